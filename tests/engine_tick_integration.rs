//! Tick integration tests: module components driven by the ECS systems.

use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemState;

use behaviorkit::components::combat::{CombatData, CombatModule};
use behaviorkit::components::kinetic::{KineticData, KineticMode, KineticModule};
use behaviorkit::components::narrative::{DialogueLine, NarrativeModule};
use behaviorkit::components::status::StatusModule;
use behaviorkit::components::vector3::Vector3;
use behaviorkit::events::combat::CombatEvent;
use behaviorkit::events::kinetic::KineticEvent;
use behaviorkit::events::narrative::DialogueEvent;
use behaviorkit::events::status::StatusChanged;
use behaviorkit::resources::worldtime::WorldTime;
use behaviorkit::systems::modules::{
    add_module_systems, init_module_messages, kinetic_module_system, update_module_messages,
};
use behaviorkit::systems::time::update_world_time;

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn make_world() -> World {
    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    init_module_messages(&mut world);
    world
}

fn tick(world: &mut World, dt: f32) {
    update_world_time(world, dt);
    let mut schedule = Schedule::default();
    add_module_systems(&mut schedule);
    schedule.run(world);
}

fn read_messages<M: Message + Clone>(world: &mut World) -> Vec<M> {
    let mut state = SystemState::<MessageReader<M>>::new(world);
    let mut reader = state.get_mut(world);
    reader.read().cloned().collect()
}

#[test]
fn kinetic_system_moves_and_reports_position() {
    let mut world = make_world();
    let mut kinetic = KineticModule::new("mover");
    kinetic.apply_impulse(Vector3::planar(100.0, 0.0));
    let entity = world.spawn(kinetic).id();

    tick(&mut world, 0.5);

    let kinetic = world.get::<KineticModule>(entity).unwrap();
    assert!(approx_eq(kinetic.position().x, 40.0));
    let events = read_messages::<KineticEvent>(&mut world);
    assert_eq!(
        events,
        vec![KineticEvent::PositionChanged {
            module_id: "mover".into(),
            position: Vector3::planar(40.0, 0.0),
        }]
    );
}

#[test]
fn time_scale_slows_modules() {
    let mut world = make_world();
    world.resource_mut::<WorldTime>().time_scale = 0.5;
    let entity = world.spawn(CombatModule::new("gun")).id();

    tick(&mut world, 1.0);

    let combat = world.get::<CombatModule>(entity).unwrap();
    assert!(approx_eq(combat.game_time(), 0.5));
    assert!(!combat.can_attack());
}

#[test]
fn path_completion_message_fires_once() {
    let mut world = make_world();
    let mut kinetic = KineticModule::with_data(
        "walker",
        KineticData {
            mode: KineticMode::Path,
            path_speed: 600.0,
            ..Default::default()
        },
    );
    kinetic.set_path(
        vec![Vector3::planar(5.0, 0.0), Vector3::planar(5.0, 5.0)],
        false,
    );
    world.spawn(kinetic);

    let mut schedule = Schedule::default();
    schedule.add_systems((kinetic_module_system, update_module_messages).chain());
    let mut state = SystemState::<MessageReader<KineticEvent>>::new(&mut world);
    let mut completions = 0;
    for _ in 0..30 {
        update_world_time(&mut world, 1.0 / 60.0);
        schedule.run(&mut world);
        let mut reader = state.get_mut(&mut world);
        completions += reader
            .read()
            .filter(|e| matches!(e, KineticEvent::PathCompleted { .. }))
            .count();
    }
    assert_eq!(completions, 1);
}

#[test]
fn combat_follows_kinetic_position_on_same_entity() {
    let mut world = make_world();
    let mut kinetic = KineticModule::new("k");
    kinetic.set_position(Vector3::planar(30.0, 40.0));
    let combat = CombatModule::with_data(
        "c",
        CombatData {
            critical_chance: 0.0,
            ..Default::default()
        },
    );
    let entity = world.spawn((kinetic, combat)).id();

    tick(&mut world, 1.0);

    let mut combat = world.get_mut::<CombatModule>(entity).unwrap();
    assert_eq!(combat.position(), Vector3::planar(30.0, 40.0));
    let shots = combat.attack(Vector3::planar(30.0, 100.0));
    assert_eq!(shots.len(), 1);
    assert_eq!(shots[0].position, Vector3::planar(30.0, 40.0));

    tick(&mut world, 0.1);
    let events = read_messages::<CombatEvent>(&mut world);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], CombatEvent::Projectile(_)));
    assert!(matches!(events[1], CombatEvent::Attack { .. }));
}

#[test]
fn status_changes_are_forwarded() {
    let mut world = make_world();
    let entity = world.spawn(StatusModule::new("hp")).id();

    world
        .get_mut::<StatusModule>(entity)
        .unwrap()
        .take_damage(30.0);
    tick(&mut world, 0.016);

    let events = read_messages::<StatusChanged>(&mut world);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stat, "hp");
    assert_eq!(events[0].old_value, 100.0);
    assert_eq!(events[0].new_value, 75.0);
}

#[test]
fn dialogue_events_are_forwarded() {
    let mut world = make_world();
    let mut narrative = NarrativeModule::new("npc");
    narrative.set_dialogues(vec![DialogueLine::new("hello", "Npc", "Hi!")]);
    let entity = world.spawn(narrative).id();

    {
        let mut narrative = world.get_mut::<NarrativeModule>(entity).unwrap();
        assert!(narrative.start_dialogue("hello"));
        assert!(narrative.advance().is_none());
    }
    tick(&mut world, 0.016);

    let events = read_messages::<DialogueEvent>(&mut world);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], DialogueEvent::Start { line, .. } if line.id == "hello"));
    assert!(matches!(&events[1], DialogueEvent::End { module_id } if module_id == "npc"));
}
