//! ECS driver for the behavior modules.
//!
//! When modules live on entities as components, these systems tick them with
//! the [`WorldTime`] delta and forward their queued events as ECS messages,
//! so other systems can read them with a `MessageReader`.
//!
//! Order per tick: kinetic, then the kinetic position is copied into combat
//! modules on the same entity, then combat, status and narrative. Use
//! [`add_module_systems`] to get that order.
//!
//! # Example
//!
//! ```
//! use bevy_ecs::prelude::*;
//! use behaviorkit::components::kinetic::KineticModule;
//! use behaviorkit::resources::worldtime::WorldTime;
//! use behaviorkit::systems::modules::{add_module_systems, init_module_messages};
//!
//! let mut world = World::new();
//! world.insert_resource(WorldTime::default());
//! init_module_messages(&mut world);
//! world.spawn(KineticModule::new("mover"));
//!
//! let mut schedule = Schedule::default();
//! add_module_systems(&mut schedule);
//! schedule.run(&mut world);
//! ```

use bevy_ecs::prelude::*;

use crate::components::combat::CombatModule;
use crate::components::kinetic::KineticModule;
use crate::components::module::Module;
use crate::components::narrative::NarrativeModule;
use crate::components::status::StatusModule;
use crate::events::combat::CombatEvent;
use crate::events::kinetic::KineticEvent;
use crate::events::narrative::DialogueEvent;
use crate::events::status::StatusChanged;
use crate::resources::worldtime::WorldTime;

/// Insert the message queues written by the module systems.
pub fn init_module_messages(world: &mut World) {
    world.insert_resource(Messages::<StatusChanged>::default());
    world.insert_resource(Messages::<KineticEvent>::default());
    world.insert_resource(Messages::<CombatEvent>::default());
    world.insert_resource(Messages::<DialogueEvent>::default());
}

/// Register every module system on `schedule` in tick order.
pub fn add_module_systems(schedule: &mut Schedule) {
    schedule.add_systems(
        (
            kinetic_module_system,
            sync_combat_position_system,
            combat_module_system,
            status_module_system,
            narrative_module_system,
        )
            .chain(),
    );
}

pub fn kinetic_module_system(
    mut query: Query<&mut KineticModule>,
    time: Res<WorldTime>,
    mut writer: MessageWriter<KineticEvent>,
) {
    for mut kinetic in query.iter_mut() {
        kinetic.update(time.delta);
        writer.write_batch(kinetic.drain_events());
    }
}

/// Combat fires from wherever the entity's kinetic module put it.
pub fn sync_combat_position_system(mut query: Query<(&KineticModule, &mut CombatModule)>) {
    for (kinetic, mut combat) in query.iter_mut() {
        if combat.position() != kinetic.position() {
            combat.set_position(kinetic.position());
        }
    }
}

pub fn combat_module_system(
    mut query: Query<&mut CombatModule>,
    time: Res<WorldTime>,
    mut writer: MessageWriter<CombatEvent>,
) {
    for mut combat in query.iter_mut() {
        combat.update(time.delta);
        writer.write_batch(combat.drain_events());
    }
}

pub fn status_module_system(
    mut query: Query<&mut StatusModule>,
    time: Res<WorldTime>,
    mut writer: MessageWriter<StatusChanged>,
) {
    for mut status in query.iter_mut() {
        status.update(time.delta);
        writer.write_batch(status.drain_events());
    }
}

pub fn narrative_module_system(
    mut query: Query<&mut NarrativeModule>,
    time: Res<WorldTime>,
    mut writer: MessageWriter<DialogueEvent>,
) {
    for mut narrative in query.iter_mut() {
        narrative.update(time.delta);
        writer.write_batch(narrative.drain_events());
    }
}

/// Advance all module message queues. Run once per tick after the readers.
pub fn update_module_messages(
    mut status: ResMut<Messages<StatusChanged>>,
    mut kinetic: ResMut<Messages<KineticEvent>>,
    mut combat: ResMut<Messages<CombatEvent>>,
    mut dialogue: ResMut<Messages<DialogueEvent>>,
) {
    status.update();
    kinetic.update();
    combat.update();
    dialogue.update();
}
