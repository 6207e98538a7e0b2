//! Behavior kit command-line simulator.
//!
//! Loads an entity file, registers every entity with its modules, runs a
//! fixed number of ticks and prints the serialized end state.
//!
//! Each tick:
//!
//! 1. Advance the [`WorldTime`] clock (fixed delta × `time_scale`)
//! 2. Update every entity (kinetic first, then combat, status, narrative)
//! 3. Auto attack: every combat module targets the living entities around it
//! 4. Drain events; projectiles with a target hit instantly
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- demos/arena.json --ticks 300 --seed 7
//! ```

use std::path::PathBuf;

use bevy_ecs::prelude::*;
use clap::Parser;
use log::{debug, info, warn};

use behaviorkit::events::combat::CombatEvent;
use behaviorkit::resources::behaviorconfig::BehaviorConfig;
use behaviorkit::resources::modulefactory::ModuleFactory;
use behaviorkit::resources::runtimeentities::{RuntimeEntities, RuntimeEntity, load_entity_file};
use behaviorkit::resources::worldtime::WorldTime;
use behaviorkit::systems::time::update_world_time;

/// Run behavior modules headless and dump the result.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Entity definition file (JSON).
    entities: PathBuf,

    /// INI configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of ticks to simulate (overrides the config file).
    #[arg(long)]
    ticks: Option<u32>,

    /// Ticks per simulated second (overrides the config file).
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Time scale (overrides the config file).
    #[arg(long)]
    time_scale: Option<f32>,

    /// Seed for critical-hit rolls (overrides the config file).
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective configuration to this INI file.
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,

    /// Write the final snapshot here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BehaviorConfig::with_path(path),
        None => BehaviorConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        if cli.config.is_some() {
            warn!("{}; using defaults", e);
        }
    }
    if let Some(ticks) = cli.ticks {
        config.ticks = ticks;
    }
    if let Some(rate) = cli.tick_rate {
        config.tick_rate = rate;
    }
    if let Some(scale) = cli.time_scale {
        config.time_scale = scale;
    }
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(path) = cli.save_config {
        config.config_path = path;
        if let Err(e) = config.save_to_file() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let definitions = match load_entity_file(&cli.entities) {
        Ok(definitions) => definitions,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut entities = RuntimeEntities::new(ModuleFactory::default());
    entities.configure(&config);
    for definition in &definitions {
        if let Err(e) = entities.register_definition(definition) {
            eprintln!("Error in entity '{}': {e}", definition.id);
            std::process::exit(1);
        }
    }

    let mut world = World::new();
    world.insert_resource(WorldTime::with_time_scale(config.time_scale));

    let mut event_count = 0;
    let mut shots = 0;
    for _ in 0..config.ticks {
        update_world_time(&mut world, config.tick_delta());
        let dt = world.resource::<WorldTime>().delta;

        entities.update_all(dt);
        shots += entities.auto_attack_all();

        let mut hits = Vec::new();
        for entity in entities.iter_mut() {
            let events = entity.drain_events();
            event_count += events.len();
            for event in events.combat {
                if let CombatEvent::Projectile(projectile) = event {
                    if let Some(target) = projectile.target_id {
                        hits.push((target, projectile.damage));
                    }
                }
            }
        }
        for (target, damage) in hits {
            if let Some(status) = entities.get_mut(&target).and_then(RuntimeEntity::status_mut) {
                let dealt = status.take_damage(damage);
                debug!("'{}' took {} damage", target, dealt);
            }
        }
    }

    let time = world.resource::<WorldTime>();
    info!(
        "Simulated {} ticks ({:.2}s) for {} entities: {} projectiles, {} events",
        time.frame_count,
        time.elapsed,
        entities.len(),
        shots,
        event_count
    );

    let snapshot = match serde_json::to_string_pretty(&entities.serialize()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    match cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, snapshot) {
                eprintln!("Error writing {}: {e}", path.display());
                std::process::exit(1);
            }
            info!("Snapshot written to {}", path.display());
        }
        None => println!("{snapshot}"),
    }
}
