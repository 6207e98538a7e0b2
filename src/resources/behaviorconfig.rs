//! Simulation configuration resource.
//!
//! Settings for the tick loop and module defaults, loaded from an INI file.
//! Every value has a safe default so a missing file or key is never fatal.
//!
//! # Configuration File Format
//!
//! ```ini
//! [simulation]
//! tick_rate = 60
//! time_scale = 1.0
//! ticks = 600
//!
//! [combat]
//! rng_seed = 42
//!
//! [narrative]
//! max_history_length = 100
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

use crate::components::narrative::DEFAULT_MAX_HISTORY_LENGTH;

const DEFAULT_TICK_RATE: u32 = 60;
const DEFAULT_TIME_SCALE: f32 = 1.0;
const DEFAULT_TICKS: u32 = 600;
const DEFAULT_CONFIG_PATH: &str = "./behavior.ini";

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct BehaviorConfig {
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Multiplier applied to every tick delta.
    pub time_scale: f32,
    /// Ticks to run in a batch simulation.
    pub ticks: u32,
    /// Seed for critical-hit rolls. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Dialogue backlog length for narrative modules.
    pub max_history_length: usize,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorConfig {
    pub fn new() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            time_scale: DEFAULT_TIME_SCALE,
            ticks: DEFAULT_TICKS,
            rng_seed: None,
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Fixed tick length in seconds, before `time_scale`.
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current values.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [simulation]
        if let Some(rate) = config.getuint("simulation", "tick_rate").ok().flatten() {
            self.tick_rate = rate as u32;
        }
        if let Some(scale) = config.getfloat("simulation", "time_scale").ok().flatten() {
            self.time_scale = scale as f32;
        }
        if let Some(ticks) = config.getuint("simulation", "ticks").ok().flatten() {
            self.ticks = ticks as u32;
        }

        // [combat]
        if let Some(seed) = config.getuint("combat", "rng_seed").ok().flatten() {
            self.rng_seed = Some(seed);
        }

        // [narrative]
        if let Some(max) = config
            .getuint("narrative", "max_history_length")
            .ok()
            .flatten()
        {
            self.max_history_length = max as usize;
        }

        info!(
            "Loaded config: tick_rate={}, time_scale={}, ticks={}, rng_seed={:?}, max_history_length={}",
            self.tick_rate, self.time_scale, self.ticks, self.rng_seed, self.max_history_length
        );

        Ok(())
    }

    /// Save configuration to the INI file, creating it if needed.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        config.set("simulation", "tick_rate", Some(self.tick_rate.to_string()));
        config.set("simulation", "time_scale", Some(self.time_scale.to_string()));
        config.set("simulation", "ticks", Some(self.ticks.to_string()));
        if let Some(seed) = self.rng_seed {
            config.set("combat", "rng_seed", Some(seed.to_string()));
        }
        config.set(
            "narrative",
            "max_history_length",
            Some(self.max_history_length.to_string()),
        );

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}
