//! Simulation clock shared by the module systems.
//!
//! Advanced once per tick by [`update_world_time`](crate::systems::time::update_world_time).
use bevy_ecs::prelude::Resource;

#[derive(Resource, Clone, Copy, Debug)]
pub struct WorldTime {
    /// Scaled seconds since the simulation started.
    pub elapsed: f32,
    /// Scaled seconds of the current tick.
    pub delta: f32,
    pub time_scale: f32,
    /// Ticks run so far.
    pub frame_count: u64,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
            frame_count: 0,
        }
    }
}

impl WorldTime {
    pub fn with_time_scale(time_scale: f32) -> Self {
        WorldTime {
            time_scale,
            ..Default::default()
        }
    }
}
