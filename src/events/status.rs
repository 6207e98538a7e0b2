//! Stat change notifications.

use bevy_ecs::message::Message;

/// Emitted when a stat of a [`StatusModule`](crate::components::status::StatusModule)
/// actually changes value. Writes that leave the value unchanged emit nothing.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct StatusChanged {
    /// Id of the emitting module.
    pub module_id: String,
    /// Stat name in camelCase (`"hp"`, `"maxExp"`, ...) or the custom stat key.
    pub stat: String,
    pub old_value: f64,
    pub new_value: f64,
}
