//! Movement notifications.
//!
//! A renderer mirrors the entity by listening for
//! [`KineticEvent::PositionChanged`]; path followers additionally report
//! [`KineticEvent::PathCompleted`] once when the last waypoint is reached.

use bevy_ecs::message::Message;

use crate::components::vector3::Vector3;

#[derive(Message, Debug, Clone, PartialEq)]
pub enum KineticEvent {
    /// The module's position moved to `position`.
    PositionChanged { module_id: String, position: Vector3 },
    /// A non-looping path reached its final waypoint.
    PathCompleted { module_id: String },
}
