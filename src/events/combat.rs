//! Combat notifications and projectile spawn signals.
//!
//! The combat module never creates renderable objects. Each fired projectile
//! is described by a [`ProjectileSpawn`] that the caller turns into whatever
//! its engine uses for bullets.

use bevy_ecs::message::Message;
use serde::{Deserialize, Serialize};

use crate::components::vector3::Vector3;

/// Everything a renderer or physics layer needs to spawn one projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSpawn {
    /// Unique per emitting module: `proj_<module id>_<counter>`.
    pub id: String,
    /// Id of the emitting combat module.
    pub from_id: String,
    pub target_id: Option<String>,
    /// Spawn position (the module's position at fire time).
    pub position: Vector3,
    /// Unit direction of travel.
    pub direction: Vector3,
    pub speed: f32,
    /// Projectile type tag (texture/prefab key).
    #[serde(rename = "type")]
    pub projectile_type: String,
    /// Final damage, floored to an integer value.
    pub damage: f32,
    /// Number of targets the projectile passes through (0 = single target).
    pub pierce_count: u32,
    /// Area damage radius (0 = single target).
    pub explosion_radius: f32,
}

#[derive(Message, Debug, Clone, PartialEq)]
pub enum CombatEvent {
    /// An attack was carried out.
    Attack {
        module_id: String,
        target_id: Option<String>,
    },
    /// A projectile was generated by an attack.
    Projectile(ProjectileSpawn),
    /// A damage roll came up critical.
    Critical { module_id: String, damage: f32 },
}
