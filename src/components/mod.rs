//! Behavior modules and the value types they share.
//!
//! Every module is a plain struct that also derives `Component`, so it can be
//! driven directly by a caller or attached to an ECS entity and ticked by
//! [`crate::systems::modules`].
//!
//! Submodules overview:
//! - [`combat`] – targeting, attack cadence and bullet patterns
//! - [`kinetic`] – top-down, platformer and path-following movement
//! - [`module`] – the [`module::Module`] contract, event outbox and per-entity module map
//! - [`narrative`] – dialogue graph, choices and story variables
//! - [`record`] – PascalCase record keys and dual-cased field lookup
//! - [`status`] – hp/mp, leveling, lives, score and custom stats
//! - [`vector3`] – 3D vector value type

pub mod combat;
pub mod kinetic;
pub mod module;
pub mod narrative;
pub mod record;
pub mod status;
pub mod vector3;
