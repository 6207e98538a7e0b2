//! Event types emitted by the behavior modules.
//!
//! Modules never hold callbacks. Every operation that produces something
//! observable pushes one of these types into the module's outbox, and the
//! caller drains it after the call or at the end of the tick. When modules
//! run as ECS components the drained events are forwarded as ECS messages
//! (see [`crate::systems::modules`]).
//!
//! Submodules:
//! - [`status`] – stat changes (hp, mp, level, score, lives, custom stats)
//! - [`kinetic`] – position changes and path completion
//! - [`combat`] – attacks, critical hits and projectile spawn signals
//! - [`narrative`] – dialogue start/advance/choice/end and variable changes
pub mod combat;
pub mod kinetic;
pub mod narrative;
pub mod status;
