//! Behavior kit library.
//!
//! Engine-independent behavior modules for 2D games (stats, movement,
//! combat, dialogue) together with the factory, registry and ECS systems
//! that drive them.

pub mod components;
pub mod events;
pub mod resources;
pub mod systems;
