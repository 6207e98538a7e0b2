//! Simulation systems.
//!
//! Submodules overview
//! - [`modules`] – tick module components and forward their events as messages
//! - [`time`] – advance the simulation clock

pub mod modules;
pub mod time;
