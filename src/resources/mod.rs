//! Long-lived objects shared by the simulation.
//!
//! Each of these is a plain type usable on its own and also derives
//! `Resource` so it can live in an ECS world.
//!
//! Overview
//! - `behaviorconfig` – tick loop settings loaded from an INI file
//! - `conditions` – named predicates over an entity's modules
//! - `modulefactory` – kind tag → module constructor registry
//! - `runtimeentities` – runtime entities and their explicit registry
//! - `worldtime` – simulation time and delta
pub mod behaviorconfig;
pub mod conditions;
pub mod modulefactory;
pub mod runtimeentities;
pub mod worldtime;
