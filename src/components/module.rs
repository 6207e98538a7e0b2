//! The module contract shared by every behavior module.
//!
//! A module is a self-contained behavior unit attached to exactly one runtime
//! entity. It is ticked once per frame through [`Module::update`], serialized
//! to the external record shape through [`Module::serialize`], and torn down
//! with [`Module::destroy`].
//!
//! Modules never call back into the caller. Anything that would have been a
//! callback is pushed into the module's [`Outbox`] and drained by the caller
//! in the same tick.

use std::any::Any;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::components::combat::CombatModule;
use crate::components::kinetic::KineticModule;
use crate::components::narrative::NarrativeModule;
use crate::components::status::StatusModule;

/// Load-time failures. Play-time problems are modelled as return values.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{kind} module record requires a string id")]
    MissingId { kind: &'static str },
    #[error("module definition is not a record: {0}")]
    NotARecord(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid module data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Behavior contract implemented by every module kind.
pub trait Module: Any + Send + Sync {
    /// Kind tag, e.g. `"Status"`. Also the `Type` field of the serialized record.
    fn kind(&self) -> &'static str;

    /// Stable identifier.
    fn id(&self) -> &str;

    /// Advance the module by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Record with PascalCase keys, see [`crate::components::record`].
    fn serialize(&self) -> Value;

    /// Drop pending events and stop queueing new ones.
    fn destroy(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-module event queue.
///
/// Events pushed during an operation are available to the caller right after
/// that operation returns. After [`Outbox::disconnect`] pushes are dropped.
#[derive(Debug, Clone)]
pub struct Outbox<E> {
    events: Vec<E>,
    connected: bool,
}

impl<E> Default for Outbox<E> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            connected: true,
        }
    }
}

impl<E> Outbox<E> {
    pub fn push(&mut self, event: E) {
        if self.connected {
            self.events.push(event);
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    pub fn pending(&self) -> &[E] {
        &self.events
    }

    pub fn disconnect(&mut self) {
        self.events.clear();
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// The modules of one runtime entity, at most one per kind.
///
/// Insertion order is preserved so ticking is deterministic.
#[derive(Default)]
pub struct ModuleMap {
    modules: Vec<Box<dyn Module>>,
}

impl std::fmt::Debug for ModuleMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| (m.kind(), m.id())))
            .finish()
    }
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module. A module of the same kind is destroyed and returned.
    pub fn insert(&mut self, module: Box<dyn Module>) -> Option<Box<dyn Module>> {
        let kind = module.kind();
        match self.modules.iter().position(|m| m.kind() == kind) {
            Some(index) => {
                let mut old = std::mem::replace(&mut self.modules[index], module);
                old.destroy();
                Some(old)
            }
            None => {
                self.modules.push(module);
                None
            }
        }
    }

    pub fn get(&self, kind: &str) -> Option<&dyn Module> {
        self.modules
            .iter()
            .find(|m| m.kind() == kind)
            .map(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, kind: &str) -> Option<&mut (dyn Module + 'static)> {
        self.modules
            .iter_mut()
            .find(|m| m.kind() == kind)
            .map(|m| m.as_mut())
    }

    /// Downcast the module of `kind` to its concrete type.
    pub fn get_as<T: Module>(&self, kind: &str) -> Option<&T> {
        self.get(kind).and_then(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn get_as_mut<T: Module>(&mut self, kind: &str) -> Option<&mut T> {
        self.get_mut(kind)
            .and_then(|m| m.as_any_mut().downcast_mut::<T>())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Module>> {
        self.modules.iter_mut()
    }

    /// Destroy every module and empty the map.
    pub fn destroy_all(&mut self) {
        for module in &mut self.modules {
            module.destroy();
        }
        self.modules.clear();
    }

    pub fn serialize_all(&self) -> Vec<Value> {
        self.modules.iter().map(|m| m.serialize()).collect()
    }

    pub fn status(&self) -> Option<&StatusModule> {
        self.get_as(StatusModule::KIND)
    }

    pub fn status_mut(&mut self) -> Option<&mut StatusModule> {
        self.get_as_mut(StatusModule::KIND)
    }

    pub fn kinetic(&self) -> Option<&KineticModule> {
        self.get_as(KineticModule::KIND)
    }

    pub fn kinetic_mut(&mut self) -> Option<&mut KineticModule> {
        self.get_as_mut(KineticModule::KIND)
    }

    pub fn combat(&self) -> Option<&CombatModule> {
        self.get_as(CombatModule::KIND)
    }

    pub fn combat_mut(&mut self) -> Option<&mut CombatModule> {
        self.get_as_mut(CombatModule::KIND)
    }

    pub fn narrative(&self) -> Option<&NarrativeModule> {
        self.get_as(NarrativeModule::KIND)
    }

    pub fn narrative_mut(&mut self) -> Option<&mut NarrativeModule> {
        self.get_as_mut(NarrativeModule::KIND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_drain_takes_everything() {
        let mut outbox = Outbox::default();
        outbox.push(1);
        outbox.push(2);
        assert_eq!(outbox.drain(), vec![1, 2]);
        assert!(outbox.pending().is_empty());
    }

    #[test]
    fn test_outbox_disconnect_drops_events() {
        let mut outbox = Outbox::default();
        outbox.push("a");
        outbox.disconnect();
        outbox.push("b");
        assert!(!outbox.is_connected());
        assert!(outbox.drain().is_empty());
    }

    #[test]
    fn test_module_map_one_per_kind() {
        let mut map = ModuleMap::new();
        assert!(map.insert(Box::new(StatusModule::new("s1"))).is_none());
        map.insert(Box::new(KineticModule::new("k1")));
        let replaced = map.insert(Box::new(StatusModule::new("s2")));
        assert_eq!(replaced.map(|m| m.id().to_string()), Some("s1".to_string()));
        assert_eq!(map.len(), 2);
        assert_eq!(map.status().map(|s| s.id()), Some("s2"));
        assert_eq!(map.kinds(), vec!["Status", "Kinetic"]);
    }

    #[test]
    fn test_module_map_typed_access() {
        let mut map = ModuleMap::new();
        map.insert(Box::new(CombatModule::new("c")));
        assert!(map.combat().is_some());
        assert!(map.narrative().is_none());
        assert!(map.get_as::<StatusModule>(CombatModule::KIND).is_none());
        map.combat_mut().unwrap().set_target(Some("enemy".into()));
        assert_eq!(map.combat().unwrap().target_id(), Some("enemy"));
    }

    #[test]
    fn test_module_map_destroy_all() {
        let mut map = ModuleMap::new();
        map.insert(Box::new(NarrativeModule::new("n")));
        map.destroy_all();
        assert!(map.is_empty());
    }
}
