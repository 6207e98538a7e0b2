//! Named predicates over an entity's modules.
//!
//! An event-condition-action layer asks questions like "is the player on the
//! ground" or "is the `gold` variable above 5" by name. Each predicate sees
//! the entity id, its [`ModuleMap`] and a parameter record, and answers with
//! a plain `bool`. A predicate whose module is missing answers `false`.
//!
//! Built-in predicates:
//!
//! | Name | Parameters | True when |
//! |---|---|---|
//! | `IsGrounded` | | the kinetic module is grounded |
//! | `IsAlive` | | the status module has hp left |
//! | `HpBelow` | `value` (default 0) | hp is strictly below `value` |
//! | `CanAttack` | | the combat module is off cooldown |
//! | `InDialogue` | | the narrative module has a current line |
//! | `VarEquals` | `key`, `value` | the story variable equals `value` (type and value) |
//! | `VarGreaterThan` | `key`, `value` | the story variable is numerically above `value` |
//!
//! Unknown names log a warning and pass.

use bevy_ecs::prelude::Resource;
use log::warn;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::components::module::ModuleMap;
use crate::components::narrative::NarrativeValue;
use crate::components::record::{FieldAlias, RecordReader};
use crate::resources::runtimeentities::RuntimeEntity;

const KEY: FieldAlias = FieldAlias::new("key", "Key");
const VALUE: FieldAlias = FieldAlias::new("value", "Value");

/// `(entity id, modules, parameters) -> holds`.
pub type ConditionFn = fn(&str, &ModuleMap, &Value) -> bool;

#[derive(Resource, Clone)]
pub struct ConditionRegistry {
    predicates: FxHashMap<String, ConditionFn>,
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("IsGrounded", is_grounded);
        registry.register("IsAlive", is_alive);
        registry.register("HpBelow", hp_below);
        registry.register("CanAttack", can_attack);
        registry.register("InDialogue", in_dialogue);
        registry.register("VarEquals", var_equals);
        registry.register("VarGreaterThan", var_greater_than);
        registry
    }
}

impl ConditionRegistry {
    pub fn empty() -> Self {
        Self {
            predicates: FxHashMap::default(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, predicate: ConditionFn) {
        self.predicates.insert(name.into(), predicate);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn evaluate(&self, name: &str, entity_id: &str, modules: &ModuleMap, params: &Value) -> bool {
        match self.predicates.get(name) {
            Some(predicate) => predicate(entity_id, modules, params),
            None => {
                warn!("Unknown condition '{}' on '{}' treated as true", name, entity_id);
                true
            }
        }
    }

    pub fn evaluate_for(&self, name: &str, entity: &RuntimeEntity, params: &Value) -> bool {
        self.evaluate(name, &entity.id, &entity.modules, params)
    }
}

fn param<'a>(params: &'a Value, field: &FieldAlias) -> Option<&'a Value> {
    RecordReader::new(params).and_then(|reader| reader.get(field))
}

fn is_grounded(_: &str, modules: &ModuleMap, _: &Value) -> bool {
    modules.kinetic().is_some_and(|k| k.is_grounded())
}

fn is_alive(_: &str, modules: &ModuleMap, _: &Value) -> bool {
    modules.status().is_some_and(|s| s.is_alive())
}

fn hp_below(_: &str, modules: &ModuleMap, params: &Value) -> bool {
    let limit = param(params, &VALUE).and_then(Value::as_f64).unwrap_or(0.0);
    modules.status().is_some_and(|s| f64::from(s.hp()) < limit)
}

fn can_attack(_: &str, modules: &ModuleMap, _: &Value) -> bool {
    modules.combat().is_some_and(|c| c.can_attack())
}

fn in_dialogue(_: &str, modules: &ModuleMap, _: &Value) -> bool {
    modules.narrative().is_some_and(|n| n.is_active())
}

fn story_variable<'a>(modules: &'a ModuleMap, params: &Value) -> Option<&'a NarrativeValue> {
    let key = param(params, &KEY)?.as_str()?;
    modules.narrative()?.get_variable(key)
}

fn var_equals(_: &str, modules: &ModuleMap, params: &Value) -> bool {
    let expected = param(params, &VALUE).and_then(NarrativeValue::from_json);
    match (story_variable(modules, params), expected) {
        (Some(stored), Some(expected)) => *stored == expected,
        _ => false,
    }
}

fn var_greater_than(_: &str, modules: &ModuleMap, params: &Value) -> bool {
    let threshold = param(params, &VALUE)
        .and_then(NarrativeValue::from_json)
        .and_then(|v| v.as_number());
    let stored = story_variable(modules, params).and_then(NarrativeValue::as_number);
    match (stored, threshold) {
        (Some(stored), Some(threshold)) => stored > threshold,
        _ => false,
    }
}
