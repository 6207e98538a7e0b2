//! Registry of module constructors keyed by kind tag.
//!
//! Module definitions are records tagged with a `type` (or `Type`) field.
//! The factory looks the tag up and hands the whole record to the matching
//! constructor, so a new module kind only needs one [`ModuleFactory::register`]
//! call. Unknown tags are logged and skipped.
//!
//! # Example
//!
//! ```
//! use behaviorkit::resources::modulefactory::ModuleFactory;
//! use serde_json::json;
//!
//! let factory = ModuleFactory::default();
//! let modules = factory
//!     .create_modules_map(&[
//!         json!({"type": "Status", "id": "hero_status", "hp": 80}),
//!         json!({"type": "Kinetic", "id": "hero_move", "mode": "Platformer"}),
//!     ])
//!     .unwrap();
//! assert_eq!(modules.status().unwrap().hp(), 80.0);
//! ```

use bevy_ecs::prelude::Resource;
use log::warn;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::components::combat::CombatModule;
use crate::components::kinetic::KineticModule;
use crate::components::module::{Module, ModuleError, ModuleMap};
use crate::components::narrative::NarrativeModule;
use crate::components::record::{self, RecordReader};
use crate::components::status::StatusModule;

/// Builds a module from its full definition record.
pub type ModuleConstructor = fn(&Value) -> Result<Box<dyn Module>, ModuleError>;

/// Map of kind tags to constructors.
#[derive(Resource, Clone)]
pub struct ModuleFactory {
    constructors: FxHashMap<String, ModuleConstructor>,
}

impl Default for ModuleFactory {
    /// A factory with the four built-in kinds registered.
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register(StatusModule::KIND, build_status);
        factory.register(KineticModule::KIND, build_kinetic);
        factory.register(CombatModule::KIND, build_combat);
        factory.register(NarrativeModule::KIND, build_narrative);
        factory
    }
}

impl std::fmt::Debug for ModuleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFactory")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ModuleFactory {
    /// A factory that knows no kinds.
    pub fn empty() -> Self {
        Self {
            constructors: FxHashMap::default(),
        }
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, constructor: ModuleConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kind tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build one module from its definition.
    ///
    /// Returns `Ok(None)` when the tag is missing or unknown. Errors come
    /// from a definition that is not a record or from the constructor itself.
    pub fn create_module(&self, definition: &Value) -> Result<Option<Box<dyn Module>>, ModuleError> {
        let reader = RecordReader::new(definition)
            .ok_or_else(|| ModuleError::NotARecord(definition.to_string()))?;
        let Some(kind) = reader.str(&record::TYPE) else {
            warn!("Module definition without a type tag skipped");
            return Ok(None);
        };
        match self.constructors.get(kind) {
            Some(constructor) => constructor(definition).map(Some),
            None => {
                warn!("Unknown module type '{}' skipped", kind);
                Ok(None)
            }
        }
    }

    /// Build every definition into a kind-keyed map, skipping unknown tags.
    pub fn create_modules_map(&self, definitions: &[Value]) -> Result<ModuleMap, ModuleError> {
        let mut modules = ModuleMap::new();
        for definition in definitions {
            if let Some(module) = self.create_module(definition)? {
                if let Some(replaced) = modules.insert(module) {
                    warn!(
                        "Duplicate {} module '{}' replaced",
                        replaced.kind(),
                        replaced.id()
                    );
                }
            }
        }
        Ok(modules)
    }
}

fn build_status(definition: &Value) -> Result<Box<dyn Module>, ModuleError> {
    Ok(Box::new(StatusModule::deserialize(definition)))
}

fn build_kinetic(definition: &Value) -> Result<Box<dyn Module>, ModuleError> {
    Ok(Box::new(KineticModule::deserialize(definition)))
}

fn build_combat(definition: &Value) -> Result<Box<dyn Module>, ModuleError> {
    Ok(Box::new(CombatModule::deserialize(definition)))
}

fn build_narrative(definition: &Value) -> Result<Box<dyn Module>, ModuleError> {
    Ok(Box::new(NarrativeModule::deserialize(definition)?))
}
