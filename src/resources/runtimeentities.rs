//! Runtime entities and the registry that owns them.
//!
//! A [`RuntimeEntity`] groups an id, a type tag, a display name, a position
//! and the entity's live modules. [`RuntimeEntities`] is an explicit registry
//! object: create as many as needed, each with its own [`ModuleFactory`].
//!
//! Removing an entity, or replacing it by registering the same id again,
//! destroys its modules first so no queued events outlive it.
//!
//! # Entity files
//!
//! [`load_entity_file`] reads a JSON array of entity definitions, or an
//! object with an `entities` array:
//!
//! ```json
//! [{
//!   "id": "hero", "type": "Player", "name": "Hero",
//!   "position": {"x": 0, "y": 0},
//!   "modules": [{"type": "Status", "id": "hero_status", "hp": 120}]
//! }]
//! ```

use std::path::Path;

use bevy_ecs::prelude::Resource;
use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::components::combat::{CombatModule, TargetInfo};
use crate::components::kinetic::{KineticMode, KineticModule};
use crate::components::module::{Module, ModuleError, ModuleMap};
use crate::components::narrative::{self, NarrativeModule};
use crate::components::record::{self, RecordReader, pascal_keys};
use crate::components::status::StatusModule;
use crate::components::vector3::Vector3;
use crate::events::combat::CombatEvent;
use crate::events::kinetic::KineticEvent;
use crate::events::narrative::DialogueEvent;
use crate::events::status::StatusChanged;
use crate::resources::behaviorconfig::BehaviorConfig;
use crate::resources::modulefactory::ModuleFactory;

/// Authored description of one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(rename = "type", alias = "Type", default)]
    pub entity_type: String,
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Position")]
    pub position: Vector3,
    /// Module-definition records, see [`ModuleFactory`].
    #[serde(default, alias = "Modules")]
    pub modules: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntityFile {
    List(Vec<EntityDefinition>),
    Wrapped {
        #[serde(alias = "Entities")]
        entities: Vec<EntityDefinition>,
    },
}

/// Read entity definitions from a JSON file.
pub fn load_entity_file(path: impl AsRef<Path>) -> Result<Vec<EntityDefinition>, ModuleError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ModuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: EntityFile = serde_json::from_str(&text)?;
    Ok(match file {
        EntityFile::List(entities) | EntityFile::Wrapped { entities } => entities,
    })
}

/// Events drained from every module of one entity.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityEvents {
    pub status: Vec<StatusChanged>,
    pub kinetic: Vec<KineticEvent>,
    pub combat: Vec<CombatEvent>,
    pub dialogue: Vec<DialogueEvent>,
}

impl EntityEvents {
    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
            && self.kinetic.is_empty()
            && self.combat.is_empty()
            && self.dialogue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.status.len() + self.kinetic.len() + self.combat.len() + self.dialogue.len()
    }
}

/// One id with its live modules.
#[derive(Debug)]
pub struct RuntimeEntity {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    /// Mirrors the kinetic module's position after each [`update`](Self::update).
    pub position: Vector3,
    pub modules: ModuleMap,
}

impl RuntimeEntity {
    pub fn new(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        name: impl Into<String>,
        position: Vector3,
        mut modules: ModuleMap,
    ) -> Self {
        if let Some(kinetic) = modules.kinetic_mut() {
            kinetic.set_position(position);
        }
        if let Some(combat) = modules.combat_mut() {
            combat.set_position(position);
        }
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            name: name.into(),
            position,
            modules,
        }
    }

    /// Tick every module. Kinetic runs first so combat fires from the new position.
    pub fn update(&mut self, dt: f32) {
        if let Some(kinetic) = self.modules.kinetic_mut() {
            kinetic.update(dt);
            self.position = kinetic.position();
        }
        if let Some(combat) = self.modules.combat_mut() {
            combat.set_position(self.position);
        }
        for module in self.modules.iter_mut() {
            if module.kind() != KineticModule::KIND {
                module.update(dt);
            }
        }
    }

    pub fn module(&self, kind: &str) -> Option<&dyn Module> {
        self.modules.get(kind)
    }

    pub fn status(&self) -> Option<&StatusModule> {
        self.modules.status()
    }

    pub fn status_mut(&mut self) -> Option<&mut StatusModule> {
        self.modules.status_mut()
    }

    pub fn kinetic(&self) -> Option<&KineticModule> {
        self.modules.kinetic()
    }

    pub fn kinetic_mut(&mut self) -> Option<&mut KineticModule> {
        self.modules.kinetic_mut()
    }

    pub fn combat(&self) -> Option<&CombatModule> {
        self.modules.combat()
    }

    pub fn combat_mut(&mut self) -> Option<&mut CombatModule> {
        self.modules.combat_mut()
    }

    pub fn narrative(&self) -> Option<&NarrativeModule> {
        self.modules.narrative()
    }

    pub fn narrative_mut(&mut self) -> Option<&mut NarrativeModule> {
        self.modules.narrative_mut()
    }

    /// This entity as a combat candidate: hp from its status module, path
    /// progress (0..1) from a path-following kinetic module.
    pub fn target_info(&self) -> TargetInfo {
        TargetInfo {
            id: self.id.clone(),
            position: self.position,
            hp: self.status().map(StatusModule::hp),
            path_progress: self.kinetic().and_then(|k| {
                let points = k.data().path_points.len();
                (k.mode() == KineticMode::Path && points > 0).then(|| {
                    if k.path_completed() {
                        1.0
                    } else {
                        k.current_path_index() as f32 / points as f32
                    }
                })
            }),
        }
    }

    /// Take the queued events of every module.
    pub fn drain_events(&mut self) -> EntityEvents {
        EntityEvents {
            status: self
                .modules
                .status_mut()
                .map(StatusModule::drain_events)
                .unwrap_or_default(),
            kinetic: self
                .modules
                .kinetic_mut()
                .map(KineticModule::drain_events)
                .unwrap_or_default(),
            combat: self
                .modules
                .combat_mut()
                .map(CombatModule::drain_events)
                .unwrap_or_default(),
            dialogue: self
                .modules
                .narrative_mut()
                .map(NarrativeModule::drain_events)
                .unwrap_or_default(),
        }
    }

    /// Entity record with PascalCase keys, modules included.
    pub fn serialize(&self) -> Value {
        let mut out = pascal_keys(json!({
            "id": self.id,
            "type": self.entity_type,
            "name": self.name,
            "position": self.position,
        }));
        if let Value::Object(map) = &mut out {
            map.insert("Modules".to_string(), Value::Array(self.modules.serialize_all()));
        }
        out
    }

    pub fn destroy(&mut self) {
        self.modules.destroy_all();
    }
}

/// Explicit registry of runtime entities, in registration order.
#[derive(Resource, Debug, Default)]
pub struct RuntimeEntities {
    factory: ModuleFactory,
    entities: Vec<RuntimeEntity>,
    index: FxHashMap<String, usize>,
    rng_seed: Option<u64>,
    max_history_length: Option<usize>,
    registered: u64,
}

impl RuntimeEntities {
    pub fn new(factory: ModuleFactory) -> Self {
        Self {
            factory,
            ..Default::default()
        }
    }

    /// Seed combat rolls and size dialogue backlogs of entities registered from now on.
    ///
    /// Each combat module gets `rng_seed + registration number`, so runs with
    /// the same file and seed are reproducible. The history length only fills
    /// in for narrative definitions that do not set `maxHistoryLength`.
    pub fn configure(&mut self, config: &BehaviorConfig) {
        self.rng_seed = config.rng_seed;
        self.max_history_length = Some(config.max_history_length);
    }

    pub fn factory(&self) -> &ModuleFactory {
        &self.factory
    }

    /// Build the entity's modules and register it, replacing (and
    /// destroying) any entity with the same id.
    pub fn register(
        &mut self,
        id: &str,
        entity_type: &str,
        name: &str,
        position: Vector3,
        definitions: &[Value],
    ) -> Result<&mut RuntimeEntity, ModuleError> {
        let modules = self.factory.create_modules_map(definitions)?;
        let mut entity = RuntimeEntity::new(id, entity_type, name, position, modules);

        if let (Some(seed), Some(combat)) = (self.rng_seed, entity.combat_mut()) {
            combat.seed_rng(seed.wrapping_add(self.registered));
        }
        if !authors_history_length(definitions) {
            if let (Some(max), Some(narrative)) = (self.max_history_length, entity.narrative_mut()) {
                narrative.set_max_history_length(max);
            }
        }
        self.registered += 1;

        info!(
            "Registered runtime entity '{}' with modules {:?}",
            id,
            entity.modules.kinds()
        );

        let slot = match self.index.get(id) {
            Some(&slot) => {
                warn!("Runtime entity '{}' replaced", id);
                self.entities[slot].destroy();
                self.entities[slot] = entity;
                slot
            }
            None => {
                self.entities.push(entity);
                self.index.insert(id.to_string(), self.entities.len() - 1);
                self.entities.len() - 1
            }
        };
        Ok(&mut self.entities[slot])
    }

    /// Register an authored definition.
    pub fn register_definition(
        &mut self,
        definition: &EntityDefinition,
    ) -> Result<&mut RuntimeEntity, ModuleError> {
        self.register(
            &definition.id,
            &definition.entity_type,
            &definition.name,
            definition.position,
            &definition.modules,
        )
    }

    /// Destroy the entity's modules and remove it. Returns whether it existed.
    pub fn unregister(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.remove(id) else {
            return false;
        };
        let mut entity = self.entities.remove(slot);
        entity.destroy();
        self.reindex();
        info!("Unregistered runtime entity '{}'", id);
        true
    }

    /// Destroy and remove every entity.
    pub fn clear(&mut self) {
        for entity in &mut self.entities {
            entity.destroy();
        }
        self.entities.clear();
        self.index.clear();
    }

    fn reindex(&mut self) {
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
    }

    pub fn get(&self, id: &str) -> Option<&RuntimeEntity> {
        self.index.get(id).map(|&i| &self.entities[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RuntimeEntity> {
        self.index.get(id).map(|&i| &mut self.entities[i])
    }

    /// Read-only lookup of one module of one entity.
    pub fn module(&self, entity_id: &str, kind: &str) -> Option<&dyn Module> {
        self.get(entity_id).and_then(|e| e.module(kind))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuntimeEntity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RuntimeEntity> {
        self.entities.iter_mut()
    }

    /// Tick every entity in registration order.
    pub fn update_all(&mut self, dt: f32) {
        for entity in &mut self.entities {
            entity.update(dt);
        }
    }

    /// Run auto attack for every combat entity against every other entity
    /// that has a living status module.
    ///
    /// Returns the total number of projectiles fired.
    pub fn auto_attack_all(&mut self) -> usize {
        let candidates: Vec<TargetInfo> = self
            .entities
            .iter()
            .filter(|e| e.status().is_some_and(StatusModule::is_alive))
            .map(RuntimeEntity::target_info)
            .collect();

        let mut fired = 0;
        for entity in &mut self.entities {
            let id = entity.id.clone();
            if let Some(combat) = entity.combat_mut() {
                let targets: Vec<TargetInfo> =
                    candidates.iter().filter(|t| t.id != id).cloned().collect();
                fired += combat.update_auto_attack(&targets).len();
            }
        }
        fired
    }

    /// Every entity as a record, in registration order.
    pub fn serialize(&self) -> Value {
        Value::Array(self.entities.iter().map(RuntimeEntity::serialize).collect())
    }
}

/// Whether a narrative definition in `definitions` sets its own history length.
fn authors_history_length(definitions: &[Value]) -> bool {
    definitions.iter().filter_map(RecordReader::new).any(|reader| {
        reader.str(&record::TYPE) == Some(NarrativeModule::KIND)
            && reader.get(&narrative::MAX_HISTORY_LENGTH).is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RuntimeEntities {
        RuntimeEntities::new(ModuleFactory::default())
    }

    fn hero_modules() -> Vec<Value> {
        vec![
            json!({"type": "Status", "id": "hero_status"}),
            json!({"type": "Kinetic", "id": "hero_move"}),
            json!({"type": "Combat", "id": "hero_gun"}),
        ]
    }

    #[test]
    fn test_register_and_lookup() {
        let mut entities = registry();
        let hero = entities
            .register("hero", "Player", "Hero", Vector3::planar(5.0, 6.0), &hero_modules())
            .unwrap();
        assert_eq!(hero.modules.len(), 3);
        assert_eq!(hero.kinetic().unwrap().position(), Vector3::planar(5.0, 6.0));
        assert!(entities.contains("hero"));
        assert_eq!(entities.module("hero", "Status").map(|m| m.id()), Some("hero_status"));
        assert!(entities.module("hero", "Narrative").is_none());
        assert!(entities.get("nobody").is_none());
    }

    #[test]
    fn test_register_same_id_replaces() {
        let mut entities = registry();
        entities.register("a", "Enemy", "A", Vector3::ZERO, &[]).unwrap();
        entities.register("b", "Enemy", "B", Vector3::ZERO, &[]).unwrap();
        entities.register("a", "Enemy", "A2", Vector3::ZERO, &[]).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities.get("a").unwrap().name, "A2");
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_register_propagates_narrative_error() {
        let mut entities = registry();
        let result = entities.register("npc", "Npc", "Npc", Vector3::ZERO, &[json!({"type": "Narrative"})]);
        assert!(result.is_err());
        assert!(entities.is_empty());
    }

    #[test]
    fn test_unregister_and_clear() {
        let mut entities = registry();
        entities.register("a", "", "", Vector3::ZERO, &hero_modules()).unwrap();
        entities.register("b", "", "", Vector3::ZERO, &[]).unwrap();
        entities.register("c", "", "", Vector3::ZERO, &[]).unwrap();
        assert!(entities.unregister("a"));
        assert!(!entities.unregister("a"));
        assert_eq!(entities.get("c").map(|e| e.id.as_str()), Some("c"));
        entities.clear();
        assert!(entities.is_empty());
        assert!(entities.get("b").is_none());
    }

    #[test]
    fn test_update_mirrors_kinetic_position() {
        let mut entities = registry();
        let hero = entities
            .register("hero", "Player", "Hero", Vector3::ZERO, &hero_modules())
            .unwrap();
        hero.kinetic_mut().unwrap().apply_impulse(Vector3::planar(100.0, 0.0));
        entities.update_all(0.5);

        let hero = entities.get("hero").unwrap();
        assert!(hero.position.x > 0.0);
        assert_eq!(hero.position, hero.kinetic().unwrap().position());
        assert_eq!(hero.position, hero.combat().unwrap().position());
        assert!((hero.combat().unwrap().game_time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_auto_attack_all_skips_self_and_dead() {
        let mut entities = registry();
        entities
            .register("tower", "Tower", "Tower", Vector3::ZERO, &[
                json!({"type": "Combat", "id": "tower_gun", "criticalChance": 0}),
                json!({"type": "Status", "id": "tower_status"}),
            ])
            .unwrap();
        entities
            .register("ghost", "Enemy", "Ghost", Vector3::planar(10.0, 0.0), &[
                json!({"type": "Status", "id": "ghost_status", "hp": 0}),
            ])
            .unwrap();
        entities
            .register("orc", "Enemy", "Orc", Vector3::planar(50.0, 0.0), &[
                json!({"type": "Status", "id": "orc_status"}),
            ])
            .unwrap();

        entities.update_all(1.0);
        assert_eq!(entities.auto_attack_all(), 1);
        let tower = entities.get_mut("tower").unwrap();
        assert_eq!(tower.combat().unwrap().target_id(), Some("orc"));
        let events = tower.drain_events();
        assert_eq!(events.combat.len(), 2);
    }

    #[test]
    fn test_configure_seeds_and_sizes_history() {
        let mut entities = registry();
        let config = BehaviorConfig {
            rng_seed: Some(9),
            max_history_length: 3,
            ..BehaviorConfig::new()
        };
        entities.configure(&config);
        let npc = entities
            .register("npc", "Npc", "Npc", Vector3::ZERO, &[json!({"type": "Narrative", "id": "talk"})])
            .unwrap();
        assert_eq!(npc.narrative().unwrap().data().max_history_length, 3);
    }

    #[test]
    fn test_authored_history_length_wins_over_config() {
        let mut entities = registry();
        entities.configure(&BehaviorConfig::new());
        let npc = entities
            .register(
                "npc",
                "Npc",
                "Npc",
                Vector3::ZERO,
                &[json!({"type": "Narrative", "id": "talk", "maxHistoryLength": 5})],
            )
            .unwrap();
        assert_eq!(npc.narrative().unwrap().data().max_history_length, 5);

        let sage = entities
            .register(
                "sage",
                "Npc",
                "Sage",
                Vector3::ZERO,
                &[json!({"Type": "Narrative", "Id": "sage_talk", "MaxHistoryLength": 2})],
            )
            .unwrap();
        assert_eq!(sage.narrative().unwrap().data().max_history_length, 2);
    }

    #[test]
    fn test_serialize_entity() {
        let mut entities = registry();
        entities
            .register("hero", "Player", "Hero", Vector3::planar(1.0, 2.0), &hero_modules())
            .unwrap();
        let record = entities.get("hero").unwrap().serialize();
        assert_eq!(record["Id"], "hero");
        assert_eq!(record["Type"], "Player");
        assert_eq!(record["Position"]["Y"], 2.0);
        assert_eq!(record["Modules"].as_array().map(Vec::len), Some(3));
        assert_eq!(record["Modules"][1]["Type"], "Kinetic");
    }

    #[test]
    fn test_entity_definition_accepts_both_casings() {
        let lower: EntityDefinition = serde_json::from_value(json!({
            "id": "a", "type": "Enemy", "position": {"x": 1, "y": 2}, "modules": []
        }))
        .unwrap();
        let upper: EntityDefinition = serde_json::from_value(json!({
            "Id": "a", "Type": "Enemy", "Position": {"X": 1, "Y": 2}, "Modules": []
        }))
        .unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.position, Vector3::planar(1.0, 2.0));
    }
}
