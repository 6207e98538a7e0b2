//! Combat module: target selection, attack cadence and projectile patterns.
//!
//! The module keeps its own clock, advanced by [`Module::update`], and gates
//! attacks on `attack_interval`. Attacks produce [`ProjectileSpawn`] values
//! (returned and queued as [`CombatEvent::Projectile`]); spawning anything
//! renderable is the caller's job.
//!
//! # Targeting
//!
//! [`CombatModule::find_target`] first drops every candidate outside
//! `attack_range`, then picks by [`TargetingMode`]. Ties go to the candidate
//! that appears first in the list.
//!
//! # Bullet patterns
//!
//! | Pattern | Projectiles per attack |
//! |---|---|
//! | `Single`, `Aimed` | one, toward the target |
//! | `Spread` | `bullet_count`, fanned over `spread_angle` degrees around the aim |
//! | `Circle` | `bullet_count`, evenly spaced over a full turn |
//! | `Spiral` | one, rotating `spiral_speed` degrees per attack |

use std::any::Any;
use std::f32::consts::{PI, TAU};

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::components::module::{Module, Outbox};
use crate::components::record::{self, FieldAlias, RecordReader, pascal_keys};
use crate::components::vector3::Vector3;
use crate::events::combat::{CombatEvent, ProjectileSpawn};

const ATTACK_TYPE: FieldAlias = FieldAlias::new("attackType", "AttackType");
const ATTACK_RANGE: FieldAlias = FieldAlias::new("attackRange", "AttackRange");
const ATTACK_INTERVAL: FieldAlias = FieldAlias::new("attackInterval", "AttackInterval");
const LAST_ATTACK_TIME: FieldAlias = FieldAlias::new("lastAttackTime", "LastAttackTime");
const GAME_TIME: FieldAlias = FieldAlias::new("gameTime", "GameTime");
const SPIRAL_ANGLE: FieldAlias = FieldAlias::new("spiralAngle", "SpiralAngle");
const PROJECTILE_COUNTER: FieldAlias = FieldAlias::new("projectileCounter", "ProjectileCounter");
const DAMAGE: FieldAlias = FieldAlias::new("damage", "Damage");
const CRITICAL_CHANCE: FieldAlias = FieldAlias::new("criticalChance", "CriticalChance");
const CRITICAL_MULTIPLIER: FieldAlias = FieldAlias::new("criticalMultiplier", "CriticalMultiplier");
const PROJECTILE_SPEED: FieldAlias = FieldAlias::new("projectileSpeed", "ProjectileSpeed");
const PROJECTILE_TYPE: FieldAlias = FieldAlias::new("projectileType", "ProjectileType");
const PIERCE_COUNT: FieldAlias = FieldAlias::new("pierceCount", "PierceCount");
const EXPLOSION_RADIUS: FieldAlias = FieldAlias::new("explosionRadius", "ExplosionRadius");
const TARGET_ID: FieldAlias = FieldAlias::new("targetId", "TargetId");
const TARGETING_MODE: FieldAlias = FieldAlias::new("targetingMode", "TargetingMode");
const AUTO_ATTACK: FieldAlias = FieldAlias::new("autoAttack", "AutoAttack");
const BULLET_PATTERN: FieldAlias = FieldAlias::new("bulletPattern", "BulletPattern");
const BULLET_COUNT: FieldAlias = FieldAlias::new("bulletCount", "BulletCount");
const SPREAD_ANGLE: FieldAlias = FieldAlias::new("spreadAngle", "SpreadAngle");
const SPIRAL_SPEED: FieldAlias = FieldAlias::new("spiralSpeed", "SpiralSpeed");
const POSITION: FieldAlias = FieldAlias::new("position", "Position");

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackType {
    Melee,
    #[default]
    Ranged,
    Area,
    Beam,
}

impl AttackType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttackType::Melee => "Melee",
            AttackType::Ranged => "Ranged",
            AttackType::Area => "Area",
            AttackType::Beam => "Beam",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Melee" => Some(AttackType::Melee),
            "Ranged" => Some(AttackType::Ranged),
            "Area" => Some(AttackType::Area),
            "Beam" => Some(AttackType::Beam),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetingMode {
    #[default]
    Nearest,
    Farthest,
    LowestHp,
    HighestHp,
    /// Furthest along its path (tower defense lanes).
    First,
    /// Keep whatever target was assigned with [`CombatModule::set_target`].
    Manual,
}

impl TargetingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetingMode::Nearest => "Nearest",
            TargetingMode::Farthest => "Farthest",
            TargetingMode::LowestHp => "LowestHp",
            TargetingMode::HighestHp => "HighestHp",
            TargetingMode::First => "First",
            TargetingMode::Manual => "Manual",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Nearest" => Some(TargetingMode::Nearest),
            "Farthest" => Some(TargetingMode::Farthest),
            "LowestHp" => Some(TargetingMode::LowestHp),
            "HighestHp" => Some(TargetingMode::HighestHp),
            "First" => Some(TargetingMode::First),
            "Manual" => Some(TargetingMode::Manual),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulletPattern {
    #[default]
    Single,
    Spread,
    Circle,
    Spiral,
    Aimed,
}

impl BulletPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            BulletPattern::Single => "Single",
            BulletPattern::Spread => "Spread",
            BulletPattern::Circle => "Circle",
            BulletPattern::Spiral => "Spiral",
            BulletPattern::Aimed => "Aimed",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Single" => Some(BulletPattern::Single),
            "Spread" => Some(BulletPattern::Spread),
            "Circle" => Some(BulletPattern::Circle),
            "Spiral" => Some(BulletPattern::Spiral),
            "Aimed" => Some(BulletPattern::Aimed),
            _ => None,
        }
    }
}

/// A candidate target supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    pub position: Vector3,
    #[serde(default)]
    pub hp: Option<f32>,
    #[serde(default)]
    pub path_progress: Option<f32>,
}

impl TargetInfo {
    pub fn new(id: impl Into<String>, position: Vector3) -> Self {
        Self {
            id: id.into(),
            position,
            hp: None,
            path_progress: None,
        }
    }

    pub fn with_hp(mut self, hp: f32) -> Self {
        self.hp = Some(hp);
        self
    }

    pub fn with_path_progress(mut self, progress: f32) -> Self {
        self.path_progress = Some(progress);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CombatData {
    pub attack_type: AttackType,
    pub attack_range: f32,
    /// Seconds between attacks.
    pub attack_interval: f32,
    pub last_attack_time: f32,
    pub damage: f32,
    /// Probability in 0..1.
    pub critical_chance: f32,
    pub critical_multiplier: f32,
    pub projectile_speed: f32,
    /// Texture or prefab key forwarded with each projectile.
    pub projectile_type: String,
    pub pierce_count: u32,
    pub explosion_radius: f32,
    pub target_id: Option<String>,
    pub targeting_mode: TargetingMode,
    pub auto_attack: bool,

    pub bullet_pattern: BulletPattern,
    pub bullet_count: u32,
    /// Degrees.
    pub spread_angle: f32,
    /// Degrees per attack.
    pub spiral_speed: f32,
}

impl Default for CombatData {
    fn default() -> Self {
        Self {
            attack_type: AttackType::Ranged,
            attack_range: 100.0,
            attack_interval: 1.0,
            last_attack_time: 0.0,
            damage: 10.0,
            critical_chance: 0.1,
            critical_multiplier: 2.0,
            projectile_speed: 300.0,
            projectile_type: "default".to_string(),
            pierce_count: 0,
            explosion_radius: 0.0,
            target_id: None,
            targeting_mode: TargetingMode::Nearest,
            auto_attack: true,
            bullet_pattern: BulletPattern::Single,
            bullet_count: 1,
            spread_angle: 30.0,
            spiral_speed: 90.0,
        }
    }
}

/// Combat module. See the [module docs](self).
#[derive(Component, Debug, Clone)]
pub struct CombatModule {
    id: String,
    data: CombatData,
    /// Mirrored from the owning entity before targeting or attacking.
    position: Vector3,
    game_time: f32,
    spiral_angle: f32,
    projectile_counter: u64,
    rng: fastrand::Rng,
    outbox: Outbox<CombatEvent>,
}

impl CombatModule {
    pub const KIND: &'static str = "Combat";

    pub fn new(id: impl Into<String>) -> Self {
        Self::with_data(id, CombatData::default())
    }

    pub fn with_data(id: impl Into<String>, data: CombatData) -> Self {
        Self {
            id: id.into(),
            data,
            position: Vector3::ZERO,
            game_time: 0.0,
            spiral_angle: 0.0,
            projectile_counter: 0,
            rng: fastrand::Rng::new(),
            outbox: Outbox::default(),
        }
    }

    /// Reseed the critical-hit roll for reproducible runs.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    pub fn data(&self) -> &CombatData {
        &self.data
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }

    pub fn attack_range(&self) -> f32 {
        self.data.attack_range
    }

    pub fn attack_interval(&self) -> f32 {
        self.data.attack_interval
    }

    pub fn damage(&self) -> f32 {
        self.data.damage
    }

    pub fn target_id(&self) -> Option<&str> {
        self.data.target_id.as_deref()
    }

    pub fn game_time(&self) -> f32 {
        self.game_time
    }

    pub fn auto_attack(&self) -> bool {
        self.data.auto_attack
    }

    pub fn set_auto_attack(&mut self, enabled: bool) {
        self.data.auto_attack = enabled;
    }

    pub fn set_targeting_mode(&mut self, mode: TargetingMode) {
        self.data.targeting_mode = mode;
    }

    pub fn set_bullet_pattern(&mut self, pattern: BulletPattern) {
        self.data.bullet_pattern = pattern;
    }

    /// True once `attack_interval` seconds have passed since the last attack.
    pub fn can_attack(&self) -> bool {
        self.game_time - self.data.last_attack_time >= self.data.attack_interval
    }

    pub fn set_target(&mut self, target_id: Option<String>) {
        self.data.target_id = target_id;
    }

    pub fn is_in_range(&self, target_position: Vector3) -> bool {
        self.position.distance(target_position) <= self.data.attack_range
    }

    /// Pick a target among `targets` according to the targeting mode.
    ///
    /// Returns `None` when no candidate is in range. `Manual` returns the
    /// currently assigned target as long as something is in range.
    pub fn find_target(&self, targets: &[TargetInfo]) -> Option<String> {
        let in_range: Vec<&TargetInfo> = targets
            .iter()
            .filter(|t| self.is_in_range(t.position))
            .collect();
        let first = *in_range.first()?;

        let distance = |t: &TargetInfo| self.position.distance(t.position);
        let picked = match self.data.targeting_mode {
            TargetingMode::Nearest => pick_by(&in_range, |t| Some(-distance(t))),
            TargetingMode::Farthest => pick_by(&in_range, |t| Some(distance(t))),
            TargetingMode::LowestHp => pick_by(&in_range, |t| t.hp.map(|hp| -hp)),
            TargetingMode::HighestHp => pick_by(&in_range, |t| t.hp),
            TargetingMode::First => pick_by(&in_range, |t| t.path_progress),
            TargetingMode::Manual => return self.data.target_id.clone(),
        };
        Some(picked.unwrap_or(first).id.clone())
    }

    /// Fire at `target_position` if the cadence allows.
    ///
    /// Returns the generated projectiles (empty when on cooldown). Queues one
    /// [`CombatEvent::Projectile`] per projectile followed by one
    /// [`CombatEvent::Attack`].
    pub fn attack(&mut self, target_position: Vector3) -> Vec<ProjectileSpawn> {
        if !self.can_attack() {
            return Vec::new();
        }
        self.data.last_attack_time = self.game_time;

        let projectiles = self.create_projectiles(target_position);
        for projectile in &projectiles {
            self.outbox.push(CombatEvent::Projectile(projectile.clone()));
        }
        self.outbox.push(CombatEvent::Attack {
            module_id: self.id.clone(),
            target_id: self.data.target_id.clone(),
        });
        projectiles
    }

    /// Target and fire in one call. Does nothing unless auto attack is on.
    pub fn update_auto_attack(&mut self, targets: &[TargetInfo]) -> Vec<ProjectileSpawn> {
        if !self.data.auto_attack {
            return Vec::new();
        }
        let Some(target_id) = self.find_target(targets) else {
            return Vec::new();
        };
        let Some(target_position) = targets
            .iter()
            .find(|t| t.id == target_id)
            .map(|t| t.position)
        else {
            return Vec::new();
        };
        self.data.target_id = Some(target_id);
        self.attack(target_position)
    }

    /// Take every queued [`CombatEvent`].
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        self.outbox.drain()
    }

    fn create_projectiles(&mut self, target_position: Vector3) -> Vec<ProjectileSpawn> {
        let offset = target_position - self.position;
        // a target on top of the shooter has no direction; fire along +x
        let aim = if offset.magnitude() > 0.0 {
            offset.normalize()
        } else {
            Vector3::planar(1.0, 0.0)
        };
        let count = self.data.bullet_count;

        match self.data.bullet_pattern {
            BulletPattern::Single | BulletPattern::Aimed => vec![self.projectile(aim)],
            BulletPattern::Spread => {
                if count == 1 {
                    return vec![self.projectile(aim)];
                }
                let total = self.data.spread_angle.to_radians();
                let step = if count > 1 { total / (count - 1) as f32 } else { 0.0 };
                (0..count)
                    .map(|i| self.projectile(aim.rotate_z(-total / 2.0 + step * i as f32)))
                    .collect()
            }
            BulletPattern::Circle => {
                let step = if count > 0 { TAU / count as f32 } else { 0.0 };
                (0..count)
                    .map(|i| {
                        let angle = step * i as f32;
                        self.projectile(Vector3::planar(angle.cos(), angle.sin()))
                    })
                    .collect()
            }
            BulletPattern::Spiral => {
                let direction = Vector3::planar(self.spiral_angle.cos(), self.spiral_angle.sin());
                self.spiral_angle += self.data.spiral_speed * PI / 180.0;
                vec![self.projectile(direction)]
            }
        }
    }

    fn projectile(&mut self, direction: Vector3) -> ProjectileSpawn {
        let id = format!("proj_{}_{}", self.id, self.projectile_counter);
        self.projectile_counter += 1;
        ProjectileSpawn {
            id,
            from_id: self.id.clone(),
            target_id: self.data.target_id.clone(),
            position: self.position,
            direction,
            speed: self.data.projectile_speed,
            projectile_type: self.data.projectile_type.clone(),
            damage: self.roll_damage(),
            pierce_count: self.data.pierce_count,
            explosion_radius: self.data.explosion_radius,
        }
    }

    fn roll_damage(&mut self) -> f32 {
        let critical = self.rng.f32() < self.data.critical_chance;
        let damage = if critical {
            self.data.damage * self.data.critical_multiplier
        } else {
            self.data.damage
        };
        if critical {
            self.outbox.push(CombatEvent::Critical {
                module_id: self.id.clone(),
                damage,
            });
        }
        damage.floor()
    }

    /// Build a module from a record in either key casing.
    ///
    /// Missing or mistyped fields fall back to defaults; a missing id becomes "".
    pub fn deserialize(value: &Value) -> Self {
        let Some(reader) = RecordReader::new(value) else {
            return Self::new("");
        };
        let d = CombatData::default();
        let data = CombatData {
            attack_type: reader
                .str(&ATTACK_TYPE)
                .and_then(AttackType::from_tag)
                .unwrap_or(d.attack_type),
            attack_range: reader.f32(&ATTACK_RANGE).unwrap_or(d.attack_range),
            attack_interval: reader.f32(&ATTACK_INTERVAL).unwrap_or(d.attack_interval),
            last_attack_time: reader.f32(&LAST_ATTACK_TIME).unwrap_or(d.last_attack_time),
            damage: reader.f32(&DAMAGE).unwrap_or(d.damage),
            critical_chance: reader.f32(&CRITICAL_CHANCE).unwrap_or(d.critical_chance),
            critical_multiplier: reader
                .f32(&CRITICAL_MULTIPLIER)
                .unwrap_or(d.critical_multiplier),
            projectile_speed: reader.f32(&PROJECTILE_SPEED).unwrap_or(d.projectile_speed),
            projectile_type: reader
                .str(&PROJECTILE_TYPE)
                .map(str::to_string)
                .unwrap_or(d.projectile_type),
            pierce_count: reader.u32(&PIERCE_COUNT).unwrap_or(d.pierce_count),
            explosion_radius: reader.f32(&EXPLOSION_RADIUS).unwrap_or(d.explosion_radius),
            target_id: reader.str(&TARGET_ID).map(str::to_string),
            targeting_mode: reader
                .str(&TARGETING_MODE)
                .and_then(TargetingMode::from_tag)
                .unwrap_or(d.targeting_mode),
            auto_attack: reader.bool(&AUTO_ATTACK).unwrap_or(d.auto_attack),
            bullet_pattern: reader
                .str(&BULLET_PATTERN)
                .and_then(BulletPattern::from_tag)
                .unwrap_or(d.bullet_pattern),
            bullet_count: reader.u32(&BULLET_COUNT).unwrap_or(d.bullet_count),
            spread_angle: reader.f32(&SPREAD_ANGLE).unwrap_or(d.spread_angle),
            spiral_speed: reader.f32(&SPIRAL_SPEED).unwrap_or(d.spiral_speed),
        };

        let mut module = Self::with_data(reader.str(&record::ID).unwrap_or_default(), data);
        module.game_time = reader.f32(&GAME_TIME).unwrap_or(0.0);
        module.spiral_angle = reader.f32(&SPIRAL_ANGLE).unwrap_or(0.0);
        module.projectile_counter = reader.u64(&PROJECTILE_COUNTER).unwrap_or(0);
        if let Some(position) = reader.get(&POSITION).and_then(Vector3::from_record) {
            module.position = position;
        }
        module
    }
}

/// Highest-scoring candidate; the earliest one wins ties. Candidates
/// without a score are skipped.
fn pick_by<'a>(
    candidates: &[&'a TargetInfo],
    score: impl Fn(&TargetInfo) -> Option<f32>,
) -> Option<&'a TargetInfo> {
    let mut best: Option<(&TargetInfo, f32)> = None;
    for &candidate in candidates {
        let Some(value) = score(candidate) else {
            continue;
        };
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((candidate, value));
        }
    }
    best.map(|(candidate, _)| candidate)
}

impl Module for CombatModule {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn update(&mut self, dt: f32) {
        self.game_time += dt;
    }

    fn serialize(&self) -> Value {
        let d = &self.data;
        pascal_keys(json!({
            "type": Self::KIND,
            "id": self.id,
            "attackType": d.attack_type.as_str(),
            "attackRange": d.attack_range,
            "attackInterval": d.attack_interval,
            "lastAttackTime": d.last_attack_time,
            "gameTime": self.game_time,
            "spiralAngle": self.spiral_angle,
            "projectileCounter": self.projectile_counter,
            "damage": d.damage,
            "criticalChance": d.critical_chance,
            "criticalMultiplier": d.critical_multiplier,
            "projectileSpeed": d.projectile_speed,
            "projectileType": d.projectile_type,
            "pierceCount": d.pierce_count,
            "explosionRadius": d.explosion_radius,
            "targetId": d.target_id,
            "targetingMode": d.targeting_mode.as_str(),
            "autoAttack": d.auto_attack,
            "bulletPattern": d.bullet_pattern.as_str(),
            "bulletCount": d.bullet_count,
            "spreadAngle": d.spread_angle,
            "spiralSpeed": d.spiral_speed,
            "position": self.position,
        }))
    }

    fn destroy(&mut self) {
        self.outbox.disconnect();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
