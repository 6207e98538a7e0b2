//! Numeric state of an entity: health, mana, stats, leveling, lives and score.
//!
//! Every mutation goes through a method so the `0 <= hp <= max_hp` and
//! `0 <= mp <= max_mp` invariants hold after each call, and every write that
//! actually changes a value queues a [`StatusChanged`] event.
//!
//! # Example
//! ```ignore
//! let mut status = StatusModule::new("hero_status");
//! let dealt = status.take_damage(12.0); // defense 5 -> 7 damage
//! if status.gain_exp(150.0) {
//!     // leveled up, hp/mp refilled
//! }
//! for change in status.drain_events() {
//!     hud.update(&change.stat, change.new_value);
//! }
//! ```

use std::any::Any;

use bevy_ecs::prelude::Component;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

use crate::components::module::{Module, Outbox};
use crate::components::record::{self, FieldAlias, RecordReader, pascal_keys};
use crate::events::status::StatusChanged;

const HP: FieldAlias = FieldAlias::new("hp", "Hp");
const MAX_HP: FieldAlias = FieldAlias::new("maxHp", "MaxHp");
const MP: FieldAlias = FieldAlias::new("mp", "Mp");
const MAX_MP: FieldAlias = FieldAlias::new("maxMp", "MaxMp");
const ATTACK: FieldAlias = FieldAlias::new("attack", "Attack");
const DEFENSE: FieldAlias = FieldAlias::new("defense", "Defense");
const SPEED: FieldAlias = FieldAlias::new("speed", "Speed");
const LEVEL: FieldAlias = FieldAlias::new("level", "Level");
const EXP: FieldAlias = FieldAlias::new("exp", "Exp");
const MAX_EXP: FieldAlias = FieldAlias::new("maxExp", "MaxExp");
const LIVES: FieldAlias = FieldAlias::new("lives", "Lives");
const SCORE: FieldAlias = FieldAlias::new("score", "Score");
const CUSTOM: FieldAlias = FieldAlias::new("custom", "Custom");

/// Multiplier applied to `max_exp` on each level-up (result floored).
const EXP_GROWTH: f32 = 1.5;
const LEVEL_UP_MAX_HP: f32 = 10.0;
const LEVEL_UP_MAX_MP: f32 = 5.0;
const LEVEL_UP_ATTACK: f32 = 2.0;
const LEVEL_UP_DEFENSE: f32 = 1.0;

/// Raw stat values. Use `..Default::default()` to override a subset.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusData {
    pub hp: f32,
    pub max_hp: f32,
    pub mp: f32,
    pub max_mp: f32,
    pub attack: f32,
    pub defense: f32,
    pub speed: f32,
    pub level: u32,
    pub exp: f32,
    pub max_exp: f32,
    /// Remaining lives (arcade/shooter genres).
    pub lives: u32,
    pub score: i64,
    /// Game-specific stats addressed by name.
    pub custom: FxHashMap<String, f32>,
}

impl Default for StatusData {
    fn default() -> Self {
        Self {
            hp: 100.0,
            max_hp: 100.0,
            mp: 50.0,
            max_mp: 50.0,
            attack: 10.0,
            defense: 5.0,
            speed: 1.0,
            level: 1,
            exp: 0.0,
            max_exp: 100.0,
            lives: 3,
            score: 0,
            custom: FxHashMap::default(),
        }
    }
}

/// Stat-keeping module. See the [module docs](self).
#[derive(Component, Debug, Clone)]
pub struct StatusModule {
    id: String,
    data: StatusData,
    outbox: Outbox<StatusChanged>,
}

impl StatusModule {
    pub const KIND: &'static str = "Status";

    /// Create a module with default stats.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_data(id, StatusData::default())
    }

    pub fn with_data(id: impl Into<String>, data: StatusData) -> Self {
        Self {
            id: id.into(),
            data,
            outbox: Outbox::default(),
        }
    }

    pub fn data(&self) -> &StatusData {
        &self.data
    }

    pub fn hp(&self) -> f32 {
        self.data.hp
    }
    pub fn max_hp(&self) -> f32 {
        self.data.max_hp
    }
    pub fn mp(&self) -> f32 {
        self.data.mp
    }
    pub fn max_mp(&self) -> f32 {
        self.data.max_mp
    }
    pub fn attack(&self) -> f32 {
        self.data.attack
    }
    pub fn defense(&self) -> f32 {
        self.data.defense
    }
    pub fn speed(&self) -> f32 {
        self.data.speed
    }
    pub fn level(&self) -> u32 {
        self.data.level
    }
    pub fn exp(&self) -> f32 {
        self.data.exp
    }
    pub fn max_exp(&self) -> f32 {
        self.data.max_exp
    }
    pub fn lives(&self) -> u32 {
        self.data.lives
    }
    pub fn score(&self) -> i64 {
        self.data.score
    }

    /// `hp / max_hp`, or 0 when `max_hp` is 0.
    pub fn hp_ratio(&self) -> f32 {
        ratio(self.data.hp, self.data.max_hp)
    }

    /// `mp / max_mp`, or 0 when `max_mp` is 0.
    pub fn mp_ratio(&self) -> f32 {
        ratio(self.data.mp, self.data.max_mp)
    }

    /// `exp / max_exp`, or 0 when `max_exp` is 0.
    pub fn exp_ratio(&self) -> f32 {
        ratio(self.data.exp, self.data.max_exp)
    }

    pub fn is_alive(&self) -> bool {
        self.data.hp > 0.0 && self.data.lives > 0
    }

    /// Set hp clamped to `[0, max_hp]`.
    pub fn set_hp(&mut self, value: f32) {
        let old = self.data.hp;
        self.data.hp = value.min(self.data.max_hp).max(0.0);
        self.notify("hp", old as f64, self.data.hp as f64);
    }

    /// Set mp clamped to `[0, max_mp]`.
    pub fn set_mp(&mut self, value: f32) {
        let old = self.data.mp;
        self.data.mp = value.min(self.data.max_mp).max(0.0);
        self.notify("mp", old as f64, self.data.mp as f64);
    }

    /// Apply a hit reduced by defense. At least 1 damage always lands.
    ///
    /// Returns the damage actually subtracted before clamping.
    pub fn take_damage(&mut self, raw: f32) -> f32 {
        let actual = (raw - self.data.defense).max(1.0);
        self.set_hp(self.data.hp - actual);
        actual
    }

    pub fn heal(&mut self, amount: f32) {
        self.set_hp(self.data.hp + amount);
    }

    /// Spend mp. Returns false, and changes nothing, if there is not enough.
    pub fn use_mp(&mut self, amount: f32) -> bool {
        if self.data.mp < amount {
            return false;
        }
        self.set_mp(self.data.mp - amount);
        true
    }

    pub fn restore_mp(&mut self, amount: f32) {
        self.set_mp(self.data.mp + amount);
    }

    /// Add experience and apply every level-up it pays for.
    ///
    /// Returns true if at least one level-up happened.
    pub fn gain_exp(&mut self, amount: f32) -> bool {
        let old = self.data.exp;
        self.data.exp += amount;

        let mut leveled_up = false;
        // max_exp <= 0 would never terminate
        while self.data.max_exp > 0.0 && self.data.exp >= self.data.max_exp {
            self.data.exp -= self.data.max_exp;
            self.level_up();
            leveled_up = true;
        }

        self.notify("exp", old as f64, self.data.exp as f64);
        leveled_up
    }

    fn level_up(&mut self) {
        let old_level = self.data.level;
        self.data.level += 1;
        self.data.max_exp = (self.data.max_exp * EXP_GROWTH).floor();

        self.data.max_hp += LEVEL_UP_MAX_HP;
        self.data.hp = self.data.max_hp;
        self.data.max_mp += LEVEL_UP_MAX_MP;
        self.data.mp = self.data.max_mp;
        self.data.attack += LEVEL_UP_ATTACK;
        self.data.defense += LEVEL_UP_DEFENSE;

        self.notify("level", old_level as f64, self.data.level as f64);
    }

    pub fn add_score(&mut self, points: i64) {
        let old = self.data.score;
        self.data.score += points;
        self.notify("score", old as f64, self.data.score as f64);
    }

    /// Remove one life (never below 0). Returns true when no lives remain.
    pub fn lose_life(&mut self) -> bool {
        let old = self.data.lives;
        self.data.lives = self.data.lives.saturating_sub(1);
        self.notify("lives", old as f64, self.data.lives as f64);
        self.data.lives == 0
    }

    /// Custom stat value, 0 if unset. A stat restored from a serialized
    /// record is also found under its original spelling.
    pub fn get_custom(&self, key: &str) -> f32 {
        self.data
            .custom
            .get(&record::stored_key(&self.data.custom, key))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_custom(&mut self, key: impl Into<String>, value: f32) {
        let key = record::stored_key(&self.data.custom, &key.into());
        let old = self.get_custom(&key);
        self.data.custom.insert(key.clone(), value);
        self.notify(&key, old as f64, value as f64);
    }

    /// Take every queued [`StatusChanged`] event.
    pub fn drain_events(&mut self) -> Vec<StatusChanged> {
        self.outbox.drain()
    }

    fn notify(&mut self, stat: &str, old_value: f64, new_value: f64) {
        if old_value != new_value {
            self.outbox.push(StatusChanged {
                module_id: self.id.clone(),
                stat: stat.to_string(),
                old_value,
                new_value,
            });
        }
    }

    /// Build a module from a record in either key casing.
    ///
    /// Missing or mistyped fields fall back to defaults; a missing id becomes "".
    pub fn deserialize(value: &Value) -> Self {
        let Some(reader) = RecordReader::new(value) else {
            return Self::new("");
        };
        let defaults = StatusData::default();
        let custom = reader
            .object(&CUSTOM)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n as f32)))
                    .collect()
            })
            .unwrap_or_default();

        Self::with_data(
            reader.str(&record::ID).unwrap_or_default(),
            StatusData {
                hp: reader.f32(&HP).unwrap_or(defaults.hp),
                max_hp: reader.f32(&MAX_HP).unwrap_or(defaults.max_hp),
                mp: reader.f32(&MP).unwrap_or(defaults.mp),
                max_mp: reader.f32(&MAX_MP).unwrap_or(defaults.max_mp),
                attack: reader.f32(&ATTACK).unwrap_or(defaults.attack),
                defense: reader.f32(&DEFENSE).unwrap_or(defaults.defense),
                speed: reader.f32(&SPEED).unwrap_or(defaults.speed),
                level: reader.u32(&LEVEL).unwrap_or(defaults.level),
                exp: reader.f32(&EXP).unwrap_or(defaults.exp),
                max_exp: reader.f32(&MAX_EXP).unwrap_or(defaults.max_exp),
                lives: reader.u32(&LIVES).unwrap_or(defaults.lives),
                score: reader.i64(&SCORE).unwrap_or(defaults.score),
                custom,
            },
        )
    }
}

fn ratio(value: f32, max: f32) -> f32 {
    if max > 0.0 { value / max } else { 0.0 }
}

impl Module for StatusModule {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn id(&self) -> &str {
        &self.id
    }

    // Stats only change through explicit calls.
    fn update(&mut self, _dt: f32) {}

    fn serialize(&self) -> Value {
        let d = &self.data;
        pascal_keys(json!({
            "type": Self::KIND,
            "id": self.id,
            "hp": d.hp,
            "maxHp": d.max_hp,
            "mp": d.mp,
            "maxMp": d.max_mp,
            "attack": d.attack,
            "defense": d.defense,
            "speed": d.speed,
            "level": d.level,
            "exp": d.exp,
            "maxExp": d.max_exp,
            "lives": d.lives,
            "score": d.score,
            "custom": d.custom,
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

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    // ==================== CLAMPING TESTS ====================

    #[test]
    fn test_defaults() {
        let s = StatusModule::new("s");
        assert!(approx_eq(s.hp(), 100.0));
        assert!(approx_eq(s.mp(), 50.0));
        assert_eq!(s.level(), 1);
        assert_eq!(s.lives(), 3);
        assert!(s.is_alive());
    }

    #[test]
    fn test_set_hp_clamps_both_ends() {
        let mut s = StatusModule::new("s");
        s.set_hp(500.0);
        assert!(approx_eq(s.hp(), 100.0));
        s.set_hp(-20.0);
        assert!(approx_eq(s.hp(), 0.0));
    }

    #[test]
    fn test_hp_stays_in_range_over_mixed_sequence() {
        let mut s = StatusModule::new("s");
        let ops: [(u8, f32); 8] = [
            (0, 30.0),
            (1, 500.0),
            (2, 80.0),
            (0, 1000.0),
            (1, 3.0),
            (2, -40.0),
            (0, 0.0),
            (1, 0.5),
        ];
        for (op, amount) in ops {
            match op {
                0 => {
                    s.take_damage(amount);
                }
                1 => s.heal(amount),
                _ => s.set_hp(amount),
            }
            assert!(s.hp() >= 0.0 && s.hp() <= s.max_hp());
        }
    }

    #[test]
    fn test_set_mp_clamps() {
        let mut s = StatusModule::new("s");
        s.set_mp(999.0);
        assert!(approx_eq(s.mp(), 50.0));
        s.set_mp(-1.0);
        assert!(approx_eq(s.mp(), 0.0));
    }

    // ==================== DAMAGE TESTS ====================

    #[test]
    fn test_take_damage_subtracts_defense() {
        let mut s = StatusModule::new("s");
        let dealt = s.take_damage(25.0);
        assert!(approx_eq(dealt, 20.0));
        assert!(approx_eq(s.hp(), 80.0));
    }

    #[test]
    fn test_take_damage_minimum_one() {
        let mut s = StatusModule::with_data(
            "s",
            StatusData {
                defense: 1000.0,
                ..Default::default()
            },
        );
        let dealt = s.take_damage(3.0);
        assert!(approx_eq(dealt, 1.0));
        assert!(approx_eq(s.hp(), 99.0));
    }

    #[test]
    fn test_heal_and_ratios() {
        let mut s = StatusModule::new("s");
        s.set_hp(40.0);
        s.heal(10.0);
        assert!(approx_eq(s.hp_ratio(), 0.5));
        assert!(approx_eq(s.mp_ratio(), 1.0));
        assert!(approx_eq(s.exp_ratio(), 0.0));
    }

    #[test]
    fn test_ratios_zero_denominator() {
        let s = StatusModule::with_data(
            "s",
            StatusData {
                max_hp: 0.0,
                max_mp: 0.0,
                max_exp: 0.0,
                ..Default::default()
            },
        );
        assert_eq!(s.hp_ratio(), 0.0);
        assert_eq!(s.mp_ratio(), 0.0);
        assert_eq!(s.exp_ratio(), 0.0);
    }

    // ==================== MP TESTS ====================

    #[test]
    fn test_use_mp_insufficient_changes_nothing() {
        let mut s = StatusModule::new("s");
        assert!(!s.use_mp(60.0));
        assert!(approx_eq(s.mp(), 50.0));
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_use_and_restore_mp() {
        let mut s = StatusModule::new("s");
        assert!(s.use_mp(20.0));
        assert!(approx_eq(s.mp(), 30.0));
        s.restore_mp(100.0);
        assert!(approx_eq(s.mp(), 50.0));
    }

    // ==================== LEVELING TESTS ====================

    #[test]
    fn test_gain_exp_single_level_up() {
        let mut s = StatusModule::with_data(
            "s",
            StatusData {
                exp: 95.0,
                max_exp: 100.0,
                ..Default::default()
            },
        );
        assert!(s.gain_exp(150.0));
        assert_eq!(s.level(), 2);
        assert!(approx_eq(s.exp(), 145.0));
        assert!(approx_eq(s.max_exp(), 150.0));
        assert!(approx_eq(s.max_hp(), 110.0));
        assert!(approx_eq(s.hp(), 110.0));
        assert!(approx_eq(s.max_mp(), 55.0));
        assert!(approx_eq(s.attack(), 12.0));
        assert!(approx_eq(s.defense(), 6.0));
    }

    #[test]
    fn test_gain_exp_multiple_level_ups() {
        let mut s = StatusModule::new("s");
        // 100 for level 2, 150 for level 3, 50 left over (< 225)
        assert!(s.gain_exp(300.0));
        assert_eq!(s.level(), 3);
        assert!(approx_eq(s.exp(), 50.0));
        assert!(approx_eq(s.max_exp(), 225.0));
    }

    #[test]
    fn test_gain_exp_no_level_up() {
        let mut s = StatusModule::new("s");
        assert!(!s.gain_exp(10.0));
        assert_eq!(s.level(), 1);
    }

    // ==================== LIVES / SCORE TESTS ====================

    #[test]
    fn test_lose_life_reports_game_over() {
        let mut s = StatusModule::with_data(
            "s",
            StatusData {
                lives: 2,
                ..Default::default()
            },
        );
        assert!(!s.lose_life());
        assert!(s.lose_life());
        assert!(s.lose_life());
        assert_eq!(s.lives(), 0);
        assert!(!s.is_alive());
    }

    #[test]
    fn test_add_score() {
        let mut s = StatusModule::new("s");
        s.add_score(250);
        s.add_score(-50);
        assert_eq!(s.score(), 200);
    }

    #[test]
    fn test_custom_stats() {
        let mut s = StatusModule::new("s");
        assert_eq!(s.get_custom("bombs"), 0.0);
        s.set_custom("bombs", 3.0);
        assert_eq!(s.get_custom("bombs"), 3.0);
    }

    // ==================== EVENT TESTS ====================

    #[test]
    fn test_events_only_on_actual_change() {
        let mut s = StatusModule::new("s");
        s.set_hp(100.0); // unchanged
        s.heal(10.0); // clamped, unchanged
        assert!(s.drain_events().is_empty());

        s.take_damage(15.0);
        let events = s.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stat, "hp");
        assert_eq!(events[0].old_value, 100.0);
        assert_eq!(events[0].new_value, 90.0);
    }

    #[test]
    fn test_level_up_emits_level_and_exp() {
        let mut s = StatusModule::new("s");
        s.gain_exp(120.0);
        let stats: Vec<_> = s.drain_events().into_iter().map(|e| e.stat).collect();
        assert_eq!(stats, vec!["level".to_string(), "exp".to_string()]);
    }

    #[test]
    fn test_destroy_stops_events() {
        let mut s = StatusModule::new("s");
        s.take_damage(20.0);
        s.destroy();
        s.take_damage(20.0);
        assert!(s.drain_events().is_empty());
    }

    // ==================== SERIALIZATION TESTS ====================

    #[test]
    fn test_serialize_uses_pascal_keys() {
        let mut s = StatusModule::new("hero");
        s.set_custom("bombs", 2.0);
        let out = s.serialize();
        assert_eq!(out["Type"], "Status");
        assert_eq!(out["Id"], "hero");
        assert_eq!(out["MaxHp"], 100.0);
        assert_eq!(out["Custom"]["Bombs"], 2.0);
        assert!(out["Custom"].get("bombs").is_none());
        assert!(out.get("maxHp").is_none());
    }

    #[test]
    fn test_round_trip() {
        let mut s = StatusModule::new("hero");
        s.take_damage(30.0);
        s.gain_exp(40.0);
        s.add_score(10);
        s.lose_life();
        s.set_custom("Keys", 4.0);
        let back = StatusModule::deserialize(&s.serialize());
        assert_eq!(back.id(), "hero");
        assert_eq!(back.data(), s.data());
    }

    #[test]
    fn test_round_trip_from_camel_keys() {
        let mut s = StatusModule::new("hero");
        s.take_damage(12.0);
        s.gain_exp(250.0);
        s.add_score(-4);
        s.set_custom("Keys", 1.0);

        let back = StatusModule::deserialize(&record::camel_keys(s.serialize()));
        assert_eq!(back.id(), "hero");
        assert!(approx_eq(back.hp(), s.hp()));
        assert_eq!(back.serialize(), s.serialize());
    }

    #[test]
    fn test_restored_custom_stat_keeps_its_name() {
        let mut s = StatusModule::new("hero");
        s.set_custom("bombs", 3.0);
        let mut back = StatusModule::deserialize(&s.serialize());
        assert_eq!(back.get_custom("bombs"), 3.0);
        back.set_custom("bombs", 1.0);
        assert_eq!(back.get_custom("Bombs"), 1.0);
        assert_eq!(back.data().custom.len(), 1);
    }

    #[test]
    fn test_deserialize_camel_and_defaults() {
        let record = serde_json::json!({"id": "x", "hp": 40, "maxHp": 80, "defense": "bad"});
        let s = StatusModule::deserialize(&record);
        assert_eq!(s.id(), "x");
        assert!(approx_eq(s.hp(), 40.0));
        assert!(approx_eq(s.max_hp(), 80.0));
        assert!(approx_eq(s.defense(), 5.0));
        assert_eq!(s.lives(), 3);
    }
}
