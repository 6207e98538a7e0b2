//! Movement module with three mutually exclusive integrators.
//!
//! - [`KineticMode::TopDown`] – free 8-direction movement with isotropic friction
//! - [`KineticMode::Platformer`] – gravity, jumps and horizontal friction
//! - [`KineticMode::Path`] – waypoint following at a constant speed
//!
//! The module owns the entity's position. Whenever the position actually
//! changes a [`KineticEvent::PositionChanged`] is queued so a renderer can
//! mirror it; a finished non-looping path queues one
//! [`KineticEvent::PathCompleted`].
//!
//! Coordinates are screen style: y grows downward, so a jump sets a negative
//! vertical velocity and gravity is positive.

use std::any::Any;

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::components::module::{Module, Outbox};
use crate::components::record::{self, FieldAlias, RecordReader, pascal_keys};
use crate::components::vector3::Vector3;
use crate::events::kinetic::KineticEvent;

const MODE: FieldAlias = FieldAlias::new("mode", "Mode");
const VELOCITY: FieldAlias = FieldAlias::new("velocity", "Velocity");
const ACCELERATION: FieldAlias = FieldAlias::new("acceleration", "Acceleration");
const MAX_SPEED: FieldAlias = FieldAlias::new("maxSpeed", "MaxSpeed");
const FRICTION: FieldAlias = FieldAlias::new("friction", "Friction");
const MASS: FieldAlias = FieldAlias::new("mass", "Mass");
const GRAVITY: FieldAlias = FieldAlias::new("gravity", "Gravity");
const JUMP_FORCE: FieldAlias = FieldAlias::new("jumpForce", "JumpForce");
const MAX_JUMPS: FieldAlias = FieldAlias::new("maxJumps", "MaxJumps");
const CURRENT_JUMPS: FieldAlias = FieldAlias::new("currentJumps", "CurrentJumps");
const IS_GROUNDED: FieldAlias = FieldAlias::new("isGrounded", "IsGrounded");
const PATH_POINTS: FieldAlias = FieldAlias::new("pathPoints", "PathPoints");
const CURRENT_PATH_INDEX: FieldAlias = FieldAlias::new("currentPathIndex", "CurrentPathIndex");
const PATH_SPEED: FieldAlias = FieldAlias::new("pathSpeed", "PathSpeed");
const LOOP_PATH: FieldAlias = FieldAlias::new("loopPath", "LoopPath");
const PATH_COMPLETED: FieldAlias = FieldAlias::new("pathCompleted", "PathCompleted");
const POSITION: FieldAlias = FieldAlias::new("position", "Position");

/// Input acceleration is this many times `max_speed` per second.
const INPUT_ACCELERATION_FACTOR: f32 = 5.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KineticMode {
    #[default]
    TopDown,
    Platformer,
    Path,
}

impl KineticMode {
    pub fn as_str(self) -> &'static str {
        match self {
            KineticMode::TopDown => "TopDown",
            KineticMode::Platformer => "Platformer",
            KineticMode::Path => "Path",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "TopDown" => Some(KineticMode::TopDown),
            "Platformer" => Some(KineticMode::Platformer),
            "Path" => Some(KineticMode::Path),
            _ => None,
        }
    }
}

/// Directional input snapshot supplied by the caller each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputDirection {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// Raw movement state. Use `..Default::default()` to override a subset.
#[derive(Clone, Debug, PartialEq)]
pub struct KineticData {
    pub mode: KineticMode,
    pub velocity: Vector3,
    pub acceleration: Vector3,
    pub max_speed: f32,
    /// Velocity retained per tick, 0..1 (0.8 keeps 80%).
    pub friction: f32,
    pub mass: f32,

    // Platformer
    pub gravity: f32,
    pub jump_force: f32,
    pub max_jumps: u32,
    pub current_jumps: u32,
    pub is_grounded: bool,

    // Path
    pub path_points: Vec<Vector3>,
    pub current_path_index: usize,
    pub path_speed: f32,
    pub loop_path: bool,
    pub path_completed: bool,
}

impl Default for KineticData {
    fn default() -> Self {
        Self {
            mode: KineticMode::TopDown,
            velocity: Vector3::ZERO,
            acceleration: Vector3::ZERO,
            max_speed: 200.0,
            friction: 0.8,
            mass: 1.0,
            gravity: 980.0,
            jump_force: 400.0,
            max_jumps: 1,
            current_jumps: 0,
            is_grounded: false,
            path_points: Vec::new(),
            current_path_index: 0,
            path_speed: 100.0,
            loop_path: false,
            path_completed: false,
        }
    }
}

/// Movement module. See the [module docs](self).
#[derive(Component, Debug, Clone)]
pub struct KineticModule {
    id: String,
    data: KineticData,
    position: Vector3,
    outbox: Outbox<KineticEvent>,
}

impl KineticModule {
    pub const KIND: &'static str = "Kinetic";

    pub fn new(id: impl Into<String>) -> Self {
        Self::with_data(id, KineticData::default())
    }

    pub fn with_data(id: impl Into<String>, data: KineticData) -> Self {
        Self {
            id: id.into(),
            data,
            position: Vector3::ZERO,
            outbox: Outbox::default(),
        }
    }

    pub fn data(&self) -> &KineticData {
        &self.data
    }

    pub fn mode(&self) -> KineticMode {
        self.data.mode
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    /// Place the entity without queueing an event (the caller already knows).
    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }

    pub fn velocity(&self) -> Vector3 {
        self.data.velocity
    }

    pub fn acceleration(&self) -> Vector3 {
        self.data.acceleration
    }

    /// Current scalar speed.
    pub fn speed(&self) -> f32 {
        self.data.velocity.magnitude()
    }

    pub fn max_speed(&self) -> f32 {
        self.data.max_speed
    }

    pub fn is_grounded(&self) -> bool {
        self.data.is_grounded
    }

    pub fn path_completed(&self) -> bool {
        self.data.path_completed
    }

    pub fn current_path_index(&self) -> usize {
        self.data.current_path_index
    }

    /// Switch integrator. Velocity and acceleration reset; entering
    /// [`KineticMode::Path`] also restarts path progress.
    pub fn set_mode(&mut self, mode: KineticMode) {
        self.data.mode = mode;
        self.data.velocity = Vector3::ZERO;
        self.data.acceleration = Vector3::ZERO;

        if mode == KineticMode::Path {
            self.data.current_path_index = 0;
            self.data.path_completed = false;
        }
    }

    // ===== TopDown =====

    /// Set this tick's acceleration from directional input (TopDown only).
    ///
    /// The direction is normalized so diagonals are not faster.
    pub fn process_top_down_input(&mut self, input: InputDirection) {
        if self.data.mode != KineticMode::TopDown {
            return;
        }
        let mut dir = Vector3::ZERO;
        if input.up {
            dir.y -= 1.0;
        }
        if input.down {
            dir.y += 1.0;
        }
        if input.left {
            dir.x -= 1.0;
        }
        if input.right {
            dir.x += 1.0;
        }
        self.data.acceleration =
            dir.normalize() * (self.data.max_speed * INPUT_ACCELERATION_FACTOR);
    }

    // ===== Platformer =====

    /// Set horizontal acceleration and jump on request (Platformer only).
    pub fn process_platformer_input(&mut self, input: InputDirection) {
        if self.data.mode != KineticMode::Platformer {
            return;
        }
        let mut accel_x = 0.0;
        if input.left {
            accel_x -= self.data.max_speed * INPUT_ACCELERATION_FACTOR;
        }
        if input.right {
            accel_x += self.data.max_speed * INPUT_ACCELERATION_FACTOR;
        }
        self.data.acceleration.x = accel_x;

        if input.jump {
            self.jump(None);
        }
    }

    pub fn can_jump(&self) -> bool {
        self.data.is_grounded || self.data.current_jumps < self.data.max_jumps
    }

    /// Jump with `force` (default `jump_force`). Ignored unless [`can_jump`](Self::can_jump).
    ///
    /// Returns whether the jump happened.
    pub fn jump(&mut self, force: Option<f32>) -> bool {
        if !self.can_jump() {
            return false;
        }
        self.data.velocity.y = -force.unwrap_or(self.data.jump_force);
        self.data.is_grounded = false;
        self.data.current_jumps += 1;
        true
    }

    /// Snap to `ground_y`, stop falling and restore jumps.
    pub fn land(&mut self, ground_y: f32) {
        let old = self.position;
        self.position.y = ground_y;
        self.data.velocity.y = 0.0;
        self.data.is_grounded = true;
        self.data.current_jumps = 0;
        self.notify_if_moved(old);
    }

    // ===== Path =====

    /// Replace the path and restart it.
    pub fn set_path(&mut self, points: Vec<Vector3>, looped: bool) {
        self.data.path_points = points;
        self.data.current_path_index = 0;
        self.data.loop_path = looped;
        self.data.path_completed = false;
    }

    pub fn add_path_point(&mut self, point: Vector3) {
        self.data.path_points.push(point);
    }

    pub fn reset_path(&mut self) {
        self.data.current_path_index = 0;
        self.data.path_completed = false;
    }

    // ===== External forces =====

    /// Add `force / mass` to this tick's acceleration.
    pub fn apply_force(&mut self, force: Vector3) {
        self.data.acceleration += force * self.inverse_mass();
    }

    /// Instantly change velocity by `impulse / mass`.
    pub fn apply_impulse(&mut self, impulse: Vector3) {
        self.data.velocity += impulse * self.inverse_mass();
    }

    pub fn stop(&mut self) {
        self.data.velocity = Vector3::ZERO;
        self.data.acceleration = Vector3::ZERO;
    }

    // massless bodies react like unit mass
    fn inverse_mass(&self) -> f32 {
        if self.data.mass > 0.0 {
            1.0 / self.data.mass
        } else {
            1.0
        }
    }

    /// Take every queued [`KineticEvent`].
    pub fn drain_events(&mut self) -> Vec<KineticEvent> {
        self.outbox.drain()
    }

    fn notify_if_moved(&mut self, old: Vector3) {
        if self.position != old {
            self.outbox.push(KineticEvent::PositionChanged {
                module_id: self.id.clone(),
                position: self.position,
            });
        }
    }

    fn update_top_down(&mut self, dt: f32) {
        let d = &mut self.data;
        d.velocity += d.acceleration * dt;

        if d.velocity.magnitude() > d.max_speed {
            d.velocity = d.velocity.normalize() * d.max_speed;
        }

        d.velocity = d.velocity * d.friction.clamp(0.0, 1.0);
        self.position += d.velocity * dt;
        d.acceleration = Vector3::ZERO;
    }

    fn update_platformer(&mut self, dt: f32) {
        let d = &mut self.data;
        d.acceleration.y += d.gravity;
        d.velocity += d.acceleration * dt;

        d.velocity.x *= d.friction.clamp(0.0, 1.0);
        if d.velocity.x.abs() > d.max_speed {
            d.velocity.x = d.velocity.x.signum() * d.max_speed;
        }

        self.position += d.velocity * dt;
        // gravity is re-applied every tick
        d.acceleration = Vector3::ZERO;
    }

    fn update_path(&mut self, dt: f32) {
        if self.data.path_completed || self.data.path_points.is_empty() {
            return;
        }
        if self.data.current_path_index >= self.data.path_points.len() {
            self.data.current_path_index = 0;
        }

        let target = self.data.path_points[self.data.current_path_index];
        let distance = self.position.distance(target);
        let step = self.data.path_speed * dt;

        if distance <= step {
            self.position = target;
            self.data.current_path_index += 1;

            if self.data.current_path_index >= self.data.path_points.len() {
                if self.data.loop_path {
                    self.data.current_path_index = 0;
                } else {
                    self.data.path_completed = true;
                    self.data.velocity = Vector3::ZERO;
                    self.outbox.push(KineticEvent::PathCompleted {
                        module_id: self.id.clone(),
                    });
                }
            }
        } else {
            let direction = (target - self.position).normalize();
            self.position += direction * step;
            self.data.velocity = direction * self.data.path_speed;
        }
    }

    /// Build a module from a record in either key casing.
    ///
    /// Missing or mistyped fields fall back to defaults; a missing id becomes "".
    pub fn deserialize(value: &Value) -> Self {
        let Some(reader) = RecordReader::new(value) else {
            return Self::new("");
        };
        let defaults = KineticData::default();
        let vector = |field: &FieldAlias| reader.get(field).and_then(Vector3::from_record);
        let path_points = reader
            .array(&PATH_POINTS)
            .map(|points| points.iter().filter_map(Vector3::from_record).collect())
            .unwrap_or_default();

        let mut module = Self::with_data(
            reader.str(&record::ID).unwrap_or_default(),
            KineticData {
                mode: reader
                    .str(&MODE)
                    .and_then(KineticMode::from_tag)
                    .unwrap_or(defaults.mode),
                velocity: vector(&VELOCITY).unwrap_or(defaults.velocity),
                acceleration: vector(&ACCELERATION).unwrap_or(defaults.acceleration),
                max_speed: reader.f32(&MAX_SPEED).unwrap_or(defaults.max_speed),
                friction: reader.f32(&FRICTION).unwrap_or(defaults.friction),
                mass: reader.f32(&MASS).unwrap_or(defaults.mass),
                gravity: reader.f32(&GRAVITY).unwrap_or(defaults.gravity),
                jump_force: reader.f32(&JUMP_FORCE).unwrap_or(defaults.jump_force),
                max_jumps: reader.u32(&MAX_JUMPS).unwrap_or(defaults.max_jumps),
                current_jumps: reader.u32(&CURRENT_JUMPS).unwrap_or(defaults.current_jumps),
                is_grounded: reader.bool(&IS_GROUNDED).unwrap_or(defaults.is_grounded),
                path_points,
                current_path_index: reader
                    .u32(&CURRENT_PATH_INDEX)
                    .map(|i| i as usize)
                    .unwrap_or(defaults.current_path_index),
                path_speed: reader.f32(&PATH_SPEED).unwrap_or(defaults.path_speed),
                loop_path: reader.bool(&LOOP_PATH).unwrap_or(defaults.loop_path),
                path_completed: reader
                    .bool(&PATH_COMPLETED)
                    .unwrap_or(defaults.path_completed),
            },
        );
        if let Some(position) = vector(&POSITION) {
            module.position = position;
        }
        module
    }
}

impl Module for KineticModule {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn update(&mut self, dt: f32) {
        let old = self.position;
        match self.data.mode {
            KineticMode::TopDown => self.update_top_down(dt),
            KineticMode::Platformer => self.update_platformer(dt),
            KineticMode::Path => self.update_path(dt),
        }
        self.notify_if_moved(old);
    }

    fn serialize(&self) -> Value {
        let d = &self.data;
        pascal_keys(json!({
            "type": Self::KIND,
            "id": self.id,
            "mode": d.mode.as_str(),
            "velocity": d.velocity,
            "acceleration": d.acceleration,
            "maxSpeed": d.max_speed,
            "friction": d.friction,
            "mass": d.mass,
            "gravity": d.gravity,
            "jumpForce": d.jump_force,
            "maxJumps": d.max_jumps,
            "currentJumps": d.current_jumps,
            "isGrounded": d.is_grounded,
            "pathPoints": d.path_points,
            "currentPathIndex": d.current_path_index,
            "pathSpeed": d.path_speed,
            "loopPath": d.loop_path,
            "pathCompleted": d.path_completed,
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
