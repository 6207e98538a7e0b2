//! Three-component vector used for positions, velocities and directions.
//!
//! All behavior modules work on the x/y plane (y grows downward, screen
//! style) and carry `z` through untouched so the same data can later drive a
//! 3D renderer.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::record::{FieldAlias, RecordReader};

const X: FieldAlias = FieldAlias::new("x", "X");
const Y: FieldAlias = FieldAlias::new("y", "Y");
const Z: FieldAlias = FieldAlias::new("z", "Z");

/// Plain 3D vector value. Copied on every mutation, never shared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(alias = "X")]
    pub x: f32,
    #[serde(alias = "Y")]
    pub y: f32,
    #[serde(default, alias = "Z")]
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Vector on the 2D plane (`z = 0`).
    #[inline]
    pub const fn planar(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    #[inline]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    #[inline]
    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    #[inline]
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            Self::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).magnitude()
    }

    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self).scale(t)
    }

    /// Rotate around the z axis by `radians`.
    pub fn rotate_z(self, radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
            self.z,
        )
    }

    /// Read a vector from a record accepting either `x` or `X` style keys.
    /// Missing components default to zero; a non-object yields `None`.
    pub fn from_record(value: &Value) -> Option<Self> {
        let reader = RecordReader::new(value)?;
        Some(Self::new(
            reader.f32(&X).unwrap_or(0.0),
            reader.f32(&Y).unwrap_or(0.0),
            reader.f32(&Z).unwrap_or(0.0),
        ))
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self.scale(rhs)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}
