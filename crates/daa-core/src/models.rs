//! Core data models for the detect-and-avoid engine.
//!
//! All geometry is Cartesian in internal units (meters, meters/second):
//! x = East, y = North, z = Up. Track angles are radians, 0 = North,
//! clockwise positive.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::ops::{Add, Neg, Sub};

/// 3-D vector used for both positions and velocities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vect3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vect3 {
    pub const ZERO: Vect3 = Vect3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Scale all components.
    pub fn scale(self, k: f64) -> Self {
        Self { x: self.x * k, y: self.y * k, z: self.z * k }
    }

    /// Horizontal (x, y) dot product.
    pub fn dot2d(self, other: Vect3) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Horizontal cross product (determinant). Sign gives which side of
    /// `self` the other vector lies on.
    pub fn det2d(self, other: Vect3) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Squared horizontal norm.
    pub fn sq_norm2d(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Horizontal norm.
    pub fn norm2d(self) -> f64 {
        self.sq_norm2d().sqrt()
    }

    /// Position after moving along this velocity for `t` seconds.
    pub fn linear(self, velocity: Vect3, t: f64) -> Vect3 {
        self + velocity.scale(t)
    }

    /// Track angle of this velocity in radians, 0 = North, clockwise.
    pub fn track(self) -> f64 {
        self.x.atan2(self.y).rem_euclid(TAU)
    }

    /// Horizontal speed component of this velocity.
    pub fn ground_speed(self) -> f64 {
        self.norm2d()
    }

    /// Vertical speed component of this velocity.
    pub fn vertical_speed(self) -> f64 {
        self.z
    }
}

impl Add for Vect3 {
    type Output = Vect3;

    fn add(self, rhs: Vect3) -> Vect3 {
        Vect3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vect3 {
    type Output = Vect3;

    fn sub(self, rhs: Vect3) -> Vect3 {
        Vect3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vect3 {
    type Output = Vect3;

    fn neg(self) -> Vect3 {
        Vect3::new(-self.x, -self.y, -self.z)
    }
}

/// Build a velocity vector from track angle, ground speed, and vertical speed.
pub fn mk_trk_gs_vs(trk_rad: f64, gs_mps: f64, vs_mps: f64) -> Vect3 {
    Vect3::new(gs_mps * trk_rad.sin(), gs_mps * trk_rad.cos(), vs_mps)
}

/// Position and velocity of one aircraft at a point in time.
///
/// Inputs are owned by the caller and never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftState {
    pub id: String,
    pub position: Vect3,
    pub velocity: Vect3,
    /// Seconds; all lookahead times are relative to this instant.
    #[serde(default)]
    pub time: f64,
}

impl AircraftState {
    /// Create a new aircraft state with zero velocity.
    pub fn new(id: impl Into<String>, position: Vect3) -> Self {
        Self {
            id: id.into(),
            position,
            velocity: Vect3::ZERO,
            time: 0.0,
        }
    }

    /// Set the velocity.
    pub fn with_velocity(mut self, velocity: Vect3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the velocity from track angle, ground speed, and vertical speed.
    pub fn with_trk_gs_vs(mut self, trk_rad: f64, gs_mps: f64, vs_mps: f64) -> Self {
        self.velocity = mk_trk_gs_vs(trk_rad, gs_mps, vs_mps);
        self
    }
}

/// One linear piece of an intent trajectory: from `time` the aircraft is at
/// `position` moving with `velocity` until the next segment starts.
///
/// Times are seconds from "now" (the ownship state time).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrajectorySegment {
    pub time: f64,
    pub position: Vect3,
    pub velocity: Vect3,
}

/// A traffic aircraft: current state plus optional declared intent.
///
/// Without intent, the aircraft is projected linearly from its current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficAircraft {
    pub state: AircraftState,
    #[serde(default)]
    pub intent: Option<Vec<TrajectorySegment>>,
}

impl TrafficAircraft {
    pub fn new(state: AircraftState) -> Self {
        Self { state, intent: None }
    }

    pub fn with_intent(mut self, segments: Vec<TrajectorySegment>) -> Self {
        self.intent = Some(segments);
        self
    }
}
