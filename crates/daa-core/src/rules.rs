//! Separation rules and banding configuration.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use thiserror::Error;

/// NMAC horizontal separation (500 ft).
pub const NMAC_HORIZONTAL_M: f64 = 152.4;
/// NMAC vertical separation (100 ft).
pub const NMAC_VERTICAL_M: f64 = 30.48;

/// Configuration rejected at the boundary. Invalid values are never
/// silently clamped; a clamp here would mask a caller bug with safety
/// consequences.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("horizontal separation must be positive, got {0}")]
    NonPositiveHorizontal(f64),
    #[error("vertical separation must be positive, got {0}")]
    NonPositiveVertical(f64),
    #[error("lookahead window requires 0 <= B < T, got B={b} T={t}")]
    InvalidWindow { b: f64, t: f64 },
    #[error("dimension range requires min < max, got min={min} max={max}")]
    InvalidRange { min: f64, max: f64 },
    #[error("dimension step must be positive, got {0}")]
    NonPositiveStep(f64),
    #[error("dimension tolerance must be non-negative, got {0}")]
    NegativeTolerance(f64),
    #[error("alert tiers require 0 < near <= mid <= lookahead, got near={near} mid={mid}")]
    InvalidTierOrder { near: f64, mid: f64 },
    #[error("recovery shrink factor must be in (0, 1], got {0}")]
    InvalidShrinkFactor(f64),
    #[error("recovery stability time must be non-negative, got {0}")]
    NegativeStabilityTime(f64),
    #[error("conflict filter time must be non-negative, got {0}")]
    NegativeFilterTime(f64),
}

/// Cylindrical protected zone around each aircraft: a loss of separation is
/// horizontal distance below `horizontal_m` together with vertical distance
/// below `vertical_m`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionVolume {
    /// Minimum horizontal separation in meters (protected circle radius)
    pub horizontal_m: f64,
    /// Minimum vertical separation in meters
    pub vertical_m: f64,
}

impl Default for ProtectionVolume {
    fn default() -> Self {
        // 1 nmi horizontally, ~500 ft vertically
        Self { horizontal_m: 1852.0, vertical_m: 152.4 }
    }
}

impl ProtectionVolume {
    pub fn new(horizontal_m: f64, vertical_m: f64) -> Result<Self, ConfigError> {
        let volume = Self { horizontal_m, vertical_m };
        volume.validate()?;
        Ok(volume)
    }

    /// The last-resort Near Mid-Air Collision volume.
    pub fn nmac() -> Self {
        Self {
            horizontal_m: NMAC_HORIZONTAL_M,
            vertical_m: NMAC_VERTICAL_M,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.horizontal_m > 0.0) {
            return Err(ConfigError::NonPositiveHorizontal(self.horizontal_m));
        }
        if !(self.vertical_m > 0.0) {
            return Err(ConfigError::NonPositiveVertical(self.vertical_m));
        }
        Ok(())
    }

    /// Scale both separations by `factor`, never below the NMAC floor.
    pub fn shrunk(&self, factor: f64) -> Self {
        Self {
            horizontal_m: (self.horizontal_m * factor).max(NMAC_HORIZONTAL_M.min(self.horizontal_m)),
            vertical_m: (self.vertical_m * factor).max(NMAC_VERTICAL_M.min(self.vertical_m)),
        }
    }
}

/// Time window `[B, T]` in seconds from now over which conflicts are probed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookaheadWindow {
    pub b: f64,
    pub t: f64,
}

impl Default for LookaheadWindow {
    fn default() -> Self {
        Self { b: 0.0, t: 120.0 }
    }
}

impl LookaheadWindow {
    pub fn new(b: f64, t: f64) -> Result<Self, ConfigError> {
        let window = Self { b, t };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.b >= 0.0 && self.b < self.t) {
            return Err(ConfigError::InvalidWindow { b: self.b, t: self.t });
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.t - self.b
    }
}

/// Range, granularity, and denoising tolerance of one maneuver dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub min: f64,
    pub max: f64,
    /// Partition granularity for dimensions without a closed-form critical
    /// set (altitude)
    pub step: f64,
    /// Wraparound period for circular dimensions (track)
    pub modulus: Option<f64>,
    /// Bands narrower than this are treated as noise and swept away
    pub tolerance: f64,
}

impl DimensionSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min >= self.max {
            return Err(ConfigError::InvalidRange { min: self.min, max: self.max });
        }
        if !(self.step > 0.0) {
            return Err(ConfigError::NonPositiveStep(self.step));
        }
        if self.tolerance < 0.0 {
            return Err(ConfigError::NegativeTolerance(self.tolerance));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp a value into the dimension range, or wrap it for circular
    /// dimensions.
    pub fn normalize(&self, value: f64) -> f64 {
        match self.modulus {
            Some(modulus) => value.rem_euclid(modulus),
            None => value.clamp(self.min, self.max),
        }
    }
}

/// Lookahead horizons of the conflict severity tiers. A maneuver whose
/// earliest conflict begins within `near_s` is NEAR, within `mid_s` MID,
/// and within the full lookahead FAR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertTiers {
    pub near_s: f64,
    pub mid_s: f64,
}

impl Default for AlertTiers {
    fn default() -> Self {
        Self { near_s: 60.0, mid_s: 90.0 }
    }
}

/// Recovery search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub enabled: bool,
    /// Hysteresis added to the found pivot so the advised recovery maneuver
    /// is not invalidated by the next replan
    pub stability_time_s: f64,
    /// Initial protection-volume scale tried by the search; iterated
    /// downward toward the NMAC floor
    pub shrink_factor: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stability_time_s: 2.0,
            shrink_factor: 0.5,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.shrink_factor > 0.0 && self.shrink_factor <= 1.0) {
            return Err(ConfigError::InvalidShrinkFactor(self.shrink_factor));
        }
        if self.stability_time_s < 0.0 {
            return Err(ConfigError::NegativeStabilityTime(self.stability_time_s));
        }
        Ok(())
    }
}

/// Full banding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaaConfig {
    pub volume: ProtectionVolume,
    pub lookahead: LookaheadWindow,
    pub tiers: AlertTiers,
    pub track: DimensionSpec,
    pub ground_speed: DimensionSpec,
    pub vertical_speed: DimensionSpec,
    pub altitude: DimensionSpec,
    pub recovery: RecoveryConfig,
    /// Conflicts shorter than this many seconds are suppressed as transients
    pub filter_s: f64,
}

impl Default for DaaConfig {
    fn default() -> Self {
        Self {
            volume: ProtectionVolume::default(),
            lookahead: LookaheadWindow::default(),
            tiers: AlertTiers::default(),
            track: DimensionSpec {
                min: 0.0,
                max: TAU,
                step: 1.0_f64.to_radians(),
                modulus: Some(TAU),
                tolerance: 5.0_f64.to_radians(),
            },
            ground_speed: DimensionSpec {
                min: 0.0,
                max: 360.0, // ~700 kt
                step: 2.5,
                modulus: None,
                tolerance: 5.0,
            },
            vertical_speed: DimensionSpec {
                min: -25.0,
                max: 25.0, // ~5000 fpm
                step: 0.5,
                modulus: None,
                tolerance: 1.0,
            },
            altitude: DimensionSpec {
                min: 0.0,
                max: 15_240.0, // 50,000 ft
                step: 152.4,   // 500 ft
                modulus: None,
                tolerance: 152.4,
            },
            recovery: RecoveryConfig::default(),
            filter_s: 1.0,
        }
    }
}

impl DaaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.volume.validate()?;
        self.lookahead.validate()?;
        self.track.validate()?;
        self.ground_speed.validate()?;
        self.vertical_speed.validate()?;
        self.altitude.validate()?;
        self.recovery.validate()?;
        if !(self.tiers.near_s > 0.0
            && self.tiers.near_s <= self.tiers.mid_s
            && self.tiers.mid_s <= self.lookahead.t)
        {
            return Err(ConfigError::InvalidTierOrder {
                near: self.tiers.near_s,
                mid: self.tiers.mid_s,
            });
        }
        if self.filter_s < 0.0 {
            return Err(ConfigError::NegativeFilterTime(self.filter_s));
        }
        Ok(())
    }
}
