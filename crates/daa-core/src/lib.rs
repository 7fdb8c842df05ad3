//! Detect-and-avoid core: pairwise conflict geometry and maneuver banding.
//!
//! Given the ownship state and nearby traffic, computes for each maneuver
//! dimension (track, ground speed, vertical speed, altitude) which values are
//! safe, which lead to a loss of separation within the lookahead, and — when
//! every maneuver is already red — how soon separation can be recovered.

pub mod bands;
pub mod critical;
pub mod detection;
pub mod interval;
pub mod models;
pub mod recovery;
pub mod rules;
pub mod sweep;

pub use bands::{Band, BandRegion, BandsResult, DaaBands};
pub use detection::{detect_states, detect_traffic, ConflictProbe, ConflictVerdict, CylinderDetector};
pub use interval::{Interval, IntervalSet};
pub use models::{mk_trk_gs_vs, AircraftState, TrafficAircraft, TrajectorySegment, Vect3};
pub use recovery::{recovery_search, RecoveryResult};
pub use rules::{
    AlertTiers, ConfigError, DaaConfig, DimensionSpec, LookaheadWindow, ProtectionVolume,
    RecoveryConfig,
};
pub use sweep::{sweep_red, sweep_tiers, Dimension, TierSets};
