//! Band assembly and the per-dimension coordinator.
//!
//! Owns the ownship/traffic snapshot and the cached band state of every
//! maneuver dimension, re-sweeping lazily on the first query after any
//! mutation. Query results cover the full dimension domain with ordered,
//! non-overlapping labeled intervals.

use crate::detection::{ConflictProbe, CylinderDetector};
use crate::interval::{Interval, IntervalSet};
use crate::models::{AircraftState, TrafficAircraft};
use crate::recovery::recovery_search;
use crate::rules::{ConfigError, DaaConfig};
use crate::sweep::{sweep_tiers, Dimension, TierSets};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Band coloring, declared in ascending severity. When merged intervals
/// overlap after denoising, the more severe region wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandRegion {
    /// Safe maneuver range
    None,
    /// Conflict beyond the mid horizon
    Far,
    /// Conflict within the mid horizon
    Mid,
    /// Conflict within the near horizon
    Near,
    /// Safe only after the recovery time has elapsed
    Recovery,
    /// Not computable (no ownship state)
    Unknown,
}

impl BandRegion {
    pub fn is_conflict(self) -> bool {
        matches!(self, BandRegion::Far | BandRegion::Mid | BandRegion::Near)
    }
}

/// One labeled sub-range of a maneuver dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub interval: Interval,
    pub region: BandRegion,
}

/// Complete banding of one dimension.
///
/// Invariant: bands are ordered, the first starts at the dimension minimum,
/// the last ends at its maximum, and consecutive bands share exactly their
/// boundary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandsResult {
    pub dimension: Dimension,
    pub bands: Vec<Band>,
    /// NaN = not saturated (or recovery disabled); negative infinity =
    /// unrecoverable within the lookahead; finite = seconds until a safe
    /// maneuver exists
    pub recovery_time_s: f64,
}

impl BandsResult {
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn interval(&self, index: usize) -> Option<Interval> {
        self.bands.get(index).map(|band| band.interval)
    }

    pub fn region(&self, index: usize) -> Option<BandRegion> {
        self.bands.get(index).map(|band| band.region)
    }

    /// Index of the band containing `value`.
    pub fn range_of(&self, value: f64) -> Option<usize> {
        self.bands.iter().position(|band| band.interval.contains(value))
    }

    /// Region at `value`, `Unknown` outside the domain.
    pub fn region_of(&self, value: f64) -> BandRegion {
        self.range_of(value)
            .and_then(|index| self.region(index))
            .unwrap_or(BandRegion::Unknown)
    }

    /// Whether a single band of `region` spans the whole domain.
    pub fn solid_region(&self, region: BandRegion) -> bool {
        self.bands.len() == 1 && self.bands[0].region == region
    }

    /// Whether no band carries `region`.
    pub fn no_band(&self, region: BandRegion) -> bool {
        self.bands.iter().all(|band| band.region != region)
    }
}

/// Cached sweep state of one dimension. Mutators atomically reset to
/// `Invalidated`; queries force a recompute before reading.
#[derive(Debug, Clone)]
enum BandState {
    Invalidated,
    Computed(BandsResult),
}

/// The detect-and-avoid banding coordinator.
///
/// Synchronous and single-threaded: inputs are copied in, results are cached
/// per dimension until the next mutation. External synchronization is the
/// caller's job if reads and writes race across threads.
pub struct DaaBands {
    config: DaaConfig,
    probe: Box<dyn ConflictProbe>,
    ownship: Option<AircraftState>,
    traffic: Vec<TrafficAircraft>,
    track: BandState,
    ground_speed: BandState,
    vertical_speed: BandState,
    altitude: BandState,
}

impl DaaBands {
    /// Create a coordinator with the cylinder reference detector.
    pub fn new(config: DaaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let probe = Box::new(CylinderDetector::new(config.volume).with_filter(config.filter_s));
        Ok(Self {
            config,
            probe,
            ownship: None,
            traffic: Vec::new(),
            track: BandState::Invalidated,
            ground_speed: BandState::Invalidated,
            vertical_speed: BandState::Invalidated,
            altitude: BandState::Invalidated,
        })
    }

    /// Replace the conflict probe with an alternate protected-volume shape.
    pub fn with_probe(mut self, probe: Box<dyn ConflictProbe>) -> Self {
        self.probe = probe;
        self.invalidate_all();
        self
    }

    pub fn config(&self) -> &DaaConfig {
        &self.config
    }

    /// Replace the configuration. Rejected configurations leave the current
    /// state untouched.
    pub fn set_config(&mut self, config: DaaConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.probe = Box::new(CylinderDetector::new(config.volume).with_filter(config.filter_s));
        self.config = config;
        self.invalidate_all();
        Ok(())
    }

    pub fn set_ownship(&mut self, ownship: AircraftState) {
        self.ownship = Some(ownship);
        self.invalidate_all();
    }

    pub fn add_traffic(&mut self, traffic: TrafficAircraft) {
        self.traffic.retain(|t| t.state.id != traffic.state.id);
        self.traffic.push(traffic);
        self.invalidate_all();
    }

    pub fn remove_traffic(&mut self, id: &str) {
        self.traffic.retain(|t| t.state.id != id);
        self.invalidate_all();
    }

    pub fn clear_traffic(&mut self) {
        self.traffic.clear();
        self.invalidate_all();
    }

    pub fn traffic_count(&self) -> usize {
        self.traffic.len()
    }

    fn invalidate_all(&mut self) {
        self.track = BandState::Invalidated;
        self.ground_speed = BandState::Invalidated;
        self.vertical_speed = BandState::Invalidated;
        self.altitude = BandState::Invalidated;
    }

    fn state(&self, dim: Dimension) -> &BandState {
        match dim {
            Dimension::Track => &self.track,
            Dimension::GroundSpeed => &self.ground_speed,
            Dimension::VerticalSpeed => &self.vertical_speed,
            Dimension::Altitude => &self.altitude,
        }
    }

    fn state_mut(&mut self, dim: Dimension) -> &mut BandState {
        match dim {
            Dimension::Track => &mut self.track,
            Dimension::GroundSpeed => &mut self.ground_speed,
            Dimension::VerticalSpeed => &mut self.vertical_speed,
            Dimension::Altitude => &mut self.altitude,
        }
    }

    /// Banding of one dimension, recomputed if a mutation invalidated it.
    pub fn bands(&mut self, dim: Dimension) -> &BandsResult {
        if let BandState::Invalidated = self.state(dim) {
            let computed = self.compute(dim);
            *self.state_mut(dim) = BandState::Computed(computed);
        }
        match self.state(dim) {
            BandState::Computed(result) => result,
            BandState::Invalidated => unreachable!("recomputed above"),
        }
    }

    /// Recovery time of one dimension: NaN when not saturated, negative
    /// infinity when unrecoverable, finite seconds otherwise.
    pub fn recovery_time(&mut self, dim: Dimension) -> f64 {
        self.bands(dim).recovery_time_s
    }

    /// Region at `value` in one dimension.
    pub fn region_of(&mut self, dim: Dimension, value: f64) -> BandRegion {
        let normalized = dim.spec(&self.config).normalize(value);
        self.bands(dim).region_of(normalized)
    }

    /// Signed offset from the ownship's current value to the nearest safe
    /// value in the given direction. Zero when already safe, positive
    /// infinity (up) or negative infinity (down) when no resolution exists.
    pub fn resolution(&mut self, dim: Dimension, up: bool) -> f64 {
        let Some(own) = &self.ownship else {
            return f64::NAN;
        };
        let spec = *dim.spec(&self.config);
        let current = spec.normalize(dim.current_value(own));
        let result = self.bands(dim);

        if result.region_of(current) == BandRegion::None {
            return 0.0;
        }
        let greens: Vec<Interval> = result
            .bands
            .iter()
            .filter(|band| band.region == BandRegion::None)
            .map(|band| band.interval)
            .collect();

        if up {
            for green in &greens {
                if green.low >= current {
                    return green.low - current;
                }
            }
            if let Some(modulus) = spec.modulus {
                if let Some(first) = greens.first() {
                    return modulus - current + first.low;
                }
            }
            f64::INFINITY
        } else {
            for green in greens.iter().rev() {
                if green.up <= current {
                    return green.up - current;
                }
            }
            if let Some(modulus) = spec.modulus {
                if let Some(last) = greens.last() {
                    return last.up - modulus - current;
                }
            }
            f64::NEG_INFINITY
        }
    }

    fn compute(&self, dim: Dimension) -> BandsResult {
        let spec = dim.spec(&self.config);
        let Some(own) = &self.ownship else {
            return BandsResult {
                dimension: dim,
                bands: vec![Band {
                    interval: Interval::new(spec.min, spec.max),
                    region: BandRegion::Unknown,
                }],
                recovery_time_s: f64::NAN,
            };
        };
        if self.traffic.is_empty() {
            return BandsResult {
                dimension: dim,
                bands: vec![Band {
                    interval: Interval::new(spec.min, spec.max),
                    region: BandRegion::None,
                }],
                recovery_time_s: f64::NAN,
            };
        }

        let tiers = sweep_tiers(dim, own, &self.traffic, self.probe.as_ref(), &self.config);
        let all_red = tiers.all_red();
        let green = all_red.complement(spec.min, spec.max);
        let saturated = !green
            .intervals()
            .iter()
            .any(|iv| iv.width() >= spec.tolerance);

        if saturated && self.config.recovery.enabled {
            debug!("{:?} saturated, starting recovery search", dim);
            let recovery =
                recovery_search(dim, own, &self.traffic, self.probe.as_ref(), &self.config);
            if recovery.is_recoverable() {
                let bands = color_bands(spec.min, spec.max, &[&recovery.red], |value| {
                    if recovery.red.contains(value) {
                        BandRegion::Near
                    } else {
                        BandRegion::Recovery
                    }
                });
                return BandsResult {
                    dimension: dim,
                    bands,
                    recovery_time_s: recovery.time_s,
                };
            }
            return BandsResult {
                dimension: dim,
                bands: vec![Band {
                    interval: Interval::new(spec.min, spec.max),
                    region: BandRegion::Near,
                }],
                recovery_time_s: f64::NEG_INFINITY,
            };
        }

        let bands = color_bands(
            spec.min,
            spec.max,
            &[&tiers.near, &tiers.mid, &tiers.far],
            |value| classify_tier(&tiers, value),
        );
        BandsResult {
            dimension: dim,
            bands,
            recovery_time_s: f64::NAN,
        }
    }
}

/// Severity-ordered tier classification: the most severe tier containing the
/// value wins.
fn classify_tier(tiers: &TierSets, value: f64) -> BandRegion {
    if tiers.near.contains(value) {
        BandRegion::Near
    } else if tiers.mid.contains(value) {
        BandRegion::Mid
    } else if tiers.far.contains(value) {
        BandRegion::Far
    } else {
        BandRegion::None
    }
}

/// Assemble an ordered, gap-free banding of `[min, max]` from interval-set
/// cut points and a point classifier. Uncovered stretches come out as
/// whatever the classifier returns between cuts (`None` gaps included), and
/// adjacent equal-region bands are merged.
fn color_bands(
    min: f64,
    max: f64,
    sets: &[&IntervalSet],
    classify: impl Fn(f64) -> BandRegion,
) -> Vec<Band> {
    let mut cuts = vec![min, max];
    for set in sets {
        for interval in set.intervals() {
            if interval.low > min && interval.low < max {
                cuts.push(interval.low);
            }
            if interval.up > min && interval.up < max {
                cuts.push(interval.up);
            }
        }
    }
    cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

    let mut bands: Vec<Band> = Vec::new();
    for pair in cuts.windows(2) {
        let region = classify(0.5 * (pair[0] + pair[1]));
        match bands.last_mut() {
            Some(last) if last.region == region => last.interval.up = pair[1],
            _ => bands.push(Band {
                interval: Interval::new(pair[0], pair[1]),
                region,
            }),
        }
    }
    bands
}
