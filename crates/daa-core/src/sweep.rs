//! Per-dimension conflict sweep.
//!
//! Partitions a maneuver dimension at its critical values, probes one
//! representative maneuver per sub-interval against every traffic aircraft,
//! and accumulates the red sub-intervals into a normalized interval set.
//! One conflicting intruder is enough to redden a maneuver.

use crate::critical::{
    ground_speed_candidates, partition, track_candidates, vertical_speed_candidates,
};
use crate::detection::{detect_traffic, ConflictProbe};
use crate::interval::{Interval, IntervalSet};
use crate::models::{mk_trk_gs_vs, AircraftState, TrafficAircraft, Vect3};
use crate::rules::{DaaConfig, DimensionSpec, LookaheadWindow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A maneuver dimension banded by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Track,
    GroundSpeed,
    VerticalSpeed,
    Altitude,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Track,
        Dimension::GroundSpeed,
        Dimension::VerticalSpeed,
        Dimension::Altitude,
    ];

    pub fn spec(self, config: &DaaConfig) -> &DimensionSpec {
        match self {
            Dimension::Track => &config.track,
            Dimension::GroundSpeed => &config.ground_speed,
            Dimension::VerticalSpeed => &config.vertical_speed,
            Dimension::Altitude => &config.altitude,
        }
    }

    /// The ownship's current value in this dimension.
    pub fn current_value(self, own: &AircraftState) -> f64 {
        match self {
            Dimension::Track => own.velocity.track(),
            Dimension::GroundSpeed => own.velocity.ground_speed(),
            Dimension::VerticalSpeed => own.velocity.vertical_speed(),
            Dimension::Altitude => own.position.z,
        }
    }
}

/// Ownship position and velocity after instantaneously taking the maneuver
/// `value` in `dim`, holding the other dimensions at their current values.
pub(crate) fn maneuver(dim: Dimension, own: &AircraftState, value: f64) -> (Vect3, Vect3) {
    let p = own.position;
    let v = own.velocity;
    match dim {
        Dimension::Track => (p, mk_trk_gs_vs(value, v.ground_speed(), v.z)),
        Dimension::GroundSpeed => (p, mk_trk_gs_vs(v.track(), value, v.z)),
        Dimension::VerticalSpeed => (p, Vect3::new(v.x, v.y, value)),
        Dimension::Altitude => (Vect3::new(p.x, p.y, value), Vect3::new(v.x, v.y, 0.0)),
    }
}

/// Effective time-zero relative state against one linear piece of traffic
/// motion: a traffic aircraft at `position` with `velocity` from `time`
/// looks, to a maneuver taken now, like one at `position - time·velocity`
/// from now on.
fn effective_relative(own: &AircraftState, position: Vect3, velocity: Vect3, time: f64) -> Vect3 {
    own.position - position.linear(velocity, -time)
}

/// Candidate partition values for one dimension across all traffic.
fn candidate_values(
    dim: Dimension,
    own: &AircraftState,
    traffic: &[TrafficAircraft],
    config: &DaaConfig,
    window: LookaheadWindow,
) -> Vec<f64> {
    let spec = dim.spec(config);
    let mut values = Vec::new();

    if dim == Dimension::Altitude {
        // No closed-form critical set; the dimension step drives the grid.
        let mut altitude = spec.min;
        while altitude <= spec.max + 1e-9 {
            values.push(altitude);
            altitude += spec.step;
        }
        return partition(values, spec.min, spec.max, spec.modulus);
    }

    for tfc in traffic {
        // Each linear piece of the intruder's motion contributes its own
        // critical values, clipped to the time span the piece covers.
        let pieces: Vec<(Vect3, Vect3, f64, f64)> = match &tfc.intent {
            Some(segments) if !segments.is_empty() => segments
                .iter()
                .enumerate()
                .map(|(i, seg)| {
                    let end = segments.get(i + 1).map_or(window.t, |next| next.time);
                    (seg.position, seg.velocity, seg.time, end)
                })
                .collect(),
            _ => vec![(tfc.state.position, tfc.state.velocity, 0.0, window.t)],
        };
        for (position, velocity, time, end) in pieces {
            let piece_window = LookaheadWindow {
                b: time.max(window.b),
                t: end.min(window.t),
            };
            if piece_window.b >= piece_window.t {
                continue;
            }
            let s = effective_relative(own, position, velocity, time);
            let vo = own.velocity;
            match dim {
                Dimension::Track => {
                    values.extend(track_candidates(s, vo, velocity, &config.volume, piece_window));
                }
                Dimension::GroundSpeed => {
                    values.extend(ground_speed_candidates(
                        s,
                        vo,
                        velocity,
                        &config.volume,
                        piece_window,
                    ));
                }
                Dimension::VerticalSpeed => {
                    values.extend(vertical_speed_candidates(
                        s,
                        vo,
                        velocity,
                        &config.volume,
                        piece_window,
                    ));
                }
                Dimension::Altitude => unreachable!("altitude uses the step grid"),
            }
        }
    }
    partition(values, spec.min, spec.max, spec.modulus)
}

/// Red interval set of one dimension over the window `[b, t]`.
///
/// Used directly by the recovery search, which probes shrunk volumes over
/// shifted windows.
pub fn sweep_red(
    dim: Dimension,
    own: &AircraftState,
    traffic: &[TrafficAircraft],
    probe: &dyn ConflictProbe,
    config: &DaaConfig,
    b: f64,
    t: f64,
) -> IntervalSet {
    let spec = dim.spec(config);
    let window = LookaheadWindow { b, t };
    let values = candidate_values(dim, own, traffic, config, window);

    let mut red = IntervalSet::new();
    for pair in values.windows(2) {
        let mid = 0.5 * (pair[0] + pair[1]);
        let (position, velocity) = maneuver(dim, own, mid);
        let conflict = traffic.iter().any(|tfc| {
            detect_traffic(
                probe,
                position,
                velocity,
                tfc.state.position,
                tfc.state.velocity,
                tfc.intent.as_deref(),
                b,
                t,
            )
            .conflict
        });
        if conflict {
            red.union(Interval::new(pair[0], pair[1]));
        }
    }

    red.sweep_single(spec.tolerance);
    red.sweep_breaks(spec.tolerance);
    if let Some(modulus) = spec.modulus {
        red.sweep_rollover(modulus, spec.tolerance);
    }
    red
}

/// Red interval sets of one dimension split by conflict severity tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierSets {
    pub near: IntervalSet,
    pub mid: IntervalSet,
    pub far: IntervalSet,
}

impl TierSets {
    /// Union of all tiers: every maneuver in conflict within the lookahead.
    pub fn all_red(&self) -> IntervalSet {
        let mut all = self.near.clone();
        all.union_set(&self.mid);
        all.union_set(&self.far);
        all
    }
}

/// Sweep one dimension, classifying each red sub-interval by how soon its
/// earliest conflict begins: within the near horizon, the mid horizon, or
/// only the full lookahead.
pub fn sweep_tiers(
    dim: Dimension,
    own: &AircraftState,
    traffic: &[TrafficAircraft],
    probe: &dyn ConflictProbe,
    config: &DaaConfig,
) -> TierSets {
    let spec = dim.spec(config);
    let window = config.lookahead;
    let values = candidate_values(dim, own, traffic, config, window);
    debug!(
        "{:?} sweep: {} traffic, {} partition values",
        dim,
        traffic.len(),
        values.len()
    );

    let mut tiers = TierSets::default();
    for pair in values.windows(2) {
        let mid = 0.5 * (pair[0] + pair[1]);
        let (position, velocity) = maneuver(dim, own, mid);

        let mut earliest_in = f64::INFINITY;
        for tfc in traffic {
            let verdict = detect_traffic(
                probe,
                position,
                velocity,
                tfc.state.position,
                tfc.state.velocity,
                tfc.intent.as_deref(),
                window.b,
                window.t,
            );
            if verdict.conflict {
                earliest_in = earliest_in.min(window.b + verdict.time_in);
            }
        }
        if !earliest_in.is_finite() {
            continue;
        }
        let interval = Interval::new(pair[0], pair[1]);
        if earliest_in <= config.tiers.near_s {
            tiers.near.union(interval);
        } else if earliest_in <= config.tiers.mid_s {
            tiers.mid.union(interval);
        } else {
            tiers.far.union(interval);
        }
    }

    for set in [&mut tiers.near, &mut tiers.mid, &mut tiers.far] {
        set.sweep_single(spec.tolerance);
        set.sweep_breaks(spec.tolerance);
        if let Some(modulus) = spec.modulus {
            set.sweep_rollover(modulus, spec.tolerance);
        }
    }
    tiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::CylinderDetector;
    use crate::models::TrajectorySegment;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    fn head_on_setup() -> (AircraftState, Vec<TrafficAircraft>, DaaConfig, CylinderDetector) {
        let config = DaaConfig::default();
        let own = AircraftState::new("own", Vect3::ZERO)
            .with_velocity(Vect3::new(100.0, 0.0, 0.0));
        let traffic = vec![TrafficAircraft::new(
            AircraftState::new("tfc1", Vect3::new(10_000.0, 0.0, 0.0))
                .with_velocity(Vect3::new(-100.0, 0.0, 0.0)),
        )];
        let probe = CylinderDetector::new(config.volume).with_filter(config.filter_s);
        (own, traffic, config, probe)
    }

    #[test]
    fn head_on_track_sweep_reddens_current_heading() {
        let (own, traffic, config, probe) = head_on_setup();
        let red = sweep_red(
            Dimension::Track,
            &own,
            &traffic,
            &probe,
            &config,
            0.0,
            120.0,
        );
        // Current heading (east) is red; perpendicular headings are safe.
        assert!(red.contains(FRAC_PI_2));
        assert!(!red.contains(0.0));
        assert!(!red.contains(PI));
    }

    #[test]
    fn sweep_with_no_traffic_is_all_green() {
        let (own, _, config, probe) = head_on_setup();
        for dim in Dimension::ALL {
            let red = sweep_red(dim, &own, &[], &probe, &config, 0.0, 120.0);
            assert!(red.is_empty(), "{dim:?} should be clear");
        }
    }

    #[test]
    fn head_on_conflict_lands_in_near_tier() {
        let (own, traffic, config, probe) = head_on_setup();
        // Entry at ~40.7 s, inside the 60 s near horizon.
        let tiers = sweep_tiers(Dimension::Track, &own, &traffic, &probe, &config);
        assert!(tiers.near.contains(FRAC_PI_2));
        assert!(!tiers.far.contains(FRAC_PI_2));
    }

    #[test]
    fn distant_conflict_lands_in_far_tier() {
        let config = DaaConfig::default();
        let own = AircraftState::new("own", Vect3::ZERO)
            .with_velocity(Vect3::new(100.0, 0.0, 0.0));
        // Entry at (22000 - 1852) / 200 ≈ 100.7 s: beyond mid (90 s), within
        // the 120 s lookahead.
        let traffic = vec![TrafficAircraft::new(
            AircraftState::new("tfc1", Vect3::new(22_000.0, 0.0, 0.0))
                .with_velocity(Vect3::new(-100.0, 0.0, 0.0)),
        )];
        let probe = CylinderDetector::new(config.volume).with_filter(config.filter_s);
        let tiers = sweep_tiers(Dimension::Track, &own, &traffic, &probe, &config);
        assert!(tiers.far.contains(FRAC_PI_2));
        assert!(!tiers.near.contains(FRAC_PI_2));
        assert!(tiers.all_red().contains(FRAC_PI_2));
    }

    #[test]
    fn ground_speed_sweep_respects_domain_bounds() {
        let (own, traffic, config, probe) = head_on_setup();
        let red = sweep_red(
            Dimension::GroundSpeed,
            &own,
            &traffic,
            &probe,
            &config,
            0.0,
            120.0,
        );
        let spec = &config.ground_speed;
        for interval in red.intervals() {
            assert!(interval.low >= spec.min - 1e-9);
            assert!(interval.up <= spec.max + 1e-9);
        }
    }

    #[test]
    fn altitude_sweep_clears_levels_above_traffic() {
        let (own, traffic, config, probe) = head_on_setup();
        let red = sweep_red(
            Dimension::Altitude,
            &own,
            &traffic,
            &probe,
            &config,
            0.0,
            120.0,
        );
        // Conflict is at 0 m; a level 1000 m up is clear of the 152.4 m
        // vertical separation.
        assert!(red.contains(0.0));
        assert!(!red.contains(1000.0));
    }

    #[test]
    fn intent_traffic_sweeps_against_each_segment() {
        let config = DaaConfig::default();
        let own = AircraftState::new("own", Vect3::ZERO)
            .with_velocity(Vect3::new(100.0, 0.0, 0.0));
        // Intruder starts far north moving away, but its declared intent
        // turns it onto a head-on collision leg at t = 20 s.
        let state = AircraftState::new("tfc1", Vect3::new(12_000.0, 40_000.0, 0.0))
            .with_velocity(Vect3::new(0.0, 100.0, 0.0));
        let intent = vec![
            TrajectorySegment {
                time: 0.0,
                position: state.position,
                velocity: state.velocity,
            },
            TrajectorySegment {
                time: 20.0,
                position: Vect3::new(12_000.0, 0.0, 0.0),
                velocity: Vect3::new(-100.0, 0.0, 0.0),
            },
        ];
        let traffic = vec![TrafficAircraft::new(state.clone()).with_intent(intent)];
        let probe = CylinderDetector::new(config.volume).with_filter(config.filter_s);

        let red = sweep_red(
            Dimension::Track,
            &own,
            &traffic,
            &probe,
            &config,
            0.0,
            120.0,
        );
        assert!(red.contains(FRAC_PI_2));

        // Without the intent the same aircraft is diverging and harmless.
        let linear_only = vec![TrafficAircraft::new(state)];
        let red_linear = sweep_red(
            Dimension::Track,
            &own,
            &linear_only,
            &probe,
            &config,
            0.0,
            120.0,
        );
        assert!(red_linear.is_empty());
    }

    #[test]
    fn track_red_band_stays_inside_domain() {
        let (own, traffic, config, probe) = head_on_setup();
        let red = sweep_red(
            Dimension::Track,
            &own,
            &traffic,
            &probe,
            &config,
            0.0,
            120.0,
        );
        for interval in red.intervals() {
            assert!(interval.low >= 0.0);
            assert!(interval.up <= TAU + 1e-9);
        }
    }
}
