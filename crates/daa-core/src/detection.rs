//! Pairwise conflict detection against a protected volume.
//!
//! The oracle consumed by every band sweep, resolution query, and recovery
//! search. Both aircraft are assumed to move linearly from now; intent-aware
//! detection walks a piecewise-linear trajectory segment by segment.

use crate::models::{AircraftState, TrajectorySegment, Vect3};
use crate::rules::ProtectionVolume;
use serde::{Deserialize, Serialize};

/// Relative speeds below this are treated as no relative motion.
const EPS_SPEED: f64 = 1e-9;
/// Relative discriminant threshold below which a horizontal crossing is a
/// tangency. A path grazing the protected circle at exactly the separation
/// distance is not a violation.
const TANGENCY_EPS: f64 = 1e-9;

/// Outcome of probing one aircraft pair over a time window.
///
/// `time_in`/`time_out` are seconds from the start of the queried window.
/// `time_in >= time_out` is a degenerate no-conflict state and must never be
/// read as a valid interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConflictVerdict {
    pub conflict: bool,
    pub time_in: f64,
    pub time_out: f64,
    /// Time of horizontal closest approach, clamped into the window
    pub time_closest: f64,
    /// Horizontal distance at `time_closest`
    pub dist_closest: f64,
}

impl ConflictVerdict {
    /// The no-conflict verdict, keeping closest-approach data.
    pub fn clear(time_closest: f64, dist_closest: f64) -> Self {
        Self {
            conflict: false,
            time_in: f64::INFINITY,
            time_out: f64::NEG_INFINITY,
            time_closest,
            dist_closest,
        }
    }
}

/// Conflict oracle over a protected-volume shape.
///
/// The cylinder is the reference implementation; alternate shapes plug in
/// here and must honor the same contract: `conflict_detection` reports a
/// conflict iff the relative linear trajectory violates the volume somewhere
/// in `[b, t]`, and `violation` tests the volume at the current instant.
pub trait ConflictProbe {
    /// Probe the window `[b, t]` (seconds from now). `s` is the relative
    /// position ownship − intruder; `vo`/`vi` the respective velocities.
    fn conflict_detection(&self, s: Vect3, vo: Vect3, vi: Vect3, b: f64, t: f64)
        -> ConflictVerdict;

    /// Loss of separation at the current instant.
    fn violation(&self, s: Vect3) -> bool;

    /// Copy of this probe with the protected volume scaled toward its NMAC
    /// floor. Recovery searches trade separation margin for an escape route.
    fn shrunk(&self, factor: f64) -> Box<dyn ConflictProbe>;
}

/// Cylindrical protected-zone oracle: horizontal radius `D`, vertical
/// half-height `H`, both from [`ProtectionVolume`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylinderDetector {
    pub volume: ProtectionVolume,
    /// Detected conflicts shorter than this are suppressed as transients
    pub filter_s: f64,
}

impl CylinderDetector {
    pub fn new(volume: ProtectionVolume) -> Self {
        Self { volume, filter_s: 0.0 }
    }

    pub fn with_filter(mut self, filter_s: f64) -> Self {
        self.filter_s = filter_s;
        self
    }
}

/// Time window during which the horizontal distance is below `d`, or `None`
/// when the relative path misses (or merely grazes) the circle.
pub(crate) fn horizontal_window(s: Vect3, v: Vect3, d: f64) -> Option<(f64, f64)> {
    let a = v.sq_norm2d();
    if a < EPS_SPEED * EPS_SPEED {
        // No relative horizontal motion: inside forever or never.
        return if s.norm2d() < d {
            Some((f64::NEG_INFINITY, f64::INFINITY))
        } else {
            None
        };
    }
    let det = s.det2d(v);
    let discriminant = d * d * a - det * det;
    // Tangency is not a violation; compare against a scaled epsilon, not
    // zero, so near-graze geometry is stable under floating error.
    if discriminant <= TANGENCY_EPS * d * d * a {
        return None;
    }
    let dot = s.dot2d(v);
    let sq = discriminant.sqrt();
    Some(((-dot - sq) / a, (-dot + sq) / a))
}

/// Time window during which the vertical distance is below `h`.
pub(crate) fn vertical_window(sz: f64, vz: f64, h: f64) -> Option<(f64, f64)> {
    if vz.abs() < EPS_SPEED {
        return if sz.abs() < h {
            Some((f64::NEG_INFINITY, f64::INFINITY))
        } else {
            None
        };
    }
    let t1 = (-h - sz) / vz;
    let t2 = (h - sz) / vz;
    Some((t1.min(t2), t1.max(t2)))
}

/// Horizontal time of closest approach (unclamped).
pub(crate) fn tcpa(s: Vect3, v: Vect3) -> f64 {
    let a = v.sq_norm2d();
    if a < EPS_SPEED * EPS_SPEED {
        0.0
    } else {
        -s.dot2d(v) / a
    }
}

impl ConflictProbe for CylinderDetector {
    fn conflict_detection(
        &self,
        s: Vect3,
        vo: Vect3,
        vi: Vect3,
        b: f64,
        t: f64,
    ) -> ConflictVerdict {
        let v = vo - vi;
        let time_closest = tcpa(s, v).clamp(b, t);
        let dist_closest = s.linear(v, time_closest).norm2d();

        let Some((h_in, h_out)) = horizontal_window(s, v, self.volume.horizontal_m) else {
            return ConflictVerdict::clear(time_closest - b, dist_closest);
        };
        let Some((v_in, v_out)) = vertical_window(s.z, v.z, self.volume.vertical_m) else {
            return ConflictVerdict::clear(time_closest - b, dist_closest);
        };

        let time_in = h_in.max(v_in).max(b);
        let time_out = h_out.min(v_out).min(t);
        if time_in >= time_out || time_out - time_in < self.filter_s {
            return ConflictVerdict::clear(time_closest - b, dist_closest);
        }
        ConflictVerdict {
            conflict: true,
            time_in: time_in - b,
            time_out: time_out - b,
            time_closest: time_closest - b,
            dist_closest,
        }
    }

    fn violation(&self, s: Vect3) -> bool {
        s.norm2d() < self.volume.horizontal_m && s.z.abs() < self.volume.vertical_m
    }

    fn shrunk(&self, factor: f64) -> Box<dyn ConflictProbe> {
        Box::new(Self {
            volume: self.volume.shrunk(factor),
            filter_s: self.filter_s,
        })
    }
}

/// Probe a traffic aircraft over `[b, t]`, following its intent trajectory
/// when one is declared and falling back to linear projection otherwise.
///
/// The ownship maneuvers instantaneously: `own_velocity` replaces the
/// ownship's current velocity for the whole window.
pub fn detect_traffic(
    probe: &dyn ConflictProbe,
    own_position: Vect3,
    own_velocity: Vect3,
    traffic_position: Vect3,
    traffic_velocity: Vect3,
    intent: Option<&[TrajectorySegment]>,
    b: f64,
    t: f64,
) -> ConflictVerdict {
    match intent {
        Some(segments) if !segments.is_empty() => detect_along_intent(
            probe,
            own_position,
            own_velocity,
            segments,
            b,
            t,
        ),
        _ => probe.conflict_detection(
            own_position - traffic_position,
            own_velocity,
            traffic_velocity,
            b,
            t,
        ),
    }
}

/// Piecewise detection along a timed linear segment list. Segment times are
/// seconds from now; the final segment extends to the end of the window.
fn detect_along_intent(
    probe: &dyn ConflictProbe,
    own_position: Vect3,
    own_velocity: Vect3,
    segments: &[TrajectorySegment],
    b: f64,
    t: f64,
) -> ConflictVerdict {
    let mut first_in = f64::INFINITY;
    let mut last_out = f64::NEG_INFINITY;
    let mut time_closest = b;
    let mut dist_closest = f64::INFINITY;

    for (i, segment) in segments.iter().enumerate() {
        let seg_end = segments.get(i + 1).map_or(t, |next| next.time);
        let t0 = segment.time.max(b);
        let nt = seg_end.min(t) - t0;
        if nt < 0.0 {
            // Negative clipped duration at segment boundaries is skipped, as
            // in the legacy sweep. Flagged for review; see DESIGN.md.
            continue;
        }
        // Relative state at the segment's clipped start.
        let own_at = own_position.linear(own_velocity, t0);
        let traffic_at = segment.position.linear(segment.velocity, t0 - segment.time);
        let verdict =
            probe.conflict_detection(own_at - traffic_at, own_velocity, segment.velocity, 0.0, nt);

        if verdict.dist_closest < dist_closest {
            dist_closest = verdict.dist_closest;
            time_closest = t0 + verdict.time_closest;
        }
        if verdict.conflict {
            first_in = first_in.min(t0 + verdict.time_in);
            last_out = last_out.max(t0 + verdict.time_out);
        }
    }

    if first_in < last_out {
        ConflictVerdict {
            conflict: true,
            time_in: first_in - b,
            time_out: last_out - b,
            time_closest: time_closest - b,
            dist_closest,
        }
    } else {
        ConflictVerdict::clear(time_closest - b, dist_closest)
    }
}

/// Convenience form over two aircraft states.
pub fn detect_states(
    probe: &dyn ConflictProbe,
    own: &AircraftState,
    traffic: &AircraftState,
    b: f64,
    t: f64,
) -> ConflictVerdict {
    probe.conflict_detection(
        own.position - traffic.position,
        own.velocity,
        traffic.velocity,
        b,
        t,
    )
}
