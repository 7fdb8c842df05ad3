//! Recovery search for saturated dimensions.
//!
//! When every maneuver in a dimension is red, the question changes from
//! "which maneuver is safe" to "how soon can any maneuver become safe". The
//! search shrinks the protection volume toward its NMAC floor and binary
//! searches the earliest pivot time from which a swept green corridor exists.

use crate::detection::ConflictProbe;
use crate::interval::IntervalSet;
use crate::models::{AircraftState, TrafficAircraft};
use crate::rules::DaaConfig;
use crate::sweep::{sweep_red, Dimension};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Convergence resolution of the pivot search, and the shortest recovery
/// window worth reporting.
const PIVOT_RESOLUTION_S: f64 = 0.5;

/// Volume scale factors tried in order, each halving the previous. The final
/// zero lands exactly on the NMAC floor.
const SHRINK_STEPS: usize = 4;

/// Outcome of a recovery search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    /// Seconds until a safe maneuver exists. `NEG_INFINITY` means the
    /// dimension stays saturated through the lookahead even at the NMAC
    /// volume — upstream alerting must treat this as maximum severity.
    pub time_s: f64,
    /// Volume scale factor at which the escape was found
    pub factor: f64,
    /// Red set at the found pivot; its complement is the recovery band
    pub red: IntervalSet,
}

impl RecoveryResult {
    pub fn is_recoverable(&self) -> bool {
        self.time_s.is_finite()
    }
}

/// Search for the earliest achievable escape in a saturated dimension.
///
/// The caller has already established that the full-volume sweep leaves no
/// green; this only runs on solid red.
pub fn recovery_search(
    dim: Dimension,
    own: &AircraftState,
    traffic: &[TrafficAircraft],
    probe: &dyn ConflictProbe,
    config: &DaaConfig,
) -> RecoveryResult {
    let window = config.lookahead;
    let mut factor = config.recovery.shrink_factor;

    for step in 0..SHRINK_STEPS {
        // Last step goes straight to the NMAC floor.
        if step == SHRINK_STEPS - 1 {
            factor = 0.0;
        }
        let shrunk = probe.shrunk(factor);
        if let Some(result) = pivot_search(dim, own, traffic, shrunk.as_ref(), config, factor) {
            return result;
        }
        factor *= 0.5;
    }

    warn!(
        "{:?} unrecoverable within {:.0} s lookahead even at NMAC volume",
        dim, window.t
    );
    RecoveryResult {
        time_s: f64::NEG_INFINITY,
        factor: 0.0,
        red: full_domain(dim, config),
    }
}

fn full_domain(dim: Dimension, config: &DaaConfig) -> IntervalSet {
    let spec = dim.spec(config);
    let mut set = IntervalSet::new();
    set.union(crate::interval::Interval::new(spec.min, spec.max));
    set
}

/// Binary search the earliest pivot with a green corridor at this volume.
/// `None` when even the latest usable pivot is still solid red.
fn pivot_search(
    dim: Dimension,
    own: &AircraftState,
    traffic: &[TrafficAircraft],
    probe: &dyn ConflictProbe,
    config: &DaaConfig,
    factor: f64,
) -> Option<RecoveryResult> {
    let window = config.lookahead;
    let latest = window.t - PIVOT_RESOLUTION_S;
    if latest <= window.b {
        return None;
    }

    let mut red_at_green = green_at(dim, own, traffic, probe, config, latest)?;
    let mut pivot_green = latest;
    // The dimension is saturated now, so the window start is known red.
    let mut pivot_red = window.b;

    // The search halves the window each step; this cap bounds worst-case
    // latency even if the interval fails to close numerically.
    let cap = (window.duration() / PIVOT_RESOLUTION_S).log2().ceil() as usize;
    let mut iterations = 0;
    while pivot_green - pivot_red > PIVOT_RESOLUTION_S && iterations < cap {
        let pivot = 0.5 * (pivot_green + pivot_red);
        match green_at(dim, own, traffic, probe, config, pivot) {
            Some(red) => {
                pivot_green = pivot;
                red_at_green = red;
            }
            None => pivot_red = pivot,
        }
        iterations += 1;
        trace!(
            "{:?} recovery pivot [{:.2}, {:.2}] at factor {:.2}",
            dim,
            pivot_red,
            pivot_green,
            factor
        );
    }

    // Hysteresis: pad the advised time so the maneuver survives the next
    // replan instead of flapping.
    let time_s = (pivot_green + config.recovery.stability_time_s).min(window.t);
    Some(RecoveryResult {
        time_s,
        factor,
        red: red_at_green,
    })
}

/// Red set over `[pivot, T]`, or `None` when no tolerance-wide green
/// corridor survives.
fn green_at(
    dim: Dimension,
    own: &AircraftState,
    traffic: &[TrafficAircraft],
    probe: &dyn ConflictProbe,
    config: &DaaConfig,
    pivot: f64,
) -> Option<IntervalSet> {
    let spec = dim.spec(config);
    let red = sweep_red(dim, own, traffic, probe, config, pivot, config.lookahead.t);
    let green = red.complement(spec.min, spec.max);
    if green
        .intervals()
        .iter()
        .any(|iv| iv.width() >= spec.tolerance)
    {
        Some(red)
    } else {
        None
    }
}
