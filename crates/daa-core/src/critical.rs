//! Critical maneuver values: the finitely many points in a dimension where
//! the conflict verdict against one traffic aircraft can flip.
//!
//! Two families of flips exist. Tangency flips: the relative velocity grazes
//! the protected circle, so the infinite relative path switches between
//! crossing and missing it. Boundary flips: the crossing times slide past an
//! end of the query window, so a crossing path switches between conflicting
//! inside the window and clearing it. Between consecutive critical values the
//! verdict is constant, so the band sweep evaluates one representative point
//! per sub-interval instead of stepping the dimension at a fixed resolution.

use crate::detection::horizontal_window;
use crate::models::Vect3;
use crate::rules::{LookaheadWindow, ProtectionVolume};

const EPS_SPEED: f64 = 1e-9;
/// Boundary times closer to now than this produce no usable candidate.
const EPS_TIME: f64 = 1e-6;

/// Rotate a horizontal unit vector by `angle` (counterclockwise in x/y).
fn rotate2d(u: Vect3, angle: f64) -> Vect3 {
    let (sin, cos) = angle.sin_cos();
    Vect3::new(u.x * cos - u.y * sin, u.x * sin + u.y * cos, 0.0)
}

/// Ownship track angles at which the conflict verdict can flip against one
/// intruder over the query window.
///
/// Tangency flips come from the two tangent lines from the relative position
/// `s` to the circle of radius `D`: intersecting the ownship speed circle
/// with each line `{vi + λ·e}` recovers the headings realizing them.
/// Boundary flips come from headings that place the relative position
/// exactly on the circle at the window start and end.
pub fn track_candidates(
    s: Vect3,
    vo: Vect3,
    vi: Vect3,
    volume: &ProtectionVolume,
    window: LookaheadWindow,
) -> Vec<f64> {
    let mut candidates = Vec::new();
    let gs = vo.ground_speed();
    if gs < EPS_SPEED {
        return candidates;
    }
    let dist = s.norm2d();
    let d = volume.horizontal_m;

    if dist > d {
        // Unit vector from the relative position toward the circle center.
        let u = (-s).scale(1.0 / dist);
        let beta = (d / dist).asin();

        for tangent in [rotate2d(u, beta), rotate2d(u, -beta)] {
            // ‖vi + λ·e‖ = gs, λ ≥ 0
            let half_b = vi.dot2d(tangent);
            let c = vi.sq_norm2d() - gs * gs;
            let discriminant = half_b * half_b - c;
            if discriminant < 0.0 {
                continue;
            }
            let sq = discriminant.sqrt();
            for lambda in [-half_b - sq, -half_b + sq] {
                if lambda > EPS_SPEED {
                    let w = Vect3::new(vi.x + lambda * tangent.x, vi.y + lambda * tangent.y, 0.0);
                    candidates.push(w.track());
                }
            }
        }
    }

    for tau in [window.b, window.t] {
        boundary_track_candidates(s, gs, vi, d, tau, &mut candidates);
    }
    candidates
}

/// Headings placing the relative position exactly on the protected circle at
/// time `tau`: the intersection of the ownship speed circle with the circle
/// of radius `D/τ` centered at `(τ·vi − s)/τ` in velocity space.
fn boundary_track_candidates(
    s: Vect3,
    gs: f64,
    vi: Vect3,
    d: f64,
    tau: f64,
    candidates: &mut Vec<f64>,
) {
    if tau <= EPS_TIME {
        return;
    }
    let center = Vect3::new((tau * vi.x - s.x) / tau, (tau * vi.y - s.y) / tau, 0.0);
    let r2 = d / tau;
    let dist = center.norm2d();
    if dist < EPS_SPEED {
        return;
    }
    if dist > gs + r2 || dist < (gs - r2).abs() {
        return;
    }
    let a = (gs * gs - r2 * r2 + dist * dist) / (2.0 * dist);
    let h_sq = gs * gs - a * a;
    if h_sq < 0.0 {
        return;
    }
    let h = h_sq.sqrt();
    let unit = center.scale(1.0 / dist);
    let perp = Vect3::new(-unit.y, unit.x, 0.0);
    for sign in [1.0, -1.0] {
        let w = unit.scale(a) + perp.scale(sign * h);
        candidates.push(w.track());
    }
}

/// Ownship ground speeds (heading held fixed) at which the verdict can flip:
/// tangency speeds from the detector's discriminant closed form, now
/// quadratic in the speed, plus window-boundary alignment speeds.
pub fn ground_speed_candidates(
    s: Vect3,
    vo: Vect3,
    vi: Vect3,
    volume: &ProtectionVolume,
    window: LookaheadWindow,
) -> Vec<f64> {
    let mut candidates = Vec::new();
    let gs = vo.ground_speed();
    if gs < EPS_SPEED {
        // Heading undefined at zero speed.
        return candidates;
    }
    let u = Vect3::new(vo.x / gs, vo.y / gs, 0.0);
    let d = volume.horizontal_m;

    // Δ(k·u − vi) = D²‖k·u − vi‖² − (s × (k·u − vi))² as a quadratic in k.
    let su = s.det2d(u);
    let svi = s.det2d(vi);
    push_quadratic_roots(
        d * d - su * su,
        2.0 * (su * svi - d * d * u.dot2d(vi)),
        d * d * vi.sq_norm2d() - svi * svi,
        &mut candidates,
    );

    // ‖(s − τ·vi) + τ·k·u‖ = D at each window boundary.
    for tau in [window.b, window.t] {
        if tau <= EPS_TIME {
            continue;
        }
        let c = s - vi.scale(tau);
        push_quadratic_roots(
            tau * tau,
            2.0 * tau * c.dot2d(u),
            c.sq_norm2d() - d * d,
            &mut candidates,
        );
    }
    candidates
}

/// Positive real roots of `a·k² + b·k + c = 0`.
fn push_quadratic_roots(a: f64, b: f64, c: f64, out: &mut Vec<f64>) {
    if a.abs() < EPS_SPEED {
        if b.abs() > EPS_SPEED {
            let k = -c / b;
            if k > 0.0 {
                out.push(k);
            }
        }
        return;
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return;
    }
    let sq = discriminant.sqrt();
    for k in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
        if k > 0.0 {
            out.push(k);
        }
    }
}

/// Ownship vertical speeds placing the relative vertical position exactly at
/// the ±H boundary at the window ends and at the horizontal conflict window
/// endpoints.
///
/// The horizontal window does not move with vertical speed, so these boundary
/// alignments are the only rates at which the verdict can flip. Extra
/// candidate times merely refine the partition; they never make it wrong.
pub fn vertical_speed_candidates(
    s: Vect3,
    vo: Vect3,
    vi: Vect3,
    volume: &ProtectionVolume,
    window: LookaheadWindow,
) -> Vec<f64> {
    let mut times = vec![window.b, window.t];
    let v = vo - vi;
    if let Some((h_in, h_out)) = horizontal_window(s, v, volume.horizontal_m) {
        times.push(h_in.max(window.b));
        times.push(h_out.min(window.t));
    }

    let h = volume.vertical_m;
    let mut candidates = Vec::new();
    for tau in times {
        if tau <= EPS_TIME {
            continue;
        }
        for boundary in [h, -h] {
            candidates.push(vi.z + (boundary - s.z) / tau);
        }
    }
    candidates
}

/// Collect, normalize, sort, and deduplicate candidate values into a
/// partition of `[min, max]`. The domain bounds are always included.
pub fn partition(mut values: Vec<f64>, min: f64, max: f64, modulus: Option<f64>) -> Vec<f64> {
    values.retain(|v| v.is_finite());
    if let Some(modulus) = modulus {
        for value in values.iter_mut() {
            *value = value.rem_euclid(modulus);
        }
    }
    values.retain(|&v| v >= min && v <= max);
    values.push(min);
    values.push(max);
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{ConflictProbe, CylinderDetector};
    use crate::models::mk_trk_gs_vs;
    use std::f64::consts::{FRAC_PI_2, TAU};

    fn volume(d: f64, h: f64) -> ProtectionVolume {
        ProtectionVolume::new(d, h).unwrap()
    }

    const WINDOW: LookaheadWindow = LookaheadWindow { b: 0.0, t: 120.0 };

    #[test]
    fn track_candidates_bracket_the_conflict_cone() {
        // Stationary intruder 10 km due east; the conflict cone is symmetric
        // about the east heading with half-angle asin(D / range).
        let vol = volume(1852.0, 150.0);
        let s = Vect3::new(-10_000.0, 0.0, 0.0);
        let vo = Vect3::new(100.0, 0.0, 0.0);
        let vi = Vect3::ZERO;
        let mut angles = track_candidates(s, vo, vi, &vol, WINDOW);
        angles.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let beta = (1852.0_f64 / 10_000.0).asin();
        assert_eq!(angles.len(), 2);
        assert!((angles[0] - (FRAC_PI_2 - beta)).abs() < 1e-9);
        assert!((angles[1] - (FRAC_PI_2 + beta)).abs() < 1e-9);

        // The verdict flips across each candidate.
        let probe = CylinderDetector::new(vol);
        let inside = mk_trk_gs_vs(FRAC_PI_2, 100.0, 0.0);
        let outside = mk_trk_gs_vs(FRAC_PI_2 + beta + 0.05, 100.0, 0.0);
        assert!(probe.conflict_detection(s, inside, vi, 0.0, 300.0).conflict);
        assert!(!probe.conflict_detection(s, outside, vi, 0.0, 300.0).conflict);
    }

    #[test]
    fn track_candidates_cover_window_start_inside_circle() {
        // Ownship starts inside the protected circle: no tangent exists, but
        // a late window still separates escaping headings from lingering
        // ones, via the boundary circle at the window start.
        let vol = volume(926.0, 150.0);
        let window = LookaheadWindow { b: 4.5, t: 120.0 };
        let s = Vect3::new(-500.0, 0.0, 0.0);
        let vo = Vect3::new(100.0, 0.0, 0.0);
        let candidates = track_candidates(s, vo, Vect3::ZERO, &vol, window);
        assert!(!candidates.is_empty());

        // The candidates separate due-west (clear of the circle by 4.5 s)
        // from due-east (re-entering it).
        let probe = CylinderDetector::new(vol);
        let west = mk_trk_gs_vs(3.0 * FRAC_PI_2, 100.0, 0.0);
        let east = mk_trk_gs_vs(FRAC_PI_2, 100.0, 0.0);
        let vi = Vect3::ZERO;
        assert!(!probe.conflict_detection(s, west, vi, 4.5, 120.0).conflict);
        assert!(probe.conflict_detection(s, east, vi, 4.5, 120.0).conflict);
    }

    #[test]
    fn ground_speed_candidates_bracket_crossing_traffic() {
        // Intruder crossing the ownship path from the south; arrival-time
        // overlap makes an interior speed range red.
        let vol = volume(500.0, 150.0);
        let s = Vect3::new(-5000.0, 5000.0, 0.0);
        let vo = Vect3::new(100.0, 0.0, 0.0);
        let vi = Vect3::new(0.0, 100.0, 0.0);
        let mut speeds = ground_speed_candidates(s, vo, vi, &vol, WINDOW);
        speeds.sort_by(|a, b| a.partial_cmp(b).unwrap());

        assert_eq!(speeds.len(), 2);
        assert!(speeds[0] < 100.0 && 100.0 < speeds[1]);

        let probe = CylinderDetector::new(vol);
        let heading = vo.track();
        let red = mk_trk_gs_vs(heading, (speeds[0] + speeds[1]) / 2.0, 0.0);
        let slow = mk_trk_gs_vs(heading, speeds[0] - 20.0, 0.0);
        let fast = mk_trk_gs_vs(heading, speeds[1] + 20.0, 0.0);
        assert!(probe.conflict_detection(s, red, vi, 0.0, 300.0).conflict);
        assert!(!probe.conflict_detection(s, slow, vi, 0.0, 300.0).conflict);
        assert!(!probe.conflict_detection(s, fast, vi, 0.0, 300.0).conflict);
    }

    #[test]
    fn vertical_speed_candidates_include_window_alignments() {
        // Intruder 300 m above on a head-on horizontal path: level flight is
        // safe, climbing into the intruder between the boundary rates is not.
        let vol = volume(1852.0, 150.0);
        let s = Vect3::new(-10_000.0, 0.0, -300.0);
        let vo = Vect3::new(100.0, 0.0, 0.0);
        let vi = Vect3::new(-100.0, 0.0, 0.0);
        let candidates = vertical_speed_candidates(s, vo, vi, &vol, WINDOW);

        // Horizontal window is (40.74, 59.26); the flip rates are
        // 150/59.26 ≈ 2.53 and 450/40.74 ≈ 11.05.
        let probe = CylinderDetector::new(vol);
        let verdict_at = |vs: f64| {
            probe
                .conflict_detection(s, Vect3::new(100.0, 0.0, vs), vi, WINDOW.b, WINDOW.t)
                .conflict
        };
        assert!(!verdict_at(0.0));
        assert!(verdict_at(6.0));
        assert!(!verdict_at(12.0));
        assert!(candidates.iter().any(|&c| (c - 2.53).abs() < 0.01));
        assert!(candidates.iter().any(|&c| (c - 11.05).abs() < 0.01));
    }

    #[test]
    fn test_partition_normalizes_and_bounds() {
        let parts = partition(vec![3.0, 1.0, 7.5, 1.0 + 1e-12, f64::NAN], 0.0, 5.0, None);
        assert_eq!(parts, vec![0.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_partition_wraps_circular_values() {
        let parts = partition(vec![-0.5, TAU + 0.25], 0.0, TAU, Some(TAU));
        assert_eq!(parts.len(), 4);
        assert!((parts[1] - 0.25).abs() < 1e-9);
        assert!((parts[2] - (TAU - 0.5)).abs() < 1e-9);
    }
}
