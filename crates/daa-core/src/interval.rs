//! Ordered sets of disjoint closed intervals.
//!
//! The workhorse container for conflict ("red") regions in a maneuver
//! dimension. All mutation goes through `union`/`diff` and the denoising
//! sweeps, each of which re-establishes the invariant: members sorted
//! ascending by `low`, pairwise disjoint and non-adjacent.

use serde::{Deserialize, Serialize};

/// A closed interval `[low, up]`. `low > up` encodes the empty interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: f64,
    pub up: f64,
}

impl Interval {
    /// The canonical empty interval.
    pub const EMPTY: Interval = Interval {
        low: f64::INFINITY,
        up: f64::NEG_INFINITY,
    };

    pub fn new(low: f64, up: f64) -> Self {
        Self { low, up }
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.up
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.up - self.low
        }
    }

    /// Inclusive membership.
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.up
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval::new(self.low.max(other.low), self.up.min(other.up))
    }
}

/// Normalized set of disjoint intervals, ascending by `low`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn contains(&self, value: f64) -> bool {
        self.intervals.iter().any(|iv| iv.contains(value))
    }

    /// Sum of member widths.
    pub fn total_width(&self) -> f64 {
        self.intervals.iter().map(Interval::width).sum()
    }

    /// Add an interval, merging any members it overlaps or touches.
    pub fn union(&mut self, interval: Interval) {
        if interval.is_empty() {
            return;
        }
        let mut merged = interval;
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        let mut inserted = false;

        for &member in &self.intervals {
            if member.up < merged.low {
                result.push(member);
            } else if member.low > merged.up {
                if !inserted {
                    result.push(merged);
                    inserted = true;
                }
                result.push(member);
            } else {
                merged = Interval::new(merged.low.min(member.low), merged.up.max(member.up));
            }
        }
        if !inserted {
            result.push(merged);
        }
        self.intervals = result;
    }

    /// Remove an interval, splitting any member it straddles.
    pub fn diff(&mut self, interval: Interval) {
        if interval.is_empty() {
            return;
        }
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        for &member in &self.intervals {
            if member.up < interval.low || member.low > interval.up {
                result.push(member);
                continue;
            }
            if member.low < interval.low {
                result.push(Interval::new(member.low, interval.low));
            }
            if member.up > interval.up {
                result.push(Interval::new(interval.up, member.up));
            }
        }
        self.intervals = result;
    }

    /// Union with every member of another set.
    pub fn union_set(&mut self, other: &IntervalSet) {
        for &interval in &other.intervals {
            self.union(interval);
        }
    }

    /// Subtract every member of another set.
    pub fn diff_set(&mut self, other: &IntervalSet) {
        for &interval in &other.intervals {
            self.diff(interval);
        }
    }

    /// The complement of this set within `[low, up]`.
    pub fn complement(&self, low: f64, up: f64) -> IntervalSet {
        let mut result = IntervalSet::new();
        result.union(Interval::new(low, up));
        result.diff_set(self);
        result
    }

    /// Close gaps narrower than `tol` by merging the flanking members.
    ///
    /// A gap between two conflict intervals is a safe maneuver corridor; one
    /// narrower than the tolerance cannot be flown reliably and is absorbed
    /// into the surrounding conflict region.
    pub fn sweep_single(&mut self, tol: f64) {
        if self.intervals.len() < 2 || tol <= 0.0 {
            return;
        }
        let mut result: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for &member in &self.intervals {
            match result.last_mut() {
                Some(last) if member.low - last.up < tol => {
                    last.up = last.up.max(member.up);
                }
                _ => result.push(member),
            }
        }
        self.intervals = result;
    }

    /// Drop members narrower than `tol`.
    ///
    /// The dual of `sweep_single`: a conflict sliver shorter than the
    /// tolerance is detection noise, not an actionable band.
    pub fn sweep_breaks(&mut self, tol: f64) {
        if tol <= 0.0 {
            return;
        }
        self.intervals.retain(|iv| iv.width() >= tol);
    }

    /// Coalesce across the wraparound of a circular dimension: when the
    /// first member starts within `tol` of 0 and the last ends within `tol`
    /// of `modulus`, both are extended to the boundary so the pair reads as
    /// one region spanning it.
    pub fn sweep_rollover(&mut self, modulus: f64, tol: f64) {
        let n = self.intervals.len();
        if n == 0 {
            return;
        }
        if self.intervals[0].low <= tol && modulus - self.intervals[n - 1].up <= tol {
            self.intervals[0].low = 0.0;
            self.intervals[n - 1].up = modulus;
        }
    }

    /// Check the structural invariant. Test support.
    #[cfg(test)]
    fn is_normalized(&self) -> bool {
        self.intervals.windows(2).all(|w| w[0].up < w[1].low)
            && self.intervals.iter().all(|iv| !iv.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(pairs: &[(f64, f64)]) -> IntervalSet {
        let mut set = IntervalSet::new();
        for &(low, up) in pairs {
            set.union(Interval::new(low, up));
        }
        set
    }

    #[test]
    fn test_empty_interval_sentinel() {
        assert!(Interval::EMPTY.is_empty());
        assert!(!Interval::EMPTY.contains(0.0));
        assert_eq!(Interval::EMPTY.width(), 0.0);
    }

    #[test]
    fn test_union_merges_overlaps() {
        let set = set_of(&[(0.0, 2.0), (5.0, 7.0), (1.0, 6.0)]);
        assert_eq!(set.intervals(), &[Interval::new(0.0, 7.0)]);
        assert!(set.is_normalized());
    }

    #[test]
    fn test_union_keeps_disjoint_sorted() {
        let set = set_of(&[(5.0, 7.0), (0.0, 1.0), (10.0, 12.0)]);
        assert_eq!(
            set.intervals(),
            &[
                Interval::new(0.0, 1.0),
                Interval::new(5.0, 7.0),
                Interval::new(10.0, 12.0)
            ]
        );
        assert!(set.is_normalized());
    }

    #[test]
    fn test_union_merges_touching() {
        let set = set_of(&[(0.0, 2.0), (2.0, 4.0)]);
        assert_eq!(set.intervals(), &[Interval::new(0.0, 4.0)]);
    }

    #[test]
    fn test_diff_splits_straddled_member() {
        let mut set = set_of(&[(0.0, 10.0)]);
        set.diff(Interval::new(4.0, 6.0));
        assert_eq!(
            set.intervals(),
            &[Interval::new(0.0, 4.0), Interval::new(6.0, 10.0)]
        );
        assert!(set.is_normalized());
    }

    #[test]
    fn test_diff_removes_covered_members() {
        let mut set = set_of(&[(1.0, 2.0), (3.0, 4.0), (8.0, 9.0)]);
        set.diff(Interval::new(0.0, 5.0));
        assert_eq!(set.intervals(), &[Interval::new(8.0, 9.0)]);
    }

    #[test]
    fn test_contains() {
        let set = set_of(&[(0.0, 1.0), (3.0, 4.0)]);
        assert!(set.contains(0.5));
        assert!(set.contains(3.0));
        assert!(!set.contains(2.0));
    }

    #[test]
    fn sweep_single_closes_narrow_gaps() {
        let mut set = set_of(&[(0.0, 1.0), (1.05, 2.0), (5.0, 6.0)]);
        set.sweep_single(0.1);
        assert_eq!(
            set.intervals(),
            &[Interval::new(0.0, 2.0), Interval::new(5.0, 6.0)]
        );
        assert!(set.is_normalized());
    }

    #[test]
    fn sweep_breaks_drops_slivers() {
        let mut set = set_of(&[(0.0, 0.05), (1.0, 3.0)]);
        set.sweep_breaks(0.1);
        assert_eq!(set.intervals(), &[Interval::new(1.0, 3.0)]);
    }

    #[test]
    fn sweep_rollover_coalesces_across_boundary() {
        let modulus = std::f64::consts::TAU;
        let mut set = set_of(&[(0.01, 1.0), (5.0, modulus - 0.01)]);
        set.sweep_rollover(modulus, 0.1);
        assert_eq!(set.intervals()[0].low, 0.0);
        assert_eq!(set.intervals()[1].up, modulus);
    }

    #[test]
    fn sweep_rollover_leaves_interior_sets_alone() {
        let modulus = std::f64::consts::TAU;
        let mut set = set_of(&[(1.0, 2.0)]);
        set.sweep_rollover(modulus, 0.1);
        assert_eq!(set.intervals(), &[Interval::new(1.0, 2.0)]);
    }

    #[test]
    fn test_complement_covers_remainder() {
        let set = set_of(&[(2.0, 3.0), (5.0, 6.0)]);
        let complement = set.complement(0.0, 10.0);
        assert_eq!(
            complement.intervals(),
            &[
                Interval::new(0.0, 2.0),
                Interval::new(3.0, 5.0),
                Interval::new(6.0, 10.0)
            ]
        );
    }

    #[test]
    fn invariant_survives_mixed_operations() {
        let mut set = IntervalSet::new();
        let ops: &[(f64, f64, bool)] = &[
            (0.0, 5.0, true),
            (2.0, 3.0, false),
            (4.0, 9.0, true),
            (1.0, 1.5, true),
            (6.0, 7.0, false),
            (-3.0, 0.5, true),
        ];
        for &(low, up, add) in ops {
            if add {
                set.union(Interval::new(low, up));
            } else {
                set.diff(Interval::new(low, up));
            }
            assert!(set.is_normalized(), "broken after ({low}, {up}, {add})");
        }
        set.sweep_single(0.6);
        assert!(set.is_normalized());
        set.sweep_breaks(0.2);
        assert!(set.is_normalized());
    }
}
