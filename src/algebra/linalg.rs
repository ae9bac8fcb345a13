//! Rank computation over GF(4)^12.
//!
//! Provides two ways to measure the rank of a set of packed vectors:
//!
//! - [`reference_rank`]: full Gaussian elimination from scratch.
//! - [`RankTracker`]: a sliding window of recently seen vectors with an
//!   incremental reduced row-echelon basis and a periodic exact rebuild.
//!
//! # Staleness
//!
//! Incremental insertion can only raise the rank. When a vector that
//! contributed a pivot slides out of the window, the basis still spans it,
//! so the reported rank may be too high. Every `rebuild_interval`-th
//! insertion the basis is rebuilt from the window contents, which bounds that
//! drift. Both paths are kept: the fast path gives the per-query anomaly
//! signal and the rebuild keeps it honest.

use std::collections::VecDeque;

use super::packed::{DIM, Gf4Vec};
use tracing::trace;

// ============================================================================
// Reference elimination
// ============================================================================

/// Rank of the span of `vectors`, by Gaussian elimination with
/// first-nonzero pivot selection.
#[must_use]
pub fn reference_rank(vectors: &[Gf4Vec]) -> usize {
    let mut rows: Vec<Gf4Vec> = vectors.iter().copied().filter(|v| !v.is_zero()).collect();
    let mut rank = 0;
    for col in 0..DIM {
        let Some(pivot) = select_pivot(&rows, rank, col) else {
            continue;
        };
        rows.swap(rank, pivot);
        let pivot_row = rows[rank].scale(rows[rank].get(col).inv());
        rows[rank] = pivot_row;
        for row in rows.iter_mut().skip(rank + 1) {
            let factor = row.get(col);
            if !factor.is_zero() {
                *row = row.scale_add(pivot_row, factor);
            }
        }
        rank += 1;
        if rank == rows.len() {
            break;
        }
    }
    rank
}

/// First row at or after `start` with a nonzero entry in column `col`.
#[inline]
#[must_use]
pub fn select_pivot(rows: &[Gf4Vec], start: usize, col: usize) -> Option<usize> {
    rows.iter()
        .skip(start)
        .position(|r| !r.get(col).is_zero())
        .map(|i| start + i)
}

// ============================================================================
// Incremental tracker
// ============================================================================

/// Counters describing tracker activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankStats {
    /// Vectors inserted into the window.
    pub insertions: u64,
    /// Vectors skipped because they were already in the window.
    pub duplicates: u64,
    /// Vectors evicted from the window.
    pub evictions: u64,
    /// Full rebuilds performed.
    pub rebuilds: u64,
}

/// Sliding-window rank estimator.
///
/// Holds the last `capacity` distinct vectors and a basis kept in reduced
/// row-echelon form: `basis[c]` is either empty or a row whose entry at
/// column `c` is one and whose entries at every other pivot column are zero.
#[derive(Debug, Clone)]
pub struct RankTracker {
    window: VecDeque<Gf4Vec>,
    capacity: usize,
    basis: [Option<Gf4Vec>; DIM],
    rank: usize,
    since_rebuild: usize,
    rebuild_interval: usize,
    stats: RankStats,
}

impl RankTracker {
    /// Creates a tracker over the last `capacity` distinct vectors that
    /// rebuilds every `rebuild_interval` insertions.
    ///
    /// # Panics
    ///
    /// Panics if either argument is zero.
    #[must_use]
    pub fn new(capacity: usize, rebuild_interval: usize) -> Self {
        assert!(capacity > 0, "rank window must be non-empty");
        assert!(rebuild_interval > 0, "rebuild interval must be non-zero");
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            basis: [None; DIM],
            rank: 0,
            since_rebuild: 0,
            rebuild_interval,
            stats: RankStats::default(),
        }
    }

    /// Current rank estimate.
    #[inline]
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Number of vectors in the window.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns true if nothing has been inserted.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Window capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Vectors currently in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = Gf4Vec> + '_ {
        self.window.iter().copied()
    }

    /// Returns the activity counters.
    #[must_use]
    pub const fn stats(&self) -> &RankStats {
        &self.stats
    }

    /// Inserts `v` and returns the updated rank.
    pub fn add(&mut self, v: Gf4Vec) -> usize {
        if self.window.contains(&v) {
            self.stats.duplicates += 1;
            return self.rank;
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
            self.stats.evictions += 1;
        }
        self.window.push_back(v);
        self.stats.insertions += 1;
        self.insert_into_basis(v);

        self.since_rebuild += 1;
        if self.since_rebuild >= self.rebuild_interval {
            self.rebuild();
        }
        self.rank
    }

    /// Recomputes the basis from the window contents.
    pub fn rebuild(&mut self) {
        let before = self.rank;
        self.basis = [None; DIM];
        self.rank = 0;
        self.since_rebuild = 0;
        self.stats.rebuilds += 1;
        for i in 0..self.window.len() {
            let v = self.window[i];
            self.insert_into_basis(v);
        }
        trace!(before, after = self.rank, window = self.window.len(), "rank basis rebuilt");
    }

    /// Reduces `v` against the basis.
    #[must_use]
    pub fn reduce(&self, mut v: Gf4Vec) -> Gf4Vec {
        for (col, row) in self.basis.iter().enumerate() {
            let Some(row) = row else { continue };
            let factor = v.get(col);
            if !factor.is_zero() {
                v = v.scale_add(*row, factor);
            }
        }
        v
    }

    fn insert_into_basis(&mut self, v: Gf4Vec) {
        let residual = self.reduce(v);
        let Some(pivot_col) = residual.first_nonzero() else {
            return;
        };
        let pivot_row = residual.scale(residual.get(pivot_col).inv());
        for row in self.basis.iter_mut().flatten() {
            let factor = row.get(pivot_col);
            if !factor.is_zero() {
                *row = row.scale_add(pivot_row, factor);
            }
        }
        self.basis[pivot_col] = Some(pivot_row);
        self.rank += 1;
    }

    /// Pivot row for column `col`, if one is installed.
    #[must_use]
    pub fn pivot_row(&self, col: usize) -> Option<Gf4Vec> {
        self.basis[col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Gf4;
    use crate::util::DetRng;

    fn random_vec(rng: &mut DetRng) -> Gf4Vec {
        Gf4Vec::from_raw(rng.next_u32())
    }

    #[test]
    fn reference_rank_of_units() {
        let units: Vec<Gf4Vec> = (0..DIM).map(|i| Gf4Vec::unit(i, Gf4::ONE)).collect();
        assert_eq!(reference_rank(&units), DIM);
        assert_eq!(reference_rank(&units[..5]), 5);
        assert_eq!(reference_rank(&[]), 0);
        assert_eq!(reference_rank(&[Gf4Vec::ZERO, Gf4Vec::ZERO]), 0);
    }

    #[test]
    fn reference_rank_sees_dependence() {
        let a = Gf4Vec::from_symbols([1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let b = Gf4Vec::from_symbols([0, 1, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0]);
        let c = a.scale(Gf4::ALPHA) + b.scale(Gf4::ALPHA_SQ);
        assert_eq!(reference_rank(&[a, b, c]), 2);
        assert_eq!(reference_rank(&[a, a.scale(Gf4::ALPHA)]), 1);
    }

    #[test]
    fn tracker_counts_independent_vectors() {
        let mut t = RankTracker::new(64, 8);
        assert_eq!(t.add(Gf4Vec::unit(0, Gf4::ONE)), 1);
        assert_eq!(t.add(Gf4Vec::unit(1, Gf4::ALPHA)), 2);
        let sum = Gf4Vec::unit(0, Gf4::ONE) + Gf4Vec::unit(1, Gf4::ALPHA);
        assert_eq!(t.add(sum), 2, "dependent vector must not raise rank");
        assert_eq!(t.add(Gf4Vec::ZERO), 2);
    }

    #[test]
    fn tracker_skips_duplicates() {
        let mut t = RankTracker::new(4, 8);
        let v = Gf4Vec::unit(3, Gf4::ONE);
        t.add(v);
        t.add(v);
        t.add(v);
        assert_eq!(t.len(), 1);
        assert_eq!(t.stats().duplicates, 2);
        assert_eq!(t.rank(), 1);
    }

    #[test]
    fn basis_stays_reduced() {
        let mut rng = DetRng::new(7);
        let mut t = RankTracker::new(64, 64);
        for _ in 0..20 {
            t.add(random_vec(&mut rng));
            for col in 0..DIM {
                if let Some(row) = t.pivot_row(col) {
                    assert_eq!(row.get(col), Gf4::ONE);
                    for other in 0..DIM {
                        if other != col && t.pivot_row(other).is_some() {
                            assert!(row.get(other).is_zero(), "pivot {col} leaks into {other}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn incremental_matches_reference_without_eviction() {
        let mut rng = DetRng::new(0xDEAD_BEEF);
        for trial in 0..50 {
            let mut t = RankTracker::new(64, 8);
            let len = 1 + rng.next_usize(64);
            for _ in 0..len {
                // Low-dimensional vectors so dependence actually occurs.
                let v = Gf4Vec::from_raw(rng.next_u32() & 0x3F);
                let rank = t.add(v);
                let window: Vec<Gf4Vec> = t.window().collect();
                assert_eq!(rank, reference_rank(&window), "trial {trial}");
            }
        }
    }

    #[test]
    fn rebuild_drops_evicted_pivots() {
        let mut t = RankTracker::new(2, 100);
        t.add(Gf4Vec::unit(0, Gf4::ONE));
        t.add(Gf4Vec::unit(1, Gf4::ONE));
        t.add(Gf4Vec::unit(1, Gf4::ALPHA));
        // e0 was evicted but the fast path cannot forget it.
        assert_eq!(t.rank(), 2);
        assert_eq!(t.stats().evictions, 1);
        t.rebuild();
        assert_eq!(t.rank(), 1);
    }

    #[test]
    fn periodic_rebuild_bounds_staleness() {
        let mut t = RankTracker::new(3, 2);
        for i in 0..DIM {
            t.add(Gf4Vec::unit(i, Gf4::ONE));
        }
        // Rebuilds at every second insertion keep rank within the window size.
        assert!(t.rank() <= 3 + 1);
        t.rebuild();
        let window: Vec<Gf4Vec> = t.window().collect();
        assert_eq!(t.rank(), reference_rank(&window));
        assert!(t.stats().rebuilds >= 6);
    }

    /// Span membership checked directly against pivot rows, independent of
    /// `RankTracker::reduce`.
    fn in_span(basis: &[Option<Gf4Vec>; DIM], v: Gf4Vec) -> bool {
        let mut r = v;
        for (col, row) in basis.iter().enumerate() {
            if let Some(row) = row {
                let factor: Gf4 = r.get(col);
                if !factor.is_zero() {
                    r = r.scale_add(*row, factor);
                }
            }
        }
        r.is_zero()
    }

    #[test]
    fn in_span_agrees_with_reduce() {
        let mut t = RankTracker::new(8, 8);
        let a = Gf4Vec::unit(2, Gf4::ALPHA);
        let b = Gf4Vec::unit(9, Gf4::ONE).with(2, Gf4::ONE);
        t.add(a);
        t.add(b);
        let basis: [Option<Gf4Vec>; DIM] = std::array::from_fn(|c| t.pivot_row(c));
        assert!(in_span(&basis, a + b.scale(Gf4::ALPHA_SQ)));
        assert!(!in_span(&basis, Gf4Vec::unit(0, Gf4::ONE)));
        assert!(t.reduce(a + b).is_zero());
    }
}
