//! Deferred linear transform over GF(4)^12.
//!
//! The transform is a dense base matrix plus a write-ahead log of elementary
//! row operations. Appending is O(1) amortized: the op is logged and
//! the base is only rewritten when the log reaches the flatten threshold.
//! [`DeferredTransform::apply`] replays the pending log onto a stack copy of
//! the base, so every answer reflects every appended op.
//!
//! # Invariant
//!
//! `apply(v)` equals replaying all ops ever appended, in order, onto the
//! identity and multiplying. Flattening changes cost, never results.

use crate::algebra::{DIM, Gf4, Gf4Matrix, Gf4Vec};
use crate::config::MAX_FLATTEN_THRESHOLD;
use crate::util::{ChainDigest, DetRng};
use tracing::trace;

/// One elementary row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOp {
    /// Row that is rewritten.
    pub target: usize,
    /// Row that is read.
    pub source: usize,
    /// Nonzero multiplier.
    pub scalar: Gf4,
    /// Apply Frobenius to the source row first.
    pub frobenius: bool,
}

impl RowOp {
    /// Creates an op. Target and source must be distinct rows below 12.
    #[must_use]
    pub fn new(target: usize, source: usize, scalar: Gf4, frobenius: bool) -> Self {
        debug_assert!(target < DIM && source < DIM && target != source);
        Self {
            target,
            source,
            scalar,
            frobenius,
        }
    }

    /// The same op with target and source exchanged.
    #[must_use]
    pub const fn transposed(self) -> Self {
        Self {
            target: self.source,
            source: self.target,
            ..self
        }
    }

    /// Applies the op to a dense matrix.
    #[inline]
    pub fn apply_to(&self, matrix: &mut Gf4Matrix) {
        matrix.row_op(self.target, self.source, self.scalar, self.frobenius);
    }
}

/// How aggressively a batch rewrites the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Intensity {
    /// 2–3 ops.
    Minor,
    /// 6–8 ops.
    Major,
    /// 8–10 ops, all reading the Frobenius image of their source.
    Frobenius,
}

impl Intensity {
    /// Inclusive op-count range.
    #[must_use]
    pub const fn op_range(self) -> (usize, usize) {
        match self {
            Self::Minor => (2, 3),
            Self::Major => (6, 8),
            Self::Frobenius => (8, 10),
        }
    }
}

/// An ordered batch of row ops derived from one digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOpBatch {
    intensity: Intensity,
    ops: Vec<RowOp>,
}

impl RowOpBatch {
    /// Derives a batch from a 32-byte digest.
    ///
    /// The first 16 bytes seed the generator. Identical digests yield
    /// identical batches.
    #[must_use]
    pub fn generate(digest: &ChainDigest, intensity: Intensity) -> Self {
        let mut rng = DetRng::from_seed_bytes(digest);
        let (lo, hi) = intensity.op_range();
        let count = rng.next_in(lo, hi);
        let frobenius = intensity == Intensity::Frobenius;
        let ops = (0..count)
            .map(|_| {
                let (target, source) = rng.next_distinct_pair(DIM);
                let scalar = Gf4::new(rng.next_in(1, 3) as u8);
                RowOp::new(target, source, scalar, frobenius)
            })
            .collect();
        Self { intensity, ops }
    }

    /// Swaps target and source in every op.
    #[must_use]
    pub fn transposed(&self) -> Self {
        Self {
            intensity: self.intensity,
            ops: self.ops.iter().map(|op| op.transposed()).collect(),
        }
    }

    /// Batch intensity.
    #[must_use]
    pub const fn intensity(&self) -> Intensity {
        self.intensity
    }

    /// The ops in application order.
    #[must_use]
    pub fn ops(&self) -> &[RowOp] {
        &self.ops
    }

    /// Number of ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no ops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Dense base matrix plus a bounded log of pending row ops.
#[derive(Debug, Clone)]
pub struct DeferredTransform {
    base: Gf4Matrix,
    pending: Vec<RowOp>,
    flatten_threshold: usize,
    appended: u64,
    flattens: u64,
}

impl DeferredTransform {
    /// Creates an identity transform that flattens every
    /// `flatten_threshold` ops.
    ///
    /// # Panics
    ///
    /// Panics if the threshold is outside `1..=32`.
    #[must_use]
    pub fn new(flatten_threshold: usize) -> Self {
        assert!(
            (1..=MAX_FLATTEN_THRESHOLD).contains(&flatten_threshold),
            "flatten threshold {flatten_threshold} outside 1..={MAX_FLATTEN_THRESHOLD}"
        );
        Self {
            base: Gf4Matrix::identity(),
            pending: Vec::with_capacity(flatten_threshold),
            flatten_threshold,
            appended: 0,
            flattens: 0,
        }
    }

    /// Logs one op, flattening if the log is full.
    pub fn append(&mut self, op: RowOp) {
        self.pending.push(op);
        self.appended += 1;
        if self.pending.len() >= self.flatten_threshold {
            self.flatten();
        }
    }

    /// Logs every op of a batch in order.
    pub fn extend(&mut self, batch: &RowOpBatch) {
        for &op in batch.ops() {
            self.append(op);
        }
    }

    /// Replays the pending log into the base and clears it.
    pub fn flatten(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        for op in &self.pending {
            op.apply_to(&mut self.base);
        }
        let replayed = self.pending.len();
        self.pending.clear();
        self.flattens += 1;
        trace!(replayed, flattens = self.flattens, "transform flattened");
    }

    /// `T · v`, including every pending op.
    #[must_use]
    pub fn apply(&self, v: Gf4Vec) -> Gf4Vec {
        if self.pending.is_empty() {
            return self.base.mul_vec(v);
        }
        self.snapshot().mul_vec(v)
    }

    /// Dense copy of the full transform.
    #[must_use]
    pub fn snapshot(&self) -> Gf4Matrix {
        let mut m = self.base;
        for op in &self.pending {
            op.apply_to(&mut m);
        }
        m
    }

    /// Ops waiting in the log.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total ops appended since creation.
    #[must_use]
    pub const fn appended(&self) -> u64 {
        self.appended
    }

    /// Number of compactions performed.
    #[must_use]
    pub const fn flattens(&self) -> u64 {
        self.flattens
    }

    /// The configured flatten threshold.
    #[must_use]
    pub const fn flatten_threshold(&self) -> usize {
        self.flatten_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::digest_parts;

    fn replay(ops: &[RowOp]) -> Gf4Matrix {
        let mut m = Gf4Matrix::identity();
        for op in ops {
            op.apply_to(&mut m);
        }
        m
    }

    #[test]
    fn batch_sizes_follow_intensity() {
        for i in 0u32..50 {
            let digest = digest_parts(&[b"batch", &i.to_be_bytes()]);
            for intensity in [Intensity::Minor, Intensity::Major, Intensity::Frobenius] {
                let batch = RowOpBatch::generate(&digest, intensity);
                let (lo, hi) = intensity.op_range();
                assert!((lo..=hi).contains(&batch.len()), "{intensity:?}: {}", batch.len());
                for op in batch.ops() {
                    assert_ne!(op.target, op.source);
                    assert!(op.target < DIM && op.source < DIM);
                    assert!(!op.scalar.is_zero());
                    assert_eq!(op.frobenius, intensity == Intensity::Frobenius);
                }
            }
        }
    }

    #[test]
    fn batch_is_deterministic() {
        let digest = digest_parts(&[b"same"]);
        assert_eq!(
            RowOpBatch::generate(&digest, Intensity::Major),
            RowOpBatch::generate(&digest, Intensity::Major)
        );
    }

    #[test]
    fn transposed_swaps_rows() {
        let batch = RowOpBatch::generate(&digest_parts(&[b"t"]), Intensity::Minor);
        let t = batch.transposed();
        for (a, b) in batch.ops().iter().zip(t.ops()) {
            assert_eq!((a.target, a.source), (b.source, b.target));
            assert_eq!(a.scalar, b.scalar);
        }
        assert_eq!(t.transposed(), batch);
    }

    #[test]
    fn apply_matches_dense_replay_across_flattens() {
        let mut t = DeferredTransform::new(5);
        let mut all = Vec::new();
        let v = Gf4Vec::from_symbols([1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 1]);
        for i in 0u32..20 {
            let batch = RowOpBatch::generate(&digest_parts(&[&i.to_be_bytes()]), Intensity::Major);
            t.extend(&batch);
            all.extend_from_slice(batch.ops());
            assert!(t.pending_len() < 5);
            assert_eq!(t.apply(v), replay(&all).mul_vec(v));
            assert_eq!(t.snapshot(), replay(&all));
        }
        assert!(t.flattens() > 0);
        assert_eq!(t.appended(), all.len() as u64);
    }

    #[test]
    fn flatten_is_invisible() {
        let mut t = DeferredTransform::new(32);
        t.extend(&RowOpBatch::generate(&digest_parts(&[b"f"]), Intensity::Frobenius));
        let before = t.snapshot();
        assert!(t.pending_len() > 0);
        t.flatten();
        assert_eq!(t.pending_len(), 0);
        assert_eq!(t.snapshot(), before);
    }

    #[test]
    #[should_panic(expected = "flatten threshold")]
    fn oversized_threshold_rejected() {
        let _ = DeferredTransform::new(33);
    }
}
