//! Timer-driven transform drift.
//!
//! Wind fires on query counts, not on query content. Marks are spaced by a
//! small set of bases derived from the shared root digest, divided by a
//! generator draw, so two sessions with different salts drift on different
//! schedules even though they share the bases.

use super::transform::{DeferredTransform, Intensity, RowOpBatch};
use crate::util::{ChainDigest, DetRng, StateChain, digest_parts};
use tracing::trace;

/// Number of wind bases.
pub const WIND_BASES: usize = 6;

/// Minimum gap between two wind marks.
pub const MIN_WIND_GAP: u64 = 5;

/// Every this many wind events, an extra minor batch follows.
pub const FOLLOW_UP_EVERY: u64 = 3;

const MODULI: [(u128, u64); WIND_BASES] = [(97, 7), (89, 11), (83, 13), (79, 17), (73, 19), (71, 23)];

/// The shared wind bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindSchedule {
    bases: [u64; WIND_BASES],
}

impl WindSchedule {
    /// Derives the bases from a root digest: with `v` the first 16 bytes
    /// read big-endian, base `k` is `v mod p_k + c_k`.
    #[must_use]
    pub fn from_root(root: &ChainDigest) -> Self {
        let mut head = [0u8; 16];
        head.copy_from_slice(&root[..16]);
        let v = u128::from_be_bytes(head);
        Self {
            bases: MODULI.map(|(p, c)| (v % p) as u64 + c),
        }
    }

    /// All bases.
    #[must_use]
    pub const fn bases(&self) -> &[u64; WIND_BASES] {
        &self.bases
    }

    /// First wind mark of a fresh session.
    #[must_use]
    pub const fn first_mark(&self) -> u64 {
        self.bases[0]
    }
}

/// What one wind event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindEvent {
    /// Intensity of the main batch.
    pub intensity: Intensity,
    /// The main batch was appended transposed.
    pub transposed: bool,
    /// An extra minor batch followed.
    pub follow_up: bool,
    /// Query count of the next mark.
    pub next_mark: u64,
}

/// Per-session wind position.
#[derive(Debug, Clone)]
pub struct WindState {
    schedule: WindSchedule,
    base_index: usize,
    next_mark: u64,
    fired: u64,
}

impl WindState {
    /// Starts at the schedule's first mark.
    #[must_use]
    pub const fn new(schedule: WindSchedule) -> Self {
        Self {
            schedule,
            base_index: 0,
            next_mark: schedule.first_mark(),
            fired: 0,
        }
    }

    /// Query count at which wind next fires.
    #[must_use]
    pub const fn next_mark(&self) -> u64 {
        self.next_mark
    }

    /// Number of wind events so far.
    #[must_use]
    pub const fn fired(&self) -> u64 {
        self.fired
    }

    /// Fires if `query_count` has reached the mark.
    ///
    /// The main batch comes from `chain.derive("wind")` and is `Major` when
    /// a draw mod 8 is at least 5. It is appended as-is on even counts and
    /// transposed on odd ones.
    pub fn tick(
        &mut self,
        query_count: u64,
        chain: &StateChain,
        rng: &mut DetRng,
        transform: &mut DeferredTransform,
    ) -> Option<WindEvent> {
        if query_count < self.next_mark {
            return None;
        }
        let digest = chain.derive(b"wind");
        let intensity = if rng.next_u64() % 8 >= 5 {
            Intensity::Major
        } else {
            Intensity::Minor
        };
        let batch = RowOpBatch::generate(&digest, intensity);
        let transposed = query_count % 2 == 1;
        if transposed {
            transform.extend(&batch.transposed());
        } else {
            transform.extend(&batch);
        }

        self.fired += 1;
        let follow_up = self.fired % FOLLOW_UP_EVERY == 0;
        if follow_up {
            let follow = digest_parts(&[&digest, b"wind-follow"]);
            transform.extend(&RowOpBatch::generate(&follow, Intensity::Minor));
        }

        self.base_index = (self.base_index + 1) % WIND_BASES;
        let divisor = rng.next_u64() % 5 + 1;
        self.next_mark = query_count + (self.schedule.bases[self.base_index] / divisor).max(MIN_WIND_GAP);

        trace!(
            query_count,
            ?intensity,
            transposed,
            follow_up,
            next_mark = self.next_mark,
            "wind"
        );
        Some(WindEvent {
            intensity,
            transposed,
            follow_up,
            next_mark: self.next_mark,
        })
    }
}
