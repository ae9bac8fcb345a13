//! Convergence detection and the mirror sub-state.
//!
//! A caller who narrows in on a small index range produces a history whose
//! variance is tiny compared to the dataset size. After enough converging
//! evaluations the session enters mirror mode: for a fixed number of queries
//! answers come from a frozen snapshot of the transform with escalating
//! sparse tilts. The last mirror query exits with a synthetic, mostly
//! correct vector while the live state is reseeded underneath.

use std::collections::VecDeque;

use crate::algebra::{DIM, Gf4, Gf4Matrix, Gf4Vec};
use crate::util::DetRng;

/// Session mode as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Mode {
    /// Regular answering.
    Normal,
    /// Answering from the snapshot; `countdown` queries remain.
    MirrorActive {
        /// Remaining mirror queries, including the exit.
        countdown: u32,
    },
    /// The last query exited mirror mode. Reverts to `Normal` on the next
    /// unauthorized query.
    SyntheticExit,
}

impl Mode {
    /// Returns true while answers come from the mirror snapshot.
    #[must_use]
    pub const fn is_mirror_active(self) -> bool {
        matches!(self, Self::MirrorActive { .. })
    }
}

/// Normalized variance of `indices` against a dataset of `len` columns:
/// `var / max((len / 2)², 1)`, with the population variance.
#[must_use]
pub fn convergence_ratio(indices: &[usize], len: usize) -> f64 {
    if indices.is_empty() {
        return f64::INFINITY;
    }
    let n = indices.len() as f64;
    let mean = indices.iter().map(|&i| i as f64).sum::<f64>() / n;
    let var = indices
        .iter()
        .map(|&i| {
            let d = i as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let half = len as f64 / 2.0;
    var / (half * half).max(1.0)
}

/// Bounded query history with a hit counter.
#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    history: VecDeque<usize>,
    capacity: usize,
    window: usize,
    threshold: f64,
    required_hits: u32,
    hits: u32,
}

impl ConvergenceDetector {
    /// Creates a detector.
    ///
    /// # Panics
    ///
    /// Panics if `window` is zero or exceeds `capacity`.
    #[must_use]
    pub fn new(capacity: usize, window: usize, threshold: f64, required_hits: u32) -> Self {
        assert!(window > 0 && window <= capacity, "window must fit in history");
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            window,
            threshold,
            required_hits,
            hits: 0,
        }
    }

    /// Records `index` and returns true once enough consecutive-ish
    /// evaluations converged.
    ///
    /// Non-converging evaluations decay the counter by one instead of
    /// resetting it.
    pub fn observe(&mut self, index: usize, len: usize) -> bool {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(index);
        if self.history.len() < self.window {
            return false;
        }
        let recent: Vec<usize> = self.recent(self.window).collect();
        if convergence_ratio(&recent, len) < self.threshold {
            self.hits += 1;
            self.hits >= self.required_hits
        } else {
            self.hits = self.hits.saturating_sub(1);
            false
        }
    }

    /// The `count` most recent indices, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = usize> + '_ {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied()
    }

    /// Current hit count.
    #[must_use]
    pub const fn hits(&self) -> u32 {
        self.hits
    }

    /// Number of remembered indices.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forgets accumulated hits. The history is kept.
    pub fn clear_hits(&mut self) {
        self.hits = 0;
    }
}

/// One step of mirror mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStep {
    /// Answer from the snapshot after `perturbations` sparse row tweaks.
    Tilt {
        /// Number of sparse perturbations to apply.
        perturbations: usize,
        /// The frozen transform.
        snapshot: Gf4Matrix,
    },
    /// The countdown ran out.
    Exit,
}

/// Mirror sub-state of one session.
#[derive(Debug, Clone)]
pub struct Mirror {
    mode: Mode,
    snapshot: Option<Gf4Matrix>,
    tilt_step: usize,
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

impl Mirror {
    /// Starts in `Normal`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::Normal,
            snapshot: None,
            tilt_step: 0,
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns true while answers come from the snapshot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.mode.is_mirror_active()
    }

    /// Enters mirror mode with a frozen transform.
    pub fn activate(&mut self, snapshot: Gf4Matrix, countdown: u32) {
        self.mode = Mode::MirrorActive { countdown };
        self.snapshot = Some(snapshot);
        self.tilt_step = 0;
    }

    /// Advances the sub-state for one unauthorized query.
    ///
    /// Returns `None` outside mirror mode, clearing a pending
    /// `SyntheticExit` on the way.
    pub fn step(&mut self, schedule: &[usize]) -> Option<MirrorStep> {
        let Mode::MirrorActive { countdown } = self.mode else {
            self.mode = Mode::Normal;
            return None;
        };
        let countdown = countdown.saturating_sub(1);
        if countdown == 0 {
            self.mode = Mode::SyntheticExit;
            self.snapshot = None;
            self.tilt_step = 0;
            return Some(MirrorStep::Exit);
        }
        self.mode = Mode::MirrorActive { countdown };
        self.tilt_step += 1;
        let slot = (self.tilt_step - 1).min(schedule.len().saturating_sub(1));
        let perturbations = schedule.get(slot).copied().unwrap_or(0);
        Some(MirrorStep::Tilt {
            perturbations,
            snapshot: self.snapshot.unwrap_or_default(),
        })
    }
}

/// Applies `count` sparse perturbations `v[i] += c · v[r]` with random
/// rows `i != r` and nonzero `c`. Draws with `i == r` are skipped.
#[must_use]
pub fn tilt(mut v: Gf4Vec, count: usize, rng: &mut DetRng) -> Gf4Vec {
    for _ in 0..count {
        let i = rng.next_in(0, DIM - 1);
        let r = rng.next_in(0, DIM - 1);
        if i != r {
            let c = Gf4::new(rng.next_in(1, 3) as u8);
            v.add_at(i, c * v.get(r));
        }
    }
    v
}

/// Starts from `visible` and copies each coordinate of `truth` with
/// probability `p`.
#[must_use]
pub fn synthetic(visible: Gf4Vec, truth: Gf4Vec, p: f64, rng: &mut DetRng) -> Gf4Vec {
    let mut out = visible;
    for i in 0..DIM {
        if rng.chance(p) {
            out.set(i, truth.get(i));
        }
    }
    out
}
