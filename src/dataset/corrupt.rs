//! Declared corruption passes that turn true vectors into visible ones.
//!
//! A [`CorruptionPipeline`] is an ordered list of named passes. The pipeline
//! owns one root [`DetRng`]; every pass receives its own child generator
//! split from that root in declaration order. A pass therefore sees the same
//! stream for a given seed and position, whatever the passes around it do
//! with their own streams.
//!
//! Passes only ever rewrite `visible`. Truth and column kinds are fixed.
//!
//! The last three standard passes deal with column kinds. [`KindSkew`] and
//! [`DecoyAnchor`] make real and decoy columns distort differently, and
//! [`GapEqualizer`] then pulls the mean distortion of the two kinds back
//! together so that distortion alone does not reveal which is which.

use std::collections::BTreeSet;
use std::fmt;

use super::{Column, ColumnKind, Dataset, GroupIndex};
use crate::algebra::{DIM, Gf4, Gf4Vec};
use crate::util::DetRng;

/// State shared by the passes of one pipeline run.
pub struct PassContext<'a> {
    groups: &'a dyn GroupIndex,
    anchored: BTreeSet<usize>,
}

impl<'a> PassContext<'a> {
    /// Starts a run over the dataset's group structure.
    #[must_use]
    pub fn new(groups: &'a dyn GroupIndex) -> Self {
        Self {
            groups,
            anchored: BTreeSet::new(),
        }
    }

    /// Group membership of the dataset being corrupted.
    #[must_use]
    pub fn groups(&self) -> &'a dyn GroupIndex {
        self.groups
    }

    /// Protects `index` from later balancing passes.
    pub fn anchor(&mut self, index: usize) {
        self.anchored.insert(index);
    }

    /// Returns true if an earlier pass anchored `index`.
    #[must_use]
    pub fn is_anchored(&self, index: usize) -> bool {
        self.anchored.contains(&index)
    }

    /// Every anchored column.
    #[must_use]
    pub fn anchored(&self) -> &BTreeSet<usize> {
        &self.anchored
    }
}

impl fmt::Debug for PassContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassContext")
            .field("groups", &self.groups.group_count())
            .field("anchored", &self.anchored.len())
            .finish()
    }
}

/// One named transformation of the visible vectors.
pub trait CorruptionPass: fmt::Debug + Send + Sync {
    /// Stable name used in logs and audits.
    fn name(&self) -> &'static str;

    /// Rewrites visible vectors in place.
    fn apply(&self, dataset: &mut Dataset, ctx: &mut PassContext<'_>, rng: &mut DetRng);
}

fn random_vector(rng: &mut DetRng) -> Gf4Vec {
    let mut raw = 0u32;
    for i in 0..DIM {
        raw |= u32::from(rng.next_symbol()) << (2 * i);
    }
    Gf4Vec::from_raw(raw)
}

fn nonzero_symbol(rng: &mut DetRng) -> Gf4 {
    Gf4::new(rng.next_in(1, 3) as u8)
}

/// Replaces a fraction of visible vectors with uniform noise.
#[derive(Debug, Clone, Copy)]
pub struct RandomOverwrite {
    /// Per-column probability.
    pub rate: f64,
}

impl Default for RandomOverwrite {
    fn default() -> Self {
        Self { rate: 0.15 }
    }
}

impl CorruptionPass for RandomOverwrite {
    fn name(&self) -> &'static str {
        "random-overwrite"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        for col in dataset.columns_mut() {
            if rng.chance(self.rate) {
                col.visible = random_vector(rng);
            }
        }
    }
}

/// Copies a noisy version of one column's visible vector over another's.
#[derive(Debug, Clone, Copy)]
pub struct CrossContaminate {
    /// Number of copy attempts.
    pub rounds: usize,
}

impl Default for CrossContaminate {
    fn default() -> Self {
        Self { rounds: 800 }
    }
}

impl CorruptionPass for CrossContaminate {
    fn name(&self) -> &'static str {
        "cross-contaminate"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        let cols = dataset.columns_mut();
        if cols.len() < 2 {
            return;
        }
        for _ in 0..self.rounds {
            let (from, to) = rng.next_distinct_pair(cols.len());
            cols[to].visible = cols[from].visible.add(random_vector(rng));
        }
    }
}

/// Swaps visible vectors between random pairs of columns.
#[derive(Debug, Clone, Copy)]
pub struct SwapColumns {
    /// Number of swaps.
    pub rounds: usize,
}

impl Default for SwapColumns {
    fn default() -> Self {
        Self { rounds: 1200 }
    }
}

impl CorruptionPass for SwapColumns {
    fn name(&self) -> &'static str {
        "swap-columns"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        let cols = dataset.columns_mut();
        if cols.len() < 2 {
            return;
        }
        for _ in 0..self.rounds {
            let (a, b) = rng.next_distinct_pair(cols.len());
            let tmp = cols[a].visible;
            cols[a].visible = cols[b].visible;
            cols[b].visible = tmp;
        }
    }
}

/// Adds nonzero noise to the leading coordinates of every column.
#[derive(Debug, Clone, Copy)]
pub struct SymbolNoise {
    /// Per-coordinate probability.
    pub rate: f64,
    /// Number of leading coordinates exposed to noise.
    pub span: usize,
}

impl Default for SymbolNoise {
    fn default() -> Self {
        Self { rate: 0.12, span: 6 }
    }
}

impl CorruptionPass for SymbolNoise {
    fn name(&self) -> &'static str {
        "symbol-noise"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        let span = self.span.min(DIM);
        for col in dataset.columns_mut() {
            for i in 0..span {
                if rng.chance(self.rate) {
                    col.visible.add_at(i, nonzero_symbol(rng));
                }
            }
        }
    }
}

/// Applies the Frobenius map to a few coordinates of some columns.
///
/// Frobenius fixes 0 and 1, so the fog is invisible on those symbols and
/// only swaps α and α².
#[derive(Debug, Clone, Copy)]
pub struct FrobeniusFog {
    /// Per-column probability.
    pub rate: f64,
}

impl Default for FrobeniusFog {
    fn default() -> Self {
        Self { rate: 0.08 }
    }
}

impl CorruptionPass for FrobeniusFog {
    fn name(&self) -> &'static str {
        "frobenius-fog"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        for col in dataset.columns_mut() {
            if !rng.chance(self.rate) {
                continue;
            }
            let mut coords: [usize; DIM] = std::array::from_fn(|i| i);
            rng.shuffle(&mut coords);
            let count = rng.next_in(2, 4);
            for &i in &coords[..count] {
                col.visible.frobenius_at(i);
            }
        }
    }
}

/// Rotates a column's symbols and shifts them by a constant.
#[derive(Debug, Clone, Copy)]
pub struct RotationTrap {
    /// Per-column probability.
    pub rate: f64,
}

impl Default for RotationTrap {
    fn default() -> Self {
        Self { rate: 0.10 }
    }
}

impl RotationTrap {
    /// `out[i] = v[(i + shift) mod 12] + offset`.
    #[must_use]
    pub fn rotate(v: Gf4Vec, shift: usize, offset: Gf4) -> Gf4Vec {
        let old = v.unpack();
        let rotated: [Gf4; DIM] = std::array::from_fn(|i| old[(i + shift) % DIM] + offset);
        Gf4Vec::pack(&rotated)
    }
}

impl CorruptionPass for RotationTrap {
    fn name(&self) -> &'static str {
        "rotation-trap"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        for col in dataset.columns_mut() {
            if rng.chance(self.rate) {
                let shift = rng.next_in(1, DIM - 1);
                let offset = Gf4::new(rng.next_symbol());
                col.visible = Self::rotate(col.visible, shift, offset);
            }
        }
    }
}

/// Pushes every visible vector at least `min` symbols away from its truth.
///
/// Columns already far enough are left alone. Closer columns get a nonzero
/// shift on every coordinate, chosen so no coordinate lands on the true
/// symbol; they end at full distance.
#[derive(Debug, Clone, Copy)]
pub struct MinimumDistance {
    /// Required Hamming distance.
    pub min: usize,
}

impl Default for MinimumDistance {
    fn default() -> Self {
        Self { min: 4 }
    }
}

impl CorruptionPass for MinimumDistance {
    fn name(&self) -> &'static str {
        "minimum-distance"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        for col in dataset.columns_mut() {
            if col.distortion() >= self.min {
                continue;
            }
            for i in 0..DIM {
                let gap = col.truth.get(i) + col.visible.get(i);
                let mut delta = nonzero_symbol(rng);
                if delta == gap {
                    // Any other nonzero value keeps the symbol off the truth.
                    delta = Gf4::new(delta.raw() % 3 + 1);
                }
                col.visible.add_at(i, delta);
            }
        }
    }
}

/// Moves one random coordinate per column in a kind-dependent direction.
///
/// A real column whose chosen coordinate still matches the truth gets it
/// shifted off; a decoy column whose chosen coordinate differs gets it
/// restored. Real columns drift further out, decoys drift back in.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindSkew;

impl CorruptionPass for KindSkew {
    fn name(&self) -> &'static str {
        "kind-skew"
    }

    fn apply(&self, dataset: &mut Dataset, _ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        for col in dataset.columns_mut() {
            let i = rng.next_in(0, DIM - 1);
            let matches = col.visible.get(i) == col.truth.get(i);
            match col.kind {
                ColumnKind::Real if matches => col.visible.add_at(i, nonzero_symbol(rng)),
                ColumnKind::Decoy if !matches => col.visible.set(i, col.truth.get(i)),
                _ => {}
            }
        }
    }
}

/// Pins the points of a few all-decoy groups near a fixed distortion and
/// anchors them so later balancing leaves them alone.
#[derive(Debug, Clone, Copy)]
pub struct DecoyAnchor {
    /// Number of decoy groups to pin.
    pub groups: usize,
    /// Target distortion.
    pub distance: usize,
    /// Coordinate draws allowed per column.
    pub budget: usize,
}

impl Default for DecoyAnchor {
    fn default() -> Self {
        Self {
            groups: 5,
            distance: 8,
            budget: 20,
        }
    }
}

impl CorruptionPass for DecoyAnchor {
    fn name(&self) -> &'static str {
        "decoy-anchor"
    }

    fn apply(&self, dataset: &mut Dataset, ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        let groups = ctx.groups();
        let mut candidates: Vec<usize> = (0..groups.group_count())
            .filter(|&g| {
                let members = groups.members_of(g);
                !members.is_empty()
                    && members.iter().all(|&m| {
                        dataset
                            .column(m)
                            .is_some_and(|c| c.kind == ColumnKind::Decoy)
                    })
            })
            .collect();
        rng.shuffle(&mut candidates);
        candidates.truncate(self.groups);

        let cols = dataset.columns_mut();
        for g in candidates {
            for &m in groups.members_of(g) {
                let Some(col) = cols.get_mut(m) else {
                    continue;
                };
                ctx.anchor(m);
                let mut d = col.distortion();
                let mut budget = self.budget;
                while d > self.distance && budget > 0 {
                    let i = rng.next_in(0, DIM - 1);
                    if col.visible.get(i) != col.truth.get(i) {
                        col.visible.set(i, col.truth.get(i));
                        d -= 1;
                    }
                    budget -= 1;
                }
                while d < self.distance && budget > 0 {
                    let i = rng.next_in(0, DIM - 1);
                    if col.visible.get(i) == col.truth.get(i) {
                        col.visible.add_at(i, nonzero_symbol(rng));
                        d += 1;
                    }
                    budget -= 1;
                }
            }
        }
    }
}

/// Closes the mean-distortion gap between real and decoy columns.
///
/// Each round estimates the gap on a rotating fifth of the columns. If it
/// is still above `target`, every unanchored column on the wrong side of
/// `threshold` is nudged one coordinate towards it with probability
/// `min(max_rate, 10 · gap)`. A final settle step then moves single
/// coordinates until the exact gap over all columns is below `target`,
/// which is always reachable once each kind has more than `1 / (2·target)`
/// columns.
#[derive(Debug, Clone, Copy)]
pub struct GapEqualizer {
    /// Maximum estimate-and-nudge rounds.
    pub rounds: usize,
    /// Gap considered closed.
    pub target: f64,
    /// Distortion the nudges steer towards.
    pub threshold: usize,
    /// Upper bound on the nudge probability.
    pub max_rate: f64,
}

impl Default for GapEqualizer {
    fn default() -> Self {
        Self {
            rounds: 8,
            target: 0.02,
            threshold: 9,
            max_rate: 0.65,
        }
    }
}

/// Restores one differing coordinate. Returns false if there is none.
fn restore_one(col: &mut Column, rng: &mut DetRng) -> bool {
    let start = rng.next_in(0, DIM - 1);
    for k in 0..DIM {
        let i = (start + k) % DIM;
        if col.visible.get(i) != col.truth.get(i) {
            col.visible.set(i, col.truth.get(i));
            return true;
        }
    }
    false
}

/// Shifts one matching coordinate off the truth. Returns false if there is none.
fn push_one(col: &mut Column, rng: &mut DetRng) -> bool {
    let start = rng.next_in(0, DIM - 1);
    for k in 0..DIM {
        let i = (start + k) % DIM;
        if col.visible.get(i) == col.truth.get(i) {
            col.visible.add_at(i, nonzero_symbol(rng));
            return true;
        }
    }
    false
}

#[derive(Debug, Clone, Copy, Default)]
struct KindSums {
    real: usize,
    real_count: usize,
    decoy: usize,
    decoy_count: usize,
}

impl KindSums {
    fn add(&mut self, col: &Column) {
        match col.kind {
            ColumnKind::Real => {
                self.real += col.distortion();
                self.real_count += 1;
            }
            ColumnKind::Decoy => {
                self.decoy += col.distortion();
                self.decoy_count += 1;
            }
        }
    }

    /// Real mean minus decoy mean.
    fn signed_gap(&self) -> f64 {
        let mean = |sum: usize, count: usize| sum as f64 / count.max(1) as f64;
        mean(self.real, self.real_count) - mean(self.decoy, self.decoy_count)
    }
}

impl GapEqualizer {
    fn estimate(
        &self,
        dataset: &Dataset,
        ctx: &PassContext<'_>,
        order: &[usize],
        round: usize,
    ) -> f64 {
        let sample = order.len() / 5;
        let mut sums = KindSums::default();
        for k in 0..sample {
            let j = order[(round * sample + k) % order.len()];
            if !ctx.is_anchored(j) {
                sums.add(&dataset.columns()[j]);
            }
        }
        sums.signed_gap()
    }

    fn nudge(&self, dataset: &mut Dataset, ctx: &PassContext<'_>, gap: f64, rng: &mut DetRng) {
        let rate = self.max_rate.min(gap.abs() * 10.0);
        let high = if gap > 0.0 {
            ColumnKind::Real
        } else {
            ColumnKind::Decoy
        };
        for (j, col) in dataset.columns_mut().iter_mut().enumerate() {
            if ctx.is_anchored(j) {
                continue;
            }
            let d = col.distortion();
            if col.kind == high && d > self.threshold && rng.chance(rate) {
                let i = rng.next_in(0, DIM - 1);
                if col.visible.get(i) != col.truth.get(i) {
                    col.visible.set(i, col.truth.get(i));
                }
            } else if col.kind != high && d < self.threshold && rng.chance(rate) {
                let i = rng.next_in(0, DIM - 1);
                if col.visible.get(i) == col.truth.get(i) {
                    col.visible.add_at(i, nonzero_symbol(rng));
                }
            }
        }
    }

    /// Next unanchored column of `kind` accepted by `usable`, scanning
    /// `order` cyclically from `cursor`.
    fn next_column(
        dataset: &Dataset,
        ctx: &PassContext<'_>,
        order: &[usize],
        cursor: &mut usize,
        kind: ColumnKind,
        usable: impl Fn(&Column) -> bool,
    ) -> Option<usize> {
        for _ in 0..order.len() {
            let j = order[*cursor % order.len()];
            *cursor += 1;
            let col = &dataset.columns()[j];
            if col.kind == kind && !ctx.is_anchored(j) && usable(col) {
                return Some(j);
            }
        }
        None
    }

    fn settle(
        &self,
        dataset: &mut Dataset,
        ctx: &PassContext<'_>,
        order: &[usize],
        rng: &mut DetRng,
    ) -> usize {
        let mut sums = KindSums::default();
        for col in dataset.columns() {
            sums.add(col);
        }
        if sums.real_count == 0 || sums.decoy_count == 0 {
            return 0;
        }

        let mut cursor = 0;
        let mut steps = 0;
        for _ in 0..order.len() * DIM {
            let gap = sums.signed_gap();
            if gap.abs() < self.target {
                break;
            }
            let (high, low, high_count, low_count) = if gap > 0.0 {
                (ColumnKind::Real, ColumnKind::Decoy, sums.real_count, sums.decoy_count)
            } else {
                (ColumnKind::Decoy, ColumnKind::Real, sums.decoy_count, sums.real_count)
            };
            let reach = gap.abs() + self.target;

            let lowered = (1.0 / high_count as f64) < reach
                && Self::next_column(dataset, ctx, order, &mut cursor, high, |c| {
                    c.distortion() > 0
                })
                .is_some_and(|j| restore_one(&mut dataset.columns_mut()[j], rng));
            if lowered {
                match high {
                    ColumnKind::Real => sums.real -= 1,
                    ColumnKind::Decoy => sums.decoy -= 1,
                }
                steps += 1;
                continue;
            }

            let raised = (1.0 / low_count as f64) < reach
                && Self::next_column(dataset, ctx, order, &mut cursor, low, |c| {
                    c.distortion() < DIM
                })
                .is_some_and(|j| push_one(&mut dataset.columns_mut()[j], rng));
            if !raised {
                break;
            }
            match low {
                ColumnKind::Real => sums.real += 1,
                ColumnKind::Decoy => sums.decoy += 1,
            }
            steps += 1;
        }
        steps
    }
}

impl CorruptionPass for GapEqualizer {
    fn name(&self) -> &'static str {
        "gap-equalizer"
    }

    fn apply(&self, dataset: &mut Dataset, ctx: &mut PassContext<'_>, rng: &mut DetRng) {
        let mut order: Vec<usize> = (0..dataset.columns().len()).collect();
        rng.shuffle(&mut order);

        let mut rounds = 0;
        for round in 0..self.rounds {
            let gap = self.estimate(dataset, ctx, &order, round);
            if gap.abs() < self.target {
                break;
            }
            self.nudge(dataset, ctx, gap, rng);
            rounds += 1;
        }
        let settled = self.settle(dataset, ctx, &order, rng);
        tracing::debug!(
            rounds,
            settled,
            gap = dataset.hamming_profile().gap(),
            "kind distortion gap equalized"
        );
    }
}

/// An ordered, seeded list of corruption passes.
#[derive(Debug)]
pub struct CorruptionPipeline {
    seed: u64,
    passes: Vec<Box<dyn CorruptionPass>>,
}

impl CorruptionPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            passes: Vec::new(),
        }
    }

    /// The default pass order.
    #[must_use]
    pub fn standard(seed: u64) -> Self {
        Self::new(seed)
            .with_pass(RandomOverwrite::default())
            .with_pass(CrossContaminate::default())
            .with_pass(SwapColumns::default())
            .with_pass(SymbolNoise::default())
            .with_pass(FrobeniusFog::default())
            .with_pass(RotationTrap::default())
            .with_pass(MinimumDistance::default())
            .with_pass(KindSkew)
            .with_pass(DecoyAnchor::default())
            .with_pass(GapEqualizer::default())
    }

    /// Appends a pass.
    #[must_use]
    pub fn with_pass(mut self, pass: impl CorruptionPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Pass names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    /// Number of passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns true if the pipeline has no passes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs every pass in order. `groups` is the dataset's group
    /// membership; passes that select whole groups read it.
    #[must_use]
    pub fn run(&self, mut dataset: Dataset, groups: &dyn GroupIndex) -> Dataset {
        let mut root = DetRng::new(self.seed);
        let mut ctx = PassContext::new(groups);
        for pass in &self.passes {
            let mut rng = root.split();
            pass.apply(&mut dataset, &mut ctx, &mut rng);
            let profile = dataset.hamming_profile();
            tracing::trace!(
                pass = pass.name(),
                real_mean = profile.real_mean,
                decoy_mean = profile.decoy_mean,
                "corruption pass applied"
            );
        }
        dataset
    }
}
