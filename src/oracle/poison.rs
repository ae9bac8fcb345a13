//! Poison chains and their propagation through group adjacency.
//!
//! A poison chain is a short sequence of nonzero symbols whose field sum is
//! nonzero, so a full chain injected into one coordinate can never cancel
//! itself out. The bank is generated once and shared by every session; each
//! session keeps its own [`PoisonAccumulator`], which only ever grows.

use std::collections::BTreeMap;

use crate::algebra::{DIM, Gf4, Gf4Vec};
use crate::dataset::GroupIndex;
use crate::util::DetRng;

/// Number of chains in a bank.
pub const BANK_SIZE: usize = 256;

/// Allowed chain lengths.
pub const CHAIN_LENGTHS: [usize; 4] = [3, 5, 7, 11];

/// Echo offsets around each poisoned member (applied in both directions).
pub const ECHO_OFFSETS: [usize; 2] = [1, 3];

/// A sequence of nonzero symbols with a nonzero sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoisonChain {
    steps: Vec<Gf4>,
}

impl PoisonChain {
    /// Draws a chain of `len` steps.
    ///
    /// The last step is chosen among the values that keep the running sum
    /// nonzero.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    #[must_use]
    pub fn generate(rng: &mut DetRng, len: usize) -> Self {
        assert!(len > 0, "poison chain must have at least one step");
        let mut steps: Vec<Gf4> = (0..len - 1)
            .map(|_| Gf4::new(rng.next_in(1, 3) as u8))
            .collect();
        let partial = steps.iter().fold(Gf4::ZERO, |acc, &s| acc + s);
        let allowed: Vec<Gf4> = Gf4::NONZERO.into_iter().filter(|&v| v != partial).collect();
        steps.push(allowed[rng.next_usize(allowed.len())]);
        Self { steps }
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for generated chains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step `i`.
    #[inline]
    #[must_use]
    pub fn step(&self, i: usize) -> Gf4 {
        self.steps[i]
    }

    /// All steps.
    #[must_use]
    pub fn steps(&self) -> &[Gf4] {
        &self.steps
    }

    /// Field sum of every step.
    #[must_use]
    pub fn sum(&self) -> Gf4 {
        self.steps.iter().fold(Gf4::ZERO, |acc, &s| acc + s)
    }
}

/// The fixed set of [`BANK_SIZE`] poison chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoisonBank {
    chains: Vec<PoisonChain>,
}

impl PoisonBank {
    /// Generates a bank from seed bytes (the first 16 are used).
    #[must_use]
    pub fn generate(seed: &[u8]) -> Self {
        let mut rng = DetRng::from_seed_bytes(seed);
        let chains = (0..BANK_SIZE)
            .map(|_| {
                let len = CHAIN_LENGTHS[rng.next_usize(CHAIN_LENGTHS.len())];
                PoisonChain::generate(&mut rng, len)
            })
            .collect();
        Self { chains }
    }

    /// The chain selected by the low 8 bits of `key`.
    #[inline]
    #[must_use]
    pub fn chain(&self, key: u64) -> &PoisonChain {
        &self.chains[(key as usize) & (BANK_SIZE - 1)]
    }

    /// All chains.
    #[must_use]
    pub fn chains(&self) -> &[PoisonChain] {
        &self.chains
    }
}

/// Per-session corruption added to visible vectors before the transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoisonAccumulator {
    entries: BTreeMap<usize, Gf4Vec>,
}

impl PoisonAccumulator {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated poison of column `index` (zero if untouched).
    #[must_use]
    pub fn get(&self, index: usize) -> Gf4Vec {
        self.entries.get(&index).copied().unwrap_or(Gf4Vec::ZERO)
    }

    /// Adds `value` at coordinate `coord` of column `index`.
    pub fn add_at(&mut self, index: usize, coord: usize, value: Gf4) {
        self.entries.entry(index).or_default().add_at(coord, value);
    }

    /// Applies Frobenius at coordinate `coord` of column `index`.
    pub fn frobenius_at(&mut self, index: usize, coord: usize) {
        self.entries.entry(index).or_default().frobenius_at(coord);
    }

    /// Number of columns that have been touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counts from one propagation or bulk pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoisonOutcome {
    /// Member injections.
    pub events: u64,
    /// Groups that propagated.
    pub groups: u64,
}

fn key_symbol(key: u64, slot: usize) -> Gf4 {
    Gf4::new(((key >> (2 * slot)) & 3) as u8)
}

/// Propagates poison from queried column `index` to its group partners.
///
/// Runs with probability `rate`. For every group of `index` with at least
/// two members, a chain is picked by the rolling key and a fresh key is
/// drawn. Each other member at position `step < chain.len()` receives
/// `chain[step]` at coordinate `keysym(step) · ((qc + step) mod 3 + 1)`,
/// then a Frobenius twist at `(coordinate + chain[step]) mod 12`. The members
/// `m ± 1` and `m ± 3` (wrapping at `len`) receive an echo.
#[allow(clippy::too_many_arguments)]
pub fn propagate<A: GroupIndex + ?Sized>(
    acc: &mut PoisonAccumulator,
    bank: &PoisonBank,
    adjacency: &A,
    rng: &mut DetRng,
    index: usize,
    query_count: u64,
    len: usize,
    rate: f64,
) -> PoisonOutcome {
    let mut outcome = PoisonOutcome::default();
    let groups = adjacency.groups_of(index);
    if groups.is_empty() || rng.next_unit() > rate {
        return outcome;
    }
    let mut key = rng.next_u64();
    for &group in groups {
        let members = adjacency.members_of(group);
        if members.len() < 2 {
            continue;
        }
        let chain = bank.chain(key);
        key = rng.next_u64();
        let chain_len = chain.len();
        for (step, &member) in members.iter().enumerate() {
            if member == index || step >= chain_len {
                continue;
            }
            let value = chain.step(step);
            let spread = Gf4::new(((query_count + step as u64) % 3 + 1) as u8);
            let coord = usize::from((key_symbol(key, step) * spread).raw());
            acc.add_at(member, coord, value);
            acc.frobenius_at(member, (coord + usize::from(value.raw())) % DIM);
            outcome.events += 1;

            for delta in ECHO_OFFSETS {
                let echo_coord = usize::from((key_symbol(key, delta) * chain.step(step % chain_len)).raw());
                let echo_value = chain.step((step + delta) % chain_len);
                let shift = delta % len;
                for neighbor in [(member + shift) % len, (member + len - shift) % len] {
                    acc.add_at(neighbor, echo_coord, echo_value);
                }
            }
        }
        outcome.groups += 1;
    }
    outcome
}

/// Mass injection over the groups of recently queried columns.
///
/// For every recent column, every group it belongs to and every member of
/// that group, a chain is picked by a fresh draw and its first
/// `min(len, 12)` steps land at generator-chosen coordinates.
pub fn bulk_poison<A: GroupIndex + ?Sized>(
    acc: &mut PoisonAccumulator,
    bank: &PoisonBank,
    adjacency: &A,
    rng: &mut DetRng,
    recent: impl IntoIterator<Item = usize>,
) -> PoisonOutcome {
    let mut outcome = PoisonOutcome::default();
    for index in recent {
        for &group in adjacency.groups_of(index) {
            for &member in adjacency.members_of(group) {
                let chain = bank.chain(rng.next_u64());
                for step in 0..chain.len().min(DIM) {
                    let coord = rng.next_in(0, DIM - 1);
                    acc.add_at(member, coord, chain.step(step));
                }
                outcome.events += 1;
            }
            outcome.groups += 1;
        }
    }
    outcome
}
