//! Immutable tables shared by every session.

use super::poison::PoisonBank;
use super::wind::WindSchedule;
use crate::util::{ChainDigest, digest_parts};

/// Seed of the default tables.
pub const DEFAULT_TABLE_SEED: &[u8] = b"tarnish/defense-tables/v1";

/// Root digest, poison bank and wind bases.
///
/// Built once and shared through `Arc` by all sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefenseTables {
    root: ChainDigest,
    bank: PoisonBank,
    wind: WindSchedule,
}

impl DefenseTables {
    /// Derives every table from `seed`.
    #[must_use]
    pub fn derive(seed: &[u8]) -> Self {
        let root = digest_parts(&[seed, b"root"]);
        let bank = PoisonBank::generate(&digest_parts(&[&root, b"poison-bank"]));
        let wind = WindSchedule::from_root(&root);
        Self { root, bank, wind }
    }

    /// Root digest sessions start their state chain from.
    #[must_use]
    pub const fn root(&self) -> &ChainDigest {
        &self.root
    }

    /// The poison bank.
    #[must_use]
    pub const fn bank(&self) -> &PoisonBank {
        &self.bank
    }

    /// The wind bases.
    #[must_use]
    pub const fn wind(&self) -> WindSchedule {
        self.wind
    }
}

impl Default for DefenseTables {
    fn default() -> Self {
        Self::derive(DEFAULT_TABLE_SEED)
    }
}
