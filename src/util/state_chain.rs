//! SHA-256 state chain for oracle sessions.
//!
//! The chain is advanced once per unauthorized query:
//! `state = SHA-256(state ∥ index ∥ salt)`. Digests derived from it seed the
//! row-operation batches, so the transform a caller sees depends on the exact
//! sequence of indices they asked for, not only on the generator seed.

use sha2::{Digest, Sha256};

/// Size of a chain state / digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
pub type ChainDigest = [u8; DIGEST_SIZE];

/// Hashes the concatenation of `parts`.
#[must_use]
pub fn digest_parts(parts: &[&[u8]]) -> ChainDigest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Per-session keyed hash chain.
#[derive(Clone)]
pub struct StateChain {
    state: ChainDigest,
    salt: Vec<u8>,
    steps: u64,
}

impl StateChain {
    /// Starts a chain from a shared root digest and a session salt.
    #[must_use]
    pub fn new(root: &[u8], salt: &[u8]) -> Self {
        Self {
            state: digest_parts(&[root, b"session", salt]),
            salt: salt.to_vec(),
            steps: 0,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> &ChainDigest {
        &self.state
    }

    /// Number of times the chain has advanced.
    #[inline]
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Advances the chain with a queried index.
    pub fn advance(&mut self, index: u32) {
        self.state = digest_parts(&[&self.state, &index.to_be_bytes(), &self.salt]);
        self.steps += 1;
    }

    /// Derives a digest for `label` without advancing.
    #[must_use]
    pub fn derive(&self, label: &[u8]) -> ChainDigest {
        digest_parts(&[&self.state, label, &self.salt])
    }

    /// Derives a digest for `label` bound to a counter.
    #[must_use]
    pub fn derive_counted(&self, label: &[u8], counter: u64) -> ChainDigest {
        digest_parts(&[&self.state, label, &counter.to_be_bytes()])
    }
}

impl std::fmt::Debug for StateChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not leak full state in debug logs
        write!(
            f,
            "StateChain({:02x}{:02x}..., steps={})",
            self.state[0], self.state[1], self.steps
        )
    }
}
