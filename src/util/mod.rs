//! Deterministic randomness and hashing utilities.

pub mod det_rng;
pub mod state_chain;

pub use det_rng::DetRng;
pub use state_chain::{ChainDigest, StateChain, digest_parts};
