//! Deterministic pseudo-random number generator.
//!
//! This module provides a small, fast PRNG for per-query randomness. It uses
//! the xorshift128+ algorithm: two 64-bit words of state, one addition and a
//! handful of shifts per output.
//!
//! # Determinism
//!
//! Given the same seed, the sequence of generated numbers is always identical.
//! Oracle sessions rely on this: two sessions built from the same inputs and
//! fed the same queries must answer identically.

/// A deterministic pseudo-random number generator using xorshift128+.
///
/// This PRNG is intentionally simple and fast. It is NOT cryptographically
/// secure; unpredictability of oracle sessions comes from the SHA-256 state
/// chain, not from this generator.
#[derive(Debug, Clone)]
pub struct DetRng {
    s0: u64,
    s1: u64,
}

impl DetRng {
    /// Creates a new PRNG from a 64-bit seed.
    ///
    /// The seed is expanded with splitmix64 so that nearby seeds give
    /// unrelated streams. Zero is a valid seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        let (a, next) = splitmix64(seed);
        let (b, _) = splitmix64(next);
        Self::from_words(a, b)
    }

    /// Creates a PRNG from the first 16 bytes of `seed`, read big-endian.
    ///
    /// Shorter inputs are zero-padded.
    #[must_use]
    pub fn from_seed_bytes(seed: &[u8]) -> Self {
        let mut buf = [0u8; 16];
        let n = seed.len().min(16);
        buf[..n].copy_from_slice(&seed[..n]);
        let (hi, lo) = buf.split_at(8);
        let mut w0 = [0u8; 8];
        let mut w1 = [0u8; 8];
        w0.copy_from_slice(hi);
        w1.copy_from_slice(lo);
        Self::from_words(u64::from_be_bytes(w0), u64::from_be_bytes(w1))
    }

    /// Both state words are forced odd so the state can never be all zero.
    const fn from_words(s0: u64, s1: u64) -> Self {
        Self { s0: s0 | 1, s1: s1 | 1 }
    }

    /// Generates the next pseudo-random u64 value.
    #[inline]
    #[allow(clippy::missing_const_for_fn)] // Cannot be const: mutates self
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.s0;
        let mut s1 = self.s1;
        let result = s0.wrapping_add(s1);
        s1 ^= s0;
        self.s0 = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.s1 = s1.rotate_left(37);
        result
    }

    /// Generates a pseudo-random u32 value.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Generates a pseudo-random usize value in the range [0, bound).
    ///
    /// Uses rejection sampling to avoid modulo bias.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    #[inline]
    pub fn next_usize(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be non-zero");
        let bound_u64 = bound as u64;
        let threshold = u64::MAX - (u64::MAX % bound_u64);
        loop {
            let value = self.next_u64();
            if value < threshold {
                return (value % bound_u64) as usize;
            }
        }
    }

    /// Generates a pseudo-random usize in the inclusive range [lo, hi].
    ///
    /// # Panics
    ///
    /// Panics if `lo > hi`.
    #[inline]
    pub fn next_in(&mut self, lo: usize, hi: usize) -> usize {
        assert!(lo <= hi, "empty range {lo}..={hi}");
        lo + self.next_usize(hi - lo + 1)
    }

    /// Generates a uniform 2-bit value.
    #[inline]
    pub fn next_symbol(&mut self) -> u8 {
        (self.next_u64() & 3) as u8
    }

    /// Generates a value in [0, 1] with 20 bits of resolution.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        const RES: u64 = 0xF_FFFF;
        (self.next_u64() & RES) as f64 / RES as f64
    }

    /// Returns true with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }

    /// Draws two distinct indices from [0, bound).
    ///
    /// # Panics
    ///
    /// Panics if `bound < 2`.
    pub fn next_distinct_pair(&mut self, bound: usize) -> (usize, usize) {
        assert!(bound >= 2, "need at least two values to draw a distinct pair");
        let a = self.next_usize(bound);
        let mut b = self.next_usize(bound - 1);
        if b >= a {
            b += 1;
        }
        (a, b)
    }

    /// Derives an independent child generator, advancing this one.
    #[must_use]
    pub fn split(&mut self) -> Self {
        let a = self.next_u64();
        let b = self.next_u64();
        let (a, _) = splitmix64(a);
        let (b, _) = splitmix64(b);
        Self::from_words(a, b)
    }

    /// Fills a buffer with pseudo-random bytes.
    pub fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut i = 0;
        while i < dest.len() {
            let rand = self.next_u64();
            let bytes = rand.to_le_bytes();
            let n = std::cmp::min(dest.len() - i, 8);
            dest[i..i + n].copy_from_slice(&bytes[..n]);
            i += n;
        }
    }

    /// Shuffles a slice in place using the Fisher-Yates algorithm.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_usize(i + 1);
            slice.swap(i, j);
        }
    }
}

/// One splitmix64 step: returns `(output, next_state)`.
const fn splitmix64(state: u64) -> (u64, u64) {
    let next = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = next;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (z ^ (z >> 31), next)
}
