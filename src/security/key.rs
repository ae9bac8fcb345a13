//! Access keys for authorized exact retrieval.
//!
//! Keys are 256-bit (32 byte) values. A presented key is never compared to
//! the secret byte-by-byte: both are reduced to an HMAC-SHA256 tag over a
//! fixed purpose string and the tags are checked with the MAC's
//! constant-time verification.

use crate::util::DetRng;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Size of an access key in bytes.
pub const ACCESS_KEY_SIZE: usize = 32;

const CHECK_PURPOSE: &[u8] = b"tarnish/access-check/v1";

/// A 256-bit access key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessKey {
    bytes: [u8; ACCESS_KEY_SIZE],
}

impl AccessKey {
    /// Creates a new key from a 64-bit seed.
    ///
    /// This uses a deterministic expansion to generate 32 bytes from the seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; ACCESS_KEY_SIZE];
        let mut rng = DetRng::new(seed);
        rng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a new key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ACCESS_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Derives a key from arbitrary secret material with HMAC-SHA256.
    ///
    /// Construction: `key = HMAC-SHA256(material, purpose)`.
    #[must_use]
    pub fn derive(material: &[u8], purpose: &[u8]) -> Self {
        let mut mac = HmacSha256::new_from_slice(material).expect("HMAC accepts any key length");
        mac.update(purpose);
        Self {
            bytes: mac.finalize().into_bytes().into(),
        }
    }

    /// Returns the raw bytes of the key.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ACCESS_KEY_SIZE] {
        &self.bytes
    }

    fn check_mac(&self) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.bytes).expect("HMAC accepts any key length");
        mac.update(CHECK_PURPOSE);
        mac
    }

    /// Returns true if `presented` is this key.
    ///
    /// Runs in time independent of where the keys differ.
    #[must_use]
    pub fn verify(&self, presented: &Self) -> bool {
        let tag = presented.check_mac().finalize().into_bytes();
        self.check_mac().verify_slice(&tag).is_ok()
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not leak full key material in debug logs
        write!(f, "AccessKey({:02x}{:02x}...)", self.bytes[0], self.bytes[1])
    }
}
