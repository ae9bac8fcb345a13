//! Secret-key handling for the authorized bypass.

pub mod key;

pub use key::{ACCESS_KEY_SIZE, AccessKey};
