//! GF(4) arithmetic, packed vectors, dense matrices and rank tracking.

pub mod gf4;
pub mod linalg;
pub mod matrix;
pub mod packed;

pub use gf4::Gf4;
pub use linalg::{RankStats, RankTracker, reference_rank};
pub use matrix::Gf4Matrix;
pub use packed::{DIM, Gf4Vec};
