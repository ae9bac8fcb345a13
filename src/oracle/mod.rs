//! The adaptive query oracle.
//!
//! # Module layout
//!
//! - [`transform`]: deferred row-operation transform and batch generation
//! - [`poison`]: poison bank, accumulator and propagation
//! - [`wind`]: timer-driven drift schedule
//! - [`mirror`]: convergence detection and the mirror sub-state
//! - [`tables`]: immutable tables shared by every session
//! - [`session`]: the per-session state and query path
//! - [`shared`]: mutex-protected handle for concurrent callers
//! - [`stats`]: serializable activity counters

pub mod mirror;
pub mod poison;
pub mod session;
pub mod shared;
pub mod stats;
pub mod tables;
pub mod transform;
pub mod wind;

pub use mirror::Mode;
pub use poison::{PoisonAccumulator, PoisonBank, PoisonChain};
pub use session::{Oracle, OracleBuilder, new_oracle};
pub use shared::SharedOracle;
pub use stats::OracleStats;
pub use tables::DefenseTables;
pub use transform::{DeferredTransform, Intensity, RowOp, RowOpBatch};
pub use wind::{WindSchedule, WindState};
