//! Tarnish: an adaptive query oracle over GF(4)^12.
//!
//! The oracle guards an exact dataset of 12-symbol vectors. Callers holding
//! the secret [`AccessKey`] get exact answers. Everyone else gets
//! deterministic, session-specific wrong answers shaped to resist two
//! kinds of analysis: converging on a narrow index range, and collecting
//! linearly dependent answers.
//!
//! # Module layout
//!
//! - [`algebra`]: field arithmetic, packed vectors, matrices, rank tracking
//! - [`util`]: deterministic generator and SHA-256 state chain
//! - [`security`]: access keys
//! - [`dataset`]: data provider traits, line builder, corruption pipeline
//! - [`oracle`]: the session state machine and its defenses
//! - [`config`]: policy constants and layered loading
//! - [`error`]: construction and query errors
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tarnish::dataset::{CorruptionPipeline, DataSource, LineSetBuilder};
//! use tarnish::{new_oracle, AccessKey};
//!
//! let lines = LineSetBuilder::new().real(50).decoy(50).build().unwrap();
//! let dataset = Arc::new(CorruptionPipeline::standard(1).run(lines.dataset, &lines.adjacency));
//! let key = AccessKey::derive(b"operator secret", b"tarnish/example");
//!
//! let mut oracle = new_oracle(dataset.clone(), Arc::new(lines.adjacency), key, b"session-1").unwrap();
//! assert_eq!(oracle.query(0, Some(&key)).unwrap(), dataset.true_vector(0).unwrap());
//! let _decoy = oracle.query(0, None).unwrap();
//! assert!(oracle.query(dataset.len(), None).is_err());
//! ```

pub mod algebra;
pub mod config;
pub mod dataset;
pub mod error;
pub mod oracle;
pub mod security;
pub mod util;

pub use algebra::{Gf4, Gf4Matrix, Gf4Vec};
pub use config::{ConfigLoader, OracleConfig};
pub use dataset::{AdjacencyMap, DataSource, Dataset, GroupIndex};
pub use error::{ConfigError, QueryError};
pub use oracle::{DefenseTables, Mode, Oracle, OracleBuilder, OracleStats, SharedOracle, new_oracle};
pub use security::AccessKey;
