//! Error types for oracle construction and queries.
//!
//! Error handling follows two rules:
//!
//! - The query path has exactly one failure, [`QueryError::InvalidIndex`].
//!   It is a defined not-found result, reported before any session state is
//!   touched. Everything else on that path is total.
//! - Every structural problem in the inputs (empty dataset, dangling group
//!   members, out-of-range policy constants) is a [`ConfigError`] raised at
//!   construction time, before a session exists.

use std::io;

/// Errors returned by [`Oracle::query`](crate::Oracle::query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The index is outside `[0, len)`.
    #[error("index {index} out of range for dataset of {len} columns")]
    InvalidIndex {
        /// The requested index.
        index: usize,
        /// Number of columns in the dataset.
        len: usize,
    },
}

/// Construction-time failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading configuration.
    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed configuration text.
    #[error("config parse error: {0}")]
    Parse(String),

    /// The dataset has no columns.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Truth and visible tables disagree in length.
    #[error("dataset tables disagree: {truth} true vectors, {visible} visible vectors")]
    LengthMismatch {
        /// Number of true vectors.
        truth: usize,
        /// Number of visible vectors.
        visible: usize,
    },

    /// A group has no members.
    #[error("group {group} has no members")]
    EmptyGroup {
        /// The offending group id.
        group: usize,
    },

    /// A group lists a column outside the dataset.
    #[error("group {group} references column {index}, dataset has {len}")]
    DanglingMember {
        /// The offending group id.
        group: usize,
        /// The dangling column index.
        index: usize,
        /// Number of columns in the dataset.
        len: usize,
    },

    /// A column lists a group id that does not exist.
    #[error("column {index} references unknown group {group}")]
    UnknownGroup {
        /// The column index.
        index: usize,
        /// The unknown group id.
        group: usize,
    },

    /// A policy constant is outside its allowed range.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// An override key is unknown or its value does not parse.
    #[error("invalid override: {0}")]
    InvalidOverride(String),
}

impl ConfigError {
    /// Returns true if the error came from the data provider rather than
    /// from policy configuration.
    #[must_use]
    pub const fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyDataset
                | Self::LengthMismatch { .. }
                | Self::EmptyGroup { .. }
                | Self::DanglingMember { .. }
                | Self::UnknownGroup { .. }
        )
    }
}
