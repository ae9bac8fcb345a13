//! Data provider interfaces and their in-memory implementations.
//!
//! The oracle consumes its dataset through two read-only traits:
//!
//! - [`DataSource`]: index → (true vector, visible vector, real/decoy flag)
//! - [`GroupIndex`]: index → group ids, group id → ordered members
//!
//! Building the data (line sets, corruption passes) lives in the
//! [`lines`] and [`corrupt`] submodules. It runs once, before any session
//! exists, and its output is shared immutably by every session.

pub mod adjacency;
pub mod corrupt;
pub mod lines;

pub use adjacency::AdjacencyMap;
pub use corrupt::{CorruptionPass, CorruptionPipeline, PassContext};
pub use lines::{LineSet, LineSetBuilder};

use crate::algebra::Gf4Vec;
use crate::error::ConfigError;

/// Identifier of an adjacency group.
pub type GroupId = usize;

/// Read-only access to the guarded vectors.
pub trait DataSource {
    /// Number of columns.
    fn len(&self) -> usize;

    /// Returns true if there are no columns.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `index` addresses a column.
    fn index_is_valid(&self, index: usize) -> bool {
        index < self.len()
    }

    /// The exact vector, served only to authorized callers.
    fn true_vector(&self, index: usize) -> Option<Gf4Vec>;

    /// The corrupted vector every unauthorized answer starts from.
    fn visible_vector(&self, index: usize) -> Option<Gf4Vec>;

    /// Returns true if the column belongs to a decoy group.
    fn is_decoy(&self, index: usize) -> bool;
}

/// Read-only group membership.
pub trait GroupIndex {
    /// Number of groups.
    fn group_count(&self) -> usize;

    /// Groups containing `index`. Empty for unknown indices.
    fn groups_of(&self, index: usize) -> &[GroupId];

    /// Ordered members of `group`. Empty for unknown groups.
    fn members_of(&self, group: GroupId) -> &[usize];
}

/// Whether a column is part of the guarded data or a decoy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ColumnKind {
    /// Part of a real group.
    Real,
    /// Only part of decoy groups.
    Decoy,
}

/// One dataset entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// The exact vector.
    pub truth: Gf4Vec,
    /// The corrupted vector.
    pub visible: Gf4Vec,
    /// Real or decoy.
    pub kind: ColumnKind,
}

impl Column {
    /// A column whose visible vector is still the truth.
    #[must_use]
    pub const fn clean(truth: Gf4Vec, kind: ColumnKind) -> Self {
        Self {
            truth,
            visible: truth,
            kind,
        }
    }

    /// Hamming distance between truth and visible.
    #[must_use]
    pub const fn distortion(&self) -> usize {
        self.truth.hamming(self.visible)
    }
}

/// Mean truth/visible distance per column kind.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HammingProfile {
    /// Mean distance over real columns.
    pub real_mean: f64,
    /// Mean distance over decoy columns.
    pub decoy_mean: f64,
    /// Real column count.
    pub real_count: usize,
    /// Decoy column count.
    pub decoy_count: usize,
}

impl HammingProfile {
    /// Absolute difference of the two means. A large gap lets an observer
    /// tell real from decoy columns by distortion alone.
    #[must_use]
    pub fn gap(&self) -> f64 {
        (self.real_mean - self.decoy_mean).abs()
    }
}

/// In-memory dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Builds a dataset from columns.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ConfigError> {
        if columns.is_empty() {
            return Err(ConfigError::EmptyDataset);
        }
        Ok(Self { columns })
    }

    /// Builds a dataset from parallel truth and visible tables. Columns listed
    /// in `decoys` are flagged as decoys.
    pub fn from_tables(
        truth: Vec<Gf4Vec>,
        visible: Vec<Gf4Vec>,
        decoys: &[usize],
    ) -> Result<Self, ConfigError> {
        if truth.len() != visible.len() {
            return Err(ConfigError::LengthMismatch {
                truth: truth.len(),
                visible: visible.len(),
            });
        }
        let mut columns: Vec<Column> = truth
            .into_iter()
            .zip(visible)
            .map(|(truth, visible)| Column {
                truth,
                visible,
                kind: ColumnKind::Real,
            })
            .collect();
        for &d in decoys {
            if let Some(col) = columns.get_mut(d) {
                col.kind = ColumnKind::Decoy;
            }
        }
        Self::from_columns(columns)
    }

    /// All columns.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Mutable access for corruption passes.
    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// Distortion statistics per column kind.
    #[must_use]
    pub fn hamming_profile(&self) -> HammingProfile {
        let (mut real_sum, mut real_count, mut decoy_sum, mut decoy_count) = (0usize, 0usize, 0usize, 0usize);
        for col in &self.columns {
            match col.kind {
                ColumnKind::Real => {
                    real_sum += col.distortion();
                    real_count += 1;
                }
                ColumnKind::Decoy => {
                    decoy_sum += col.distortion();
                    decoy_count += 1;
                }
            }
        }
        let mean = |sum: usize, count: usize| {
            if count == 0 {
                0.0
            } else {
                sum as f64 / count as f64
            }
        };
        HammingProfile {
            real_mean: mean(real_sum, real_count),
            decoy_mean: mean(decoy_sum, decoy_count),
            real_count,
            decoy_count,
        }
    }
}

impl DataSource for Dataset {
    fn len(&self) -> usize {
        self.columns.len()
    }

    fn true_vector(&self, index: usize) -> Option<Gf4Vec> {
        self.columns.get(index).map(|c| c.truth)
    }

    fn visible_vector(&self, index: usize) -> Option<Gf4Vec> {
        self.columns.get(index).map(|c| c.visible)
    }

    fn is_decoy(&self, index: usize) -> bool {
        self.columns
            .get(index)
            .is_some_and(|c| c.kind == ColumnKind::Decoy)
    }
}
