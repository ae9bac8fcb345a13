//! Dense 12×12 matrices over GF(4) with packed rows.

use super::gf4::Gf4;
use super::packed::{DIM, Gf4Vec};

/// A dense square matrix over GF(4). Row `i` is a packed [`Gf4Vec`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gf4Matrix {
    rows: [Gf4Vec; DIM],
}

impl Gf4Matrix {
    /// The identity matrix.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rows: std::array::from_fn(|i| Gf4Vec::unit(i, Gf4::ONE)),
        }
    }

    /// The zero matrix.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            rows: [Gf4Vec::ZERO; DIM],
        }
    }

    /// Builds a matrix from its rows.
    #[must_use]
    pub const fn from_rows(rows: [Gf4Vec; DIM]) -> Self {
        Self { rows }
    }

    /// Returns row `i`.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> Gf4Vec {
        self.rows[i]
    }

    /// Returns all rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> &[Gf4Vec; DIM] {
        &self.rows
    }

    /// Returns entry `(row, col)`.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Gf4 {
        self.rows[row].get(col)
    }

    /// Elementary row operation: `row[target] += scalar · row[source]`,
    /// or `scalar · Frobenius(row[source])` when `frobenius` is set.
    ///
    /// O(12): only the target row is rewritten.
    #[inline]
    pub fn row_op(&mut self, target: usize, source: usize, scalar: Gf4, frobenius: bool) {
        let mut src = self.rows[source];
        if frobenius {
            src = src.frobenius();
        }
        self.rows[target] = self.rows[target].scale_add(src, scalar);
    }

    /// Matrix-vector product `M · v`. O(144).
    #[must_use]
    pub fn mul_vec(&self, v: Gf4Vec) -> Gf4Vec {
        let mut out = Gf4Vec::ZERO;
        for (i, row) in self.rows.iter().enumerate() {
            out.set(i, row.dot(v));
        }
        out
    }

    /// Returns true if this is the identity matrix.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Default for Gf4Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Debug for Gf4Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rows.iter()).finish()
    }
}
