//! GF(4) finite-field arithmetic for the oracle's coordinate alphabet.
//!
//! Implements the Galois field GF(2^2) with the irreducible polynomial
//! x^2 + x + 1. The four elements `{0, 1, α, α²}` are encoded as the 2-bit
//! values `0, 1, 2, 3`.
//!
//! # Representation
//!
//! Elements are stored as `u8` values in `0..4`. Addition is XOR;
//! multiplication, inversion and the Frobenius automorphism use fixed
//! 16-entry and 4-entry lookup tables, so every operation is O(1) and total.
//!
//! # Frobenius
//!
//! The Frobenius map `x ↦ x²` swaps `α` and `α²` and fixes `0` and `1`. It is
//! an involution and a field automorphism: it distributes over both addition
//! and multiplication.
//!
//! # Determinism
//!
//! All operations are deterministic and platform-independent. Tables are
//! `const` data.

/// Addition table, row-major `ADD[a * 4 + b]`. Equal to `a ^ b`.
const ADD: [u8; 16] = [0, 1, 2, 3, 1, 0, 3, 2, 2, 3, 0, 1, 3, 2, 1, 0];

/// Multiplication table, row-major `MUL[a * 4 + b]`.
const MUL: [u8; 16] = [0, 0, 0, 0, 0, 1, 2, 3, 0, 2, 3, 1, 0, 3, 1, 2];

/// Multiplicative inverse. `INV[0]` is unused.
const INV: [u8; 4] = [0, 1, 3, 2];

/// Frobenius automorphism `x ↦ x²`.
const FROB: [u8; 4] = [0, 1, 3, 2];

/// Number of field elements.
pub const ORDER: usize = 4;

// ============================================================================
// Field element
// ============================================================================

/// An element of GF(4).
///
/// Wraps a `u8` in `0..4`. Constructors mask the input, so an out-of-range
/// byte can never be observed inside a `Gf4`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Gf4(u8);

impl Gf4 {
    /// The additive identity.
    pub const ZERO: Self = Self(0);

    /// The multiplicative identity.
    pub const ONE: Self = Self(1);

    /// The primitive element α (a root of x^2 + x + 1).
    pub const ALPHA: Self = Self(2);

    /// α² = α + 1.
    pub const ALPHA_SQ: Self = Self(3);

    /// All elements in encoding order.
    pub const ALL: [Self; ORDER] = [Self::ZERO, Self::ONE, Self::ALPHA, Self::ALPHA_SQ];

    /// The nonzero elements in encoding order.
    pub const NONZERO: [Self; 3] = [Self::ONE, Self::ALPHA, Self::ALPHA_SQ];

    /// Creates a field element from the low two bits of `val`.
    #[inline]
    #[must_use]
    pub const fn new(val: u8) -> Self {
        Self(val & 3)
    }

    /// Returns the 2-bit encoding.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns true if this is the zero element.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Field addition (XOR). Subtraction is the same operation.
    #[inline]
    #[must_use]
    pub const fn add(self, rhs: Self) -> Self {
        Self(ADD[(self.0 * 4 + rhs.0) as usize])
    }

    /// Field multiplication.
    #[inline]
    #[must_use]
    pub const fn mul_field(self, rhs: Self) -> Self {
        Self(MUL[(self.0 * 4 + rhs.0) as usize])
    }

    /// Multiplicative inverse.
    ///
    /// # Panics
    ///
    /// Panics if `self` is zero (zero has no multiplicative inverse).
    #[inline]
    #[must_use]
    pub fn inv(self) -> Self {
        assert!(!self.is_zero(), "cannot invert zero in GF(4)");
        Self(INV[self.0 as usize])
    }

    /// The Frobenius automorphism `x ↦ x²`.
    #[inline]
    #[must_use]
    pub const fn frobenius(self) -> Self {
        Self(FROB[self.0 as usize])
    }

    /// Exponentiation by squaring. The multiplicative group has order 3.
    #[must_use]
    pub fn pow(self, exp: u32) -> Self {
        if exp == 0 {
            return Self::ONE;
        }
        if self.is_zero() {
            return Self::ZERO;
        }
        match exp % 3 {
            0 => Self::ONE,
            1 => self,
            _ => self.mul_field(self),
        }
    }
}

impl std::fmt::Debug for Gf4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GF4({})", self.0)
    }
}

impl std::fmt::Display for Gf4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Gf4> for u8 {
    fn from(value: Gf4) -> Self {
        value.0
    }
}

impl std::ops::Add for Gf4 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::add(self, rhs)
    }
}

impl std::ops::Sub for Gf4 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::add(self, rhs)
    }
}

impl std::ops::Mul for Gf4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::mul_field(self, rhs)
    }
}

impl std::ops::Div for Gf4 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.mul_field(rhs.inv())
    }
}

impl std::ops::AddAssign for Gf4 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = Self::add(*self, rhs);
    }
}

impl std::ops::MulAssign for Gf4 {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = Self::mul_field(*self, rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_xor() {
        for a in Gf4::ALL {
            for b in Gf4::ALL {
                assert_eq!((a + b).raw(), a.raw() ^ b.raw());
            }
        }
    }

    #[test]
    fn additive_inverse_is_self() {
        for a in Gf4::ALL {
            assert_eq!(a + a, Gf4::ZERO);
        }
    }

    #[test]
    fn alpha_is_root_of_defining_polynomial() {
        // α² + α + 1 = 0
        let a = Gf4::ALPHA;
        assert_eq!(a * a + a + Gf4::ONE, Gf4::ZERO);
        assert_eq!(a * a, Gf4::ALPHA_SQ);
    }

    #[test]
    fn mul_commutative_and_associative() {
        for a in Gf4::ALL {
            for b in Gf4::ALL {
                assert_eq!(a * b, b * a);
                for c in Gf4::ALL {
                    assert_eq!((a * b) * c, a * (b * c));
                    assert_eq!(a * (b + c), a * b + a * c, "distributivity");
                }
            }
        }
    }

    #[test]
    fn inverse_roundtrip() {
        for a in Gf4::NONZERO {
            assert_eq!(a * a.inv(), Gf4::ONE, "a={a:?}");
            assert_eq!(a / a, Gf4::ONE);
        }
    }

    #[test]
    #[should_panic(expected = "cannot invert zero")]
    fn zero_has_no_inverse() {
        let _ = Gf4::ZERO.inv();
    }

    #[test]
    fn frobenius_is_involutive_automorphism() {
        for a in Gf4::ALL {
            assert_eq!(a.frobenius().frobenius(), a);
            assert_eq!(a.frobenius(), a * a);
            for b in Gf4::ALL {
                assert_eq!((a + b).frobenius(), a.frobenius() + b.frobenius());
                assert_eq!((a * b).frobenius(), a.frobenius() * b.frobenius());
            }
        }
    }

    #[test]
    fn pow_cycles_with_group_order() {
        for a in Gf4::NONZERO {
            assert_eq!(a.pow(3), Gf4::ONE);
            assert_eq!(a.pow(4), a);
        }
        assert_eq!(Gf4::ZERO.pow(0), Gf4::ONE);
        assert_eq!(Gf4::ZERO.pow(5), Gf4::ZERO);
    }

    #[test]
    fn new_masks_high_bits() {
        assert_eq!(Gf4::new(0xFE), Gf4::ALPHA);
        assert_eq!(format!("{:?}", Gf4::new(7)), "GF4(3)");
    }
}
