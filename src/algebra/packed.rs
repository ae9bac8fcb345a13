//! Packed 12-symbol vectors over GF(4).
//!
//! A [`Gf4Vec`] stores symbol `i` in bits `2i..2i+2` of a `u32`. The upper
//! eight bits are always zero. Because GF(4) addition is XOR on the 2-bit
//! encoding, vector addition is a single XOR of the packed words, and
//! equality is integer equality.

use super::gf4::Gf4;

/// Number of symbols in a vector.
pub const DIM: usize = 12;

/// Mask of the 24 meaningful bits.
pub const MASK: u32 = (1 << (2 * DIM)) - 1;

/// A 12-symbol vector over GF(4), packed into 24 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Gf4Vec(u32);

impl Gf4Vec {
    /// The zero vector.
    pub const ZERO: Self = Self(0);

    /// Creates a vector from a packed word, discarding bits above 24.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & MASK)
    }

    /// Returns the packed word.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Packs 12 symbols.
    #[must_use]
    pub fn pack(symbols: &[Gf4; DIM]) -> Self {
        let mut raw = 0u32;
        for (i, s) in symbols.iter().enumerate() {
            raw |= u32::from(s.raw()) << (2 * i);
        }
        Self(raw)
    }

    /// Packs the low two bits of each byte.
    #[must_use]
    pub fn from_symbols(values: [u8; DIM]) -> Self {
        Self::pack(&values.map(Gf4::new))
    }

    /// Unpacks into 12 symbols.
    #[must_use]
    pub fn unpack(self) -> [Gf4; DIM] {
        std::array::from_fn(|i| self.get(i))
    }

    /// Returns the 2-bit encodings of the 12 symbols.
    #[must_use]
    pub fn to_symbols(self) -> [u8; DIM] {
        std::array::from_fn(|i| self.get(i).raw())
    }

    /// Returns the unit vector with `value` at position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= DIM`.
    #[must_use]
    pub fn unit(index: usize, value: Gf4) -> Self {
        Self::ZERO.with(index, value)
    }

    /// Returns symbol `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= DIM`.
    #[inline]
    #[must_use]
    pub fn get(self, index: usize) -> Gf4 {
        assert!(index < DIM, "symbol index {index} out of range");
        Gf4::new((self.0 >> (2 * index)) as u8)
    }

    /// Overwrites symbol `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= DIM`.
    #[inline]
    pub fn set(&mut self, index: usize, value: Gf4) {
        assert!(index < DIM, "symbol index {index} out of range");
        let shift = 2 * index;
        self.0 = (self.0 & !(3 << shift)) | (u32::from(value.raw()) << shift);
    }

    /// Returns a copy with symbol `index` replaced.
    #[inline]
    #[must_use]
    pub fn with(mut self, index: usize, value: Gf4) -> Self {
        self.set(index, value);
        self
    }

    /// Adds `delta` to symbol `index` in place.
    #[inline]
    pub fn add_at(&mut self, index: usize, delta: Gf4) {
        let current = self.get(index);
        self.set(index, current + delta);
    }

    /// Maps symbol `index` through the Frobenius automorphism in place.
    #[inline]
    pub fn frobenius_at(&mut self, index: usize) {
        let current = self.get(index);
        self.set(index, current.frobenius());
    }

    /// Vector addition (XOR of the packed words).
    #[inline]
    #[must_use]
    pub const fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }

    /// Multiplies every symbol by `c`.
    #[must_use]
    pub fn scale(self, c: Gf4) -> Self {
        match c.raw() {
            0 => Self::ZERO,
            1 => self,
            _ => Self::pack(&self.unpack().map(|s| s * c)),
        }
    }

    /// `self + c * other`.
    #[inline]
    #[must_use]
    pub fn scale_add(self, other: Self, c: Gf4) -> Self {
        self.add(other.scale(c))
    }

    /// Applies the Frobenius automorphism to every symbol.
    #[must_use]
    pub fn frobenius(self) -> Self {
        // x² swaps α (10) and α² (11): flip the low bit wherever the high bit is set.
        let high = (self.0 >> 1) & 0x0055_5555;
        Self(self.0 ^ high)
    }

    /// Inner product `Σ self[i] · other[i]`.
    #[must_use]
    pub fn dot(self, other: Self) -> Gf4 {
        let mut acc = Gf4::ZERO;
        for i in 0..DIM {
            acc += self.get(i) * other.get(i);
        }
        acc
    }

    /// Returns true if every symbol is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Index of the first nonzero symbol, if any.
    #[inline]
    #[must_use]
    pub fn first_nonzero(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize / 2)
        }
    }

    /// Number of nonzero symbols.
    #[inline]
    #[must_use]
    pub const fn weight(self) -> usize {
        let occupied = (self.0 | (self.0 >> 1)) & 0x0055_5555;
        occupied.count_ones() as usize
    }

    /// Number of positions where `self` and `other` differ.
    #[inline]
    #[must_use]
    pub const fn hamming(self, other: Self) -> usize {
        Self(self.0 ^ other.0).weight()
    }

    /// Scales the vector so its first nonzero symbol is one.
    ///
    /// Returns `None` for the zero vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let lead = self.first_nonzero()?;
        Some(self.scale(self.get(lead).inv()))
    }
}

impl std::fmt::Debug for Gf4Vec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gf4Vec(")?;
        for i in 0..DIM {
            write!(f, "{}", self.get(i).raw())?;
        }
        write!(f, ")")
    }
}

impl std::fmt::Display for Gf4Vec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..DIM {
            write!(f, "{}", self.get(i).raw())?;
        }
        Ok(())
    }
}

impl std::ops::Add for Gf4Vec {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::add(self, rhs)
    }
}

impl std::ops::AddAssign for Gf4Vec {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = Self::add(*self, rhs);
    }
}

impl From<[Gf4; DIM]> for Gf4Vec {
    fn from(symbols: [Gf4; DIM]) -> Self {
        Self::pack(&symbols)
    }
}

impl From<Gf4Vec> for [Gf4; DIM] {
    fn from(v: Gf4Vec) -> Self {
        v.unpack()
    }
}

impl serde::Serialize for Gf4Vec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_symbols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Gf4Vec {
        Gf4Vec::from_symbols([0, 1, 2, 3, 3, 2, 1, 0, 1, 1, 2, 3])
    }

    #[test]
    fn pack_unpack_inverse() {
        let v = sample();
        assert_eq!(Gf4Vec::pack(&v.unpack()), v);
        assert_eq!(v.to_symbols(), [0, 1, 2, 3, 3, 2, 1, 0, 1, 1, 2, 3]);
        for raw in [0, 1, MASK, 0x00AB_CDEF, 0x0012_3456] {
            let v = Gf4Vec::from_raw(raw);
            assert_eq!(Gf4Vec::pack(&v.unpack()).raw(), raw);
        }
    }

    #[test]
    fn from_raw_masks_upper_bits() {
        assert_eq!(Gf4Vec::from_raw(u32::MAX).raw(), MASK);
    }

    #[test]
    fn set_and_get_single_symbol() {
        let mut v = Gf4Vec::ZERO;
        v.set(11, Gf4::ALPHA_SQ);
        v.set(0, Gf4::ALPHA);
        assert_eq!(v.get(11), Gf4::ALPHA_SQ);
        assert_eq!(v.get(0), Gf4::ALPHA);
        assert_eq!(v.weight(), 2);
        v.set(11, Gf4::ZERO);
        assert_eq!(v.weight(), 1);
    }

    #[test]
    fn add_matches_symbolwise_field_add() {
        let a = sample();
        let b = Gf4Vec::from_symbols([3, 3, 3, 3, 0, 0, 0, 0, 1, 2, 3, 1]);
        let sum = a + b;
        for i in 0..DIM {
            assert_eq!(sum.get(i), a.get(i) + b.get(i));
        }
        assert_eq!(a + a, Gf4Vec::ZERO);
    }

    #[test]
    fn frobenius_matches_symbolwise() {
        let v = sample();
        let f = v.frobenius();
        for i in 0..DIM {
            assert_eq!(f.get(i), v.get(i).frobenius());
        }
        assert_eq!(f.frobenius(), v);
    }

    #[test]
    fn scale_and_dot() {
        let v = sample();
        assert_eq!(v.scale(Gf4::ZERO), Gf4Vec::ZERO);
        assert_eq!(v.scale(Gf4::ONE), v);
        let s = v.scale(Gf4::ALPHA);
        for i in 0..DIM {
            assert_eq!(s.get(i), v.get(i) * Gf4::ALPHA);
        }
        let e3 = Gf4Vec::unit(3, Gf4::ONE);
        assert_eq!(v.dot(e3), v.get(3));
    }

    #[test]
    fn hamming_counts_symbol_positions() {
        let a = sample();
        // 1 -> 2 and 2 -> 1 differ in both bits; still one position each.
        let b = a.with(1, Gf4::ALPHA).with(2, Gf4::ONE);
        assert_eq!(a.hamming(b), 2);
        assert_eq!(a.hamming(a), 0);
        assert_eq!(Gf4Vec::ZERO.hamming(Gf4Vec::from_raw(MASK)), DIM);
    }

    #[test]
    fn first_nonzero_and_normalized() {
        assert_eq!(Gf4Vec::ZERO.first_nonzero(), None);
        assert_eq!(Gf4Vec::ZERO.normalized(), None);
        let v = Gf4Vec::unit(5, Gf4::ALPHA).with(7, Gf4::ONE);
        assert_eq!(v.first_nonzero(), Some(5));
        let n = v.normalized().unwrap();
        assert_eq!(n.get(5), Gf4::ONE);
        assert_eq!(n.get(7), Gf4::ALPHA_SQ);
    }

    #[test]
    fn display_is_symbol_string() {
        assert_eq!(sample().to_string(), "012332101123");
        assert_eq!(format!("{:?}", sample()), "Gf4Vec(012332101123)");
    }
}
