//! Projective line generation.
//!
//! A line of PG(11, 4) is a 2-dimensional subspace of GF(4)^12. Its 15
//! nonzero vectors fall into 5 classes under scaling, so every line has
//! exactly 5 normalized points. Lines are the natural groups of the guarded
//! dataset: knowing any two points of a line determines the other three.
//!
//! Real and decoy lines differ in structure. Real lines come from a
//! Desarguesian spread: GF(4)^12 is read as GF(16)^6, and every point of
//! PG(5, 16) becomes the line of its 15 nonzero GF(16) multiples. Distinct
//! GF(16) points give disjoint lines, so real lines never share a point.
//! Decoy lines are spans of two random vectors and overlap freely.

use std::collections::{HashMap, HashSet};

use super::{Column, ColumnKind, Dataset};
use crate::algebra::{DIM, Gf4, Gf4Vec};
use crate::dataset::AdjacencyMap;
use crate::error::ConfigError;
use crate::util::DetRng;

/// Points on a projective line over GF(4).
pub const POINTS_PER_LINE: usize = 5;

/// Default number of real lines.
pub const DEFAULT_REAL_LINES: usize = 500;

/// Default number of decoy lines.
pub const DEFAULT_DECOY_LINES: usize = 500;

const DEFAULT_SEED: u64 = 0x7a61_7a65_6c5f_7067;

/// The points of one line, in generation order.
pub type Line = [Gf4Vec; POINTS_PER_LINE];

/// Deterministic generator of real and decoy lines.
///
/// ```
/// use tarnish::dataset::LineSetBuilder;
///
/// let set = LineSetBuilder::new().real(10).decoy(10).seed(7).build().unwrap();
/// assert_eq!(set.real_lines.len(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct LineSetBuilder {
    real: usize,
    decoy: usize,
    seed: u64,
    attempts_per_line: usize,
}

impl Default for LineSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSetBuilder {
    /// Creates a builder with the default counts and seed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            real: DEFAULT_REAL_LINES,
            decoy: DEFAULT_DECOY_LINES,
            seed: DEFAULT_SEED,
            attempts_per_line: 5,
        }
    }

    /// Sets the number of real lines.
    #[must_use]
    pub const fn real(mut self, count: usize) -> Self {
        self.real = count;
        self
    }

    /// Sets the number of decoy lines.
    #[must_use]
    pub const fn decoy(mut self, count: usize) -> Self {
        self.decoy = count;
        self
    }

    /// Sets the generation seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generates the lines and interns their points into a dataset.
    ///
    /// Real and decoy lines come from independent streams. A line is never
    /// emitted twice. Generation gives up on a kind after
    /// `5 × count` attempts, so the result may hold fewer lines than asked
    /// for; it fails only if no column was produced at all.
    pub fn build(&self) -> Result<LineSet, ConfigError> {
        let mut root = DetRng::new(self.seed);
        let mut real_rng = root.split();
        let mut decoy_rng = root.split();

        let mut seen = HashSet::new();
        let real_lines = self.generate(&mut real_rng, self.real, &mut seen, spread_sampler());
        let decoy_lines = self.generate(&mut decoy_rng, self.decoy, &mut seen, random_span);

        let mut index: HashMap<Gf4Vec, usize> = HashMap::new();
        let mut columns: Vec<Column> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::with_capacity(real_lines.len() + decoy_lines.len());

        for (lines, kind) in [
            (&real_lines, ColumnKind::Real),
            (&decoy_lines, ColumnKind::Decoy),
        ] {
            for line in lines {
                let members = line
                    .iter()
                    .map(|&p| {
                        *index.entry(p).or_insert_with(|| {
                            columns.push(Column::clean(p, kind));
                            columns.len() - 1
                        })
                    })
                    .collect();
                groups.push(members);
            }
        }

        let len = columns.len();
        let dataset = Dataset::from_columns(columns)?;
        let adjacency = AdjacencyMap::from_groups(groups, len);
        adjacency.validate(len)?;
        tracing::debug!(
            real = real_lines.len(),
            decoy = decoy_lines.len(),
            columns = len,
            "line set generated"
        );
        Ok(LineSet {
            dataset,
            adjacency,
            real_lines,
            decoy_lines,
        })
    }

    fn generate(
        &self,
        rng: &mut DetRng,
        count: usize,
        seen: &mut HashSet<Line>,
        mut draw: impl FnMut(&mut DetRng) -> Option<Line>,
    ) -> Vec<Line> {
        let mut lines = Vec::with_capacity(count);
        let budget = count.saturating_mul(self.attempts_per_line);
        let mut attempts = 0;
        while lines.len() < count && attempts < budget {
            attempts += 1;
            let Some(line) = draw(rng) else {
                continue;
            };
            let mut key = line;
            key.sort_unstable();
            if seen.insert(key) {
                lines.push(line);
            }
        }
        lines
    }
}

/// Element `a + b·t` of GF(16), built as GF(4)[t] / (t² + t + α).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Gf16 {
    a: Gf4,
    b: Gf4,
}

impl Gf16 {
    const ZERO: Self = Self {
        a: Gf4::ZERO,
        b: Gf4::ZERO,
    };

    const ONE: Self = Self {
        a: Gf4::ONE,
        b: Gf4::ZERO,
    };

    /// The element with encoding `bits` (low two bits `a`, next two `b`).
    const fn from_bits(bits: u8) -> Self {
        Self {
            a: Gf4::new(bits),
            b: Gf4::new(bits >> 2),
        }
    }

    fn mul(self, rhs: Self) -> Self {
        let bb = self.b * rhs.b;
        Self {
            a: self.a * rhs.a + bb * Gf4::ALPHA,
            b: self.a * rhs.b + self.b * rhs.a + bb,
        }
    }

    /// `x^14`, the inverse in a group of order 15. Zero maps to zero.
    fn inv(self) -> Self {
        (0..14).fold(Self::ONE, |acc, _| acc.mul(self))
    }
}

/// A point of PG(5, 16) scaled so its first nonzero coordinate is one.
type SpreadPoint = [Gf16; 6];

fn random_spread_point(rng: &mut DetRng) -> Option<SpreadPoint> {
    let raw: SpreadPoint = std::array::from_fn(|_| Gf16::from_bits(rng.next_usize(16) as u8));
    let lead = raw.iter().copied().find(|&x| x != Gf16::ZERO)?;
    let inv = lead.inv();
    Some(raw.map(|x| inv.mul(x)))
}

/// The 5 GF(4) points of the spread line through `point`.
fn spread_line(point: &SpreadPoint) -> Option<Line> {
    let mut points = Vec::with_capacity(POINTS_PER_LINE);
    for bits in 1..16 {
        let s = Gf16::from_bits(bits);
        let mut v = Gf4Vec::ZERO;
        for (k, &x) in point.iter().enumerate() {
            let sx = s.mul(x);
            v.set(2 * k, sx.a);
            v.set(2 * k + 1, sx.b);
        }
        let Some(p) = v.normalized() else { continue };
        if !points.contains(&p) {
            points.push(p);
        }
    }
    <Line>::try_from(points).ok()
}

/// Draws spread lines, never the same GF(16) point twice.
fn spread_sampler() -> impl FnMut(&mut DetRng) -> Option<Line> {
    let mut used: HashSet<SpreadPoint> = HashSet::new();
    move |rng| {
        let point = random_spread_point(rng)?;
        if !used.insert(point) {
            return None;
        }
        spread_line(&point)
    }
}

fn random_span(rng: &mut DetRng) -> Option<Line> {
    let v1 = random_vector(rng);
    let v2 = random_vector(rng);
    span_points(v1, v2)
}

fn random_vector(rng: &mut DetRng) -> Gf4Vec {
    let mut symbols = [0u8; DIM];
    for s in &mut symbols {
        *s = rng.next_symbol();
    }
    Gf4Vec::from_symbols(symbols)
}

/// Returns the normalized points of `span(v1, v2)`, or `None` if the two
/// vectors do not span a line.
#[must_use]
pub fn span_points(v1: Gf4Vec, v2: Gf4Vec) -> Option<Line> {
    let mut points = Vec::with_capacity(POINTS_PER_LINE);
    for c1 in Gf4::ALL {
        for c2 in Gf4::ALL {
            let Some(p) = v1.scale(c1).scale_add(v2, c2).normalized() else {
                continue;
            };
            if !points.contains(&p) {
                points.push(p);
            }
        }
    }
    <Line>::try_from(points).ok()
}

/// Generated lines and the dataset built from their points.
#[derive(Debug, Clone)]
pub struct LineSet {
    /// One column per distinct point. Visible equals truth.
    pub dataset: Dataset,
    /// One group per line: real lines first, then decoys.
    pub adjacency: AdjacencyMap,
    /// Real lines in generation order.
    pub real_lines: Vec<Line>,
    /// Decoy lines in generation order.
    pub decoy_lines: Vec<Line>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataSource, GroupIndex};

    #[test]
    fn span_of_independent_vectors_has_five_points() {
        let e0 = Gf4Vec::unit(0, Gf4::ONE);
        let e1 = Gf4Vec::unit(1, Gf4::ONE);
        let line = span_points(e0, e1).expect("independent");
        for p in line {
            assert_eq!(p.normalized(), Some(p));
        }
        assert!(line.contains(&e0));
        assert!(line.contains(&e1));
        assert!(line.contains(&e0.add(e1)));
    }

    #[test]
    fn dependent_vectors_are_not_a_line() {
        let v = Gf4Vec::from_symbols([1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(span_points(v, v.scale(Gf4::ALPHA)).is_none());
        assert!(span_points(v, Gf4Vec::ZERO).is_none());
    }

    #[test]
    fn gf16_field_laws() {
        let t = Gf16::from_bits(0b0100);
        // t² = t + α
        assert_eq!(
            t.mul(t),
            Gf16 {
                a: Gf4::ALPHA,
                b: Gf4::ONE
            }
        );
        for bits in 1..16 {
            let x = Gf16::from_bits(bits);
            assert_eq!(x.mul(x.inv()), Gf16::ONE, "{x:?}");
            assert_eq!(x.mul(Gf16::ZERO), Gf16::ZERO);
        }
    }

    #[test]
    fn spread_line_is_a_projective_line() {
        let mut rng = DetRng::new(21);
        for _ in 0..50 {
            let Some(point) = random_spread_point(&mut rng) else {
                continue;
            };
            let mut line = spread_line(&point).expect("five points");
            let mut span = span_points(line[0], line[1]).expect("independent");
            line.sort_unstable();
            span.sort_unstable();
            assert_eq!(line, span);
        }
    }

    #[test]
    fn real_lines_are_pairwise_disjoint() {
        let set = LineSetBuilder::new().real(300).decoy(50).seed(17).build().unwrap();
        assert_eq!(set.real_lines.len(), 300);
        let points: HashSet<Gf4Vec> = set.real_lines.iter().flatten().copied().collect();
        assert_eq!(points.len(), 300 * POINTS_PER_LINE);

        let mut shared_with_decoy = 0;
        let mut decoy_points = HashSet::new();
        for line in &set.decoy_lines {
            for p in line {
                if !decoy_points.insert(*p) || points.contains(p) {
                    shared_with_decoy += 1;
                }
            }
        }
        // Random spans are not constrained; they only rarely collide.
        assert!(shared_with_decoy < 5);
    }

    #[test]
    fn builder_yields_valid_adjacency() {
        let set = LineSetBuilder::new().real(40).decoy(30).seed(11).build().unwrap();
        assert_eq!(set.real_lines.len(), 40);
        assert_eq!(set.decoy_lines.len(), 30);
        assert_eq!(set.adjacency.group_count(), 70);
        assert!(set.adjacency.validate(set.dataset.len()).is_ok());

        for (g, line) in set.real_lines.iter().enumerate() {
            let members = set.adjacency.members_of(g);
            assert_eq!(members.len(), POINTS_PER_LINE);
            for (&m, &p) in members.iter().zip(line) {
                assert_eq!(set.dataset.true_vector(m), Some(p));
                assert_eq!(set.dataset.visible_vector(m), Some(p));
                assert!(!set.dataset.is_decoy(m));
            }
        }
    }

    #[test]
    fn builder_is_deterministic_per_seed() {
        let a = LineSetBuilder::new().real(20).decoy(20).seed(3).build().unwrap();
        let b = LineSetBuilder::new().real(20).decoy(20).seed(3).build().unwrap();
        let c = LineSetBuilder::new().real(20).decoy(20).seed(4).build().unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(a.adjacency, b.adjacency);
        assert_ne!(a.real_lines, c.real_lines);
    }

    #[test]
    fn empty_request_fails() {
        let err = LineSetBuilder::new().real(0).decoy(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyDataset));
    }
}
