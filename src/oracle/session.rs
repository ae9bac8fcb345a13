//! One oracle session and its query path.
//!
//! # Query path
//!
//! ```text
//! index ──► range check ──► qc += 1 ──► key? ──yes──► truth
//!                                        │
//!                                        no
//!                                        ▼
//!                              advance hash chain
//!                                        │
//!                                        ▼
//!                   mirror step ──(tilt / exit / activation)──► answer
//!                                        │
//!                                     normal
//!                                        ▼
//!        wind ─► rank batches ─► poison ─► T·(visible + poison) ─► rain
//! ```
//!
//! A rejected index touches nothing. Every other step is total.

use std::sync::Arc;

use tracing::{debug, trace};

use super::mirror::{self, ConvergenceDetector, Mirror, MirrorStep, Mode};
use super::poison::{self, PoisonAccumulator};
use super::stats::OracleStats;
use super::tables::DefenseTables;
use super::transform::{DeferredTransform, Intensity, RowOpBatch};
use super::wind::WindState;
use crate::algebra::{DIM, Gf4, Gf4Vec, RankTracker};
use crate::config::OracleConfig;
use crate::dataset::adjacency::validate_index;
use crate::dataset::{AdjacencyMap, DataSource, Dataset, GroupIndex};
use crate::error::{ConfigError, QueryError};
use crate::security::AccessKey;
use crate::util::{DetRng, StateChain};

/// Creates a session with the default tables and configuration.
pub fn new_oracle<D, A>(
    dataset: Arc<D>,
    adjacency: Arc<A>,
    secret_key: AccessKey,
    session_salt: &[u8],
) -> Result<Oracle<D, A>, ConfigError>
where
    D: DataSource,
    A: GroupIndex,
{
    Oracle::builder(dataset, adjacency)
        .secret_key(secret_key)
        .salt(session_salt)
        .build()
}

/// Builder for [`Oracle`].
#[derive(Debug)]
pub struct OracleBuilder<D, A> {
    dataset: Arc<D>,
    adjacency: Arc<A>,
    secret_key: Option<AccessKey>,
    salt: Option<Vec<u8>>,
    tables: Option<Arc<DefenseTables>>,
    config: OracleConfig,
}

impl<D: DataSource, A: GroupIndex> OracleBuilder<D, A> {
    /// Sets the key that unlocks exact answers. Required.
    #[must_use]
    pub fn secret_key(mut self, key: AccessKey) -> Self {
        self.secret_key = Some(key);
        self
    }

    /// Sets the per-session salt. Required.
    #[must_use]
    pub fn salt(mut self, salt: impl AsRef<[u8]>) -> Self {
        self.salt = Some(salt.as_ref().to_vec());
        self
    }

    /// Shares prebuilt tables. Defaults to [`DefenseTables::default`].
    #[must_use]
    pub fn tables(mut self, tables: Arc<DefenseTables>) -> Self {
        self.tables = Some(tables);
        self
    }

    /// Overrides the policy configuration.
    #[must_use]
    pub fn config(mut self, config: OracleConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates every input and creates the session.
    pub fn build(self) -> Result<Oracle<D, A>, ConfigError> {
        self.config.validate()?;
        let secret = self
            .secret_key
            .ok_or_else(|| ConfigError::InvalidPolicy("secret key must be set".into()))?;
        let salt = self
            .salt
            .ok_or_else(|| ConfigError::InvalidPolicy("session salt must be set".into()))?;

        let len = self.dataset.len();
        if len == 0 {
            return Err(ConfigError::EmptyDataset);
        }
        if u32::try_from(len).is_err() {
            return Err(ConfigError::InvalidPolicy(format!(
                "dataset of {len} columns exceeds the 32-bit index space"
            )));
        }
        validate_index(self.adjacency.as_ref(), len)?;

        let tables = self.tables.unwrap_or_default();
        let chain = StateChain::new(tables.root(), &salt);
        let rng = DetRng::from_seed_bytes(chain.state());
        let config = self.config;

        debug!(
            columns = len,
            groups = self.adjacency.group_count(),
            rank_window = config.rank_window,
            flatten_threshold = config.flatten_threshold,
            "oracle session created"
        );

        Ok(Oracle {
            dataset: self.dataset,
            adjacency: self.adjacency,
            secret,
            transform: DeferredTransform::new(config.flatten_threshold),
            tracker: RankTracker::new(config.rank_window, config.rebuild_interval),
            convergence: ConvergenceDetector::new(
                config.history_capacity,
                config.convergence_window,
                config.convergence_threshold,
                config.convergence_hits,
            ),
            mirror: Mirror::new(),
            wind: WindState::new(tables.wind()),
            poison: PoisonAccumulator::new(),
            poison_rate: config.poison_rate_initial,
            chain,
            rng,
            query_count: 0,
            stats: OracleStats::default(),
            tables,
            config,
        })
    }
}

/// One isolated oracle session.
///
/// Sessions built from the same inputs answer the same query sequence
/// identically. Sessions with different salts diverge after the first
/// unauthorized query.
#[derive(Debug)]
pub struct Oracle<D = Dataset, A = AdjacencyMap> {
    dataset: Arc<D>,
    adjacency: Arc<A>,
    tables: Arc<DefenseTables>,
    config: OracleConfig,
    secret: AccessKey,
    transform: DeferredTransform,
    tracker: RankTracker,
    convergence: ConvergenceDetector,
    mirror: Mirror,
    wind: WindState,
    poison: PoisonAccumulator,
    poison_rate: f64,
    chain: StateChain,
    rng: DetRng,
    query_count: u64,
    stats: OracleStats,
}

impl<D: DataSource, A: GroupIndex> Oracle<D, A> {
    /// Starts building a session over shared data.
    #[must_use]
    pub fn builder(dataset: Arc<D>, adjacency: Arc<A>) -> OracleBuilder<D, A> {
        OracleBuilder {
            dataset,
            adjacency,
            secret_key: None,
            salt: None,
            tables: None,
            config: OracleConfig::default(),
        }
    }

    /// Answers a query for column `index`.
    ///
    /// With the secret key the answer is the true vector. Without it the
    /// answer is derived from the visible vector and the session's
    /// defensive state, which this call advances.
    pub fn query(&mut self, index: usize, key: Option<&AccessKey>) -> Result<Gf4Vec, QueryError> {
        let len = self.dataset.len();
        let (Some(truth), Some(visible)) = (
            self.dataset.true_vector(index),
            self.dataset.visible_vector(index),
        ) else {
            return Err(QueryError::InvalidIndex { index, len });
        };

        self.query_count += 1;
        self.stats.queries += 1;

        if key.is_some_and(|k| self.secret.verify(k)) {
            self.stats.key_bypasses += 1;
            return Ok(truth);
        }

        self.chain.advance(index as u32);

        if let Some(answer) = self.mirror_step(index, truth, visible, len) {
            return Ok(answer);
        }

        if self
            .wind
            .tick(self.query_count, &self.chain, &mut self.rng, &mut self.transform)
            .is_some()
        {
            self.stats.wind_events += 1;
        }

        let rank = self.tracker.add(visible);
        self.rank_response(rank);

        let outcome = poison::propagate(
            &mut self.poison,
            self.tables.bank(),
            self.adjacency.as_ref(),
            &mut self.rng,
            index,
            self.query_count,
            len,
            self.poison_rate,
        );
        self.stats.poison_events += outcome.events;
        self.stats.poison_propagations += outcome.groups;

        let answer = self.transform.apply(visible.add(self.poison.get(index)));
        Ok(self.rain(answer, rank))
    }

    /// Mirror handling. Returns the answer when mirror mode owns this query.
    fn mirror_step(&mut self, index: usize, truth: Gf4Vec, visible: Gf4Vec, len: usize) -> Option<Gf4Vec> {
        match self.mirror.step(&self.config.tilt_schedule) {
            Some(MirrorStep::Exit) => return Some(self.synthetic_exit(index, truth, visible)),
            Some(MirrorStep::Tilt {
                perturbations,
                snapshot,
            }) => {
                let tilted = mirror::tilt(visible, perturbations, &mut self.rng);
                if perturbations > 0 {
                    self.stats.tilt_steps += 1;
                }
                return Some(snapshot.mul_vec(tilted));
            }
            None => {}
        }

        if !self.convergence.observe(index, len) {
            return None;
        }
        let snapshot = self.transform.snapshot();
        self.mirror.activate(snapshot, self.config.mirror_countdown);
        self.stats.mirror_activations += 1;
        debug!(
            query_count = self.query_count,
            countdown = self.config.mirror_countdown,
            activations = self.stats.mirror_activations,
            "mirror mode activated"
        );
        Some(snapshot.mul_vec(visible))
    }

    /// Leaves mirror mode: reseeds the live transform, bulk-poisons the
    /// recent neighbourhood and emits a near-correct decoy.
    fn synthetic_exit(&mut self, index: usize, truth: Gf4Vec, visible: Gf4Vec) -> Gf4Vec {
        let digest = self.chain.derive(b"mirror-exit");
        self.transform
            .extend(&RowOpBatch::generate(&digest, Intensity::Frobenius));
        self.stats.frobenius_resets += 1;

        let recent: Vec<usize> = self.convergence.recent(self.config.bulk_poison_depth).collect();
        let outcome = poison::bulk_poison(
            &mut self.poison,
            self.tables.bank(),
            self.adjacency.as_ref(),
            &mut self.rng,
            recent,
        );
        self.stats.poison_events += outcome.events;

        self.convergence.clear_hits();
        self.stats.synthetic_exits += 1;
        debug!(
            query_count = self.query_count,
            index,
            bulk_poisoned = outcome.events,
            "mirror mode exited"
        );
        mirror::synthetic(
            visible,
            truth,
            self.config.synthetic_truth_probability,
            &mut self.rng,
        )
    }

    /// Extra batches and poisoning pressure driven by the window rank.
    fn rank_response(&mut self, rank: usize) {
        let qc = self.query_count;
        if rank >= self.config.rank_minor_threshold {
            let digest = self.chain.derive_counted(b"rank-minor", qc);
            self.transform
                .extend(&RowOpBatch::generate(&digest, Intensity::Minor));
            self.stats.minor_batches += 1;
        }
        if rank >= self.config.rank_major_threshold {
            let digest = self.chain.derive_counted(b"rank-major", qc);
            self.transform
                .extend(&RowOpBatch::generate(&digest, Intensity::Major));
            self.stats.major_batches += 1;
        }
        if rank >= self.config.rank_major_threshold {
            self.poison_rate = (self.poison_rate + 0.05).min(self.config.poison_rate_cap);
        } else if rank >= self.config.rank_minor_threshold {
            self.poison_rate = (self.poison_rate + 0.02).min(self.config.poison_rate_mid_cap);
        }
        if rank >= self.config.rank_minor_threshold {
            trace!(rank, qc, poison_rate = self.poison_rate, "rank-triggered batch");
        }
    }

    /// Low-rate coordinate noise applied to the final answer.
    fn rain(&mut self, mut answer: Gf4Vec, rank: usize) -> Gf4Vec {
        let roll = self.rng.next_u64() % 8;
        let drops = if rank >= self.config.rain_elevated_threshold {
            usize::from(roll < 4)
        } else if roll < 2 {
            1
        } else if roll == 7 {
            3
        } else {
            0
        };
        for _ in 0..drops {
            let coord = self.rng.next_in(0, DIM - 1);
            answer.add_at(coord, Gf4::new(self.rng.next_in(1, 3) as u8));
        }
        self.stats.rain_events += drops as u64;
        answer
    }

    /// Activity counters.
    #[must_use]
    pub const fn stats(&self) -> &OracleStats {
        &self.stats
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mirror.mode()
    }

    /// Current window rank.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.tracker.rank()
    }

    /// Accumulated poison of column `index`.
    #[must_use]
    pub fn poison_of(&self, index: usize) -> Gf4Vec {
        self.poison.get(index)
    }

    /// Current poisoning probability.
    #[must_use]
    pub const fn poison_rate(&self) -> f64 {
        self.poison_rate
    }

    /// The live transform.
    #[must_use]
    pub const fn transform(&self) -> &DeferredTransform {
        &self.transform
    }

    /// Valid queries answered so far.
    #[must_use]
    pub const fn query_count(&self) -> u64 {
        self.query_count
    }

    /// The active policy.
    #[must_use]
    pub const fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// The rank tracker.
    #[must_use]
    pub const fn tracker(&self) -> &RankTracker {
        &self.tracker
    }

    /// The shared dataset.
    #[must_use]
    pub fn dataset(&self) -> &D {
        &self.dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnKind};

    fn fixture(n: usize) -> (Arc<Dataset>, Arc<AdjacencyMap>) {
        let mut rng = DetRng::new(77);
        let columns = (0..n)
            .map(|_| {
                let truth = Gf4Vec::from_raw(rng.next_u32());
                let visible = truth.add(Gf4Vec::from_raw(rng.next_u32() | 1));
                Column {
                    truth,
                    visible,
                    kind: ColumnKind::Real,
                }
            })
            .collect();
        let groups = (0..n / 5).map(|g| (g * 5..g * 5 + 5).collect()).collect();
        (
            Arc::new(Dataset::from_columns(columns).unwrap()),
            Arc::new(AdjacencyMap::from_groups(groups, n)),
        )
    }

    fn session(salt: &[u8]) -> Oracle {
        let (ds, adj) = fixture(200);
        new_oracle(ds, adj, AccessKey::from_seed(1), salt).unwrap()
    }

    #[test]
    fn builder_requires_key_and_salt() {
        let (ds, adj) = fixture(10);
        let err = Oracle::builder(ds.clone(), adj.clone()).salt(b"s").build().unwrap_err();
        assert!(err.to_string().contains("secret key"));
        let err = Oracle::builder(ds, adj)
            .secret_key(AccessKey::from_seed(1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("salt"));
    }

    #[test]
    fn builder_rejects_bad_inputs() {
        let (ds, _) = fixture(10);
        let dangling = Arc::new(AdjacencyMap::from_groups(vec![vec![0, 42]], 10));
        let err = new_oracle(ds.clone(), dangling, AccessKey::from_seed(1), b"s").unwrap_err();
        assert!(matches!(err, ConfigError::DanglingMember { index: 42, .. }));

        let config = OracleConfig {
            flatten_threshold: 64,
            ..OracleConfig::default()
        };
        let err = Oracle::builder(ds, Arc::new(AdjacencyMap::default()))
            .secret_key(AccessKey::from_seed(1))
            .salt(b"s")
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPolicy(_)));
    }

    #[test]
    fn keyed_queries_bypass_state() {
        let mut o = session(b"k");
        let key = AccessKey::from_seed(1);
        for i in 0..50 {
            let truth = o.dataset().true_vector(i).unwrap();
            assert_eq!(o.query(i, Some(&key)).unwrap(), truth);
        }
        assert_eq!(o.stats().key_bypasses, 50);
        assert_eq!(o.stats().queries, 50);
        assert_eq!(o.transform().appended(), 0);
        assert_eq!(o.rank(), 0);
    }

    #[test]
    fn wrong_key_is_unauthorized() {
        let mut o = session(b"k");
        o.query(3, Some(&AccessKey::from_seed(2))).unwrap();
        assert_eq!(o.stats().key_bypasses, 0);
        assert_eq!(o.tracker().len(), 1);
    }

    #[test]
    fn invalid_index_mutates_nothing() {
        let mut o = session(b"i");
        o.query(5, None).unwrap();
        let stats = *o.stats();
        let appended = o.transform().appended();
        let err = o.query(200, None).unwrap_err();
        assert_eq!(err, QueryError::InvalidIndex { index: 200, len: 200 });
        assert_eq!(*o.stats(), stats);
        assert_eq!(o.query_count(), 1);
        assert_eq!(o.transform().appended(), appended);
        assert_eq!(o.tracker().len(), 1);
    }

    #[test]
    fn sessions_are_reproducible() {
        let mut a = session(b"same");
        let mut b = session(b"same");
        for k in 0..150 {
            let j = (k * 37) % 200;
            assert_eq!(a.query(j, None).unwrap(), b.query(j, None).unwrap());
        }
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn narrow_probing_enters_mirror_and_exits_synthetic() {
        let mut o = session(b"m");
        for j in 100..114 {
            o.query(j, None).unwrap();
        }
        assert!(matches!(o.mode(), Mode::MirrorActive { countdown: 10 }));
        assert_eq!(o.stats().mirror_activations, 1);

        for _ in 0..9 {
            o.query(100, None).unwrap();
        }
        assert!(matches!(o.mode(), Mode::MirrorActive { countdown: 1 }));
        let before = o.transform().appended();
        o.query(101, None).unwrap();
        assert_eq!(o.mode(), Mode::SyntheticExit);
        assert_eq!(o.stats().synthetic_exits, 1);
        assert_eq!(o.stats().frobenius_resets, 1);
        assert!(o.transform().appended() >= before + 8);
        assert!(o.stats().poison_events > 0);
        assert!(o.stats().tilt_steps > 0);

        o.query(0, None).unwrap();
        assert_eq!(o.mode(), Mode::Normal);
    }

    #[test]
    fn synthetic_exit_answer_is_nearer_truth_than_visible() {
        let (ds, _) = fixture(200);
        let target = (0..200)
            .max_by_key(|&j| ds.column(j).map_or(0, Column::distortion))
            .unwrap();
        let col = *ds.column(target).unwrap();
        let visible_distance = col.distortion();

        let mut answer_total = 0;
        for salt in 0u8..20 {
            let mut o = session(&[b'x', salt]);
            for j in 100..114 {
                o.query(j, None).unwrap();
            }
            for _ in 0..9 {
                o.query(100, None).unwrap();
            }
            let answer = o.query(target, None).unwrap();
            assert_eq!(o.mode(), Mode::SyntheticExit);
            let distance = col.truth.hamming(answer);
            assert!(distance <= visible_distance);
            answer_total += distance;
        }
        assert!(answer_total * 3 < visible_distance * 20, "{answer_total} vs {visible_distance}");
    }

    #[test]
    fn rank_pressure_raises_poison_rate() {
        let mut o = session(b"r");
        for k in 0..20 {
            let j = (k * 71) % 200;
            o.query(j, None).unwrap();
        }
        assert!(o.rank() >= 6);
        assert!(o.rank() <= DIM);
        assert!(o.stats().minor_batches > 0);
        assert!(o.stats().major_batches > 0);
        assert!(o.poison_rate() > o.config().poison_rate_initial);
        assert!(o.poison_rate() <= o.config().poison_rate_cap);
    }
}
