//! Thread-safe handle to one session.
//!
//! A session answers one query at a time. [`SharedOracle`] lets several
//! threads hold the same session and serializes their queries with a
//! `parking_lot` mutex, so each query still runs to completion before the
//! next one starts.

use std::sync::Arc;

use parking_lot::Mutex;

use super::session::Oracle;
use super::stats::OracleStats;
use crate::algebra::Gf4Vec;
use crate::dataset::{AdjacencyMap, DataSource, Dataset, GroupIndex};
use crate::error::QueryError;
use crate::security::AccessKey;

/// Cloneable, lock-protected session handle.
#[derive(Debug)]
pub struct SharedOracle<D = Dataset, A = AdjacencyMap> {
    inner: Arc<Mutex<Oracle<D, A>>>,
}

impl<D, A> Clone for SharedOracle<D, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: DataSource, A: GroupIndex> SharedOracle<D, A> {
    /// Wraps a session.
    #[must_use]
    pub fn new(oracle: Oracle<D, A>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(oracle)),
        }
    }

    /// Runs one query under the lock.
    pub fn query(&self, index: usize, key: Option<&AccessKey>) -> Result<Gf4Vec, QueryError> {
        self.inner.lock().query(index, key)
    }

    /// Copy of the current counters.
    #[must_use]
    pub fn stats(&self) -> OracleStats {
        *self.inner.lock().stats()
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Oracle<D, A>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LineSetBuilder;
    use std::thread;

    fn shared() -> SharedOracle {
        let set = LineSetBuilder::new().real(30).decoy(30).seed(5).build().unwrap();
        let oracle = crate::oracle::new_oracle(
            Arc::new(set.dataset),
            Arc::new(set.adjacency),
            AccessKey::from_seed(3),
            b"shared",
        )
        .unwrap();
        SharedOracle::new(oracle)
    }

    #[test]
    fn concurrent_callers_are_serialized() {
        let oracle = shared();
        let len = oracle.with(|o| o.dataset().len());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let oracle = oracle.clone();
                thread::spawn(move || {
                    for k in 0..25 {
                        oracle.query((t * 25 + k) * 7 % len, None).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(oracle.stats().queries, 100);
    }

    #[test]
    fn keyed_access_through_handle() {
        let oracle = shared();
        let key = AccessKey::from_seed(3);
        let truth = oracle.with(|o| o.dataset().true_vector(0)).unwrap();
        assert_eq!(oracle.query(0, Some(&key)).unwrap(), truth);
        assert!(oracle.query(usize::MAX, None).is_err());
        assert_eq!(oracle.stats().key_bypasses, 1);
    }
}
