//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tarnish::dataset::{CorruptionPipeline, LineSetBuilder};
use tarnish::{AccessKey, AdjacencyMap, Dataset};

pub fn init_test_logging() {
    // Initialize tracing for tests if not already done
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Phase tracking macro for structured test logging.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Assertion with logging for better test output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

pub fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

/// About a thousand columns: 100 real and 100 decoy lines, corrupted by the
/// standard pipeline.
pub fn corrupted_lines() -> (Arc<Dataset>, Arc<AdjacencyMap>) {
    let set = LineSetBuilder::new()
        .real(100)
        .decoy(100)
        .seed(0x5eed)
        .build()
        .expect("line set");
    let dataset = CorruptionPipeline::standard(0xc0de).run(set.dataset, &set.adjacency);
    (Arc::new(dataset), Arc::new(set.adjacency))
}

pub fn secret() -> AccessKey {
    AccessKey::derive(b"integration secret", b"tarnish/tests")
}

/// Index sequence whose every 10-wide window is spread over the dataset.
pub fn wide_sequence(len: usize, count: usize) -> Vec<usize> {
    (0..count).map(|k| (k * 617) % len).collect()
}
