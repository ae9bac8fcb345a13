//! Session activity counters.

use serde::Serialize;

/// Counters describing what a session has done so far.
///
/// Serializable so callers can capture audit snapshots:
///
/// ```
/// # use tarnish::oracle::OracleStats;
/// let json = OracleStats::default().to_json().unwrap();
/// assert!(json.contains("\"queries\":0"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    /// Valid queries, authorized or not.
    pub queries: u64,
    /// Queries answered with the true vector.
    pub key_bypasses: u64,
    /// Wind events.
    pub wind_events: u64,
    /// Rank-triggered minor batches.
    pub minor_batches: u64,
    /// Rank-triggered major batches.
    pub major_batches: u64,
    /// Individual member poisonings, single and bulk.
    pub poison_events: u64,
    /// Groups that propagated poison.
    pub poison_propagations: u64,
    /// Entries into mirror mode.
    pub mirror_activations: u64,
    /// Mirror answers that carried at least one tilt.
    pub tilt_steps: u64,
    /// Frobenius batches appended on mirror exit.
    pub frobenius_resets: u64,
    /// Synthetic exit answers.
    pub synthetic_exits: u64,
    /// Rain perturbations.
    pub rain_events: u64,
}

impl OracleStats {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
