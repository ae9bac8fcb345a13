//! Policy configuration for oracle sessions.
//!
//! This module provides:
//! - [`OracleConfig`], the tunable policy constants with their defaults
//! - Validation of the structural invariants those constants must respect
//! - Layered loading (defaults, then an optional file, then env overrides)
//!
//! Note: File parsing is intentionally minimal and deterministic. The format
//! is `key = value` lines grouped under `[section]` headers; `#` and `//`
//! start comments.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TARNISH_";

/// Largest allowed pending row-op log before compaction.
pub const MAX_FLATTEN_THRESHOLD: usize = 32;

/// Largest allowed number of insertions between exact rank rebuilds.
pub const MAX_REBUILD_INTERVAL: usize = 8;

/// Tunable policy constants for one oracle session.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OracleConfig {
    /// Rank tracking window (distinct vectors).
    pub rank_window: usize,
    /// Insertions between exact rank rebuilds.
    pub rebuild_interval: usize,
    /// Pending row ops that trigger transform compaction.
    pub flatten_threshold: usize,
    /// Rank at which every query adds a minor batch.
    pub rank_minor_threshold: usize,
    /// Rank at which every query adds a major batch.
    pub rank_major_threshold: usize,
    /// Rank at which rain runs at the elevated rate.
    pub rain_elevated_threshold: usize,
    /// Recent queried indices retained for convergence and bulk poisoning.
    pub history_capacity: usize,
    /// Indices used for each convergence evaluation.
    pub convergence_window: usize,
    /// Normalized variance below which a window counts as converging.
    pub convergence_threshold: f64,
    /// Converging evaluations needed to enter mirror mode.
    pub convergence_hits: u32,
    /// Queries answered in mirror mode before the synthetic exit.
    pub mirror_countdown: u32,
    /// Sparse perturbations applied at each mirror step.
    pub tilt_schedule: Vec<usize>,
    /// Per-coordinate probability that the synthetic exit copies the truth.
    pub synthetic_truth_probability: f64,
    /// Most recent indices whose groups are bulk-poisoned on mirror exit.
    pub bulk_poison_depth: usize,
    /// Initial poisoning probability.
    pub poison_rate_initial: f64,
    /// Cap while rank sits between the minor and major thresholds.
    pub poison_rate_mid_cap: f64,
    /// Absolute cap.
    pub poison_rate_cap: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            rank_window: 64,
            rebuild_interval: 8,
            flatten_threshold: 32,
            rank_minor_threshold: 3,
            rank_major_threshold: 6,
            rain_elevated_threshold: 4,
            history_capacity: 20,
            convergence_window: 10,
            convergence_threshold: 0.15,
            convergence_hits: 5,
            mirror_countdown: 10,
            tilt_schedule: vec![0, 0, 1, 1, 2, 3, 4, 5, 6, 8],
            synthetic_truth_probability: 0.85,
            bulk_poison_depth: 15,
            poison_rate_initial: 0.35,
            poison_rate_mid_cap: 0.55,
            poison_rate_cap: 0.75,
        }
    }
}

impl OracleConfig {
    /// Validates the configuration for basic sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::InvalidPolicy(msg));

        if self.rank_window == 0 {
            return fail("rank_window must be > 0".into());
        }
        if !(1..=MAX_REBUILD_INTERVAL).contains(&self.rebuild_interval) {
            return fail(format!("rebuild_interval must be in 1..={MAX_REBUILD_INTERVAL}"));
        }
        if !(1..=MAX_FLATTEN_THRESHOLD).contains(&self.flatten_threshold) {
            return fail(format!("flatten_threshold must be in 1..={MAX_FLATTEN_THRESHOLD}"));
        }
        if self.rank_minor_threshold > self.rank_major_threshold {
            return fail("rank_minor_threshold must not exceed rank_major_threshold".into());
        }
        if self.convergence_window < 2 {
            return fail("convergence_window must be >= 2".into());
        }
        if self.convergence_window > self.history_capacity {
            return fail("convergence_window must fit in history_capacity".into());
        }
        if self.bulk_poison_depth > self.history_capacity {
            return fail("bulk_poison_depth must fit in history_capacity".into());
        }
        if self.convergence_hits == 0 {
            return fail("convergence_hits must be > 0".into());
        }
        if self.mirror_countdown == 0 {
            return fail("mirror_countdown must be > 0".into());
        }
        if self.tilt_schedule.is_empty() {
            return fail("tilt_schedule must be non-empty".into());
        }
        if self.tilt_schedule.windows(2).any(|w| w[0] > w[1]) {
            return fail("tilt_schedule must be non-decreasing".into());
        }
        if !(self.convergence_threshold > 0.0 && self.convergence_threshold.is_finite()) {
            return fail(format!(
                "convergence_threshold out of range: {}",
                self.convergence_threshold
            ));
        }
        for (name, p) in [
            ("synthetic_truth_probability", self.synthetic_truth_probability),
            ("poison_rate_initial", self.poison_rate_initial),
            ("poison_rate_mid_cap", self.poison_rate_mid_cap),
            ("poison_rate_cap", self.poison_rate_cap),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return fail(format!("{name} out of range: {p}"));
            }
        }
        if self.poison_rate_mid_cap > self.poison_rate_cap {
            return fail("poison_rate_mid_cap must not exceed poison_rate_cap".into());
        }

        Ok(())
    }

    /// Applies `key = value` overrides keyed by their environment names
    /// (for example `TARNISH_RANK_WINDOW`).
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        for (key, value) in overrides {
            apply_override(self, key, value)?;
        }
        Ok(())
    }
}

/// Layered configuration loader.
///
/// ```
/// # use tarnish::config::ConfigLoader;
/// let config = ConfigLoader::new().with_env(false).load().unwrap();
/// assert_eq!(config.rank_window, 64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
    overrides: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// Creates a loader that reads environment overrides.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
            overrides: BTreeMap::new(),
        }
    }

    /// Reads a configuration file before overrides.
    #[must_use]
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables or disables `TARNISH_*` environment overrides.
    #[must_use]
    pub fn with_env(mut self, enabled: bool) -> Self {
        self.use_env = enabled;
        self
    }

    /// Adds an explicit override, applied after environment overrides.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<OracleConfig, ConfigError> {
        let mut config = match &self.path {
            Some(path) => load_from_file(path)?,
            None => OracleConfig::default(),
        };
        if self.use_env {
            apply_env_overrides(&mut config)?;
        }
        config.apply_overrides(&self.overrides)?;
        config.validate()?;
        Ok(config)
    }
}

fn load_from_file(path: &Path) -> Result<OracleConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents, OracleConfig::default())
}

fn apply_env_overrides(config: &mut OracleConfig) -> Result<(), ConfigError> {
    let mut overrides = BTreeMap::new();
    for (key, value) in std::env::vars() {
        if key.starts_with(ENV_PREFIX) {
            overrides.insert(key, value);
        }
    }
    config.apply_overrides(&overrides)
}

fn apply_override(config: &mut OracleConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let Some(name) = key.strip_prefix(ENV_PREFIX) else {
        return Err(ConfigError::InvalidOverride(key.to_string()));
    };
    let name = name.to_ascii_lowercase();
    let section = match name.as_str() {
        "rank_window" | "rebuild_interval" | "rank_minor_threshold" | "rank_major_threshold"
        | "rain_elevated_threshold" => "rank",
        "flatten_threshold" => "transform",
        "history_capacity" | "convergence_window" | "convergence_threshold"
        | "convergence_hits" | "mirror_countdown" | "tilt_schedule"
        | "synthetic_truth_probability" => "mirror",
        "bulk_poison_depth" | "poison_rate_initial" | "poison_rate_mid_cap" | "poison_rate_cap" => {
            "poison"
        }
        _ => return Err(ConfigError::InvalidOverride(key.to_string())),
    };
    apply_section_kv(config, section, &name, value)
        .map_err(|_| ConfigError::InvalidOverride(format!("{key}={value}")))
}

fn parse_config(contents: &str, base: OracleConfig) -> Result<OracleConfig, ConfigError> {
    let mut config = base;
    let mut section = String::new();

    for (line_idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].trim().to_lowercase();
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ConfigError::Parse(format!("line {}: {}", line_idx + 1, line)))?;
        let key = key.trim();
        let value = value.trim().trim_matches('"');

        apply_section_kv(&mut config, &section, key, value)?;
    }

    Ok(config)
}

fn apply_section_kv(
    config: &mut OracleConfig,
    section: &str,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match section {
        "rank" => apply_rank_kv(config, key, value),
        "transform" => apply_transform_kv(config, key, value),
        "mirror" => apply_mirror_kv(config, key, value),
        "poison" => apply_poison_kv(config, key, value),
        "" => Err(ConfigError::Parse(format!(
            "missing section for key: {key}"
        ))),
        _ => Err(ConfigError::Parse(format!("unknown section: {section}"))),
    }
}

fn apply_rank_kv(config: &mut OracleConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "rank_window" => config.rank_window = parse_usize(value, key)?,
        "rebuild_interval" => config.rebuild_interval = parse_usize(value, key)?,
        "rank_minor_threshold" => config.rank_minor_threshold = parse_usize(value, key)?,
        "rank_major_threshold" => config.rank_major_threshold = parse_usize(value, key)?,
        "rain_elevated_threshold" => config.rain_elevated_threshold = parse_usize(value, key)?,
        _ => return Err(unknown_key("rank", key)),
    }
    Ok(())
}

fn apply_transform_kv(config: &mut OracleConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "flatten_threshold" => config.flatten_threshold = parse_usize(value, key)?,
        _ => return Err(unknown_key("transform", key)),
    }
    Ok(())
}

fn apply_mirror_kv(config: &mut OracleConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "history_capacity" => config.history_capacity = parse_usize(value, key)?,
        "convergence_window" => config.convergence_window = parse_usize(value, key)?,
        "convergence_threshold" => config.convergence_threshold = parse_f64(value, key)?,
        "convergence_hits" => config.convergence_hits = parse_u32(value, key)?,
        "mirror_countdown" => config.mirror_countdown = parse_u32(value, key)?,
        "tilt_schedule" => config.tilt_schedule = parse_usize_list(value, key)?,
        "synthetic_truth_probability" => {
            config.synthetic_truth_probability = parse_f64(value, key)?;
        }
        _ => return Err(unknown_key("mirror", key)),
    }
    Ok(())
}

fn apply_poison_kv(config: &mut OracleConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "bulk_poison_depth" => config.bulk_poison_depth = parse_usize(value, key)?,
        "poison_rate_initial" => config.poison_rate_initial = parse_f64(value, key)?,
        "poison_rate_mid_cap" => config.poison_rate_mid_cap = parse_f64(value, key)?,
        "poison_rate_cap" => config.poison_rate_cap = parse_f64(value, key)?,
        _ => return Err(unknown_key("poison", key)),
    }
    Ok(())
}

fn unknown_key(section: &str, key: &str) -> ConfigError {
    ConfigError::Parse(format!("unknown key in [{section}]: {key}"))
}

fn parse_usize(value: &str, key: &str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Parse(format!("{key}: expected integer, got {value:?}")))
}

fn parse_u32(value: &str, key: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Parse(format!("{key}: expected integer, got {value:?}")))
}

fn parse_f64(value: &str, key: &str) -> Result<f64, ConfigError> {
    value
        .parse::<f64>()
        .map_err(|_| ConfigError::Parse(format!("{key}: expected number, got {value:?}")))
}

fn parse_usize_list(value: &str, key: &str) -> Result<Vec<usize>, ConfigError> {
    value
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_usize(s, key))
        .collect()
}
