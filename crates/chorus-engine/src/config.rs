//! Engine configuration: mode iteration caps, session TTL, early-follow-up
//! thresholds, and HTTP timeouts. Loaded from built-in defaults, optionally
//! overridden by a TOML file and then by environment variables, matching the
//! teacher's `default_x()` + `#[serde(default = "default_x")]` idiom.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Maximum researcher iterations for `speed` mode.
pub const DEFAULT_SPEED_MAX_ITERATIONS: usize = 2;
/// Maximum researcher iterations for `balanced` mode.
pub const DEFAULT_BALANCED_MAX_ITERATIONS: usize = 6;
/// Maximum researcher iterations for `quality` mode.
pub const DEFAULT_QUALITY_MAX_ITERATIONS: usize = 25;

/// Default session idle TTL, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
/// Character threshold that triggers early follow-up generation.
pub const DEFAULT_EARLY_FOLLOWUP_CHARS: usize = 1000;
/// Chunk-count threshold that triggers early follow-up generation.
pub const DEFAULT_EARLY_FOLLOWUP_CHUNKS: usize = 50;
/// Maximum follow-up suggestions surfaced after dedup.
pub const DEFAULT_MAX_FOLLOWUPS: usize = 3;
/// Jaccard similarity above which two follow-ups are considered duplicates.
pub const DEFAULT_FOLLOWUP_DEDUPE_THRESHOLD: f64 = 0.5;
/// Overall connect + first-byte timeout for provider HTTP calls, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Research optimization mode, selecting the researcher's iteration budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    Speed,
    Balanced,
    Quality,
}

impl OptimizationMode {
    pub fn max_iterations(self, config: &EngineConfig) -> usize {
        match self {
            OptimizationMode::Speed => config.speed_max_iterations,
            OptimizationMode::Balanced => config.balanced_max_iterations,
            OptimizationMode::Quality => config.quality_max_iterations,
        }
    }
}

fn default_speed_max_iterations() -> usize {
    DEFAULT_SPEED_MAX_ITERATIONS
}
fn default_balanced_max_iterations() -> usize {
    DEFAULT_BALANCED_MAX_ITERATIONS
}
fn default_quality_max_iterations() -> usize {
    DEFAULT_QUALITY_MAX_ITERATIONS
}
fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}
fn default_early_followup_chars() -> usize {
    DEFAULT_EARLY_FOLLOWUP_CHARS
}
fn default_early_followup_chunks() -> usize {
    DEFAULT_EARLY_FOLLOWUP_CHUNKS
}
fn default_max_followups() -> usize {
    DEFAULT_MAX_FOLLOWUPS
}
fn default_followup_dedupe_threshold() -> f64 {
    DEFAULT_FOLLOWUP_DEDUPE_THRESHOLD
}
fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_speed_max_iterations")]
    pub speed_max_iterations: usize,
    #[serde(default = "default_balanced_max_iterations")]
    pub balanced_max_iterations: usize,
    #[serde(default = "default_quality_max_iterations")]
    pub quality_max_iterations: usize,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_early_followup_chars")]
    pub early_followup_chars: usize,
    #[serde(default = "default_early_followup_chunks")]
    pub early_followup_chunks: usize,
    #[serde(default = "default_max_followups")]
    pub max_followups: usize,
    #[serde(default = "default_followup_dedupe_threshold")]
    pub followup_dedupe_threshold: f64,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// `RUST_LOG`-style filter string for the server binary's tracing setup.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            speed_max_iterations: DEFAULT_SPEED_MAX_ITERATIONS,
            balanced_max_iterations: DEFAULT_BALANCED_MAX_ITERATIONS,
            quality_max_iterations: DEFAULT_QUALITY_MAX_ITERATIONS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            early_followup_chars: DEFAULT_EARLY_FOLLOWUP_CHARS,
            early_followup_chunks: DEFAULT_EARLY_FOLLOWUP_CHUNKS,
            max_followups: DEFAULT_MAX_FOLLOWUPS,
            followup_dedupe_threshold: DEFAULT_FOLLOWUP_DEDUPE_THRESHOLD,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Load defaults, overridden by an optional TOML file, overridden in
    /// turn by `CHORUS_`-prefixed environment variables.
    pub fn load(toml_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match toml_path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHORUS_SESSION_TTL_SECS") {
            if let Ok(parsed) = v.parse() {
                self.session_ttl_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("CHORUS_LOG_FILTER") {
            self.log_filter = v;
        }
        if let Ok(v) = std::env::var("CHORUS_PROVIDER_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse() {
                self.provider_timeout_secs = parsed;
            }
        }
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}
