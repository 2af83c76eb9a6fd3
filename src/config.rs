//! Configuration loaded from plancheck.toml.
//!
//! Every detector threshold is a named field with a default, so a deployment
//! can tune cutoffs without code changes:
//!
//! ```toml
//! [thresholds]
//! large_table_rows = 50000
//! min_cache_hit_ratio = 0.95
//!
//! [rewrite]
//! extra_error_phrases = ["model overloaded"]
//! ```

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::sql::MAX_EXCERPT_LENGTH;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "plancheck.toml";

/// Main configuration structure loaded from plancheck.toml
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub thresholds: Thresholds,
    pub rewrite: RewriteConfig,
}

/// Detector cutoffs.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Scans above this many rows are worth an index
    pub large_table_rows: f64,
    /// Row count at which scan issues escalate to high severity
    pub high_severity_rows: f64,
    /// Index scans matching more than this fraction of the table are inefficient
    pub low_selectivity_ratio: f64,
    /// Nested loops with a child above this many rows are flagged
    pub large_join_rows: f64,
    /// Hash joins whose inputs together exceed this many rows are flagged
    pub hash_join_rows: f64,
    /// Cache hit ratio below which a node is I/O bound
    pub min_cache_hit_ratio: f64,
    /// Absolute block reads above which a node is I/O bound
    pub high_read_blocks: u64,
    pub max_window_functions: usize,
    pub max_aggregates: usize,
    pub max_joined_tables: usize,
    /// `SELECT *` with at least this many joins is an over-fetch
    pub overfetch_min_joins: usize,
    /// Identical queries in one batch that signal an N+1 loop
    pub n_plus_one_min_batch: usize,
    pub stats_warning_days: f64,
    pub stats_critical_days: f64,
    /// Estimated vs actual rows differing by this factor are a misestimate
    pub misestimate_factor: f64,
    /// Misestimates where both sides stay below this are ignored
    pub misestimate_min_rows: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            large_table_rows: 10_000.0,
            high_severity_rows: 100_000.0,
            low_selectivity_ratio: 0.30,
            large_join_rows: 10_000.0,
            hash_join_rows: 1_000_000.0,
            min_cache_hit_ratio: 0.90,
            high_read_blocks: 10_000,
            max_window_functions: 2,
            max_aggregates: 5,
            max_joined_tables: 5,
            overfetch_min_joins: 2,
            n_plus_one_min_batch: 20,
            stats_warning_days: 7.0,
            stats_critical_days: 30.0,
            misestimate_factor: 10.0,
            misestimate_min_rows: 1_000.0,
        }
    }
}

/// Rewrite interpreter settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Characters of the raw response kept for diagnostics on failure
    pub excerpt_chars: usize,
    /// Phrases rejected in addition to the built-in error indicators
    pub extra_error_phrases: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: MAX_EXCERPT_LENGTH,
            extra_error_phrases: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file, or return default if no config exists.
    /// If an explicit path is provided it MUST exist (error if not).
    /// If no path is provided, check ./plancheck.toml (use default if not found).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                p
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    default_path
                } else {
                    return Ok(Config::default());
                }
            }
        };

        let contents = fs::read_to_string(config_path)?;
        let config = Self::from_toml(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {:#}", config_path.display(), e))?;
        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.thresholds.validate()?;
        Ok(config)
    }
}

impl Thresholds {
    /// Reject values that would make a detector meaningless.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("low_selectivity_ratio", self.low_selectivity_ratio),
            ("min_cache_hit_ratio", self.min_cache_hit_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("thresholds.{} must be between 0 and 1, got {}", name, value);
            }
        }
        for (name, value) in [
            ("large_table_rows", self.large_table_rows),
            ("high_severity_rows", self.high_severity_rows),
            ("large_join_rows", self.large_join_rows),
            ("hash_join_rows", self.hash_join_rows),
        ] {
            if value <= 0.0 || !value.is_finite() {
                bail!("thresholds.{} must be a positive number, got {}", name, value);
            }
        }
        for (name, value) in [
            ("misestimate_min_rows", self.misestimate_min_rows),
            ("stats_warning_days", self.stats_warning_days),
            ("stats_critical_days", self.stats_critical_days),
        ] {
            if value < 0.0 || !value.is_finite() {
                bail!("thresholds.{} must be a non-negative number, got {}", name, value);
            }
        }
        if !self.misestimate_factor.is_finite() || self.misestimate_factor <= 1.0 {
            bail!(
                "thresholds.misestimate_factor must be greater than 1, got {}",
                self.misestimate_factor
            );
        }
        if self.stats_critical_days < self.stats_warning_days {
            bail!(
                "thresholds.stats_critical_days ({}) must not be below stats_warning_days ({})",
                self.stats_critical_days,
                self.stats_warning_days
            );
        }
        if self.n_plus_one_min_batch < 2 {
            bail!("thresholds.n_plus_one_min_batch must be at least 2");
        }
        Ok(())
    }
}
