//! Tunable scoring thresholds.
//!
//! Defaults reproduce the production heuristic. Any subset can be overridden
//! from a TOML file:
//!
//! ```toml
//! min_typing_time_ms = 8000
//! paste_penalty = 0.2
//! verified_threshold = 0.75
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scoring config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scoring config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Sessions shorter than this look pasted or scripted
    pub min_typing_time_ms: i64,
    pub short_time_penalty: f64,

    /// Deducted per blocked paste, capped at `max_paste_penalty`
    pub paste_penalty: f64,
    pub max_paste_penalty: f64,

    /// Humans have at least this much interval variance
    pub min_cv: f64,
    pub consistency_penalty: f64,

    /// Average keydown gap below this is faster than people type
    pub max_avg_interval_ms: f64,
    pub speed_penalty: f64,

    /// Consistency and speed rules only apply above this many keystrokes
    pub min_keystrokes: u32,

    /// Expected fraction of characters that get corrected
    pub expected_correction_rate: f64,
    /// Correction rule only applies to content longer than this
    pub min_content_for_corrections: usize,
    pub few_corrections_penalty: f64,

    pub natural_cv: f64,
    pub natural_min_keystrokes: u32,
    pub natural_variance_bonus: f64,

    /// Backspaces must stay below this fraction of keystrokes to earn the bonus
    pub max_correction_ratio: f64,
    pub correction_pattern_bonus: f64,

    pub verified_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_typing_time_ms: 5000,
            short_time_penalty: 0.3,
            paste_penalty: 0.15,
            max_paste_penalty: 0.5,
            min_cv: 0.25,
            consistency_penalty: 0.25,
            max_avg_interval_ms: 50.0,
            speed_penalty: 0.2,
            min_keystrokes: 10,
            expected_correction_rate: 0.02,
            min_content_for_corrections: 100,
            few_corrections_penalty: 0.1,
            natural_cv: 0.4,
            natural_min_keystrokes: 20,
            natural_variance_bonus: 0.1,
            max_correction_ratio: 0.2,
            correction_pattern_bonus: 0.05,
            verified_threshold: 0.7,
        }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
