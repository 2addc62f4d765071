//! Human-likelihood scoring
//!
//! Scores a [`TypingMetrics`] sample on a 0.0-1.0 scale, where 1.0 means the
//! text looks entirely hand-typed.
//!
//! # Scoring System
//!
//! Every sample starts at 1.0. Each rule in [`rules::RULES`] that fires adds
//! its delta and a reason:
//!
//! | Rule | Fires When | Delta |
//! |------|------------|-------|
//! | typing_time | session under 5s | -0.30 |
//! | paste_attempts | any blocked paste | -0.15 each, max -0.50 |
//! | interval_consistency | CV < 0.25 with > 10 keystrokes | -0.25 |
//! | typing_speed | avg interval < 50ms with > 10 keystrokes | -0.20 |
//! | correction_rate | > 100 chars with fewer backspaces than 2% | -0.10 |
//! | natural_variance | CV > 0.4 with > 20 keystrokes | +0.10 |
//! | correction_pattern | some backspaces, under 20% of keystrokes | +0.05 |
//!
//! The total is clamped to [0, 1] and a post is verified when the score
//! reaches 0.7. All numbers come from [`ScoringConfig`].

pub mod config;
pub mod rules;

pub use config::{ConfigError, ScoringConfig};
pub use rules::{Adjustment, Rule, Sample, RULES};

use crate::metrics::TypingMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub verified: bool,
    pub human_score: f64,
    pub reasons: Vec<String>,
}

/// Stateless scorer; cheap to clone and share across threads
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: ScoringConfig,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ScoringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Every rule that fires for this sample, in rule-table order
    pub fn adjustments(&self, metrics: &TypingMetrics, content_length: usize) -> Vec<Adjustment> {
        let sample = Sample { metrics, content_length };
        RULES
            .iter()
            .filter_map(|rule| rule.evaluate(&sample, &self.config))
            .collect()
    }

    pub fn verify(&self, metrics: &TypingMetrics, content_length: usize) -> VerificationResult {
        let mut score = 1.0;
        let mut reasons = Vec::new();

        for adj in self.adjustments(metrics, content_length) {
            score += adj.delta;
            reasons.push(adj.reason);
        }

        let human_score = score.clamp(0.0, 1.0);

        VerificationResult {
            verified: human_score >= self.config.verified_threshold,
            human_score,
            reasons,
        }
    }
}
