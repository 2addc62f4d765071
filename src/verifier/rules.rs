//! The scoring rule table.
//!
//! Each rule is an independent additive adjustment: a predicate over the
//! sample, a signed delta, and a human-readable reason. [`RULES`] is evaluated
//! top to bottom, so its order is the order reasons appear in a result.

use super::config::ScoringConfig;
use crate::metrics::TypingMetrics;

/// What a rule looks at: the aggregated metrics plus the submitted length
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub metrics: &'a TypingMetrics,
    /// Character count of the submitted text
    pub content_length: usize,
}

/// A fired rule's contribution to the score
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub rule: &'static str,
    pub delta: f64,
    pub reason: String,
}

pub struct Rule {
    pub name: &'static str,
    applies: fn(&Sample, &ScoringConfig) -> bool,
    delta: fn(&Sample, &ScoringConfig) -> f64,
    reason: fn(&Sample, &ScoringConfig) -> String,
}

impl Rule {
    /// `Some` when the rule fires for this sample
    pub fn evaluate(&self, sample: &Sample, config: &ScoringConfig) -> Option<Adjustment> {
        if !(self.applies)(sample, config) {
            return None;
        }
        Some(Adjustment {
            rule: self.name,
            delta: (self.delta)(sample, config),
            reason: (self.reason)(sample, config),
        })
    }

    pub fn is_bonus(&self) -> bool {
        self.name == NATURAL_VARIANCE || self.name == CORRECTION_PATTERN
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

pub const TYPING_TIME: &str = "typing_time";
pub const PASTE_ATTEMPTS: &str = "paste_attempts";
pub const INTERVAL_CONSISTENCY: &str = "interval_consistency";
pub const TYPING_SPEED: &str = "typing_speed";
pub const CORRECTION_RATE: &str = "correction_rate";
pub const NATURAL_VARIANCE: &str = "natural_variance";
pub const CORRECTION_PATTERN: &str = "correction_pattern";

pub static RULES: [Rule; 7] = [
    Rule {
        name: TYPING_TIME,
        applies: |s, c| s.metrics.total_time_ms < c.min_typing_time_ms,
        delta: |_, c| -c.short_time_penalty,
        reason: |s, _| {
            let secs = round_half_up(s.metrics.total_time_ms as f64 / 1000.0);
            format!("Typing time too short ({}s)", secs)
        },
    },
    Rule {
        name: PASTE_ATTEMPTS,
        applies: |s, _| s.metrics.paste_attempts > 0,
        delta: |s, c| -(s.metrics.paste_attempts as f64 * c.paste_penalty).min(c.max_paste_penalty),
        reason: |s, _| format!("{} paste attempt(s) detected", s.metrics.paste_attempts),
    },
    Rule {
        name: INTERVAL_CONSISTENCY,
        applies: |s, c| {
            s.metrics.coefficient_of_variation < c.min_cv
                && s.metrics.keystroke_count > c.min_keystrokes
        },
        delta: |_, c| -c.consistency_penalty,
        reason: |s, c| {
            format!(
                "Typing too consistent (CV: {}, expected >{})",
                fixed_2(s.metrics.coefficient_of_variation),
                c.min_cv
            )
        },
    },
    Rule {
        name: TYPING_SPEED,
        applies: |s, c| {
            s.metrics.average_interval_ms < c.max_avg_interval_ms
                && s.metrics.keystroke_count > c.min_keystrokes
        },
        delta: |_, c| -c.speed_penalty,
        reason: |s, _| {
            format!(
                "Typing too fast ({}ms avg interval)",
                round_half_up(s.metrics.average_interval_ms)
            )
        },
    },
    Rule {
        name: CORRECTION_RATE,
        applies: |s, c| {
            s.content_length > c.min_content_for_corrections
                && (s.metrics.backspace_count as f64) < expected_backspaces(s.content_length, c)
        },
        delta: |_, c| -c.few_corrections_penalty,
        reason: |s, _| {
            format!(
                "Few corrections ({} backspaces for {} chars)",
                s.metrics.backspace_count, s.content_length
            )
        },
    },
    Rule {
        name: NATURAL_VARIANCE,
        applies: |s, c| {
            s.metrics.coefficient_of_variation > c.natural_cv
                && s.metrics.keystroke_count > c.natural_min_keystrokes
        },
        delta: |_, c| c.natural_variance_bonus,
        reason: |_, _| "Natural typing variance detected".to_string(),
    },
    Rule {
        name: CORRECTION_PATTERN,
        applies: |s, c| {
            s.metrics.backspace_count > 0
                && (s.metrics.backspace_count as f64)
                    < s.metrics.keystroke_count as f64 * c.max_correction_ratio
        },
        delta: |_, c| c.correction_pattern_bonus,
        reason: |_, _| "Normal correction pattern".to_string(),
    },
];

/// At least one correction, otherwise the configured rate of the content length
pub fn expected_backspaces(content_length: usize, config: &ScoringConfig) -> f64 {
    (content_length as f64 * config.expected_correction_rate).floor().max(1.0)
}

/// Nearest integer, halves toward positive infinity (-2.5 becomes -2)
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Two decimals; an exact tie rounds away from zero rather than to even
fn fixed_2(x: f64) -> String {
    if x == 0.0 {
        return "0.00".to_string();
    }
    // Only multiples of 1/8 with an odd numerator sit exactly on a tie
    let eighths = x * 8.0;
    if eighths.fract() == 0.0 && eighths.abs() < 1e15 && (eighths as i64) % 2 != 0 {
        let cents = (x.abs() * 100.0).ceil() as i64;
        let sign = if x < 0.0 { "-" } else { "" };
        return format!("{}{}.{:02}", sign, cents / 100, cents % 100);
    }
    format!("{:.2}", x)
}

pub fn find(name: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.name == name)
}
