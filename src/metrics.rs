//! Keystroke metrics aggregation
//!
//! Turns the raw keydown/keyup stream captured by the compose page into the
//! fixed set of timing features the verifier scores.
//!
//! # What Gets Measured
//!
//! ```text
//! Feature                    | Derived From
//! ---------------------------|----------------------------------------------
//! keystroke_count            | number of keydown events
//! inter_keystroke_intervals  | gaps between consecutive keydowns
//! dwell_times                | keydown → matching keyup of the same key
//! backspace_count            | keydowns of the Backspace key
//! total_time_ms              | last event timestamp - first event timestamp
//! average / variance / CV    | statistics over the intervals
//! ```
//!
//! Humans are irregular. A script replaying characters at a fixed rate has a
//! coefficient of variation (stddev / mean of the intervals) close to zero,
//! while real typing usually sits well above 0.3.
//!
//! Paste attempts never show up in the key stream (the page blocks them and
//! counts them separately), so [`calculate_metrics`] always leaves
//! `paste_attempts` at zero and the caller overlays the real count with
//! [`TypingMetrics::with_paste_attempts`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key value the browser reports for the backspace key
pub const BACKSPACE_KEY: &str = "Backspace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

/// One key notification from the capture surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    /// Logical key value (`"a"`, `"Shift"`, `"Backspace"`, ...)
    pub key: String,
    /// Milliseconds since the epoch
    #[serde(alias = "timestampMillis")]
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: KeyEventKind,
}

impl KeystrokeEvent {
    pub fn down(key: &str, timestamp: i64) -> Self {
        Self { key: key.to_string(), timestamp, kind: KeyEventKind::KeyDown }
    }

    pub fn up(key: &str, timestamp: i64) -> Self {
        Self { key: key.to_string(), timestamp, kind: KeyEventKind::KeyUp }
    }

    pub fn is_keydown(&self) -> bool {
        self.kind == KeyEventKind::KeyDown
    }
}

/// Aggregate timing features for one typing session.
///
/// Serialized with the field names the browser client uses, since the same
/// shape travels in submissions and is stored alongside each post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypingMetrics {
    #[serde(rename = "totalTime")]
    pub total_time_ms: i64,
    pub keystroke_count: u32,
    pub inter_keystroke_intervals: Vec<i64>,
    pub dwell_times: Vec<i64>,
    pub backspace_count: u32,
    pub paste_attempts: u32,
    #[serde(rename = "averageInterval")]
    pub average_interval_ms: f64,
    pub interval_variance: f64,
    pub coefficient_of_variation: f64,
}

impl TypingMetrics {
    /// Replace the paste counter with the one tracked by the client
    pub fn with_paste_attempts(mut self, paste_attempts: u32) -> Self {
        self.paste_attempts = paste_attempts;
        self
    }

    /// Standard deviation of the inter-keystroke intervals
    pub fn interval_std_dev(&self) -> f64 {
        self.interval_variance.sqrt()
    }
}

/// Aggregate an ordered event stream into [`TypingMetrics`].
///
/// Events are consumed exactly in the order given. Out-of-order timestamps are
/// not rejected; they simply produce negative intervals. Differences saturate
/// at the `i64` range.
pub fn calculate_metrics(events: &[KeystrokeEvent]) -> TypingMetrics {
    let keydowns: Vec<&KeystrokeEvent> = events.iter().filter(|e| e.is_keydown()).collect();

    let inter_keystroke_intervals: Vec<i64> = keydowns
        .windows(2)
        .map(|pair| pair[1].timestamp.saturating_sub(pair[0].timestamp))
        .collect();

    let dwell_times = dwell_times(events);

    let backspace_count = keydowns.iter().filter(|e| e.key == BACKSPACE_KEY).count() as u32;

    let total_time_ms = match (events.first(), events.last()) {
        (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
        _ => 0,
    };

    let (average_interval_ms, interval_variance) = mean_and_variance(&inter_keystroke_intervals);
    let coefficient_of_variation = if average_interval_ms > 0.0 {
        interval_variance.sqrt() / average_interval_ms
    } else {
        0.0
    };

    TypingMetrics {
        total_time_ms,
        keystroke_count: keydowns.len() as u32,
        inter_keystroke_intervals,
        dwell_times,
        backspace_count,
        paste_attempts: 0,
        average_interval_ms,
        interval_variance,
        coefficient_of_variation,
    }
}

/// Pair each keyup with the most recent unmatched keydown of the same key.
fn dwell_times(events: &[KeystrokeEvent]) -> Vec<i64> {
    let mut pending: HashMap<&str, i64> = HashMap::new();
    let mut dwell = Vec::new();

    for event in events {
        match event.kind {
            KeyEventKind::KeyDown => {
                pending.insert(event.key.as_str(), event.timestamp);
            }
            KeyEventKind::KeyUp => {
                if let Some(down) = pending.remove(event.key.as_str()) {
                    dwell.push(event.timestamp.saturating_sub(down));
                }
            }
        }
    }

    dwell
}

/// Arithmetic mean and population variance; both zero for an empty slice
fn mean_and_variance(values: &[i64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance)
}
