//! Report generation for offline verification runs
//!
//! `notary verify` scores keystroke capture files and can write the results in
//! two formats:
//!
//! - **JSON**: Machine-readable format with a summary block
//! - **CSV**: Spreadsheet-compatible, one row per capture
//!
//! # Usage
//!
//! ```ignore
//! use human_notary::report;
//!
//! // Automatically picks format based on extension
//! report::generate("report.json", &results)?;  // JSON
//! report::generate("report.csv", &results)?;   // CSV
//! ```

pub mod csv;
pub mod json;

use crate::notary::Evaluation;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Verified,
    Unverified,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Verified => write!(f, "VERIFIED"),
            Verdict::Unverified => write!(f, "UNVERIFIED"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of scoring one capture file
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub file_path: String,
    pub file_name: String,
    pub verdict: Verdict,
    pub human_score: f64,
    pub keystroke_count: u32,
    pub total_time_ms: i64,
    pub content_length: usize,
    pub reasons: Vec<String>,
    pub error: Option<String>,
}

impl CaptureReport {
    pub fn from_evaluation(path: &Path, evaluation: &Evaluation) -> Self {
        let result = &evaluation.result;
        Self {
            file_path: path.display().to_string(),
            file_name: file_name(path),
            verdict: if result.verified { Verdict::Verified } else { Verdict::Unverified },
            human_score: result.human_score,
            keystroke_count: evaluation.metrics.keystroke_count,
            total_time_ms: evaluation.metrics.total_time_ms,
            content_length: evaluation.content.chars().count(),
            reasons: result.reasons.clone(),
            error: None,
        }
    }

    pub fn error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            file_path: path.display().to_string(),
            file_name: file_name(path),
            verdict: Verdict::Error,
            human_score: 0.0,
            keystroke_count: 0,
            total_time_ms: 0,
            content_length: 0,
            reasons: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Score as a whole percentage
    pub fn score_percent(&self) -> u32 {
        (self.human_score * 100.0).round() as u32
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, results: &[CaptureReport]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "json" => json::write(&mut file, results),
        _ => csv::write(&mut file, results),
    }
}

/// Summary statistics for a batch of results
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
    pub error: usize,
}

impl Summary {
    pub fn from_results(results: &[CaptureReport]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for r in results {
            match r.verdict {
                Verdict::Verified => summary.verified += 1,
                Verdict::Unverified => summary.unverified += 1,
                Verdict::Error => summary.error += 1,
            }
        }

        summary
    }
}
