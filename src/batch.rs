//! Offline verification of keystroke capture files
//!
//! A capture file is a JSON document shaped like the submission body the
//! compose page sends: `{content, events | metrics, pasteAttempts?}`.

use crate::notary::{evaluate, NotaryError, Submission};
use crate::report::CaptureReport;
use crate::verifier::Verifier;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const CAPTURE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read capture: {0}")]
    Io(#[from] io::Error),

    #[error("capture is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(#[from] NotaryError),
}

/// Capture files under `path`, sorted; a single file is returned as-is
pub fn collect_captures(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(CAPTURE_EXTENSION))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

pub fn read_capture(path: &Path) -> Result<Submission, CaptureError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Score one capture file. Failures become an error row rather than aborting.
pub fn verify_file(path: &Path, verifier: &Verifier) -> CaptureReport {
    match score_capture(path, verifier) {
        Ok(report) => report,
        Err(e) => {
            log::warn!("{}: {}", path.display(), e);
            CaptureReport::error(path, e.to_string())
        }
    }
}

fn score_capture(path: &Path, verifier: &Verifier) -> Result<CaptureReport, CaptureError> {
    let submission = read_capture(path)?;
    let evaluation = evaluate(verifier, &submission)?;
    log::debug!(
        "{}: score={:.2} reasons={:?}",
        path.display(),
        evaluation.result.human_score,
        evaluation.result.reasons
    );
    Ok(CaptureReport::from_evaluation(path, &evaluation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Verdict;
    use tempfile::TempDir;

    const HUMAN_CAPTURE: &str = r#"{
        "content": "hello there",
        "metrics": {"totalTime": 10000, "keystrokeCount": 50, "backspaceCount": 5,
                    "averageInterval": 150, "coefficientOfVariation": 0.5}
    }"#;

    const PASTED_CAPTURE: &str = r#"{
        "content": "hello there",
        "events": [
            {"key": "h", "timestamp": 0, "type": "keydown"},
            {"key": "h", "timestamp": 40, "type": "keyup"}
        ],
        "pasteAttempts": 3
    }"#;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    // ==========================================================================
    // COLLECTION TESTS
    // ==========================================================================

    #[test]
    fn test_collect_captures_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.json", HUMAN_CAPTURE);
        write(&dir, "nested/a.JSON", HUMAN_CAPTURE);
        write(&dir, "notes.txt", "ignored");

        let files = collect_captures(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["b.json", "nested/a.JSON"]);
    }

    #[test]
    fn test_collect_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "one.txt", HUMAN_CAPTURE);
        assert_eq!(collect_captures(&path), vec![path]);
    }

    // ==========================================================================
    // SCORING TESTS
    // ==========================================================================

    #[test]
    fn test_verify_human_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "human.json", HUMAN_CAPTURE);

        let report = verify_file(&path, &Verifier::new());
        assert_eq!(report.verdict, Verdict::Verified);
        assert_eq!(report.human_score, 1.0);
        assert_eq!(report.keystroke_count, 50);
        assert_eq!(report.content_length, 11);
        assert_eq!(report.file_name, "human.json");
    }

    #[test]
    fn test_verify_pasted_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "pasted.json", PASTED_CAPTURE);

        let report = verify_file(&path, &Verifier::new());
        assert_eq!(report.verdict, Verdict::Unverified);
        assert!(report.reasons.contains(&"3 paste attempt(s) detected".to_string()));
        assert!(report.human_score < 0.7);
    }

    #[test]
    fn test_broken_captures_become_error_rows() {
        let dir = tempfile::tempdir().unwrap();
        let bad_json = write(&dir, "bad.json", "{ not json");
        let no_metrics = write(&dir, "empty.json", r#"{"content": "hi"}"#);
        let missing = dir.path().join("missing.json");

        let report = verify_file(&bad_json, &Verifier::new());
        assert_eq!(report.verdict, Verdict::Error);
        assert!(report.error.unwrap().starts_with("capture is not valid JSON"));

        let report = verify_file(&no_metrics, &Verifier::new());
        assert_eq!(report.verdict, Verdict::Error);
        assert_eq!(report.error.as_deref(), Some("Typing metrics are required"));

        let report = verify_file(&missing, &Verifier::new());
        assert_eq!(report.verdict, Verdict::Error);
        assert!(report.error.unwrap().starts_with("failed to read capture"));
    }
}
