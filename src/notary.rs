//! Submission and lookup
//!
//! [`Notary`] is what the HTTP routes call: it validates a submission, runs
//! the aggregator and verifier, stores the post under a fresh id, and reads
//! posts back. It knows nothing about HTTP beyond [`NotaryError::status_code`].

use crate::db::DbError;
use crate::metrics::{calculate_metrics, KeystrokeEvent, TypingMetrics};
use crate::post::{self, Post};
use crate::store::{PostStore, StoreStats};
use crate::verifier::{VerificationResult, Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fresh ids tried before a submission gives up on collisions
pub const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("Content is required")]
    ContentRequired,

    #[error("Typing metrics are required")]
    MetricsRequired,

    #[error("Keystroke timestamps must not be negative")]
    NegativeTimestamp,

    #[error("ID is required")]
    IdRequired,

    #[error("Post not found")]
    NotFound,

    #[error("Failed to save post")]
    SaveFailed(#[source] DbError),

    #[error("Failed to load post")]
    LoadFailed(#[source] DbError),
}

impl NotaryError {
    pub fn status_code(&self) -> u16 {
        match self {
            NotaryError::ContentRequired
            | NotaryError::MetricsRequired
            | NotaryError::NegativeTimestamp
            | NotaryError::IdRequired => 400,
            NotaryError::NotFound => 404,
            NotaryError::SaveFailed(_) | NotaryError::LoadFailed(_) => 500,
        }
    }
}

/// A typing capture as the compose page sends it.
///
/// Either raw `events` (aggregated here) or client-side `metrics` must be
/// present. A top-level `pasteAttempts` overrides whatever the metrics carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metrics: Option<TypingMetrics>,
    #[serde(default)]
    pub events: Option<Vec<KeystrokeEvent>>,
    #[serde(default)]
    pub paste_attempts: Option<u32>,
}

impl Submission {
    pub fn from_events(content: &str, events: Vec<KeystrokeEvent>, paste_attempts: u32) -> Self {
        Self {
            content: Some(content.to_string()),
            metrics: None,
            events: Some(events),
            paste_attempts: Some(paste_attempts),
        }
    }

    pub fn from_metrics(content: &str, metrics: TypingMetrics) -> Self {
        Self {
            content: Some(content.to_string()),
            metrics: Some(metrics),
            events: None,
            paste_attempts: None,
        }
    }

    /// Metrics to score, with the paste count overlaid
    pub fn typing_metrics(&self) -> Option<TypingMetrics> {
        let metrics = match (&self.events, &self.metrics) {
            (Some(events), _) => calculate_metrics(events),
            (None, Some(metrics)) => metrics.clone(),
            (None, None) => return None,
        };
        Some(match self.paste_attempts {
            Some(n) => metrics.with_paste_attempts(n),
            None => metrics,
        })
    }
}

/// A scored submission that has not been stored
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub content: String,
    pub metrics: TypingMetrics,
    pub result: VerificationResult,
}

/// Validate and score a submission without storing it
pub fn evaluate(verifier: &Verifier, submission: &Submission) -> Result<Evaluation, NotaryError> {
    let content = submission.content.as_deref().unwrap_or("");
    if content.trim().is_empty() {
        return Err(NotaryError::ContentRequired);
    }
    if let Some(events) = &submission.events {
        if events.iter().any(|e| e.timestamp < 0) {
            return Err(NotaryError::NegativeTimestamp);
        }
    }
    let metrics = submission.typing_metrics().ok_or(NotaryError::MetricsRequired)?;

    // Length of what was typed, before trimming
    let result = verifier.verify(&metrics, content.chars().count());

    Ok(Evaluation {
        content: content.to_string(),
        metrics,
        result,
    })
}

/// Response body for a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub verified: bool,
    pub human_score: f64,
    pub reasons: Vec<String>,
}

pub struct Notary<S: PostStore> {
    store: S,
    verifier: Verifier,
    id_generator: Box<dyn Fn() -> String + Send + Sync>,
}

impl<S: PostStore> Notary<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            verifier: Verifier::new(),
            id_generator: Box::new(post::generate_id),
        }
    }

    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Box::new(generator);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Score and store a submission
    pub fn submit(&self, submission: &Submission) -> Result<Receipt, NotaryError> {
        let evaluation = evaluate(&self.verifier, submission)?;
        let Evaluation { content, metrics, result } = evaluation;

        let mut post = Post {
            id: String::new(),
            content: content.trim().to_string(),
            typing_metrics: metrics,
            human_score: result.human_score,
            verified: result.verified,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            post.id = (self.id_generator)();
            match self.store.insert(&post) {
                Ok(()) => break,
                Err(DbError::DuplicateId(id)) if attempt < MAX_ID_ATTEMPTS => {
                    log::warn!("post id {} collided, retrying", id);
                }
                Err(e) => {
                    log::error!("failed to save post: {}", e);
                    return Err(NotaryError::SaveFailed(e));
                }
            }
        }

        log::info!(
            "stored post {} verified={} score={:.2} reasons={}",
            post.id,
            result.verified,
            result.human_score,
            result.reasons.len()
        );

        Ok(Receipt {
            id: post.id,
            verified: result.verified,
            human_score: result.human_score,
            reasons: result.reasons,
        })
    }

    /// Fetch a post by id
    pub fn lookup(&self, id: &str) -> Result<Post, NotaryError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(NotaryError::IdRequired);
        }
        log::debug!("lookup {}", id);

        match self.store.get_by_id(id) {
            Ok(Some(post)) => Ok(post),
            Ok(None) => Err(NotaryError::NotFound),
            Err(e) => {
                log::error!("failed to load post {}: {}", id, e);
                Err(NotaryError::LoadFailed(e))
            }
        }
    }

    /// Check that a post exists, returning its canonical id
    pub fn search(&self, id: &str) -> Result<String, NotaryError> {
        self.lookup(id).map(|post| post.id)
    }

    pub fn stats(&self) -> Result<StoreStats, NotaryError> {
        self.store.stats().map_err(NotaryError::LoadFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::BACKSPACE_KEY;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn human_metrics() -> TypingMetrics {
        TypingMetrics {
            total_time_ms: 10_000,
            keystroke_count: 50,
            coefficient_of_variation: 0.5,
            average_interval_ms: 150.0,
            backspace_count: 5,
            ..Default::default()
        }
    }

    /// Returns the given ids in order, then repeats the last one
    fn scripted_ids(ids: &'static [&'static str]) -> impl Fn() -> String + Send + Sync {
        let next = Arc::new(AtomicUsize::new(0));
        move || {
            let i = next.fetch_add(1, Ordering::SeqCst).min(ids.len() - 1);
            ids[i].to_string()
        }
    }

    // ==========================================================================
    // VALIDATION TESTS
    // ==========================================================================

    #[test]
    fn test_blank_content_rejected() {
        let notary = Notary::new(MemoryStore::new());
        for content in [None, Some(""), Some("   \n\t")] {
            let submission = Submission {
                content: content.map(String::from),
                metrics: Some(human_metrics()),
                ..Default::default()
            };
            let err = notary.submit(&submission).unwrap_err();
            assert!(matches!(err, NotaryError::ContentRequired));
            assert_eq!(err.status_code(), 400);
            assert_eq!(err.to_string(), "Content is required");
        }
        assert!(notary.store().is_empty());
    }

    #[test]
    fn test_missing_metrics_rejected() {
        let notary = Notary::new(MemoryStore::new());
        let submission = Submission { content: Some("hello".into()), ..Default::default() };

        let err = notary.submit(&submission).unwrap_err();
        assert!(matches!(err, NotaryError::MetricsRequired));
        assert_eq!(err.to_string(), "Typing metrics are required");
    }

    #[test]
    fn test_negative_timestamps_rejected() {
        let notary = Notary::new(MemoryStore::new());
        let events = vec![KeystrokeEvent::down("a", i64::MIN), KeystrokeEvent::up("a", i64::MAX)];

        let err = notary.submit(&Submission::from_events("a", events, 0)).unwrap_err();
        assert!(matches!(err, NotaryError::NegativeTimestamp));
        assert_eq!(err.status_code(), 400);
        assert!(notary.store().is_empty());
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let events = vec![
            KeystrokeEvent::down("a", 0),
            KeystrokeEvent::down("b", i64::MAX),
            KeystrokeEvent::up("a", i64::MAX),
        ];
        let evaluation = evaluate(&Verifier::new(), &Submission::from_events("ab", events, 0)).unwrap();

        assert_eq!(evaluation.metrics.total_time_ms, i64::MAX);
        assert_eq!(evaluation.metrics.inter_keystroke_intervals, vec![i64::MAX]);
        assert_eq!(evaluation.metrics.dwell_times, vec![i64::MAX]);
    }

    // ==========================================================================
    // METRICS SOURCE TESTS
    // ==========================================================================

    #[test]
    fn test_events_take_precedence_over_metrics() {
        let events = vec![KeystrokeEvent::down("a", 0), KeystrokeEvent::up("a", 90)];
        let submission = Submission {
            content: Some("a".into()),
            metrics: Some(human_metrics()),
            events: Some(events),
            paste_attempts: Some(2),
        };
        let m = submission.typing_metrics().unwrap();

        assert_eq!(m.keystroke_count, 1);
        assert_eq!(m.dwell_times, vec![90]);
        assert_eq!(m.paste_attempts, 2);
    }

    #[test]
    fn test_client_metrics_keep_their_paste_count() {
        let mut metrics = human_metrics();
        metrics.paste_attempts = 4;
        let submission = Submission::from_metrics("hi", metrics);

        assert_eq!(submission.typing_metrics().unwrap().paste_attempts, 4);
    }

    #[test]
    fn test_top_level_paste_count_overrides_metrics() {
        let mut submission = Submission::from_metrics("hi", human_metrics());
        submission.paste_attempts = Some(1);

        assert_eq!(submission.typing_metrics().unwrap().paste_attempts, 1);
    }

    #[test]
    fn test_submission_deserializes_client_body() {
        let body = r#"{
            "content": "hello",
            "metrics": {"totalTime": 9000, "keystrokeCount": 12, "pasteAttempts": 1,
                        "averageInterval": 120.5, "coefficientOfVariation": 0.31}
        }"#;
        let submission: Submission = serde_json::from_str(body).unwrap();
        let m = submission.typing_metrics().unwrap();

        assert_eq!(m.total_time_ms, 9000);
        assert_eq!(m.paste_attempts, 1);
        assert_eq!(m.average_interval_ms, 120.5);
    }

    // ==========================================================================
    // SUBMIT / LOOKUP TESTS
    // ==========================================================================

    #[test]
    fn test_submit_stores_trimmed_content() {
        let notary = Notary::new(MemoryStore::new()).with_id_generator(|| "abc1234".to_string());
        let receipt = notary.submit(&Submission::from_metrics("  typed it myself \n", human_metrics())).unwrap();

        assert_eq!(receipt.id, "abc1234");
        assert!(receipt.verified);
        assert_eq!(receipt.human_score, 1.0);

        let post = notary.lookup("abc1234").unwrap();
        assert_eq!(post.content, "typed it myself");
        assert_eq!(post.human_score, receipt.human_score);
        assert_eq!(post.verified, receipt.verified);
        assert_eq!(post.typing_metrics, human_metrics());
    }

    #[test]
    fn test_content_length_counts_untrimmed_chars() {
        // 101 chars including padding triggers the corrections rule; trimmed would not
        let content = format!("{}{}", " ".repeat(2), "é".repeat(99));
        assert_eq!(content.chars().count(), 101);

        let mut m = human_metrics();
        m.backspace_count = 0;
        let evaluation = evaluate(&Verifier::new(), &Submission::from_metrics(&content, m)).unwrap();
        assert!(evaluation
            .result
            .reasons
            .contains(&"Few corrections (0 backspaces for 101 chars)".to_string()));
    }

    #[test]
    fn test_submit_generates_valid_ids() {
        let notary = Notary::new(MemoryStore::new());
        let a = notary.submit(&Submission::from_metrics("one", human_metrics())).unwrap();
        let b = notary.submit(&Submission::from_metrics("two", human_metrics())).unwrap();

        assert!(post::is_valid_id(&a.id));
        assert!(post::is_valid_id(&b.id));
        assert_ne!(a.id, b.id);
        assert_eq!(notary.store().len(), 2);
    }

    #[test]
    fn test_id_collision_retries() {
        let notary = Notary::new(MemoryStore::new())
            .with_id_generator(scripted_ids(&["taken00", "taken00", "fresh00"]));

        assert_eq!(notary.submit(&Submission::from_metrics("first", human_metrics())).unwrap().id, "taken00");
        assert_eq!(notary.submit(&Submission::from_metrics("second", human_metrics())).unwrap().id, "fresh00");
        assert_eq!(notary.lookup("taken00").unwrap().content, "first");
    }

    #[test]
    fn test_id_collision_gives_up() {
        let notary = Notary::new(MemoryStore::new()).with_id_generator(|| "same000".to_string());
        notary.submit(&Submission::from_metrics("first", human_metrics())).unwrap();

        let err = notary.submit(&Submission::from_metrics("second", human_metrics())).unwrap_err();
        assert!(matches!(err, NotaryError::SaveFailed(DbError::DuplicateId(_))));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "Failed to save post");
    }

    #[test]
    fn test_submit_from_raw_events() {
        let mut events = Vec::new();
        let mut t = 0;
        for i in 0..30 {
            let key = if i == 12 { BACKSPACE_KEY } else { "x" };
            events.push(KeystrokeEvent::down(key, t));
            events.push(KeystrokeEvent::up(key, t + 60));
            t += if i % 3 == 0 { 420 } else { 110 };
        }

        let notary = Notary::new(MemoryStore::new());
        let receipt = notary.submit(&Submission::from_events("xxxxxxxxxxxxxxxxxxxxxxxxxxxx", events, 0)).unwrap();
        let post = notary.lookup(&receipt.id).unwrap();

        assert_eq!(post.typing_metrics.keystroke_count, 30);
        assert_eq!(post.typing_metrics.backspace_count, 1);
        assert!(receipt.verified);
    }

    #[test]
    fn test_lookup_errors() {
        let notary = Notary::new(MemoryStore::new());

        let err = notary.lookup("  ").unwrap_err();
        assert!(matches!(err, NotaryError::IdRequired));
        assert_eq!(err.status_code(), 400);

        let err = notary.lookup("missing").unwrap_err();
        assert!(matches!(err, NotaryError::NotFound));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Post not found");
    }

    #[test]
    fn test_search_trims_id() {
        let notary = Notary::new(MemoryStore::new()).with_id_generator(|| "Xy_-123".to_string());
        notary.submit(&Submission::from_metrics("hi", human_metrics())).unwrap();

        assert_eq!(notary.search("  Xy_-123 ").unwrap(), "Xy_-123");
        assert!(matches!(notary.search("").unwrap_err(), NotaryError::IdRequired));
    }

    #[test]
    fn test_stats_through_notary() {
        let notary = Notary::new(MemoryStore::new());
        notary.submit(&Submission::from_metrics("good", human_metrics())).unwrap();
        notary
            .submit(&Submission::from_metrics("bad", TypingMetrics { paste_attempts: 5, ..Default::default() }))
            .unwrap();

        let stats = notary.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.verified, 1);
    }
}
