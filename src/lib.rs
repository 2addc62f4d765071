//! Human Notary - Prove a post was typed by a human
//!
//! Human Notary records how a piece of text was typed (key timings, corrections,
//! paste attempts), scores how human that typing looks, and stores the post
//! under a short shareable id together with its verdict.
//!
//! # Overview
//!
//! People type irregularly. Gaps between keys vary, some keys are held longer
//! than others, and mistakes get corrected. Pasted or machine-generated text
//! arrives too fast, too evenly, or with no corrections at all. Human Notary
//! turns a keystroke log into a handful of statistics and runs them through a
//! small table of scoring rules.
//!
//! # Pipeline
//!
//! 1. **Aggregation** ([`calculate_metrics`]): ordered keydown/keyup events become
//!    [`TypingMetrics`]: total time, intervals between keydowns, dwell times,
//!    backspace count, interval variance and coefficient of variation.
//!
//! 2. **Scoring** ([`Verifier`]): starts at 1.0, applies penalties and bonuses
//!    from [`RULES`], clamps to [0, 1], and marks the post verified at 0.7 or
//!    above.
//!
//! 3. **Notarizing** ([`Notary`]): validates a submission, scores it, and
//!    stores it in a [`PostStore`] (SQLite via [`Database`], or [`MemoryStore`]).
//!
//! # Quick Start
//!
//! ```
//! use human_notary::{calculate_metrics, KeystrokeEvent, Verifier};
//!
//! let events = vec![
//!     KeystrokeEvent::down("h", 0),
//!     KeystrokeEvent::up("h", 80),
//!     KeystrokeEvent::down("i", 210),
//!     KeystrokeEvent::up("i", 300),
//! ];
//! let metrics = calculate_metrics(&events);
//! let result = Verifier::new().verify(&metrics, 2);
//!
//! println!("Score: {:.0}%", result.human_score * 100.0);
//! println!("Reasons: {:?}", result.reasons);
//! ```
//!
//! # Modules
//!
//! - [`metrics`]: Keystroke event model and aggregation
//! - [`verifier`]: Rule-table scorer and its configuration
//! - [`notary`]: Submission validation, storage and lookup
//! - [`db`] / [`store`]: SQLite persistence and the store trait
//! - [`serve`]: HTTP server and embedded pages
//! - [`batch`] / [`report`]: Offline verification of capture files (JSON, CSV)

pub mod batch;
pub mod db;
pub mod metrics;
pub mod notary;
pub mod post;
pub mod report;
pub mod schema;
pub mod serve;
pub mod store;
pub mod verifier;

pub use db::{Database, DbError};
pub use metrics::{calculate_metrics, KeyEventKind, KeystrokeEvent, TypingMetrics};
pub use notary::{Notary, NotaryError, Receipt, Submission};
pub use post::{Post, PostView};
pub use store::{MemoryStore, PostStore, StoreStats};
pub use verifier::{ScoringConfig, VerificationResult, Verifier, RULES};

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the public API surface is correct and documented.
    // ==========================================================================

    #[test]
    fn test_public_exports() {
        // Core types are re-exported from crate root
        let _: KeyEventKind = KeyEventKind::KeyDown;
        let _verifier = Verifier::new();
        let _store = MemoryStore::new();
        let _config = ScoringConfig::default();
    }

    #[test]
    fn test_quick_start_pipeline() {
        let events = vec![
            KeystrokeEvent::down("h", 0),
            KeystrokeEvent::up("h", 80),
            KeystrokeEvent::down("i", 210),
            KeystrokeEvent::up("i", 300),
        ];
        let metrics = calculate_metrics(&events);
        let result = Verifier::new().verify(&metrics, 2);

        assert_eq!(metrics.keystroke_count, 2);
        assert_eq!(metrics.inter_keystroke_intervals, vec![210]);
        assert_eq!(result.reasons, vec!["Typing time too short (0s)".to_string()]);
        assert_eq!(result.verified, result.human_score >= 0.7);
    }
}
