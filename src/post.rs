//! Stored posts and their public identifiers

use crate::metrics::TypingMetrics;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a post id
pub const ID_LENGTH: usize = 7;

/// URL-safe alphabet for post ids (64 symbols, 6 bits each)
const ID_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Random 7-character URL-safe id
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// True if `id` could have come from [`generate_id`]
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content: String,
    pub typing_metrics: TypingMetrics,
    pub human_score: f64,
    pub verified: bool,
    /// RFC 3339
    pub created_at: String,
}

/// What the lookup page and `GET /api/posts/{id}` expose; metrics stay private
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub content: String,
    pub verified: bool,
    pub human_score: f64,
    pub created_at: String,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            content: post.content.clone(),
            verified: post.verified,
            human_score: post.human_score,
            created_at: post.created_at.clone(),
        }
    }
}

impl Post {
    /// Score as a whole percentage, the way pages display it
    pub fn score_percent(&self) -> u32 {
        (self.human_score * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_url_safe() {
        for _ in 0..500 {
            let id = generate_id();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(is_valid_id(&id), "bad id {}", id);
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        // 64^7 ≈ 4.4e12 ids; a thousand draws should never collide
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("V1StGXR"));
        assert!(is_valid_id("a_b-c9Z"));
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("toolong1"));
        assert!(!is_valid_id("bad/id!"));
        assert!(!is_valid_id(""));
    }

    #[test]
    fn test_view_hides_metrics() {
        let post = Post {
            id: "abcdefg".to_string(),
            content: "hello".to_string(),
            typing_metrics: TypingMetrics::default(),
            human_score: 0.856,
            verified: true,
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_value(PostView::from(&post)).unwrap();

        assert_eq!(json["id"], "abcdefg");
        assert_eq!(json["humanScore"], 0.856);
        assert!(json.get("typingMetrics").is_none());
        assert_eq!(post.score_percent(), 86);
    }
}
