//! Persistence boundary for posts
//!
//! The notary only needs to insert a post and read it back by id. SQLite
//! ([`crate::Database`]) is the production store; [`MemoryStore`] backs tests
//! and throwaway servers.

use crate::db::{DbError, Result};
use crate::post::Post;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait PostStore: Send + Sync {
    /// Insert a new post; a taken id is [`DbError::DuplicateId`]
    fn insert(&self, post: &Post) -> Result<()>;

    fn get_by_id(&self, id: &str) -> Result<Option<Post>>;

    fn stats(&self) -> Result<StoreStats>;
}

/// Summary statistics over stored posts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: i64,
    pub verified: i64,
    pub unverified: i64,
    pub avg_score: Option<f64>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: RwLock<HashMap<String, Post>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> DbError {
    DbError::Connection("memory store lock poisoned".to_string())
}

impl PostStore for MemoryStore {
    fn insert(&self, post: &Post) -> Result<()> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        if posts.contains_key(&post.id) {
            return Err(DbError::DuplicateId(post.id.clone()));
        }
        posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Post>> {
        let posts = self.posts.read().map_err(poisoned)?;
        Ok(posts.get(id).cloned())
    }

    fn stats(&self) -> Result<StoreStats> {
        let posts = self.posts.read().map_err(poisoned)?;
        let total = posts.len() as i64;
        let verified = posts.values().filter(|p| p.verified).count() as i64;
        let avg_score = if posts.is_empty() {
            None
        } else {
            Some(posts.values().map(|p| p.human_score).sum::<f64>() / total as f64)
        };

        Ok(StoreStats {
            total,
            verified,
            unverified: total - verified,
            avg_score,
        })
    }
}
