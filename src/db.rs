//! SQLite database with Diesel ORM
//!
//! Stores posts together with the metrics they were scored on.

use crate::post::Post;
use crate::schema::*;
use crate::store::{PostStore, StoreStats};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::SqliteConnection;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "notary.db";

// ============================================================================
// Diesel Models
// ============================================================================

#[derive(Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub typing_metrics: &'a str,
    pub human_score: f64,
    pub verified: bool,
    pub created_at: &'a str,
}

/// Queryable post row; `typing_metrics` is still JSON text here
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = posts)]
pub struct PostRecord {
    pub id: String,
    pub content: String,
    pub typing_metrics: String,
    pub human_score: f64,
    pub verified: bool,
    pub created_at: String,
}

impl PostRecord {
    fn into_post(self) -> Result<Post> {
        Ok(Post {
            id: self.id,
            content: self.content,
            typing_metrics: serde_json::from_str(&self.typing_metrics)?,
            human_score: self.human_score,
            verified: self.verified,
            created_at: self.created_at,
        })
    }
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Stored metrics are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Post id {0} already exists")]
    DuplicateId(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(QueryableByName)]
struct AvgResult {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    avg: Option<f64>,
}

impl Database {
    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        log::debug!("opened database {}", path_str);
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY NOT NULL,
                content TEXT NOT NULL,
                typing_metrics TEXT NOT NULL,
                human_score REAL NOT NULL,
                verified BOOLEAN NOT NULL,
                created_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_posts_verified ON posts(verified)").execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Store a post. Fails with [`DbError::DuplicateId`] if the id is taken.
    pub fn insert_post(&self, post: &Post) -> Result<()> {
        let mut conn = self.get_conn()?;
        let metrics_json = serde_json::to_string(&post.typing_metrics)?;

        let new_post = NewPost {
            id: &post.id,
            content: &post.content,
            typing_metrics: &metrics_json,
            human_score: post.human_score,
            verified: post.verified,
            created_at: &post.created_at,
        };

        match diesel::insert_into(posts::table).values(&new_post).execute(&mut conn) {
            Ok(_) => Ok(()),
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(DbError::DuplicateId(post.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let mut conn = self.get_conn()?;

        let record = posts::table
            .filter(posts::id.eq(id))
            .first::<PostRecord>(&mut conn)
            .optional()?;

        record.map(PostRecord::into_post).transpose()
    }

    /// Newest posts first
    pub fn get_recent_posts(&self, limit: i64) -> Result<Vec<Post>> {
        let mut conn = self.get_conn()?;

        let records = posts::table
            .order(posts::created_at.desc())
            .limit(limit)
            .load::<PostRecord>(&mut conn)?;

        records.into_iter().map(PostRecord::into_post).collect()
    }

    /// Get summary statistics
    pub fn get_summary(&self) -> Result<StoreStats> {
        let mut conn = self.get_conn()?;

        let total: i64 = posts::table.count().get_result(&mut conn)?;

        let verified: i64 = posts::table
            .filter(posts::verified.eq(true))
            .count()
            .get_result(&mut conn)?;

        // Raw SQL for avg since Diesel's avg returns Numeric type
        let avg_score: Option<f64> = diesel::sql_query("SELECT AVG(human_score) as avg FROM posts")
            .get_result::<AvgResult>(&mut conn)?
            .avg;

        Ok(StoreStats {
            total,
            verified,
            unverified: total - verified,
            avg_score,
        })
    }
}

impl PostStore for Database {
    fn insert(&self, post: &Post) -> Result<()> {
        self.insert_post(post)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.get_post(id)
    }

    fn stats(&self) -> Result<StoreStats> {
        self.get_summary()
    }
}
