use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The database is locked by another process. Is another feedsweep running?")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A row the caller referred to does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
/// as one of these messages.
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

/// Outcome of a failed post insert.
///
/// `Duplicate` is the expected result of re-polling a feed whose items were
/// already stored; callers treat it as a skip. Everything else lands in
/// `Other` and points at a store problem.
#[derive(Debug, Error)]
pub enum PostInsertError {
    #[error("post with url {url} already exists")]
    Duplicate { url: String },

    #[error("Failed to insert post: {0}")]
    Other(#[source] sqlx::Error),
}

impl PostInsertError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PostInsertError::Duplicate { .. })
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed registration row.
///
/// `last_fetched_at` is `None` until the first sweep picks the feed up.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_fetched_at: Option<i64>,
}

/// Feed joined with its owner's name, for listings
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedListing {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner: Option<String>,
    pub last_fetched_at: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A post ready to be written. The id is generated by the caller.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub feed_id: i64,
}

/// Stored post
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub feed_id: i64,
}
