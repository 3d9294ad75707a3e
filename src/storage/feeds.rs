use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedListing};

impl Database {
    // ========================================================================
    // Feed Registration
    // ========================================================================

    /// Register a feed, returning its id.
    ///
    /// Re-registering a known url updates its name and owner and keeps the
    /// fetch history.
    pub async fn insert_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                name = excluded.name,
                user_id = excluded.user_id,
                updated_at = excluded.updated_at
            RETURNING id
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// All feeds with owner names, ordered by name
    pub async fn list_feeds(&self) -> Result<Vec<FeedListing>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedListing>(
            r#"
            SELECT f.id, f.name, f.url, u.name AS owner, f.last_fetched_at
            FROM feeds f
            LEFT JOIN users u ON u.id = f.user_id
            ORDER BY f.name, f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            WHERE id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Look a feed up by its registered url
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Next batch of feeds to poll, least recently fetched first.
    ///
    /// Never-fetched feeds (NULL) sort before everything else; ties are
    /// broken by id so the order is stable.
    pub async fn list_due_feeds(&self, limit: u32) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT ?
        "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Record that a feed was picked up for fetching at `at`.
    ///
    /// The stored value only moves forward: an `at` earlier than what is
    /// already recorded leaves the row unchanged.
    pub async fn mark_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let at = at.timestamp();
        let result = sqlx::query(
            r#"
            UPDATE feeds SET
                last_fetched_at = MAX(COALESCE(last_fetched_at, ?1), ?1),
                updated_at = MAX(updated_at, ?1)
            WHERE id = ?2
        "#,
        )
        .bind(at)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("feed {}", feed_id)));
        }
        Ok(())
    }
}
