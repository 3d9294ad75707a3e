use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, FeedListing};

impl Database {
    // ========================================================================
    // Feed Follows
    // ========================================================================

    /// Subscribe a user to a feed.
    ///
    /// Returns `false` when the user already follows it. An unknown user or
    /// feed id fails the foreign key and is an error.
    pub async fn follow_feed(&self, user_id: i64, feed_id: i64) -> Result<bool, DatabaseError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO feed_follows (created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, feed_id) DO NOTHING
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` when the user was not following the feed
    pub async fn unfollow_feed(&self, user_id: i64, feed_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Feeds the user follows, with owner names, ordered by name
    pub async fn list_following(&self, user_id: i64) -> Result<Vec<FeedListing>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedListing>(
            r#"
            SELECT f.id, f.name, f.url, u.name AS owner, f.last_fetched_at
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            LEFT JOIN users u ON u.id = f.user_id
            WHERE ff.user_id = ?
            ORDER BY f.name, f.id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }
}
