use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post, PostInsertError};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a single post.
    ///
    /// There is no existence check before the insert: the UNIQUE constraint
    /// on `posts.url` is the only source of truth for duplicates, so two
    /// writers racing on the same url still end up with one row. A violation
    /// of that constraint comes back as [`PostInsertError::Duplicate`].
    pub async fn insert_post(&self, post: &NewPost) -> Result<(), PostInsertError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(post.id)
        .bind(now)
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() && db_err.message().contains("posts.url") =>
            {
                Err(PostInsertError::Duplicate {
                    url: post.url.clone(),
                })
            }
            Err(e) => Err(PostInsertError::Other(e)),
        }
    }

    /// Newest posts first, by publish date then insertion time.
    ///
    /// With `follower` set, only posts from feeds that user follows are
    /// returned. Posts without a publish date sort last.
    pub async fn get_recent_posts(
        &self,
        follower: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.created_at, p.updated_at, p.title, p.url, p.description,
                   p.published_at, p.feed_id
            FROM posts p
            WHERE ?1 IS NULL
               OR p.feed_id IN (SELECT feed_id FROM feed_follows WHERE user_id = ?1)
            ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
            LIMIT ?2
        "#,
        )
        .bind(follower)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn count_posts_for_feed(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
