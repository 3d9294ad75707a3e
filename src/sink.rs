//! Post Sink: turns normalized items into stored posts.
//!
//! Duplicate detection is left entirely to the store's UNIQUE constraint on
//! the post url. Re-polling a feed that still lists old items produces
//! [`StoreOutcome::Duplicate`] for each of them and nothing else.

use uuid::Uuid;

use crate::feed::NormalizedItem;
use crate::storage::{Database, NewPost, PostInsertError};

/// Result of a successful hand-off to the post store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    /// A post with the same url already exists; nothing was written
    Duplicate,
}

#[derive(Clone)]
pub struct PostSink {
    db: Database,
}

impl PostSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store `item` as a post owned by `feed_id` under a fresh id.
    ///
    /// Only store failures other than a url collision are returned as errors.
    pub async fn store(
        &self,
        feed_id: i64,
        item: &NormalizedItem,
    ) -> Result<StoreOutcome, PostInsertError> {
        let post = NewPost {
            id: Uuid::new_v4(),
            title: item.title.clone(),
            url: item.link.clone(),
            description: item.description.clone(),
            published_at: item.published_at.map(|dt| dt.timestamp()),
            feed_id,
        };

        match self.db.insert_post(&post).await {
            Ok(()) => Ok(StoreOutcome::Inserted),
            Err(PostInsertError::Duplicate { url }) => {
                tracing::debug!(feed_id = feed_id, url = %url, "Post already stored, skipping");
                Ok(StoreOutcome::Duplicate)
            }
            Err(e) => {
                tracing::error!(
                    feed_id = feed_id,
                    url = %post.url,
                    error = %e,
                    "Failed to store post"
                );
                Err(e)
            }
        }
    }
}
