//! Poll Scheduler.
//!
//! One sweep runs at start-up and then on every interval boundary. A sweep
//! that overruns the interval delays the next one instead of queueing it, so
//! sweeps never overlap. Within a sweep each due feed is polled
//! independently and a failing feed only costs its own items.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::feed::{self, FetchError, Fetcher, ParseError};
use crate::shutdown::Shutdown;
use crate::sink::{PostSink, StoreOutcome};
use crate::storage::{Database, Feed};

/// Why a single feed produced no items this sweep
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Totals for one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Feeds selected for this sweep
    pub feeds: usize,
    /// Feeds whose fetch or parse failed
    pub failed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Post inserts that failed for a reason other than a url collision
    pub store_errors: usize,
}

#[derive(Debug, Default)]
struct FeedTally {
    inserted: usize,
    duplicates: usize,
    store_errors: usize,
}

pub struct Poller {
    db: Database,
    fetcher: Fetcher,
    sink: PostSink,
    batch_size: u32,
    concurrency: usize,
}

impl Poller {
    pub fn new(db: Database, fetcher: Fetcher, config: &Config) -> Self {
        Self::with_limits(db, fetcher, config.batch_size, config.max_concurrent_fetches)
    }

    /// `batch_size` feeds are selected per sweep and at most `concurrency`
    /// of them are in flight at once.
    pub fn with_limits(db: Database, fetcher: Fetcher, batch_size: u32, concurrency: usize) -> Self {
        Self {
            sink: PostSink::new(db.clone()),
            db,
            fetcher,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Sweep every `period` until `shutdown` fires.
    pub async fn run(&self, period: Duration, shutdown: &Shutdown) {
        tracing::info!(interval = ?period, batch_size = self.batch_size, "Collecting feeds");
        run_every(period, shutdown, || async move {
            self.sweep(shutdown).await;
        })
        .await;
        tracing::info!("Poller stopped");
    }

    /// Poll the next batch of due feeds once.
    ///
    /// Never fails as a whole: per-feed problems are logged and counted in
    /// the returned report.
    pub async fn sweep(&self, shutdown: &Shutdown) -> SweepReport {
        let feeds = match self.db.list_due_feeds(self.batch_size).await {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list due feeds");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            feeds: feeds.len(),
            ..SweepReport::default()
        };
        if feeds.is_empty() {
            tracing::info!("No feeds to fetch");
            return report;
        }
        tracing::info!(feeds = feeds.len(), "Starting sweep");

        let results: Vec<(Feed, Result<FeedTally, PollError>)> = stream::iter(feeds)
            .map(|feed| async move {
                let result = self.poll_feed(&feed, Utc::now(), shutdown).await;
                (feed, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (feed, result) in results {
            match result {
                Ok(tally) => {
                    report.inserted += tally.inserted;
                    report.duplicates += tally.duplicates;
                    report.store_errors += tally.store_errors;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(feed_id = feed.id, url = %feed.url, error = %e, "Feed poll failed");
                }
            }
        }

        tracing::info!(
            feeds = report.feeds,
            failed = report.failed,
            inserted = report.inserted,
            duplicates = report.duplicates,
            store_errors = report.store_errors,
            "Sweep finished"
        );
        report
    }

    async fn poll_feed(
        &self,
        feed: &Feed,
        now: DateTime<Utc>,
        shutdown: &Shutdown,
    ) -> Result<FeedTally, PollError> {
        // Marked before fetching so a failing feed drops to the back of the
        // queue like any other.
        if let Err(e) = self.db.mark_fetched(feed.id, now).await {
            tracing::error!(feed_id = feed.id, error = %e, "Failed to mark feed fetched");
        }

        let bytes = self.fetcher.fetch(&feed.url, shutdown).await?;
        let document = feed::normalize_document(feed::parse_document(&bytes)?);
        tracing::info!(
            feed_id = feed.id,
            title = %document.title,
            items = document.items.len(),
            skipped = document.skipped,
            "Fetched feed"
        );

        let mut tally = FeedTally::default();
        for item in &document.items {
            tracing::info!(feed_id = feed.id, title = %item.title, "Item");
            match self.sink.store(feed.id, item).await {
                Ok(StoreOutcome::Inserted) => tally.inserted += 1,
                Ok(StoreOutcome::Duplicate) => tally.duplicates += 1,
                // Already logged by the sink
                Err(_) => tally.store_errors += 1,
            }
        }
        Ok(tally)
    }
}

/// Call `tick` now and then once per `period` until `shutdown` fires.
///
/// Ticks missed while `tick` was running are skipped rather than replayed,
/// and the next call never starts before the previous one has finished.
pub async fn run_every<F, Fut>(period: Duration, shutdown: &Shutdown, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = timer.tick() => {}
        }
        tick().await;
    }
}
