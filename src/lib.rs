//! Feed aggregator core.
//!
//! Registered feeds are polled on a fixed interval; each sweep fetches the
//! feeds that have waited longest, parses and normalizes their items, and
//! stores new posts. Posts already seen are recognized by their url and
//! skipped.

pub mod config;
pub mod feed;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
pub mod storage;
pub mod util;
