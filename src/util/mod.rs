//! Small helpers shared by the command-line front end.

mod feed_url;

pub use feed_url::{validate_feed_url, FeedUrlError};
