//! Turning a feed url into normalized items.
//!
//! - [`fetcher`] - HTTP retrieval with a size cap and shutdown awareness
//! - [`parser`] - RSS 2.0 decoding, with `feed-rs` as the fallback for Atom
//!   and JSON Feed
//! - [`normalize`] - HTML entity decoding and publish-date parsing
//!
//! Parsing and normalization are pure; only the fetcher touches the network.

mod fetcher;
mod normalize;
mod parser;

pub use fetcher::{FetchError, Fetcher};
pub use normalize::{
    matching_format, normalize_document, parse_publish_date, unescape_text, DateFormat,
    NormalizedFeed, NormalizedItem, DATE_FORMATS,
};
pub use parser::{parse_document, Item, ParseError, SyndicationDocument};
