//! Feed retrieval and parsing.

pub mod fetcher;
pub mod types;

pub use fetcher::{parse_feed, validate_url, FeedFetcher};
pub use types::{MediaGroup, ParsedFeed, RawEntry};
