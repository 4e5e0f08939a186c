//! feedhub - feed ingestion and normalization engine
//!
//! Resolves user-supplied references to RSS/Atom feeds, YouTube channels,
//! Reddit subreddits/users and Bluesky profiles, fetches them, normalizes
//! entries into safe HTML items and stores only new ones.

pub mod clock;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod feed;
pub mod http;
pub mod ingest;
pub mod item;
pub mod logging;
pub mod normalize;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use error::{FeedhubError, Result};
pub use feed::{FeedFetcher, ParsedFeed, RawEntry};
pub use http::{HttpClient, ReqwestClient, StubHttpClient};
pub use ingest::{IngestEngine, RefreshSummary, RetentionSweeper, Scheduler};
pub use item::{Item, ItemStore, NewItem, SqliteItemRepository};
pub use normalize::Normalizer;
pub use source::{
    CreateSourceRequest, Source, SourceFilters, SourceIdentifier, SourceService, SourceStore,
    SourceType, SqliteSourceRepository,
};
