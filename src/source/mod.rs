//! Sources: model, identifier resolution, icon discovery, storage and
//! creation.

pub mod icon;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod types;

pub use icon::discover_icon;
pub use repository::{SourceStore, SqliteSourceRepository};
pub use resolver::resolve;
pub use service::{CreateSourceRequest, SourceService};
pub use types::{
    NewSource, RedditKind, ShortsFilter, Source, SourceFilters, SourceIdentifier, SourceType,
};
