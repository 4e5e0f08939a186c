//! Normalized items and their storage.

pub mod repository;
pub mod types;

pub use repository::{ItemStore, SqliteItemRepository};
pub use types::{Item, NewItem};
