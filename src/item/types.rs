//! Item types for feedhub.

use chrono::{DateTime, Utc};

/// A stored, normalized item.
#[derive(Debug, Clone)]
pub struct Item {
    /// Item ID.
    pub id: i64,
    /// Owning source.
    pub source_id: i64,
    /// Title, never empty.
    pub title: String,
    /// Permalink; the dedup key within a source.
    pub link: String,
    /// Safe HTML body.
    pub content: String,
    /// Plain text excerpt, never empty.
    pub excerpt: String,
    /// Author name.
    pub author: Option<String>,
    /// Upstream publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Lead image.
    pub image_url: Option<String>,
    /// Whether the item has been read.
    pub read: bool,
    /// Whether the item has been saved.
    pub saved: bool,
    /// When the item was stored.
    pub created_at: DateTime<Utc>,
}

/// A normalized item ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub content: String,
    pub excerpt: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

impl NewItem {
    /// Create a new item with empty content.
    pub fn new(source_id: i64, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            source_id,
            title: title.into(),
            link: link.into(),
            content: String::new(),
            excerpt: String::new(),
            author: None,
            published_at: None,
            image_url: None,
        }
    }

    /// Set the HTML content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the excerpt.
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the publication time.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the lead image.
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}
