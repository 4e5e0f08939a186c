//! Parsed feed types.
//!
//! These are ephemeral: produced by one fetch, consumed by the normalizer,
//! never persisted.

use chrono::{DateTime, Utc};

/// A `media:group` (or equivalent media container) attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaGroup {
    /// Thumbnail URLs, smallest first as published.
    pub thumbnails: Vec<String>,
    /// Image-like media content URLs.
    pub contents: Vec<String>,
}

/// One feed entry as published upstream.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    /// RSS guid or Atom id.
    pub guid: String,
    /// Entry title as plain text; HTML titles are stripped at parse time.
    pub title: Option<String>,
    /// Permalink.
    pub link: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Publication (or last update) time.
    pub published_at: Option<DateTime<Utc>>,
    /// `content:encoded` / Atom content, raw HTML.
    pub content_html: Option<String>,
    /// `description` / Atom summary, raw HTML or text.
    pub description: Option<String>,
    /// Media groups.
    pub media_groups: Vec<MediaGroup>,
    /// Direct `media:thumbnail` URLs.
    pub media_thumbnails: Vec<String>,
    /// Direct image-like `media:content` URLs.
    pub media_contents: Vec<String>,
    /// Image enclosure URL.
    pub enclosure_url: Option<String>,
}

impl RawEntry {
    /// Create an entry with only a guid and link.
    pub fn new(guid: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            link: Some(link.into()),
            ..Default::default()
        }
    }

    /// The richest HTML body available: content, then description.
    pub fn body_html(&self) -> Option<&str> {
        self.content_html
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.description.as_deref())
    }

    /// The link used as dedup key.
    pub fn dedup_link(&self) -> Option<&str> {
        self.link
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.guid.as_str()).filter(|s| !s.is_empty()))
    }
}

/// A parsed feed.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Feed title.
    pub title: Option<String>,
    /// Feed logo or icon.
    pub icon_url: Option<String>,
    /// Entries in feed order.
    pub entries: Vec<RawEntry>,
}
