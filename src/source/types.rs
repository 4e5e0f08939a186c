//! Source types for feedhub.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of upstream a source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// Plain RSS/Atom feed.
    Rss,
    /// YouTube channel.
    YouTube,
    /// Reddit subreddit or user.
    Reddit,
    /// Bluesky profile.
    Bluesky,
}

impl SourceType {
    /// Stable string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Rss => "rss",
            SourceType::YouTube => "youtube",
            SourceType::Reddit => "reddit",
            SourceType::Bluesky => "bluesky",
        }
    }

    /// Parse from the stored string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rss" => Some(SourceType::Rss),
            "youtube" => Some(SourceType::YouTube),
            "reddit" => Some(SourceType::Reddit),
            "bluesky" => Some(SourceType::Bluesky),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a Reddit source follows a subreddit or a user's submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedditKind {
    Subreddit,
    User,
}

impl RedditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedditKind::Subreddit => "subreddit",
            RedditKind::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subreddit" => Some(RedditKind::Subreddit),
            "user" => Some(RedditKind::User),
            _ => None,
        }
    }
}

/// Canonical identifier of a source.
///
/// Exactly one identifier set exists per source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceIdentifier {
    /// The feed URL itself.
    Rss { feed_url: String },
    /// A YouTube channel id (`UC` followed by 22 characters).
    YouTube { channel_id: String },
    /// A subreddit or Reddit user name.
    Reddit { name: String, kind: RedditKind },
    /// A Bluesky handle, lowercased, without `@`.
    Bluesky { handle: String },
}

impl SourceIdentifier {
    /// Source type this identifier belongs to.
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceIdentifier::Rss { .. } => SourceType::Rss,
            SourceIdentifier::YouTube { .. } => SourceType::YouTube,
            SourceIdentifier::Reddit { .. } => SourceType::Reddit,
            SourceIdentifier::Bluesky { .. } => SourceType::Bluesky,
        }
    }

    /// Canonical fetchable feed URL.
    pub fn feed_url(&self) -> String {
        match self {
            SourceIdentifier::Rss { feed_url } => feed_url.clone(),
            SourceIdentifier::YouTube { channel_id } => {
                format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}")
            }
            SourceIdentifier::Reddit {
                name,
                kind: RedditKind::Subreddit,
            } => format!("https://www.reddit.com/r/{name}.rss"),
            SourceIdentifier::Reddit {
                name,
                kind: RedditKind::User,
            } => format!("https://www.reddit.com/user/{name}/submitted.rss"),
            SourceIdentifier::Bluesky { handle } => {
                format!("https://bsky.app/profile/{handle}/rss")
            }
        }
    }

    /// Human-readable fallback name when the feed has no title.
    pub fn display_name(&self) -> String {
        match self {
            SourceIdentifier::Rss { feed_url } => url::Url::parse(feed_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| feed_url.clone()),
            SourceIdentifier::YouTube { channel_id } => channel_id.clone(),
            SourceIdentifier::Reddit {
                name,
                kind: RedditKind::Subreddit,
            } => format!("r/{name}"),
            SourceIdentifier::Reddit {
                name,
                kind: RedditKind::User,
            } => format!("u/{name}"),
            SourceIdentifier::Bluesky { handle } => format!("@{handle}"),
        }
    }
}

/// YouTube shorts policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortsFilter {
    /// Keep every video.
    #[default]
    All,
    /// Drop shorts.
    Exclude,
    /// Keep only shorts.
    Only,
}

impl ShortsFilter {
    /// Whether a video with the given shorts classification passes.
    pub fn allows(&self, is_short: bool) -> bool {
        match self {
            ShortsFilter::All => true,
            ShortsFilter::Exclude => !is_short,
            ShortsFilter::Only => is_short,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Some(ShortsFilter::All),
            "exclude" => Some(ShortsFilter::Exclude),
            "only" => Some(ShortsFilter::Only),
            _ => None,
        }
    }
}

/// Per-source filter policy, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceFilters {
    /// YouTube shorts policy.
    pub youtube_shorts: ShortsFilter,
    /// Minimum Reddit score for a post to be kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reddit_min_upvotes: Option<i64>,
    /// Stored, not enforced.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub whitelist_keywords: Vec<String>,
    /// Stored, not enforced.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blacklist_keywords: Vec<String>,
}

/// A configured upstream owned by a user.
#[derive(Debug, Clone)]
pub struct Source {
    /// Source ID.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// User-supplied reference, as entered.
    pub url: String,
    /// Canonical identifier.
    pub identifier: SourceIdentifier,
    /// Display name.
    pub title: String,
    /// Avatar/icon, if one was discovered.
    pub icon_url: Option<String>,
    /// Filter policy.
    pub filters: SourceFilters,
    /// Days to keep items; 0 keeps them forever.
    pub retention_days: i64,
    /// Last successful fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// When the source was created.
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Source type.
    pub fn source_type(&self) -> SourceType {
        self.identifier.source_type()
    }

    /// Canonical feed URL.
    pub fn feed_url(&self) -> String {
        self.identifier.feed_url()
    }
}

/// New source for creation.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub user_id: i64,
    pub url: String,
    pub identifier: SourceIdentifier,
    pub title: String,
    pub icon_url: Option<String>,
    pub filters: SourceFilters,
    pub retention_days: i64,
}

impl NewSource {
    /// Create a new source with default filters and no retention limit.
    pub fn new(
        user_id: i64,
        url: impl Into<String>,
        identifier: SourceIdentifier,
        title: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            url: url.into(),
            identifier,
            title: title.into(),
            icon_url: None,
            filters: SourceFilters::default(),
            retention_days: 0,
        }
    }

    /// Set the icon URL.
    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Set the filter policy.
    pub fn with_filters(mut self, filters: SourceFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the retention period in days.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days.max(0);
        self
    }
}
