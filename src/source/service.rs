//! Source creation.
//!
//! Resolves the user's input to a canonical identifier, discovers a title
//! from the canonical feed and an icon (both best effort), then persists the
//! source.

use std::sync::Arc;

use tracing::{debug, info};

use super::icon::discover_icon;
use super::repository::{SourceStore, SqliteSourceRepository};
use super::resolver::resolve;
use super::types::{NewSource, Source, SourceFilters, SourceType};
use crate::clock::Clock;
use crate::db::Database;
use crate::feed::fetcher::FeedFetcher;
use crate::{FeedhubError, Result};

/// Request to add a new source.
#[derive(Debug, Clone)]
pub struct CreateSourceRequest {
    /// Owning user.
    pub user_id: i64,
    /// Declared source type.
    pub source_type: SourceType,
    /// URL or handle as entered.
    pub url: String,
    /// Filter policy.
    pub filters: SourceFilters,
    /// Days to keep items; 0 keeps them forever.
    pub retention_days: i64,
}

impl CreateSourceRequest {
    /// Create a request with default filters and no retention limit.
    pub fn new(user_id: i64, source_type: SourceType, url: impl Into<String>) -> Self {
        Self {
            user_id,
            source_type,
            url: url.into(),
            filters: SourceFilters::default(),
            retention_days: 0,
        }
    }

    /// Set the filter policy.
    pub fn with_filters(mut self, filters: SourceFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the retention period in days.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }
}

/// Service for source management.
pub struct SourceService {
    sources: SqliteSourceRepository,
    fetcher: FeedFetcher,
    clock: Arc<dyn Clock>,
}

impl SourceService {
    /// Create a new service.
    pub fn new(db: &Database, fetcher: FeedFetcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: SqliteSourceRepository::new(db),
            fetcher,
            clock,
        }
    }

    /// Add a new source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input cannot be resolved for the declared type
    /// - The user already follows the same canonical feed
    /// - The source cannot be stored
    pub async fn create_source(&self, request: &CreateSourceRequest) -> Result<Source> {
        let identifier = resolve(request.source_type, &request.url, self.fetcher.http())
            .await
            .ok_or_else(|| {
                FeedhubError::Resolution(format!(
                    "could not resolve {} source from '{}'",
                    request.source_type, request.url
                ))
            })?;

        let feed_url = identifier.feed_url();
        let existing = self.sources.list_by_user(request.user_id).await?;
        if existing.iter().any(|s| s.feed_url() == feed_url) {
            return Err(FeedhubError::Validation(format!(
                "source already exists: {feed_url}"
            )));
        }

        let feed = match self.fetcher.fetch(&feed_url).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                debug!("Title lookup failed for {}: {}", feed_url, e);
                None
            }
        };
        let title = feed
            .as_ref()
            .and_then(|f| f.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| identifier.display_name());
        let icon_url = discover_icon(&identifier, feed.as_ref(), self.fetcher.http()).await;

        let mut new_source = NewSource::new(request.user_id, &request.url, identifier, title)
            .with_filters(request.filters.clone())
            .with_retention_days(request.retention_days);
        if let Some(icon_url) = icon_url {
            new_source = new_source.with_icon_url(icon_url);
        }

        let source = self.sources.create(&new_source, self.clock.now()).await?;
        info!(
            "Created {} source {} ({}) for user {}",
            source.source_type(),
            source.id,
            source.title,
            source.user_id
        );
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::http::StubHttpClient;
    use crate::source::types::{RedditKind, SourceIdentifier};

    const RSS_BODY: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Blog</title>
  <link>https://example.com</link>
  <image><url>https://example.com/logo.png</url><title>x</title><link>https://example.com</link></image>
</channel></rss>"#;

    fn service(db: &Database, http: Arc<StubHttpClient>) -> SourceService {
        SourceService::new(db, FeedFetcher::new(http), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_create_rss_source_with_title_and_icon() {
        let db = Database::open_in_memory().await.unwrap();
        let http = Arc::new(StubHttpClient::new());
        http.respond("https://example.com/feed.xml", RSS_BODY);

        let source = service(&db, http)
            .create_source(
                &CreateSourceRequest::new(1, SourceType::Rss, "https://example.com/feed.xml")
                    .with_retention_days(14),
            )
            .await
            .unwrap();

        assert_eq!(source.title, "Example Blog");
        assert_eq!(source.icon_url.as_deref(), Some("https://example.com/logo.png"));
        assert_eq!(source.retention_days, 14);
    }

    #[tokio::test]
    async fn test_create_reddit_source_when_upstream_down() {
        let db = Database::open_in_memory().await.unwrap();
        let http = Arc::new(StubHttpClient::new());

        let source = service(&db, http)
            .create_source(&CreateSourceRequest::new(1, SourceType::Reddit, "r/rust"))
            .await
            .unwrap();

        assert_eq!(
            source.identifier,
            SourceIdentifier::Reddit {
                name: "rust".into(),
                kind: RedditKind::Subreddit
            }
        );
        assert_eq!(source.title, "r/rust");
        assert_eq!(source.icon_url, None);
    }

    #[tokio::test]
    async fn test_unresolvable_input() {
        let db = Database::open_in_memory().await.unwrap();
        let http = Arc::new(StubHttpClient::new());

        let err = service(&db, http)
            .create_source(&CreateSourceRequest::new(1, SourceType::Bluesky, "not a handle"))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedhubError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_duplicate_source_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let http = Arc::new(StubHttpClient::new());
        let svc = service(&db, http);

        svc.create_source(&CreateSourceRequest::new(1, SourceType::Reddit, "rust"))
            .await
            .unwrap();
        let err = svc
            .create_source(&CreateSourceRequest::new(
                1,
                SourceType::Reddit,
                "https://www.reddit.com/r/rust/",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedhubError::Validation(_)));

        svc.create_source(&CreateSourceRequest::new(2, SourceType::Reddit, "rust"))
            .await
            .unwrap();
    }
}
