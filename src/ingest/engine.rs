//! Ingestion orchestration.
//!
//! One refresh of a source runs fetch, filter, normalize and insert.
//! Batches run sources on a bounded worker pool with a per-source timeout;
//! a failing source never stops the batch.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::filter::evaluate;
use crate::clock::Clock;
use crate::config::FetchConfig;
use crate::feed::fetcher::FeedFetcher;
use crate::http::HttpClient;
use crate::item::repository::ItemStore;
use crate::normalize::Normalizer;
use crate::source::repository::SourceStore;
use crate::source::types::Source;
use crate::{FeedhubError, Result};

/// Default number of sources refreshed concurrently.
pub const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 4;

/// Default time budget for one source refresh.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 120;

/// Counters for one successful source refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Entries in the fetched feed.
    pub fetched: usize,
    /// Items newly stored.
    pub inserted: usize,
    /// Entries dropped by dedup or filters.
    pub skipped: usize,
}

/// Result of refreshing one source within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    /// Source ID.
    pub source_id: i64,
    /// Source display name.
    pub title: String,
    /// Counters, or the error message.
    pub result: std::result::Result<SourceStats, String>,
}

/// Structured result of a batch refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Per-source outcomes, ordered by source ID.
    pub outcomes: Vec<SourceOutcome>,
}

impl RefreshSummary {
    /// Number of sources refreshed successfully.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of sources that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Total items stored across the batch.
    pub fn total_inserted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|stats| stats.inserted)
            .sum()
    }

    /// Outcome for one source.
    pub fn outcome(&self, source_id: i64) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }
}

/// Feed ingestion engine.
pub struct IngestEngine {
    sources: Arc<dyn SourceStore>,
    items: Arc<dyn ItemStore>,
    http: Arc<dyn HttpClient>,
    fetcher: FeedFetcher,
    normalizer: Normalizer,
    clock: Arc<dyn Clock>,
    max_concurrent_sources: usize,
    source_timeout: Duration,
}

impl IngestEngine {
    /// Create an engine with default concurrency and timeout.
    pub fn new(
        sources: Arc<dyn SourceStore>,
        items: Arc<dyn ItemStore>,
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            items,
            fetcher: FeedFetcher::new(http.clone()),
            normalizer: Normalizer::new(http.clone()),
            http,
            clock,
            max_concurrent_sources: DEFAULT_MAX_CONCURRENT_SOURCES,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
        }
    }

    /// Apply the worker pool settings from the fetch configuration.
    pub fn with_fetch_config(self, config: &FetchConfig) -> Self {
        self.with_max_concurrent_sources(config.max_concurrent_sources)
            .with_source_timeout(Duration::from_secs(config.source_timeout_secs))
    }

    /// Set the number of sources refreshed concurrently (at least 1).
    pub fn with_max_concurrent_sources(mut self, max: usize) -> Self {
        self.max_concurrent_sources = max.max(1);
        self
    }

    /// Set the per-source time budget.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Refresh one source.
    ///
    /// Fetch and storage errors fail the source; per-entry enrichment
    /// problems never do. `last_fetched_at` is only advanced on success.
    pub async fn refresh_source(&self, source: &Source) -> Result<SourceStats> {
        let now = self.clock.now();
        let feed_url = source.feed_url();
        debug!("Refreshing source {}: {}", source.id, feed_url);

        let feed = self.fetcher.fetch(&feed_url).await?;
        let mut stats = SourceStats {
            fetched: feed.entries.len(),
            ..Default::default()
        };

        for entry in &feed.entries {
            if let Some(reason) =
                evaluate(self.items.as_ref(), self.http.as_ref(), source, entry).await?
            {
                debug!("Source {}: skipping {} ({})", source.id, entry.guid, reason);
                stats.skipped += 1;
                continue;
            }

            let Some(item) = self
                .normalizer
                .normalize(source.id, source.source_type(), entry)
                .await
            else {
                stats.skipped += 1;
                continue;
            };

            if self.items.insert(&item, now).await? {
                stats.inserted += 1;
            } else {
                // Stored concurrently since the dedup check.
                stats.skipped += 1;
            }
        }

        self.sources.update_last_fetched(source.id, now).await?;

        if stats.inserted > 0 {
            info!(
                "Source {} refreshed: {} new item(s) of {}",
                source.id, stats.inserted, stats.fetched
            );
        } else {
            debug!("Source {} refreshed: no new items", source.id);
        }
        Ok(stats)
    }

    /// Refresh one source by ID.
    pub async fn refresh_source_by_id(&self, source_id: i64) -> Result<SourceStats> {
        let source = self
            .sources
            .get_by_id(source_id)
            .await?
            .ok_or_else(|| FeedhubError::NotFound(format!("source {source_id}")))?;
        self.refresh_source(&source).await
    }

    /// Refresh every source of a user.
    pub async fn refresh_user_sources(&self, user_id: i64) -> Result<RefreshSummary> {
        let sources = self.sources.list_by_user(user_id).await?;
        Ok(self.refresh_batch(sources).await)
    }

    /// Refresh every source.
    pub async fn refresh_all_sources(&self) -> Result<RefreshSummary> {
        let sources = self.sources.list_all().await?;
        Ok(self.refresh_batch(sources).await)
    }

    /// Refresh sources on the worker pool, isolating failures per source.
    pub async fn refresh_batch(&self, sources: Vec<Source>) -> RefreshSummary {
        if sources.is_empty() {
            debug!("No sources to refresh");
            return RefreshSummary::default();
        }
        info!("Refreshing {} source(s)", sources.len());

        let mut outcomes: Vec<SourceOutcome> = stream::iter(sources)
            .map(|source| self.refresh_with_timeout(source))
            .buffer_unordered(self.max_concurrent_sources)
            .collect()
            .await;
        outcomes.sort_by_key(|o| o.source_id);

        let summary = RefreshSummary { outcomes };
        info!(
            "Refresh complete: {} succeeded, {} failed, {} new item(s)",
            summary.succeeded(),
            summary.failed(),
            summary.total_inserted()
        );
        summary
    }

    async fn refresh_with_timeout(&self, source: Source) -> SourceOutcome {
        let result =
            match tokio::time::timeout(self.source_timeout, self.refresh_source(&source)).await {
                Ok(Ok(stats)) => Ok(stats),
                Ok(Err(e)) => {
                    warn!("Failed to refresh source {}: {}", source.id, e);
                    Err(e.to_string())
                }
                Err(_) => {
                    warn!(
                        "Refresh of source {} timed out after {} seconds",
                        source.id,
                        self.source_timeout.as_secs()
                    );
                    Err(format!(
                        "timed out after {} seconds",
                        self.source_timeout.as_secs()
                    ))
                }
            };

        SourceOutcome {
            source_id: source.id,
            title: source.title,
            result,
        }
    }
}
