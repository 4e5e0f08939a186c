//! Filter and dedup stage.
//!
//! Runs on the raw entry before normalization, so dropped entries never
//! trigger enrichment requests. Order: dedup, shorts policy, minimum score.

use std::fmt;

use tracing::debug;

use crate::feed::types::RawEntry;
use crate::http::HttpClient;
use crate::item::repository::ItemStore;
use crate::normalize::{reddit, youtube};
use crate::source::types::{Source, SourceType};
use crate::Result;

/// Why an entry was not ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No link or guid to deduplicate on.
    NoLink,
    /// Already stored for this source.
    Duplicate,
    /// Rejected by the source's shorts policy.
    ShortsPolicy,
    /// Reddit score below the source's minimum.
    BelowMinUpvotes { score: i64, min: i64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoLink => write!(f, "no link"),
            SkipReason::Duplicate => write!(f, "duplicate"),
            SkipReason::ShortsPolicy => write!(f, "shorts policy"),
            SkipReason::BelowMinUpvotes { score, min } => {
                write!(f, "score {score} below minimum {min}")
            }
        }
    }
}

/// Whether a YouTube entry passes the source's shorts policy.
///
/// Non-YouTube sources always pass.
pub fn passes_shorts_filter(source: &Source, link: &str) -> bool {
    if source.source_type() != SourceType::YouTube {
        return true;
    }
    source.filters.youtube_shorts.allows(youtube::is_short(link))
}

/// Check the minimum-score policy of a Reddit source.
///
/// Fails open: if the score cannot be fetched the entry is kept.
pub async fn check_min_upvotes(
    http: &dyn HttpClient,
    source: &Source,
    link: &str,
) -> Option<SkipReason> {
    if source.source_type() != SourceType::Reddit {
        return None;
    }
    let min = source.filters.reddit_min_upvotes?;

    match reddit::fetch_reddit_score(http, link).await {
        Ok(score) if score < min => Some(SkipReason::BelowMinUpvotes { score, min }),
        Ok(_) => None,
        Err(e) => {
            debug!("Score lookup failed for {}, keeping entry: {}", link, e);
            None
        }
    }
}

/// Decide whether an entry should be ingested.
///
/// Returns `None` to keep the entry. Storage errors propagate.
pub async fn evaluate(
    items: &dyn ItemStore,
    http: &dyn HttpClient,
    source: &Source,
    entry: &RawEntry,
) -> Result<Option<SkipReason>> {
    let Some(link) = entry.dedup_link() else {
        return Ok(Some(SkipReason::NoLink));
    };

    if items.exists_by_link(source.id, link).await? {
        return Ok(Some(SkipReason::Duplicate));
    }

    if !passes_shorts_filter(source, link) {
        return Ok(Some(SkipReason::ShortsPolicy));
    }

    Ok(check_min_upvotes(http, source, link).await)
}
