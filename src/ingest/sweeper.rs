//! Retention sweeper.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::item::repository::ItemStore;
use crate::Result;

/// Deletes items that have outlived their source's retention period.
///
/// Items in any collection are never deleted, nor are items without a
/// publication time or from sources that keep items forever.
pub struct RetentionSweeper {
    items: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
}

impl RetentionSweeper {
    /// Create a sweeper.
    pub fn new(items: Arc<dyn ItemStore>, clock: Arc<dyn Clock>) -> Self {
        Self { items, clock }
    }

    /// Sweep using the current time. Returns the number of deleted items.
    pub async fn sweep(&self) -> Result<u64> {
        self.sweep_at(self.clock.now()).await
    }

    /// Sweep as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let deleted = self.items.delete_expired(now).await?;
        if deleted > 0 {
            info!("Retention sweep deleted {} item(s)", deleted);
        } else {
            debug!("Retention sweep: nothing to delete");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::Database;
    use crate::item::repository::SqliteItemRepository;
    use crate::item::types::NewItem;
    use crate::source::repository::SqliteSourceRepository;
    use crate::source::types::{NewSource, SourceIdentifier};
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_sweep_uses_clock() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let source = SqliteSourceRepository::new(&db)
            .create(
                &NewSource::new(
                    1,
                    "https://example.com/feed",
                    SourceIdentifier::Rss {
                        feed_url: "https://example.com/feed".into(),
                    },
                    "Example",
                )
                .with_retention_days(3),
                now,
            )
            .await
            .unwrap();
        let items = Arc::new(SqliteItemRepository::new(&db));
        items
            .insert(
                &NewItem::new(source.id, "old", "https://example.com/old")
                    .with_excerpt("old")
                    .with_published_at(now - Duration::days(4)),
                now,
            )
            .await
            .unwrap();

        let sweeper = RetentionSweeper::new(items.clone(), Arc::new(FixedClock(now)));
        assert_eq!(sweeper.sweep().await.unwrap(), 1);
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
        assert_eq!(items.count_by_source(source.id).await.unwrap(), 0);
    }
}
