//! Item repository for feedhub.
//!
//! This is the persistence sink of the ingestion pipeline. Inserts are
//! insert-if-absent against the `UNIQUE(source_id, link)` index, so
//! concurrent or repeated refreshes never create duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::{Item, NewItem};
use crate::datetime::{from_millis, to_millis, MILLIS_PER_DAY};
use crate::db::Database;
use crate::Result;

/// Item storage used by the ingestion engine and the retention sweeper.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Whether an item with this link already exists for the source.
    async fn exists_by_link(&self, source_id: i64, link: &str) -> Result<bool>;

    /// Insert an item unless `(source_id, link)` already exists.
    ///
    /// Returns `true` when a row was inserted.
    async fn insert(&self, item: &NewItem, now: DateTime<Utc>) -> Result<bool>;

    /// Delete items older than their source's retention period that are
    /// not in any collection. Returns the number of deleted items.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Row type for an item from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    source_id: i64,
    title: String,
    link: String,
    content: String,
    excerpt: String,
    author: Option<String>,
    published_at: Option<i64>,
    image_url: Option<String>,
    read: bool,
    saved: bool,
    created_at: i64,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            source_id: row.source_id,
            title: row.title,
            link: row.link,
            content: row.content,
            excerpt: row.excerpt,
            author: row.author,
            published_at: row.published_at.and_then(from_millis),
            image_url: row.image_url,
            read: row.read,
            saved: row.saved,
            created_at: from_millis(row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// SQLite-backed item repository.
#[derive(Debug, Clone)]
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    /// Create a new repository instance.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Get an item by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, source_id, title, link, content, excerpt, author, published_at,
                   image_url, read, saved, created_at
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    /// List items of a source, newest first.
    pub async fn list_by_source(&self, source_id: i64, limit: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, source_id, title, link, content, excerpt, author, published_at,
                   image_url, read, saved, created_at
            FROM items
            WHERE source_id = $1
            ORDER BY COALESCE(published_at, created_at) DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(source_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Count items of a source.
    pub async fn count_by_source(&self, source_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Add an item to a collection, protecting it from retention.
    pub async fn add_to_collection(
        &self,
        collection_id: i64,
        item_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO collection_items (collection_id, item_id, added_at) VALUES ($1, $2, $3)",
        )
        .bind(collection_id)
        .bind(item_id)
        .bind(to_millis(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for SqliteItemRepository {
    async fn exists_by_link(&self, source_id: i64, link: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE source_id = $1 AND link = $2")
                .bind(source_id)
                .bind(link)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn insert(&self, item: &NewItem, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO items (source_id, title, link, content, excerpt, author,
                                         published_at, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.source_id)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.content)
        .bind(&item.excerpt)
        .bind(&item.author)
        .bind(item.published_at.map(to_millis))
        .bind(&item.image_url)
        .bind(to_millis(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM items
            WHERE published_at IS NOT NULL
              AND id NOT IN (SELECT item_id FROM collection_items)
              AND EXISTS (
                  SELECT 1 FROM sources s
                  WHERE s.id = items.source_id
                    AND s.retention_days > 0
                    AND $1 - items.published_at > s.retention_days * $2
              )
            "#,
        )
        .bind(to_millis(now))
        .bind(MILLIS_PER_DAY)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
