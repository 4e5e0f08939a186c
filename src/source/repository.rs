//! Source repository for feedhub.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::{NewSource, RedditKind, Source, SourceFilters, SourceIdentifier, SourceType};
use crate::datetime::{from_millis, to_millis};
use crate::db::Database;
use crate::{FeedhubError, Result};

/// Source lookups needed by the ingestion engine.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Get a source by ID.
    async fn get_by_id(&self, id: i64) -> Result<Option<Source>>;

    /// List every source.
    async fn list_all(&self) -> Result<Vec<Source>>;

    /// List the sources of one user.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Source>>;

    /// Record a successful fetch.
    async fn update_last_fetched(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// Row type for a source from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i64,
    user_id: i64,
    source_type: String,
    url: String,
    feed_url: String,
    channel_id: Option<String>,
    reddit_name: Option<String>,
    reddit_kind: Option<String>,
    bluesky_handle: Option<String>,
    title: String,
    icon_url: Option<String>,
    filters: String,
    retention_days: i64,
    last_fetched_at: Option<i64>,
    created_at: i64,
}

impl SourceRow {
    fn identifier(&self) -> Option<SourceIdentifier> {
        match SourceType::parse(&self.source_type)? {
            SourceType::Rss => Some(SourceIdentifier::Rss {
                feed_url: self.feed_url.clone(),
            }),
            SourceType::YouTube => Some(SourceIdentifier::YouTube {
                channel_id: self.channel_id.clone()?,
            }),
            SourceType::Reddit => Some(SourceIdentifier::Reddit {
                name: self.reddit_name.clone()?,
                kind: RedditKind::parse(self.reddit_kind.as_deref()?)?,
            }),
            SourceType::Bluesky => Some(SourceIdentifier::Bluesky {
                handle: self.bluesky_handle.clone()?,
            }),
        }
    }
}

impl TryFrom<SourceRow> for Source {
    type Error = FeedhubError;

    fn try_from(row: SourceRow) -> Result<Self> {
        let identifier = row.identifier().ok_or_else(|| {
            FeedhubError::Database(format!(
                "source {} has no valid {} identifier",
                row.id, row.source_type
            ))
        })?;
        // Unreadable filter JSON falls back to the permissive default.
        let filters: SourceFilters = serde_json::from_str(&row.filters).unwrap_or_default();

        Ok(Source {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            identifier,
            title: row.title,
            icon_url: row.icon_url,
            filters,
            retention_days: row.retention_days,
            last_fetched_at: row.last_fetched_at.and_then(from_millis),
            created_at: from_millis(row.created_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Identifier columns for a source: `(channel_id, reddit_name, reddit_kind, bluesky_handle)`.
type IdentifierColumns<'a> = (
    Option<&'a str>,
    Option<&'a str>,
    Option<&'static str>,
    Option<&'a str>,
);

fn identifier_columns(identifier: &SourceIdentifier) -> IdentifierColumns<'_> {
    match identifier {
        SourceIdentifier::Rss { .. } => (None, None, None, None),
        SourceIdentifier::YouTube { channel_id } => (Some(channel_id.as_str()), None, None, None),
        SourceIdentifier::Reddit { name, kind } => {
            (None, Some(name.as_str()), Some(kind.as_str()), None)
        }
        SourceIdentifier::Bluesky { handle } => (None, None, None, Some(handle.as_str())),
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, source_type, url, feed_url, channel_id, reddit_name, reddit_kind,
           bluesky_handle, title, icon_url, filters, retention_days, last_fetched_at,
           created_at
    FROM sources
"#;

/// SQLite-backed source repository.
#[derive(Debug, Clone)]
pub struct SqliteSourceRepository {
    pool: SqlitePool,
}

impl SqliteSourceRepository {
    /// Create a new repository instance.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Create a new source.
    pub async fn create(&self, source: &NewSource, now: DateTime<Utc>) -> Result<Source> {
        let (channel_id, reddit_name, reddit_kind, bluesky_handle) =
            identifier_columns(&source.identifier);
        let filters = serde_json::to_string(&source.filters)
            .map_err(|e| FeedhubError::Validation(format!("invalid filters: {e}")))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sources (user_id, source_type, url, feed_url, channel_id, reddit_name,
                                 reddit_kind, bluesky_handle, title, icon_url, filters,
                                 retention_days, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(source.user_id)
        .bind(source.identifier.source_type().as_str())
        .bind(&source.url)
        .bind(source.identifier.feed_url())
        .bind(channel_id)
        .bind(reddit_name)
        .bind(reddit_kind)
        .bind(bluesky_handle)
        .bind(&source.title)
        .bind(&source.icon_url)
        .bind(filters)
        .bind(source.retention_days.max(0))
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| FeedhubError::NotFound("source not found".into()))
    }

    /// Replace the filter policy of a source.
    pub async fn update_filters(&self, id: i64, filters: &SourceFilters) -> Result<bool> {
        let filters = serde_json::to_string(filters)
            .map_err(|e| FeedhubError::Validation(format!("invalid filters: {e}")))?;
        let result = sqlx::query("UPDATE sources SET filters = $1 WHERE id = $2")
            .bind(filters)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change the retention period of a source. Negative values keep forever.
    pub async fn update_retention_days(&self, id: i64, days: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE sources SET retention_days = $1 WHERE id = $2")
            .bind(days.max(0))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a source and, by cascade, its items.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn into_sources(rows: Vec<SourceRow>) -> Result<Vec<Source>> {
    rows.into_iter().map(Source::try_from).collect()
}

#[async_trait]
impl SourceStore for SqliteSourceRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Source::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        into_sources(rows)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_sources(rows)
    }

    async fn update_last_fetched(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sources SET last_fetched_at = $1 WHERE id = $2")
            .bind(to_millis(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
