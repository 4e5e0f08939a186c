//! Database schema and migrations for feedhub.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded. Timestamps are stored as INTEGER unix milliseconds.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Sources table
    r#"
CREATE TABLE sources (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL,
    source_type     TEXT NOT NULL,           -- 'rss', 'youtube', 'reddit', 'bluesky'
    url             TEXT NOT NULL,           -- user-supplied reference
    feed_url        TEXT NOT NULL,           -- canonical fetchable feed URL
    channel_id      TEXT,                    -- youtube only
    reddit_name     TEXT,                    -- reddit only
    reddit_kind     TEXT,                    -- 'subreddit' or 'user', reddit only
    bluesky_handle  TEXT,                    -- bluesky only
    title           TEXT NOT NULL,
    icon_url        TEXT,
    filters         TEXT NOT NULL DEFAULT '{}',  -- JSON
    retention_days  INTEGER NOT NULL DEFAULT 0,  -- 0 = keep forever
    last_fetched_at INTEGER,
    created_at      INTEGER NOT NULL
);

CREATE INDEX idx_sources_user_id ON sources(user_id);
"#,
    // v2: Items table
    r#"
CREATE TABLE items (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id    INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    link         TEXT NOT NULL,
    content      TEXT NOT NULL,
    excerpt      TEXT NOT NULL,
    author       TEXT,
    published_at INTEGER,
    image_url    TEXT,
    read         INTEGER NOT NULL DEFAULT 0,
    saved        INTEGER NOT NULL DEFAULT 0,
    created_at   INTEGER NOT NULL,
    UNIQUE(source_id, link)
);

CREATE INDEX idx_items_source_id ON items(source_id);
CREATE INDEX idx_items_published_at ON items(published_at);
"#,
    // v3: Collections (owned by the surrounding application; read here for retention)
    r#"
CREATE TABLE collections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    name        TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE TABLE collection_items (
    collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    item_id       INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    added_at      INTEGER NOT NULL,
    PRIMARY KEY (collection_id, item_id)
);

CREATE INDEX idx_collection_items_item_id ON collection_items(item_id);
"#,
];
