//! Test helpers for integration tests.
//!
//! Provides an in-memory environment with a stub HTTP client and a fixed
//! clock, plus builders for the feed formats each source type serves.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use feedhub::source::types::{NewSource, SourceFilters, SourceIdentifier};
use feedhub::{
    Database, FixedClock, IngestEngine, RetentionSweeper, Source, SqliteItemRepository,
    SqliteSourceRepository, StubHttpClient,
};

/// The instant every test environment is frozen at.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// In-memory database, stub HTTP client and fixed clock.
pub struct TestEnv {
    pub db: Database,
    pub http: Arc<StubHttpClient>,
    pub clock: Arc<FixedClock>,
}

impl TestEnv {
    /// Create an environment frozen at [`test_now`].
    pub async fn new() -> Self {
        Self::at(test_now()).await
    }

    /// Create an environment frozen at `now`.
    pub async fn at(now: DateTime<Utc>) -> Self {
        Self {
            db: Database::open_in_memory().await.unwrap(),
            http: Arc::new(StubHttpClient::new()),
            clock: Arc::new(FixedClock(now)),
        }
    }

    pub fn sources(&self) -> SqliteSourceRepository {
        SqliteSourceRepository::new(&self.db)
    }

    pub fn items(&self) -> SqliteItemRepository {
        SqliteItemRepository::new(&self.db)
    }

    pub fn engine(&self) -> IngestEngine {
        IngestEngine::new(
            Arc::new(self.sources()),
            Arc::new(self.items()),
            self.http.clone(),
            self.clock.clone(),
        )
    }

    /// Sweeper whose clock is frozen at `now`.
    pub fn sweeper_at(&self, now: DateTime<Utc>) -> RetentionSweeper {
        RetentionSweeper::new(Arc::new(self.items()), Arc::new(FixedClock(now)))
    }

    /// Store a source directly, bypassing resolution.
    pub async fn add_source(
        &self,
        user_id: i64,
        identifier: SourceIdentifier,
        filters: SourceFilters,
        retention_days: i64,
    ) -> Source {
        let title = identifier.display_name();
        self.sources()
            .create(
                &NewSource::new(user_id, title.clone(), identifier, title)
                    .with_filters(filters)
                    .with_retention_days(retention_days),
                self.clock.0,
            )
            .await
            .unwrap()
    }

    /// Create a collection and add an item to it.
    pub async fn collect(&self, item_id: i64) {
        let collection_id: i64 = sqlx::query_scalar(
            "INSERT INTO collections (user_id, name, created_at) VALUES (1, 'Saved', 0) RETURNING id",
        )
        .fetch_one(self.db.pool())
        .await
        .unwrap();
        self.items()
            .add_to_collection(collection_id, item_id, self.clock.0)
            .await
            .unwrap();
    }
}

/// Escape text for embedding in XML.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A YouTube channel Atom feed entry.
pub struct YouTubeVideo<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub short: bool,
    pub description: &'a str,
    pub published: &'a str,
}

/// YouTube channel feed in the shape YouTube serves.
pub fn youtube_feed(videos: &[YouTubeVideo<'_>]) -> String {
    let entries: String = videos
        .iter()
        .map(|v| {
            let link = if v.short {
                format!("https://www.youtube.com/shorts/{}", v.id)
            } else {
                format!("https://www.youtube.com/watch?v={}", v.id)
            };
            format!(
                r#"<entry>
  <id>yt:video:{id}</id>
  <yt:videoId>{id}</yt:videoId>
  <title>{title}</title>
  <link rel="alternate" href="{link}"/>
  <author><name>Channel</name></author>
  <published>{published}</published>
  <updated>{published}</updated>
  <media:group>
    <media:title>{title}</media:title>
    <media:content url="https://www.youtube.com/v/{id}?version=3" type="application/x-shockwave-flash" width="640" height="390"/>
    <media:thumbnail url="https://i2.ytimg.com/vi/{id}/hqdefault.jpg" width="480" height="360"/>
    <media:description>{description}</media:description>
  </media:group>
</entry>
"#,
                id = v.id,
                title = xml_escape(v.title),
                link = link,
                published = v.published,
                description = xml_escape(v.description),
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
<title>Channel</title>
<link rel="alternate" href="https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv"/>
{entries}</feed>"#
    )
}

/// A Reddit Atom feed entry.
pub struct RedditPost<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub permalink: &'a str,
    pub content_html: &'a str,
    pub published: &'a str,
}

/// Subreddit feed in the shape Reddit serves.
pub fn reddit_feed(posts: &[RedditPost<'_>]) -> String {
    let entries: String = posts
        .iter()
        .map(|p| {
            format!(
                r#"<entry>
  <author><name>/u/poster</name></author>
  <content type="html">{content}</content>
  <id>t3_{id}</id>
  <link href="{permalink}"/>
  <updated>{published}</updated>
  <published>{published}</published>
  <title>{title}</title>
</entry>
"#,
                content = xml_escape(p.content_html),
                id = p.id,
                permalink = p.permalink,
                published = p.published,
                title = xml_escape(p.title),
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
<title>rust</title>
<updated>2024-06-01T00:00:00+00:00</updated>
<id>/r/rust.rss</id>
{entries}</feed>"#
    )
}

/// Listing JSON for a Reddit post with the given score.
pub fn reddit_post_json(score: i64) -> String {
    serde_json::json!([{"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {"score": score}}]}}])
        .to_string()
}

/// A Bluesky profile RSS item.
pub struct BlueskyPost<'a> {
    pub link: &'a str,
    pub text: &'a str,
    pub pub_date: &'a str,
}

/// Bluesky profile feed in the shape bsky.app serves. Items carry no title.
pub fn bluesky_feed(posts: &[BlueskyPost<'_>]) -> String {
    let items: String = posts
        .iter()
        .map(|p| {
            format!(
                r#"<item>
  <link>{link}</link>
  <description>{text}</description>
  <pubDate>{pub_date}</pubDate>
  <guid isPermaLink="false">{link}</guid>
</item>
"#,
                link = p.link,
                text = xml_escape(p.text),
                pub_date = p.pub_date,
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
<title>@alice.bsky.social - Alice</title>
<link>https://bsky.app/profile/alice.bsky.social</link>
<description>Alice's posts</description>
{items}</channel>
</rss>"#
    )
}

/// Plain RSS feed with dated items `(title, link, pubDate)`.
pub fn rss_feed(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link, pub_date)| {
            format!(
                "<item><title>{}</title><link>{}</link><description>About {}</description><pubDate>{}</pubDate></item>\n",
                xml_escape(title),
                link,
                xml_escape(title),
                pub_date
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Example</title><link>https://example.com</link>
{items}</channel></rss>"#
    )
}
