//! Content normalization.
//!
//! Each source type has an adapter that turns a [`RawEntry`] into rendered
//! HTML plus a lead image. The shared steps here then derive the title and
//! excerpt and build the [`NewItem`].

pub mod bluesky;
pub mod media;
pub mod reddit;
pub mod rss;
pub mod text;
pub mod youtube;

use std::sync::Arc;

use crate::feed::types::RawEntry;
use crate::http::HttpClient;
use crate::item::types::NewItem;
use crate::source::types::SourceType;

use text::{collapse_whitespace, excerpt, strip_tags, title_from_text, unescape_entities};

/// Output of a per-type adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Safe HTML body, including any synthesized embed markup.
    pub content: String,
    /// Lead image.
    pub image_url: Option<String>,
    /// HTML the excerpt (and a missing title) is derived from.
    pub summary_html: String,
}

/// Normalizes raw entries for one source type.
#[derive(Clone)]
pub struct Normalizer {
    http: Arc<dyn HttpClient>,
}

impl Normalizer {
    /// Create a normalizer. The client is used for Reddit gallery lookups and
    /// Bluesky thread enrichment.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Run the adapter for `source_type` over an entry.
    pub async fn render(&self, source_type: SourceType, entry: &RawEntry) -> Rendered {
        match source_type {
            SourceType::Rss => rss::render(entry),
            SourceType::YouTube => youtube::render(entry).unwrap_or_else(|| rss::render(entry)),
            SourceType::Reddit => reddit::render(entry, self.http.as_ref()).await,
            SourceType::Bluesky => bluesky::render(entry, self.http.as_ref()).await,
        }
    }

    /// Normalize an entry into an insertable item.
    ///
    /// Returns `None` when the entry has neither a link nor a guid to
    /// deduplicate on.
    pub async fn normalize(
        &self,
        source_id: i64,
        source_type: SourceType,
        entry: &RawEntry,
    ) -> Option<NewItem> {
        let link = entry.dedup_link()?.to_string();
        let rendered = self.render(source_type, entry).await;

        let title = entry
            .title
            .as_deref()
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_text(&title_source(source_type, &rendered)));

        let summary = [rendered.summary_html.as_str(), rendered.content.as_str()]
            .into_iter()
            .map(excerpt)
            .find(|e| !e.is_empty())
            .unwrap_or_else(|| excerpt(&title));

        let mut item = NewItem::new(source_id, title, link)
            .with_content(rendered.content)
            .with_excerpt(summary);
        if let Some(author) = entry.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            item = item.with_author(author);
        }
        if let Some(published_at) = entry.published_at {
            item = item.with_published_at(published_at);
        }
        if let Some(image_url) = rendered.image_url {
            item = item.with_image_url(image_url);
        }
        Some(item)
    }
}

/// Text a missing title is generated from.
///
/// Plain-text posts keep their line breaks so the first line can become the
/// title; HTML bodies are flattened.
fn title_source(source_type: SourceType, rendered: &Rendered) -> String {
    match source_type {
        SourceType::Bluesky | SourceType::YouTube => unescape_entities(&rendered.summary_html),
        SourceType::Rss | SourceType::Reddit => strip_tags(&rendered.summary_html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StubHttpClient;
    use chrono::{TimeZone, Utc};

    fn normalizer() -> Normalizer {
        Normalizer::new(Arc::new(StubHttpClient::new()))
    }

    #[tokio::test]
    async fn test_normalize_rss_entry() {
        let mut entry = RawEntry::new("g1", "https://example.com/post");
        entry.title = Some(" Hello &\n welcome ".into());
        entry.author = Some("  Alice ".into());
        entry.published_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        entry.description = Some(format!("<p>{}</p>", "word ".repeat(100)));

        let item = normalizer()
            .normalize(7, SourceType::Rss, &entry)
            .await
            .unwrap();
        assert_eq!(item.source_id, 7);
        assert_eq!(item.title, "Hello & welcome");
        assert_eq!(item.link, "https://example.com/post");
        assert_eq!(item.author.as_deref(), Some("Alice"));
        assert!(item.excerpt.ends_with("..."));
        assert_eq!(item.excerpt.chars().count(), 203);
        assert!(item.published_at.is_some());
    }

    #[tokio::test]
    async fn test_plain_title_keeps_angle_brackets() {
        for (source_type, title) in [
            (SourceType::YouTube, "I <3 Rust and Go"),
            (SourceType::Rss, "Why 2 < 3 matters"),
            (SourceType::Reddit, "<b> is not bold here & that's fine"),
        ] {
            let mut entry = RawEntry::new("g", "https://example.com/x");
            entry.title = Some(title.into());
            let item = normalizer().normalize(1, source_type, &entry).await.unwrap();
            assert_eq!(item.title, title);
        }
    }

    #[tokio::test]
    async fn test_bluesky_title_from_first_line() {
        let mut entry = RawEntry::new("at://x", "https://example.com/not-bluesky");
        entry.description = Some("First line here\nand then more text".into());

        let item = normalizer()
            .normalize(1, SourceType::Bluesky, &entry)
            .await
            .unwrap();
        assert_eq!(item.title, "First line here");
        assert_eq!(item.excerpt, "First line here and then more text");
    }

    #[tokio::test]
    async fn test_empty_entry_gets_untitled() {
        let entry = RawEntry::new("g", "https://example.com/empty");

        let item = normalizer()
            .normalize(1, SourceType::Rss, &entry)
            .await
            .unwrap();
        assert_eq!(item.title, "Untitled");
        assert_eq!(item.excerpt, "Untitled");
    }

    #[tokio::test]
    async fn test_youtube_without_video_id_falls_back_to_rss() {
        let mut entry = RawEntry::new("tag:x", "https://example.com/watch");
        entry.title = Some("Not a video".into());
        entry.description = Some("<p>desc</p>".into());

        let item = normalizer()
            .normalize(1, SourceType::YouTube, &entry)
            .await
            .unwrap();
        assert_eq!(item.content, "<p>desc</p>");
    }

    #[tokio::test]
    async fn test_entry_without_link_or_guid_is_skipped() {
        let mut entry = RawEntry::new("", "");
        entry.title = Some("orphan".into());
        assert!(normalizer()
            .normalize(1, SourceType::Rss, &entry)
            .await
            .is_none());
    }
}
