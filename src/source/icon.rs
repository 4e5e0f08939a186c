//! Best-effort icon discovery for new sources.
//!
//! Every lookup returns `None` on any failure; a missing icon never blocks
//! source creation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::types::{RedditKind, SourceIdentifier};
use crate::feed::fetcher::fetch_json;
use crate::feed::types::ParsedFeed;
use crate::http::{get_text, HttpClient};
use crate::normalize::text::unescape_entities;

static META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("valid meta regex"));

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<link\b[^>]*>").expect("valid link regex"));

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b([a-z][a-z0-9:_-]*)\s*=\s*["']([^"']*)["']"#).expect("valid attribute regex")
});

/// Attribute value of a tag, by attribute name.
fn attribute(tag: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(tag)
        .find(|cap| cap[1].eq_ignore_ascii_case(name))
        .map(|cap| unescape_entities(&cap[2]))
}

/// `content` of the first `<meta>` whose `property`, `name` or `itemprop`
/// equals `key`.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    META_RE.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let matches = ["property", "name", "itemprop"]
            .iter()
            .any(|attr| attribute(tag, attr).is_some_and(|v| v.eq_ignore_ascii_case(key)));
        if matches {
            attribute(tag, "content").filter(|c| !c.trim().is_empty())
        } else {
            None
        }
    })
}

/// `href` of the first `<link itemprop="thumbnailUrl">`.
fn thumbnail_link(html: &str) -> Option<String> {
    LINK_RE.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        if attribute(tag, "itemprop").is_some_and(|v| v == "thumbnailUrl") {
            attribute(tag, "href").filter(|h| !h.trim().is_empty())
        } else {
            None
        }
    })
}

/// Icon from a Reddit `about.json` response: `community_icon`, then
/// `icon_img`, then `header_img`. Entities are decoded; the query is kept.
pub fn reddit_icon(about: &Value) -> Option<String> {
    let data = about.get("data")?;
    ["community_icon", "icon_img", "header_img"]
        .iter()
        .filter_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(unescape_entities)
}

async fn page_icon(http: &dyn HttpClient, url: &str, keys: &[&str]) -> Option<String> {
    let html = match get_text(http, url).await {
        Ok(html) => html,
        Err(e) => {
            debug!("Icon page fetch failed for {}: {}", url, e);
            return None;
        }
    };
    keys.iter().find_map(|key| meta_content(&html, key))
}

/// Discover an icon for a source.
///
/// RSS sources use the feed's own logo, if the feed was fetched.
pub async fn discover_icon(
    identifier: &SourceIdentifier,
    feed: Option<&ParsedFeed>,
    http: &dyn HttpClient,
) -> Option<String> {
    match identifier {
        SourceIdentifier::Rss { .. } => feed.and_then(|f| f.icon_url.clone()),
        SourceIdentifier::YouTube { channel_id } => {
            let url = format!("https://www.youtube.com/channel/{channel_id}");
            let html = match get_text(http, &url).await {
                Ok(html) => html,
                Err(e) => {
                    debug!("Icon page fetch failed for {}: {}", url, e);
                    return None;
                }
            };
            meta_content(&html, "og:image").or_else(|| thumbnail_link(&html))
        }
        SourceIdentifier::Reddit { name, kind } => {
            let url = match kind {
                RedditKind::Subreddit => format!("https://www.reddit.com/r/{name}/about.json"),
                RedditKind::User => format!("https://www.reddit.com/user/{name}/about.json"),
            };
            match fetch_json::<Value>(http, &url).await {
                Ok(about) => reddit_icon(&about),
                Err(e) => {
                    debug!("Reddit about.json failed for {}: {}", url, e);
                    None
                }
            }
        }
        SourceIdentifier::Bluesky { handle } => {
            let url = format!("https://bsky.app/profile/{handle}");
            page_icon(http, &url, &["og:image", "twitter:image"]).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StubHttpClient;

    #[test]
    fn test_meta_content_either_attribute_order() {
        let html = r#"<head>
            <meta name="description" content="x">
            <meta content="https://cdn.example/og.png" property="og:image">
        </head>"#;
        assert_eq!(
            meta_content(html, "og:image").as_deref(),
            Some("https://cdn.example/og.png")
        );
        assert_eq!(meta_content(html, "twitter:image"), None);
    }

    #[test]
    fn test_thumbnail_link() {
        let html = r#"<link rel="canonical" href="https://www.youtube.com/channel/x"><link itemprop="thumbnailUrl" href="https://yt3.example/a.jpg?x=1&amp;y=2">"#;
        assert_eq!(
            thumbnail_link(html).as_deref(),
            Some("https://yt3.example/a.jpg?x=1&y=2")
        );
        assert_eq!(thumbnail_link("<link rel=\"icon\" href=\"/f.ico\">"), None);
    }

    #[test]
    fn test_reddit_icon_chain() {
        let about = serde_json::json!({"data": {
            "community_icon": "https://styles.redditmedia.com/icon.png?width=256&amp;s=abc",
            "icon_img": "https://b.thumbs.redditmedia.com/icon.png"
        }});
        assert_eq!(
            reddit_icon(&about).as_deref(),
            Some("https://styles.redditmedia.com/icon.png?width=256&s=abc")
        );

        let about = serde_json::json!({"data": {"community_icon": "", "icon_img": "", "header_img": "https://h.png"}});
        assert_eq!(reddit_icon(&about).as_deref(), Some("https://h.png"));

        let about = serde_json::json!({"data": {"community_icon": null}});
        assert_eq!(reddit_icon(&about), None);
    }

    #[tokio::test]
    async fn test_discover_youtube_icon() {
        let http = StubHttpClient::new();
        http.respond(
            "https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv",
            r#"<link itemprop="thumbnailUrl" href="https://yt3.ggpht.com/avatar=s900">"#,
        );
        let identifier = SourceIdentifier::YouTube {
            channel_id: "UCabcdefghijklmnopqrstuv".into(),
        };
        assert_eq!(
            discover_icon(&identifier, None, &http).await.as_deref(),
            Some("https://yt3.ggpht.com/avatar=s900")
        );
    }

    #[tokio::test]
    async fn test_discover_bluesky_icon_twitter_fallback() {
        let http = StubHttpClient::new();
        http.respond(
            "https://bsky.app/profile/alice.bsky.social",
            r#"<meta name="twitter:image" content="https://cdn.bsky.app/avatar.jpg">"#,
        );
        let identifier = SourceIdentifier::Bluesky {
            handle: "alice.bsky.social".into(),
        };
        assert_eq!(
            discover_icon(&identifier, None, &http).await.as_deref(),
            Some("https://cdn.bsky.app/avatar.jpg")
        );
    }

    #[tokio::test]
    async fn test_discover_failures_yield_none() {
        let http = StubHttpClient::new();
        http.respond_with_status("https://www.reddit.com/r/rust/about.json", 403, "forbidden");
        let identifier = SourceIdentifier::Reddit {
            name: "rust".into(),
            kind: RedditKind::Subreddit,
        };
        assert_eq!(discover_icon(&identifier, None, &http).await, None);

        let rss = SourceIdentifier::Rss {
            feed_url: "https://example.com/feed".into(),
        };
        let feed = ParsedFeed {
            icon_url: Some("https://example.com/logo.png".into()),
            ..Default::default()
        };
        assert_eq!(discover_icon(&rss, None, &http).await, None);
        assert_eq!(
            discover_icon(&rss, Some(&feed), &http).await.as_deref(),
            Some("https://example.com/logo.png")
        );
    }
}
