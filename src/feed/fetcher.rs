//! Feed fetcher with security measures.
//!
//! Retrieves RSS/Atom feeds and JSON endpoints through the injected
//! [`HttpClient`], with SSRF protection on every URL.

use std::net::IpAddr;
use std::sync::Arc;

use feed_rs::model::{Entry, MediaObject, Text};
use feed_rs::parser;
use serde::de::DeserializeOwned;

use super::types::{MediaGroup, ParsedFeed, RawEntry};
use crate::http::{get_json, HttpClient};
use crate::normalize::text::{collapse_whitespace, strip_tags};
use crate::{FeedhubError, Result};

/// Feed fetcher over an injected HTTP client.
#[derive(Clone)]
pub struct FeedFetcher {
    http: Arc<dyn HttpClient>,
}

impl FeedFetcher {
    /// Create a fetcher.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// The underlying HTTP client, for enrichment lookups.
    pub fn http(&self) -> &dyn HttpClient {
        self.http.as_ref()
    }

    /// Fetch and parse a feed from the given URL.
    pub async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        validate_url(url)?;

        let response = self.http.get(url).await?;
        if !response.is_success() {
            return Err(FeedhubError::Fetch(format!(
                "HTTP error: {} for {}",
                response.status, url
            )));
        }

        parse_feed(&response.body)
    }
}

/// Fetch a JSON document (Reddit `.json` endpoints, Bluesky public API)
/// after the same URL checks as feeds.
pub async fn fetch_json<T: DeserializeOwned>(http: &dyn HttpClient, url: &str) -> Result<T> {
    validate_url(url)?;
    get_json(http, url).await
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| FeedhubError::Validation(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedhubError::Validation(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedhubError::Validation("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(FeedhubError::Validation(format!(
                    "forbidden host: {}",
                    domain
                )));
            }
            return Ok(());
        }
        url::Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        url::Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };

    if is_private_ip(&ip) {
        return Err(FeedhubError::Validation(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }

    Ok(())
}

/// Check if a hostname is forbidden.
fn is_forbidden_hostname(host: &str) -> bool {
    let host_lower = host.to_lowercase();

    if host_lower == "localhost" {
        return true;
    }

    [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ]
    .iter()
    .any(|suffix| host_lower.ends_with(suffix))
}

/// Check if an IP address is private/reserved.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            let segments = ipv6.segments();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Parse feed bytes into a ParsedFeed.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedhubError::Fetch(format!("failed to parse feed: {}", e)))?;

    let title = feed.title.map(plain_text).filter(|t| !t.is_empty());
    let icon_url = feed.logo.or(feed.icon).map(|image| image.uri);

    let entries = feed.entries.into_iter().map(convert_entry).collect();

    Ok(ParsedFeed {
        title,
        icon_url,
        entries,
    })
}

/// Plain text of a feed text construct: HTML is stripped, plain text is
/// kept verbatim apart from whitespace.
fn plain_text(text: Text) -> String {
    let mime = text.content_type.essence().to_string();
    if mime.ends_with("html") || mime.ends_with("xhtml+xml") {
        strip_tags(&text.content)
    } else {
        collapse_whitespace(&text.content)
    }
}

fn convert_entry(entry: Entry) -> RawEntry {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone());

    let mut raw = RawEntry {
        guid: entry.id,
        title: entry.title.map(plain_text).filter(|t| !t.is_empty()),
        link,
        author: entry
            .authors
            .first()
            .map(|a| a.name.clone())
            .filter(|name| !name.is_empty()),
        published_at: entry.published.or(entry.updated),
        content_html: entry.content.and_then(|c| c.body),
        description: entry.summary.map(|s| s.content),
        ..Default::default()
    };

    for object in entry.media {
        if raw.description.is_none() {
            raw.description = object
                .description
                .as_ref()
                .map(|d| d.content.clone())
                .filter(|d| !d.trim().is_empty());
        }
        classify_media(object, &mut raw);
    }

    raw
}

/// Whether a media content entry can stand in for an image.
fn is_image_like(content_type: Option<&str>) -> bool {
    content_type.map_or(true, |mime| mime.starts_with("image/"))
}

/// Sort a media object into groups, direct media or the enclosure.
///
/// The parser folds `media:group`, loose `media:*` elements and the RSS
/// enclosure into media objects. A lone thumbnail set is direct thumbnails;
/// a single sized content item with no thumbnails is the enclosure; a
/// single content item otherwise is direct content; anything else is a
/// group.
fn classify_media(object: MediaObject, raw: &mut RawEntry) {
    let thumbnails: Vec<String> = object
        .thumbnails
        .into_iter()
        .map(|t| t.image.uri)
        .collect();

    let content_count = object.content.len();
    let single_sized = content_count == 1 && object.content[0].size.is_some();

    let contents: Vec<String> = object
        .content
        .into_iter()
        .filter(|c| {
            let mime = c.content_type.as_ref().map(|m| m.essence().to_string());
            is_image_like(mime.as_deref())
        })
        .filter_map(|c| c.url.map(|u| u.to_string()))
        .collect();

    match (content_count, thumbnails.is_empty()) {
        (0, false) => raw.media_thumbnails.extend(thumbnails),
        (0, true) => {}
        (1, true) if single_sized => {
            if raw.enclosure_url.is_none() {
                raw.enclosure_url = contents.into_iter().next();
            }
        }
        (1, true) => raw.media_contents.extend(contents),
        _ => raw.media_groups.push(MediaGroup {
            thumbnails,
            contents,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StubHttpClient;

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://example.com/feed.xml").is_ok());
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        let result = validate_url("ftp://example.com/feed.xml");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));
    }

    #[test]
    fn test_validate_url_forbidden_hosts() {
        for url in [
            "http://localhost/feed.xml",
            "http://server.local/feed.xml",
            "http://api.internal/feed.xml",
        ] {
            let result = validate_url(url);
            assert!(result.unwrap_err().to_string().contains("forbidden host"));
        }
    }

    #[test]
    fn test_validate_url_private_ips() {
        for url in [
            "http://127.0.0.1/feed.xml",
            "http://10.0.0.1/feed.xml",
            "http://172.16.0.1/feed.xml",
            "http://192.168.1.1/feed.xml",
            "http://169.254.169.254/latest/meta-data",
            "http://100.64.0.1/feed.xml",
            "http://[::1]/feed.xml",
            "http://[::ffff:127.0.0.1]/feed.xml",
        ] {
            let result = validate_url(url);
            assert!(
                result.unwrap_err().to_string().contains("private IP"),
                "{url}"
            );
        }

        // 172.32 is public
        assert!(validate_url("http://172.32.0.1/feed.xml").is_ok());
    }

    #[test]
    fn test_is_forbidden_hostname() {
        assert!(is_forbidden_hostname("localhost"));
        assert!(is_forbidden_hostname("api.localhost"));
        assert!(is_forbidden_hostname("corp.intranet"));
        assert!(!is_forbidden_hostname("example.com"));
        assert!(!is_forbidden_hostname("localhost.example.com"));
    }

    #[test]
    fn test_is_private_ip_v6() {
        assert!(is_private_ip(&"::".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn test_parse_feed_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>A test feed</description>
    <image><url>https://example.com/logo.png</url><title>Test</title><link>https://example.com</link></image>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <description>&lt;p&gt;Description&lt;/p&gt;</description>
      <content:encoded><![CDATA[<p>Full <b>body</b></p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Test Feed"));
        assert_eq!(feed.icon_url.as_deref(), Some("https://example.com/logo.png"));
        assert_eq!(feed.entries.len(), 1);

        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_deref(), Some("First Article"));
        assert_eq!(entry.guid, "guid-1");
        assert_eq!(entry.link.as_deref(), Some("https://example.com/1"));
        assert_eq!(entry.description.as_deref(), Some("<p>Description</p>"));
        assert_eq!(entry.content_html.as_deref(), Some("<p>Full <b>body</b></p>"));
    }

    #[test]
    fn test_parse_feed_youtube_media_group() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
  <title>Channel</title>
  <entry>
    <id>yt:video:dQw4w9WgXcQ</id>
    <yt:videoId>dQw4w9WgXcQ</yt:videoId>
    <title>Video</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=dQw4w9WgXcQ"/>
    <author><name>Channel</name></author>
    <published>2024-01-01T00:00:00+00:00</published>
    <media:group>
      <media:title>Video</media:title>
      <media:content url="https://www.youtube.com/v/dQw4w9WgXcQ?version=3" type="application/x-shockwave-flash" width="640" height="390"/>
      <media:thumbnail url="https://i1.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" width="480" height="360"/>
      <media:description>Line one
Line two</media:description>
    </media:group>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        let entry = &feed.entries[0];
        assert_eq!(
            entry.link.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(entry.media_groups.len(), 1);
        assert_eq!(
            entry.media_groups[0].thumbnails,
            vec!["https://i1.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string()]
        );
        // Flash player URL is not an image.
        assert!(entry.media_groups[0].contents.is_empty());
        assert_eq!(entry.description.as_deref(), Some("Line one\nLine two"));
        assert!(entry.published_at.is_some());
    }

    #[test]
    fn test_parse_feed_minimal() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <item>
      <guid>1</guid>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title, None);
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title, None);
        assert_eq!(feed.entries[0].guid, "1");
    }

    #[test]
    fn test_parse_feed_invalid() {
        let result = parse_feed(b"This is not XML");
        assert!(matches!(result, Err(FeedhubError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let stub = Arc::new(StubHttpClient::new());
        stub.respond_with_status("https://example.com/feed.xml", 503, "busy");
        let fetcher = FeedFetcher::new(stub);

        let err = fetcher.fetch("https://example.com/feed.xml").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_private_url_without_request() {
        let stub = Arc::new(StubHttpClient::new());
        let fetcher = FeedFetcher::new(stub.clone());

        assert!(fetcher.fetch("http://192.168.0.10/feed").await.is_err());
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_json() {
        let stub = StubHttpClient::new();
        stub.respond("https://www.reddit.com/r/rust/about.json", r#"{"data":{"title":"Rust"}}"#);

        let value: serde_json::Value = fetch_json(&stub, "https://www.reddit.com/r/rust/about.json")
            .await
            .unwrap();
        assert_eq!(value["data"]["title"], "Rust");
    }

    #[tokio::test]
    async fn test_fetch_json_rejects_private_hosts() {
        let stub = StubHttpClient::new();
        stub.respond("http://169.254.169.254/latest", "{}");

        let result: Result<serde_json::Value> =
            fetch_json(&stub, "http://169.254.169.254/latest").await;
        assert!(matches!(result, Err(FeedhubError::Validation(_))));
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn test_parse_feed_plain_and_html_titles() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Feeds &amp; &lt;Things&gt;</title>
  <entry>
    <id>1</id>
    <title>I &lt;3 Rust &amp; Go</title>
    <link href="https://example.com/1"/>
  </entry>
  <entry>
    <id>2</id>
    <title type="html">&lt;b&gt;Bold&lt;/b&gt; move &amp;amp; more</title>
    <link href="https://example.com/2"/>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Feeds & <Things>"));
        assert_eq!(feed.entries[0].title.as_deref(), Some("I <3 Rust & Go"));
        assert_eq!(feed.entries[1].title.as_deref(), Some("Bold move & more"));
    }
}
