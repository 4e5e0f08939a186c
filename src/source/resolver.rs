//! Source identifier resolution.
//!
//! Turns whatever the user typed (a URL, a handle, a bare name) into a
//! canonical [`SourceIdentifier`]. Malformed input yields `None`; only
//! unreachable upstreams during a YouTube page scrape also yield `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::types::{RedditKind, SourceIdentifier, SourceType};
use crate::feed::fetcher::validate_url;
use crate::http::{get_text, HttpClient};

/// A parsed YouTube reference: either the channel id itself, or a page that
/// has to be scraped for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YouTubeRef {
    Channel(String),
    Page(String),
}

/// Resolve user input for the given source type.
pub async fn resolve(
    source_type: SourceType,
    input: &str,
    http: &dyn HttpClient,
) -> Option<SourceIdentifier> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match source_type {
        SourceType::Rss => parse_rss(input),
        SourceType::Reddit => parse_reddit(input),
        SourceType::Bluesky => parse_bluesky(input),
        SourceType::YouTube => match parse_youtube(input)? {
            YouTubeRef::Channel(channel_id) => Some(SourceIdentifier::YouTube { channel_id }),
            YouTubeRef::Page(page_url) => {
                let html = match get_text(http, &page_url).await {
                    Ok(html) => html,
                    Err(e) => {
                        debug!("YouTube page fetch failed for {}: {}", page_url, e);
                        return None;
                    }
                };
                let channel_id = scrape_channel_id(&html)?;
                Some(SourceIdentifier::YouTube { channel_id })
            }
        },
    }
}

/// RSS: identity, provided the URL passes the SSRF guard.
pub fn parse_rss(input: &str) -> Option<SourceIdentifier> {
    validate_url(input).ok()?;
    Some(SourceIdentifier::Rss {
        feed_url: input.to_string(),
    })
}

fn is_channel_id(s: &str) -> bool {
    s.len() == 24
        && s.starts_with("UC")
        && s[2..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_handle_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parse a URL that may be missing its scheme.
fn parse_loose_url(input: &str) -> Option<url::Url> {
    if input.starts_with("http://") || input.starts_with("https://") {
        url::Url::parse(input).ok()
    } else if input.contains('/') || input.contains('.') {
        url::Url::parse(&format!("https://{input}")).ok()
    } else {
        None
    }
}

/// Parse a YouTube reference.
pub fn parse_youtube(input: &str) -> Option<YouTubeRef> {
    if is_channel_id(input) {
        return Some(YouTubeRef::Channel(input.to_string()));
    }

    if let Some(handle) = input.strip_prefix('@') {
        if is_handle_segment(handle) {
            return Some(YouTubeRef::Page(format!("https://www.youtube.com/@{handle}")));
        }
        return None;
    }

    let url = parse_loose_url(input)?;
    let host = url.host_str()?.to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if host == "youtu.be" {
        let video_id = segments.first()?;
        return Some(YouTubeRef::Page(format!(
            "https://www.youtube.com/watch?v={video_id}"
        )));
    }

    if !matches!(
        host.as_str(),
        "youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com"
    ) {
        return None;
    }

    if let Some((_, channel_id)) = url.query_pairs().find(|(k, _)| k == "channel_id") {
        return is_channel_id(&channel_id).then(|| YouTubeRef::Channel(channel_id.into_owned()));
    }

    match segments.as_slice() {
        [first, ..] if first.starts_with('@') && is_handle_segment(&first[1..]) => Some(
            YouTubeRef::Page(format!("https://www.youtube.com/{first}")),
        ),
        ["channel", id, ..] => is_channel_id(id).then(|| YouTubeRef::Channel(id.to_string())),
        [kind @ ("c" | "user"), name, ..] if is_handle_segment(name) => Some(YouTubeRef::Page(
            format!("https://www.youtube.com/{kind}/{name}"),
        )),
        ["watch", ..] => {
            let (_, video_id) = url.query_pairs().find(|(k, _)| k == "v")?;
            Some(YouTubeRef::Page(format!(
                "https://www.youtube.com/watch?v={video_id}"
            )))
        }
        [kind @ ("shorts" | "live" | "embed"), video_id, ..] => Some(YouTubeRef::Page(format!(
            "https://www.youtube.com/{kind}/{video_id}"
        ))),
        _ => None,
    }
}

/// Patterns tried against a YouTube page, in order.
static CHANNEL_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""channelId":"(UC[\w-]{22})""#,
        r#"<meta\s+itemprop="channelId"\s+content="(UC[\w-]{22})""#,
        r#""externalId":"(UC[\w-]{22})""#,
        r#"<link\s+rel="canonical"\s+href="[^"]*/channel/(UC[\w-]{22})""#,
        r#""browseId":"(UC[\w-]{22})""#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid channel id regex"))
    .collect()
});

/// Extract a channel id from YouTube page HTML.
pub fn scrape_channel_id(html: &str) -> Option<String> {
    CHANNEL_ID_PATTERNS.iter().find_map(|re| {
        re.captures(html)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn is_reddit_name(s: &str) -> bool {
    (2..=32).contains(&s.len())
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse a Reddit reference.
pub fn parse_reddit(input: &str) -> Option<SourceIdentifier> {
    let reddit = |name: &str, kind: RedditKind| {
        is_reddit_name(name).then(|| SourceIdentifier::Reddit {
            name: name.to_string(),
            kind,
        })
    };

    let token = input.trim_start_matches('/');
    if let Some(name) = token.strip_prefix("r/") {
        return reddit(name.trim_end_matches('/'), RedditKind::Subreddit);
    }
    if let Some(name) = token
        .strip_prefix("u/")
        .or_else(|| token.strip_prefix("user/"))
    {
        return reddit(name.trim_end_matches('/'), RedditKind::User);
    }
    if is_reddit_name(token) {
        return reddit(token, RedditKind::Subreddit);
    }

    let url = parse_loose_url(input)?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "reddit.com" && !host.ends_with(".reddit.com") {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["r", name, ..] => reddit(name.trim_end_matches(".rss"), RedditKind::Subreddit),
        ["user" | "u", name, ..] => reddit(name, RedditKind::User),
        _ => None,
    }
}

fn is_bluesky_handle(s: &str) -> bool {
    let labels: Vec<&str> = s.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

fn is_did(s: &str) -> bool {
    s.starts_with("did:plc:") || s.starts_with("did:web:")
}

/// Parse a Bluesky reference.
pub fn parse_bluesky(input: &str) -> Option<SourceIdentifier> {
    let bluesky = |handle: &str| {
        let handle = handle.to_ascii_lowercase();
        (is_bluesky_handle(&handle) || is_did(&handle))
            .then_some(SourceIdentifier::Bluesky { handle })
    };

    let bare = input.strip_prefix('@').unwrap_or(input);
    if !bare.contains('/') && (is_bluesky_handle(bare) || is_did(bare)) {
        return bluesky(bare);
    }

    let url = parse_loose_url(input)?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "bsky.app" && host != "www.bsky.app" {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|seg| !seg.is_empty());
    match (segments.next(), segments.next()) {
        (Some("profile"), Some(actor)) => {
            let actor = urlencoding::decode(actor).ok()?;
            bluesky(actor.trim_start_matches('@'))
        }
        _ => None,
    }
}
