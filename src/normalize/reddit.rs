//! Reddit entry normalization.
//!
//! Reddit's RSS content is a small HTML table wrapping a thumbnail, the
//! submitter and `[link]`/`[comments]` anchors, or the self-text. Media is
//! recognised in a fixed order: Redgifs embed, native video, gallery (via the
//! post's JSON), then inline images.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use super::media::extract_image;
use super::text::{escape_html, sanitize_html, unescape_entities};
use super::Rendered;
use crate::feed::fetcher::fetch_json;
use crate::feed::types::RawEntry;
use crate::http::HttpClient;
use crate::{FeedhubError, Result};

/// Quality variants offered for native Reddit video, best first.
pub const VIDEO_QUALITIES: &[u32] = &[720, 480, 360, 240, 96];

static REDGIFS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:www\.|v3\.)?redgifs\.com/(?:watch|ifr)/([a-z0-9]+)")
        .expect("valid redgifs regex")
});

static DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://v\.redd\.it/([A-Za-z0-9]+)").expect("valid v.redd.it regex"));

static VIDEO_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<video\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid video regex")
});

static VIDEO_ELEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<video\b[^>]*>.*?</video\s*>").expect("valid video regex"));

static HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("valid href regex")
});

static IMG_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid img regex")
});

static IMG_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("valid img regex"));

static SRC_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid src regex"));

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)
        .expect("valid anchor regex")
});

static ANCHOR_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?a\b[^>]*>").expect("valid anchor regex"));

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

fn is_reddit_host(host: &str) -> bool {
    host == "reddit.com" || host.ends_with(".reddit.com")
}

fn is_thumbnail_host(host: &str) -> bool {
    host.ends_with("thumbs.redditmedia.com")
}

/// Upgrade a `preview.redd.it` URL to the full-size `i.redd.it` original.
///
/// The query string is dropped. Other URLs are returned unchanged.
pub fn upgrade_reddit_image_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.host_str() == Some("preview.redd.it") => {
            format!("https://i.redd.it{}", parsed.path())
        }
        _ => url.to_string(),
    }
}

/// URL with the query string and fragment removed, for de-duplication.
fn without_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Append `url` unless an image with the same query-less URL is present.
fn push_unique(images: &mut Vec<String>, url: String) {
    let key = without_query(&url).to_string();
    if !images.iter().any(|existing| without_query(existing) == key) {
        images.push(url);
    }
}

/// JSON endpoint for a post permalink.
///
/// Handles `/r/<sub>/comments/<id>/...` and `/gallery/<id>` links.
pub fn post_json_url(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if !is_reddit_host(&host) && host != "redd.it" {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.contains(&"comments") {
        let path = url.path().trim_end_matches('/');
        return Some(format!("https://www.reddit.com{path}.json"));
    }
    match segments.as_slice() {
        ["gallery", id, ..] => Some(format!("https://www.reddit.com/comments/{id}.json")),
        [id] if host == "redd.it" => Some(format!("https://www.reddit.com/comments/{id}.json")),
        _ => None,
    }
}

/// Fetch the post listing JSON for a permalink.
pub async fn fetch_post(http: &dyn HttpClient, link: &str) -> Result<Value> {
    let url = post_json_url(link)
        .ok_or_else(|| FeedhubError::Enrichment(format!("not a Reddit post link: {link}")))?;
    fetch_json(http, &url)
        .await
        .map_err(|e| FeedhubError::Enrichment(e.to_string()))
}

/// The post object inside a listing response.
fn post_data(listing: &Value) -> Option<&Value> {
    listing
        .get(0)?
        .get("data")?
        .get("children")?
        .get(0)?
        .get("data")
}

/// Current score of a post.
pub async fn fetch_reddit_score(http: &dyn HttpClient, link: &str) -> Result<i64> {
    let listing = fetch_post(http, link).await?;
    post_data(&listing)
        .and_then(|post| post.get("score"))
        .and_then(Value::as_i64)
        .ok_or_else(|| FeedhubError::Enrichment(format!("no score in post JSON for {link}")))
}

/// Full-size image URLs of a gallery post, in gallery order.
pub fn gallery_images(listing: &Value) -> Vec<String> {
    let mut images = Vec::new();
    let Some(post) = post_data(listing) else {
        return images;
    };
    let (Some(items), Some(metadata)) = (
        post.pointer("/gallery_data/items").and_then(Value::as_array),
        post.get("media_metadata"),
    ) else {
        return images;
    };

    for item in items {
        let Some(media_id) = item.get("media_id").and_then(Value::as_str) else {
            continue;
        };
        let Some(source) = metadata.get(media_id).and_then(|m| m.get("s")) else {
            continue;
        };
        let best = ["u", "gif", "mp4"]
            .iter()
            .find_map(|key| source.get(*key).and_then(Value::as_str));
        if let Some(url) = best {
            push_unique(&mut images, upgrade_reddit_image_url(&unescape_entities(url)));
        }
    }
    images
}

/// Redgifs id referenced by the content, lowercased.
fn redgifs_id(html: &str) -> Option<String> {
    REDGIFS_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Native video found in a post.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NativeVideo {
    /// A `v.redd.it` id with DASH renditions.
    Dash(String),
    /// A direct `<video src>`.
    Direct(String),
}

fn native_video(html: &str, link: Option<&str>) -> Option<NativeVideo> {
    let in_content = DASH_RE.captures(html);
    let in_link = link.and_then(|l| DASH_RE.captures(l));
    if let Some(cap) = in_content.or(in_link) {
        return Some(NativeVideo::Dash(cap[1].to_string()));
    }

    VIDEO_SRC_RE
        .captures(html)
        .map(|cap| NativeVideo::Direct(unescape_entities(&cap[1])))
}

fn is_gallery(html: &str, link: Option<&str>) -> bool {
    link.is_some_and(|l| l.contains("reddit.com/gallery/")) || html.contains("reddit.com/gallery/")
}

/// Whether an anchor target is itself an image we re-host in a gallery.
fn is_image_link(url: &str) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };
    match host.as_str() {
        "i.redd.it" | "preview.redd.it" => true,
        "i.imgur.com" => {
            let path = without_query(url).to_ascii_lowercase();
            [".jpg", ".jpeg", ".png", ".gif", ".webp"]
                .iter()
                .any(|ext| path.ends_with(ext))
        }
        _ => false,
    }
}

/// Inline images: `href` targets first, then `<img>` sources, skipping
/// thumbnail hosts. URLs are upgraded and de-duplicated.
fn inline_images(html: &str) -> Vec<String> {
    let mut images = Vec::new();

    for cap in HREF_RE.captures_iter(html) {
        let href = unescape_entities(&cap[1]);
        if is_image_link(&href) {
            push_unique(&mut images, upgrade_reddit_image_url(&href));
        }
    }

    for cap in IMG_SRC_RE.captures_iter(html) {
        let src = unescape_entities(&cap[1]);
        match host_of(&src) {
            Some(host) if is_thumbnail_host(&host) => continue,
            Some(_) => push_unique(&mut images, upgrade_reddit_image_url(&src)),
            None => continue,
        }
    }

    images
}

/// Remove `<img>` tags matching the predicate on their (decoded) `src`.
fn strip_images(html: &str, remove: impl Fn(&str) -> bool) -> String {
    IMG_TAG_RE
        .replace_all(html, |caps: &Captures| {
            let src = SRC_ATTR_RE
                .captures(&caps[0])
                .map(|c| unescape_entities(&c[1]))
                .unwrap_or_default();
            if remove(&src) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Remove anchors that are empty or whose target matches the predicate,
/// together with their text.
fn strip_anchors_where(html: &str, remove: impl Fn(&str) -> bool) -> String {
    ANCHOR_RE
        .replace_all(html, |caps: &Captures| {
            let href = unescape_entities(&caps[1]);
            if caps[2].trim().is_empty() || remove(&href) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Remove anchor tags but keep their text.
fn unwrap_anchors(html: &str) -> String {
    ANCHOR_TAG_RE.replace_all(html, "").into_owned()
}

fn strip_video_elements(html: &str) -> String {
    VIDEO_ELEMENT_RE.replace_all(html, "").into_owned()
}

/// Clean image gallery markup.
fn gallery_block(images: &[String]) -> String {
    let mut html = String::from(r#"<div class="reddit-gallery">"#);
    for url in images {
        html.push_str(&format!(
            r#"<a href="{0}" target="_blank" rel="noopener noreferrer"><img src="{0}" alt="" loading="lazy" style="max-width:100%;"></a>"#,
            escape_html(url)
        ));
    }
    html.push_str("</div>");
    html
}

fn redgifs_block(id: &str) -> String {
    format!(
        r#"<div class="video-embed" style="position:relative;padding-bottom:56.25%;height:0;overflow:hidden;"><iframe src="https://www.redgifs.com/ifr/{}" style="position:absolute;top:0;left:0;width:100%;height:100%;border:0;" allowfullscreen loading="lazy"></iframe></div>"#,
        escape_html(id)
    )
}

fn video_block(video: &NativeVideo, permalink: Option<&str>, poster: Option<&str>) -> String {
    let sources = match video {
        NativeVideo::Dash(id) => VIDEO_QUALITIES
            .iter()
            .map(|q| {
                format!(
                    r#"<source src="https://v.redd.it/{}/DASH_{q}.mp4" type="video/mp4">"#,
                    escape_html(id)
                )
            })
            .collect::<String>(),
        NativeVideo::Direct(url) => {
            format!(r#"<source src="{}" type="video/mp4">"#, escape_html(url))
        }
    };
    let poster = poster
        .map(|p| format!(r#" poster="{}""#, escape_html(p)))
        .unwrap_or_default();
    let notice = match permalink {
        Some(link) => format!(
            r#"<p class="video-notice">This video plays without audio. <a href="{}" target="_blank" rel="noopener noreferrer">Open the post on Reddit</a> for sound.</p>"#,
            escape_html(link)
        ),
        None => r#"<p class="video-notice">This video plays without audio.</p>"#.to_string(),
    };

    format!(
        r#"<div class="reddit-video"><video controls preload="metadata" playsinline{poster} style="width:100%;max-height:80vh;">{sources}</video>{notice}</div>"#
    )
}

/// Render a Reddit entry.
pub async fn render(entry: &RawEntry, http: &dyn HttpClient) -> Rendered {
    let body = sanitize_html(entry.body_html().unwrap_or_default());
    let link = entry.link.as_deref();
    let lead_image = extract_image(entry).map(|url| upgrade_reddit_image_url(&url));

    if let Some(id) = redgifs_id(&body).or_else(|| link.and_then(redgifs_id)) {
        let cleaned = strip_images(&unwrap_anchors(&body), |src| {
            src.contains("redgifs.com") || src.contains("external-preview.redd.it")
        });
        return Rendered {
            content: format!("{}{}", redgifs_block(&id), cleaned),
            image_url: lead_image,
            summary_html: body,
        };
    }

    if let Some(video) = native_video(&body, link) {
        let cleaned = strip_anchors_where(
            &strip_images(&strip_video_elements(&body), |_| true),
            |href| href.contains("v.redd.it"),
        );
        return Rendered {
            content: format!(
                "{}{}",
                video_block(&video, link, lead_image.as_deref()),
                cleaned
            ),
            image_url: lead_image,
            summary_html: body,
        };
    }

    if is_gallery(&body, link) {
        let gallery_link = link.unwrap_or_default();
        match fetch_post(http, gallery_link).await {
            Ok(listing) => {
                let images = gallery_images(&listing);
                if !images.is_empty() {
                    return Rendered {
                        content: gallery_block(&images),
                        image_url: images.first().cloned(),
                        summary_html: body,
                    };
                }
                debug!("Gallery post {} has no images in JSON", gallery_link);
            }
            Err(e) => debug!("Gallery lookup failed for {}: {}", gallery_link, e),
        }
    }

    let images = inline_images(&body);
    if images.is_empty() {
        return Rendered {
            content: body.clone(),
            image_url: lead_image,
            summary_html: body,
        };
    }

    let cleaned = strip_anchors_where(&strip_images(&body, |_| true), is_image_link);
    Rendered {
        content: format!("{}{}", gallery_block(&images), cleaned),
        image_url: images.first().cloned(),
        summary_html: body,
    }
}
