//! Bluesky entry normalization.
//!
//! The profile RSS only carries the post text. Embeds (images, link cards,
//! video, quote posts) come from the public AppView API: the author handle is
//! resolved to a DID, then the post thread is fetched at depth 0. Any API
//! failure degrades to the plain text rendering.

use serde::Deserialize;
use tracing::debug;

use super::media::extract_image;
use super::text::{escape_html, format_plain_text};
use super::Rendered;
use crate::feed::fetcher::fetch_json;
use crate::feed::types::RawEntry;
use crate::http::HttpClient;
use crate::{FeedhubError, Result};

/// Public AppView XRPC endpoint.
pub const API_BASE: &str = "https://public.api.bsky.app/xrpc";

/// `(actor, rkey)` from a `bsky.app/profile/<actor>/post/<rkey>` permalink.
///
/// The actor may be a handle or a DID.
pub fn post_ref(link: &str) -> Option<(String, String)> {
    let url = url::Url::parse(link).ok()?;
    if !url.host_str()?.eq_ignore_ascii_case("bsky.app") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["profile", actor, "post", rkey, ..] => Some((actor.to_string(), rkey.to_string())),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    thread: ThreadView,
}

#[derive(Debug, Deserialize)]
struct ThreadView {
    #[serde(default)]
    post: Option<PostView>,
}

#[derive(Debug, Deserialize)]
struct PostView {
    #[serde(default)]
    embed: Option<EmbedView>,
}

/// Embed attached to a post, dispatched on its `$type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "$type")]
enum EmbedView {
    #[serde(rename = "app.bsky.embed.images#view")]
    Images { images: Vec<ImageView> },
    #[serde(rename = "app.bsky.embed.external#view")]
    External { external: ExternalView },
    #[serde(rename = "app.bsky.embed.video#view")]
    Video {
        playlist: String,
        #[serde(default)]
        thumbnail: Option<String>,
        #[serde(default)]
        alt: Option<String>,
    },
    #[serde(rename = "app.bsky.embed.record#view")]
    Record { record: QuotedRecord },
    #[serde(rename = "app.bsky.embed.recordWithMedia#view")]
    RecordWithMedia {
        record: QuotedRecordView,
        media: Box<EmbedView>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ImageView {
    #[serde(default)]
    thumb: Option<String>,
    #[serde(default)]
    fullsize: Option<String>,
    #[serde(default)]
    alt: String,
}

impl ImageView {
    fn best_url(&self) -> Option<&str> {
        self.fullsize
            .as_deref()
            .or(self.thumb.as_deref())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ExternalView {
    uri: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumb: Option<String>,
}

/// The `record` wrapper inside `recordWithMedia#view`.
#[derive(Debug, Deserialize)]
struct QuotedRecordView {
    record: QuotedRecord,
}

/// A quoted post. Not-found and blocked records carry no author.
#[derive(Debug, Deserialize)]
struct QuotedRecord {
    #[serde(default)]
    author: Option<Author>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    embeds: Vec<EmbedView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    handle: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Resolve a handle to its DID. DIDs pass through unchanged.
async fn resolve_did(http: &dyn HttpClient, actor: &str) -> Result<String> {
    if actor.starts_with("did:") {
        return Ok(actor.to_string());
    }
    let url = format!(
        "{API_BASE}/com.atproto.identity.resolveHandle?handle={}",
        urlencoding::encode(actor)
    );
    let response: ResolveHandleResponse = fetch_json(http, &url).await?;
    Ok(response.did)
}

async fn fetch_embed(http: &dyn HttpClient, link: &str) -> Result<Option<EmbedView>> {
    let (actor, rkey) = post_ref(link)
        .ok_or_else(|| FeedhubError::Enrichment(format!("not a Bluesky post link: {link}")))?;
    let did = resolve_did(http, &actor).await?;
    let at_uri = format!("at://{did}/app.bsky.feed.post/{rkey}");
    let url = format!(
        "{API_BASE}/app.bsky.feed.getPostThread?uri={}&depth=0",
        urlencoding::encode(&at_uri)
    );
    let response: ThreadResponse = fetch_json(http, &url).await?;
    Ok(response.thread.post.and_then(|post| post.embed))
}

/// Accumulates embed markup and the first usable lead image.
#[derive(Debug, Default)]
struct EmbedOutput {
    html: String,
    lead_image: Option<String>,
}

impl EmbedOutput {
    fn offer_image(&mut self, url: Option<&str>) {
        if self.lead_image.is_none() {
            self.lead_image = url.filter(|u| !u.is_empty()).map(str::to_string);
        }
    }

    fn render(&mut self, embed: &EmbedView) {
        match embed {
            EmbedView::Images { images } => self.images(images),
            EmbedView::External { external } => self.external(external),
            EmbedView::Video {
                playlist,
                thumbnail,
                alt,
            } => self.video(playlist, thumbnail.as_deref(), alt.as_deref()),
            EmbedView::Record { record } => self.quote(record),
            EmbedView::RecordWithMedia { record, media } => {
                self.render(media);
                self.quote(&record.record);
            }
            EmbedView::Unknown => {}
        }
    }

    fn images(&mut self, images: &[ImageView]) {
        let urls: Vec<(&str, &str)> = images
            .iter()
            .filter_map(|img| img.best_url().map(|url| (url, img.alt.as_str())))
            .collect();
        if urls.is_empty() {
            return;
        }
        self.offer_image(urls.first().map(|(url, _)| *url));
        self.html.push_str(r#"<div class="bluesky-images">"#);
        for (url, alt) in urls {
            self.html.push_str(&format!(
                r#"<a href="{0}" target="_blank" rel="noopener noreferrer"><img src="{0}" alt="{1}" loading="lazy" style="max-width:100%;"></a>"#,
                escape_html(url),
                escape_html(alt)
            ));
        }
        self.html.push_str("</div>");
    }

    fn external(&mut self, external: &ExternalView) {
        let host = url::Url::parse(&external.uri)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let thumb = external.thumb.as_deref().filter(|t| !t.is_empty());
        self.offer_image(thumb);

        self.html.push_str(&format!(
            r#"<a class="bluesky-card" href="{}" target="_blank" rel="noopener noreferrer">"#,
            escape_html(&external.uri)
        ));
        if let Some(thumb) = thumb {
            self.html.push_str(&format!(
                r#"<img src="{}" alt="" loading="lazy" style="max-width:100%;">"#,
                escape_html(thumb)
            ));
        }
        self.html.push_str(r#"<div class="card-body">"#);
        if !external.title.is_empty() {
            self.html
                .push_str(&format!("<strong>{}</strong>", escape_html(&external.title)));
        }
        if !external.description.is_empty() {
            self.html
                .push_str(&format!("<p>{}</p>", escape_html(&external.description)));
        }
        if !host.is_empty() {
            self.html.push_str(&format!(
                r#"<span class="card-host">{}</span>"#,
                escape_html(&host)
            ));
        }
        self.html.push_str("</div></a>");
    }

    fn video(&mut self, playlist: &str, thumbnail: Option<&str>, alt: Option<&str>) {
        self.offer_image(thumbnail);
        let poster = thumbnail
            .filter(|t| !t.is_empty())
            .map(|t| format!(r#" poster="{}""#, escape_html(t)))
            .unwrap_or_default();
        let label = alt
            .filter(|a| !a.is_empty())
            .map(|a| format!(r#" aria-label="{}""#, escape_html(a)))
            .unwrap_or_default();
        self.html.push_str(&format!(
            r#"<div class="bluesky-video"><video controls preload="metadata" playsinline{poster}{label} src="{}" style="width:100%;max-height:80vh;"></video></div>"#,
            escape_html(playlist)
        ));
    }

    fn quote(&mut self, record: &QuotedRecord) {
        let Some(author) = &record.author else {
            return;
        };
        let text = record
            .value
            .as_ref()
            .and_then(|v| v.get("text"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        self.html.push_str(r#"<blockquote class="bluesky-quote"><p class="quote-author">"#);
        if let Some(name) = author.display_name.as_deref().filter(|n| !n.is_empty()) {
            self.html
                .push_str(&format!("<strong>{}</strong> ", escape_html(name)));
        }
        self.html
            .push_str(&format!("@{}</p>", escape_html(&author.handle)));
        if !text.is_empty() {
            self.html
                .push_str(&format!("<p>{}</p>", format_plain_text(text, None)));
        }
        for embed in &record.embeds {
            if let EmbedView::Images { images } = embed {
                self.images(images);
            }
        }
        self.html.push_str("</blockquote>");
    }
}

/// Render a Bluesky entry: the formatted post text plus any embed.
pub async fn render(entry: &RawEntry, http: &dyn HttpClient) -> Rendered {
    let text = entry
        .description
        .as_deref()
        .or(entry.content_html.as_deref())
        .unwrap_or_default()
        .trim();

    let mut content = String::new();
    if !text.is_empty() {
        content.push_str(r#"<div class="post-text">"#);
        content.push_str(&format_plain_text(text, None));
        content.push_str("</div>");
    }

    let mut output = EmbedOutput::default();
    if let Some(link) = entry.link.as_deref() {
        match fetch_embed(http, link).await {
            Ok(Some(embed)) => output.render(&embed),
            Ok(None) => {}
            Err(e) => debug!("Bluesky enrichment failed for {}: {}", link, e),
        }
    }
    content.push_str(&output.html);

    Rendered {
        content,
        image_url: output.lead_image.or_else(|| extract_image(entry)),
        summary_html: escape_html(text),
    }
}
