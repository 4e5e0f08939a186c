//! YouTube entry normalization.

use super::media::extract_image;
use super::text::{escape_html, format_plain_text};
use super::Rendered;
use crate::feed::types::RawEntry;

/// Extract the video id from a YouTube URL.
///
/// Handles `watch?v=`, `/shorts/`, `/embed/`, `/live/` and `youtu.be` forms.
pub fn video_id_from_url(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let id = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    id.filter(|id| {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

/// Video id of a feed entry, from its link or its `yt:video:` guid.
pub fn video_id(entry: &RawEntry) -> Option<String> {
    entry
        .link
        .as_deref()
        .and_then(video_id_from_url)
        .or_else(|| {
            entry
                .guid
                .strip_prefix("yt:video:")
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
}

/// Whether a link points at a Short.
pub fn is_short(link: &str) -> bool {
    url::Url::parse(link)
        .map(|u| u.path().starts_with("/shorts/"))
        .unwrap_or(false)
}

/// Fallback thumbnail for a video.
pub fn fallback_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg")
}

const IFRAME_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

/// Player embed: portrait with a fixed height for Shorts, a 16:9 padded box
/// otherwise.
pub fn embed_html(video_id: &str, short: bool) -> String {
    let id = escape_html(video_id);
    if short {
        format!(
            r#"<div class="video-embed video-embed-short" style="max-width:360px;margin:0 auto;"><iframe src="https://www.youtube.com/embed/{id}" width="360" height="640" style="width:100%;height:640px;aspect-ratio:9/16;border:0;" allow="{IFRAME_ALLOW}" allowfullscreen loading="lazy"></iframe></div>"#
        )
    } else {
        format!(
            r#"<div class="video-embed" style="position:relative;padding-bottom:56.25%;height:0;overflow:hidden;"><iframe src="https://www.youtube.com/embed/{id}" style="position:absolute;top:0;left:0;width:100%;height:100%;border:0;" allow="{IFRAME_ALLOW}" allowfullscreen loading="lazy"></iframe></div>"#
        )
    }
}

/// Render a YouTube entry: embed followed by the formatted description.
///
/// Returns `None` when no video id can be found.
pub fn render(entry: &RawEntry) -> Option<Rendered> {
    let id = video_id(entry)?;
    let short = entry.link.as_deref().is_some_and(is_short);
    let description = entry.description.as_deref().unwrap_or_default().trim();

    let mut content = embed_html(&id, short);
    if !description.is_empty() {
        content.push_str(r#"<div class="video-description">"#);
        content.push_str(&format_plain_text(description, Some(&id)));
        content.push_str("</div>");
    }

    Some(Rendered {
        content,
        image_url: Some(extract_image(entry).unwrap_or_else(|| fallback_thumbnail(&id))),
        summary_html: escape_html(description),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::MediaGroup;

    #[test]
    fn test_video_id_from_url_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
        ] {
            assert_eq!(video_id_from_url(url).as_deref(), Some("dQw4w9WgXcQ"), "{url}");
        }
        assert_eq!(video_id_from_url("https://vimeo.com/123"), None);
        assert_eq!(video_id_from_url("https://www.youtube.com/@handle"), None);
    }

    #[test]
    fn test_video_id_from_guid() {
        let mut entry = RawEntry::new("yt:video:abc123", "");
        entry.link = None;
        assert_eq!(video_id(&entry).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_is_short() {
        assert!(is_short("https://www.youtube.com/shorts/abc"));
        assert!(!is_short("https://www.youtube.com/watch?v=abc"));
        assert!(!is_short("not a url"));
    }

    #[test]
    fn test_embed_shapes() {
        let regular = embed_html("abc", false);
        assert!(regular.contains("padding-bottom:56.25%"));
        assert!(regular.contains("https://www.youtube.com/embed/abc"));

        let short = embed_html("abc", true);
        assert!(short.contains("aspect-ratio:9/16"));
        assert!(short.contains("height:640px"));
        assert!(!short.contains("56.25%"));
    }

    #[test]
    fn test_render_regular_video() {
        let mut entry = RawEntry::new("yt:video:abc", "https://www.youtube.com/watch?v=abc");
        entry.description = Some("Chapters:\n1:05:30 end\n<b>bold</b> https://example.com".into());
        entry.media_groups.push(MediaGroup {
            thumbnails: vec!["https://i1.ytimg.com/vi/abc/hqdefault.jpg".into()],
            contents: vec![],
        });

        let rendered = render(&entry).unwrap();
        assert!(rendered.content.starts_with(r#"<div class="video-embed""#));
        assert!(rendered.content.contains("watch?v=abc&t=3930s"));
        assert!(rendered.content.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(rendered.content.contains(r#"href="https://example.com""#));
        assert!(rendered.content.contains("<br>"));
        assert_eq!(
            rendered.image_url.as_deref(),
            Some("https://i1.ytimg.com/vi/abc/hqdefault.jpg")
        );
    }

    #[test]
    fn test_render_falls_back_to_hqdefault() {
        let entry = RawEntry::new("yt:video:xyz", "https://www.youtube.com/shorts/xyz");
        let rendered = render(&entry).unwrap();
        assert!(rendered.content.contains("video-embed-short"));
        assert!(!rendered.content.contains("video-description"));
        assert_eq!(
            rendered.image_url.as_deref(),
            Some("https://i.ytimg.com/vi/xyz/hqdefault.jpg")
        );
    }

    #[test]
    fn test_render_without_video_id() {
        let entry = RawEntry::new("tag:other", "https://example.com/post");
        assert!(render(&entry).is_none());
    }
}
