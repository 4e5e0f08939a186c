//! Text and markup helpers shared by all normalizers.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Maximum excerpt length in characters.
pub const EXCERPT_LENGTH: usize = 200;

/// Maximum generated title length in characters.
pub const TITLE_LENGTH: usize = 100;

/// Title used when nothing better can be derived.
pub const UNTITLED: &str = "Untitled";

const ELLIPSIS: &str = "...";

/// Tags whose boundaries separate words when markup is stripped.
const BLOCK_TAGS: &[&str] = &[
    "br",
    "p",
    "div",
    "li",
    "ul",
    "ol",
    "tr",
    "td",
    "th",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "pre",
    "figure",
    "figcaption",
    "hr",
];

/// Elements removed together with their content by [`sanitize_html`].
const DANGEROUS_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// URL schemes allowed in sanitized `href`/`src` attributes.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(|| {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(&["video", "source"])
        .add_tag_attributes("video", &["src", "poster", "controls"])
        .add_tag_attributes("source", &["src", "type"])
        .clean_content_tags(DANGEROUS_ELEMENTS.iter().copied().collect())
        .url_schemes(ALLOWED_SCHEMES.iter().copied().collect());
    builder
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://(?:[^\s<>&]|&amp;)+").expect("valid url regex"));

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b[^>]*>.*?</a>").expect("valid anchor regex"));

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(\d{1,2}):)?(\d{1,2}):(\d{2})\b").expect("valid timestamp regex")
});

static IMG_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid img regex")
});

/// Decode a single entity body (the part between `&` and `;`).
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => parse_numeric_entity(entity).and_then(char::from_u32),
    }
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse().ok()
    } else {
        None
    }
}

/// Decode HTML entities; unknown entities are kept verbatim.
pub fn unescape_entities(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 10)
            .and_then(|semi| decode_entity(&after[..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                result.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Strip markup tags, decode entities and collapse whitespace.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' if !in_tag => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name: String = tag
                    .trim_start_matches('/')
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                if BLOCK_TAGS.contains(&name.as_str()) {
                    text.push(' ');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => text.push(ch),
        }
    }

    collapse_whitespace(&unescape_entities(&text))
}

/// Trim and collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// First `n` characters of `s`.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Plain-text excerpt: at most [`EXCERPT_LENGTH`] characters, with `...`
/// appended when truncated.
pub fn excerpt(html: &str) -> String {
    let text = strip_tags(html);
    if text.chars().count() > EXCERPT_LENGTH {
        format!("{}{}", take_chars(&text, EXCERPT_LENGTH), ELLIPSIS)
    } else {
        text
    }
}

/// End index (exclusive) of the first sentence, if any.
///
/// A sentence ends at a newline, or at `.`, `!` or `?` followed by
/// whitespace or the end of the text.
fn first_sentence_end(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\n' => return Some(idx),
            '.' | '!' | '?' => {
                let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
                if at_boundary {
                    return Some(idx + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Derive a title from body text.
///
/// Uses the first sentence if it fits in [`TITLE_LENGTH`] characters;
/// otherwise cuts at the last word boundary past 60% of the limit, or
/// hard-cuts at the limit. Empty input yields [`UNTITLED`].
pub fn title_from_text(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return UNTITLED.to_string();
    }

    if let Some(end) = first_sentence_end(text) {
        let sentence = text[..end].trim();
        if !sentence.is_empty() && sentence.chars().count() <= TITLE_LENGTH {
            return sentence.to_string();
        }
    }

    let flat = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    if flat.chars().count() <= TITLE_LENGTH {
        return flat;
    }

    let cut = take_chars(&flat, TITLE_LENGTH);
    let min_boundary = TITLE_LENGTH * 6 / 10;
    let boundary = cut
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(idx, _)| idx)
        .filter(|&idx| cut[..idx].chars().count() > min_boundary)
        .last();

    match boundary {
        Some(idx) => format!("{}{}", cut[..idx].trim_end(), ELLIPSIS),
        None => format!("{}{}", cut, ELLIPSIS),
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap bare `http(s)://` URLs in already-escaped text with anchors.
///
/// Trailing punctuation is left outside the link. A closing parenthesis
/// stays in the URL when it balances an opening one inside it.
pub fn linkify_urls(escaped: &str) -> String {
    URL_RE
        .replace_all(escaped, |caps: &Captures| {
            let matched = &caps[0];
            let url = trim_url_end(matched);
            let trailing = &matched[url.len()..];
            format!(
                r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>{trailing}"#
            )
        })
        .into_owned()
}

fn trim_url_end(url: &str) -> &str {
    let mut end = url;
    loop {
        let trimmed = end.trim_end_matches(['.', ',', ';', ':', '!', '?', ']', '\'']);
        match trimmed.strip_suffix(')') {
            Some(rest) if trimmed.matches('(').count() < trimmed.matches(')').count() => {
                end = rest;
            }
            _ => return trimmed,
        }
    }
}

/// Convert a timestamp's parts to seconds, rejecting out-of-range parts.
fn timestamp_seconds(hours: Option<&str>, minutes: &str, seconds: &str) -> Option<u64> {
    let h: u64 = hours.map_or(Ok(0), str::parse).ok()?;
    let m: u64 = minutes.parse().ok()?;
    let s: u64 = seconds.parse().ok()?;
    if s >= 60 || (hours.is_some() && m >= 60) {
        return None;
    }
    Some(h * 3600 + m * 60 + s)
}

/// Link `MM:SS` and `HH:MM:SS` timestamps to the given YouTube video.
///
/// Text inside existing anchors is left alone.
pub fn linkify_timestamps(html: &str, video_id: &str) -> String {
    let link_segment = |segment: &str| -> String {
        TIMESTAMP_RE
            .replace_all(segment, |caps: &Captures| {
                let hours = caps.get(1).map(|m| m.as_str());
                match timestamp_seconds(hours, &caps[2], &caps[3]) {
                    Some(secs) => format!(
                        r#"<a href="https://www.youtube.com/watch?v={video_id}&t={secs}s" target="_blank" rel="noopener noreferrer">{}</a>"#,
                        &caps[0]
                    ),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    };

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for anchor in ANCHOR_RE.find_iter(html) {
        out.push_str(&link_segment(&html[last..anchor.start()]));
        out.push_str(anchor.as_str());
        last = anchor.end();
    }
    out.push_str(&link_segment(&html[last..]));
    out
}

/// Replace newlines with `<br>` tags.
pub fn newlines_to_br(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\n', "<br>\n")
}

/// Full pipeline for plain-text descriptions: escape, link URLs, link
/// timestamps (when a video id is known), then break lines.
pub fn format_plain_text(text: &str, video_id: Option<&str>) -> String {
    let escaped = escape_html(text);
    let linked = linkify_urls(&escaped);
    let linked = match video_id {
        Some(id) => linkify_timestamps(&linked, id),
        None => linked,
    };
    newlines_to_br(&linked)
}

/// Remove active content from upstream HTML.
///
/// Drops script, style, iframe, object and embed elements with their
/// content, every attribute outside the allow-list (including `on*`
/// handlers) and URLs whose scheme is not http, https or mailto.
pub fn sanitize_html(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}

/// `src` of the first `<img>` in the given HTML, entity-decoded.
pub fn first_img_src(html: &str) -> Option<String> {
    IMG_SRC_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| unescape_entities(m.as_str()))
}
