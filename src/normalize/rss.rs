//! Plain RSS/Atom entry normalization.

use super::media::extract_image;
use super::text::sanitize_html;
use super::Rendered;
use crate::feed::types::RawEntry;

/// Render a generic feed entry: the sanitized body as published.
pub fn render(entry: &RawEntry) -> Rendered {
    let content = sanitize_html(entry.body_html().unwrap_or_default());
    let summary_html = entry
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(sanitize_html)
        .unwrap_or_else(|| content.clone());

    Rendered {
        content,
        image_url: extract_image(entry),
        summary_html,
    }
}
