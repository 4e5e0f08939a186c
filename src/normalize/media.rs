//! Lead image extraction.

use super::text::first_img_src;
use crate::feed::types::RawEntry;

fn is_present(url: &&String) -> bool {
    !url.trim().is_empty()
}

/// Pick the lead image for an entry.
///
/// First match wins: group thumbnail (the last, i.e. largest) → group
/// content → direct thumbnail → direct content → enclosure → first inline
/// `<img>` in the content or description.
pub fn extract_image(entry: &RawEntry) -> Option<String> {
    entry
        .media_groups
        .iter()
        .find_map(|group| group.thumbnails.iter().rev().find(is_present))
        .or_else(|| {
            entry
                .media_groups
                .iter()
                .find_map(|group| group.contents.iter().find(is_present))
        })
        .or_else(|| entry.media_thumbnails.iter().find(is_present))
        .or_else(|| entry.media_contents.iter().find(is_present))
        .or_else(|| entry.enclosure_url.as_ref().filter(is_present))
        .cloned()
        .or_else(|| entry.content_html.as_deref().and_then(first_img_src))
        .or_else(|| entry.description.as_deref().and_then(first_img_src))
}
