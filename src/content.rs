//! Post body assembly.
//!
//! [`build_body`] turns a [`FeedItem`] into the HTML stored as the post
//! content: one paragraph of escaped text followed by a source attribution
//! link. It performs no I/O and yields identical output for identical input.

use crate::models::FeedItem;
use crate::utils::{collapse_whitespace, truncate_chars};
use scraper::Html;
use url::Url;

/// Maximum characters of stripped raw content used when no summary exists.
pub const RAW_CONTENT_LIMIT: usize = 500;

/// Build the HTML body for a post.
///
/// The text is the first non-empty of the snippet, the summary with markup
/// stripped, or the raw content with markup stripped and cut to
/// [`RAW_CONTENT_LIMIT`] characters. A summary that is nothing but markup
/// (an `<img>`-only description, say) counts as empty.
///
/// # Arguments
///
/// * `item` - The feed item being published
///
/// # Returns
///
/// The post content: a paragraph of escaped text followed by a paragraph
/// linking back to the item's host.
pub fn build_body(item: &FeedItem) -> String {
    let text = body_text(item);
    let host = Url::parse(&item.link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| item.link.clone());

    format!(
        "<p>{}</p>\n<p>Source: <a href=\"{}\" target=\"_blank\" rel=\"nofollow noopener\">{}</a></p>",
        escape_html(&text),
        escape_html(&item.link),
        escape_html(&host),
    )
}

fn body_text(item: &FeedItem) -> String {
    let non_empty = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    non_empty(&item.snippet)
        .or_else(|| {
            item.summary
                .as_deref()
                .map(strip_markup)
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            item.raw_content
                .as_deref()
                .map(|raw| truncate_chars(&strip_markup(raw), RAW_CONTENT_LIMIT))
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
}

/// Text content of an HTML fragment with entities decoded and whitespace collapsed.
pub fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Escape text for use in HTML element content or a double-quoted attribute.
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
