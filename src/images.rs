//! Representative image selection for a feed item.
//!
//! The resolver walks a fixed fallback chain and stops at the first hit:
//!
//! 1. the item's enclosure URL
//! 2. the item's `media:content` (or `media:thumbnail`) URL
//! 3. the `og:image` declared by the linked article page
//!
//! Only step 3 touches the network. A failed page fetch is treated as "no
//! image", never as an error, so an item without an image still gets posted.

use crate::error::Result;
use crate::http::{HttpRequest, Transport};
use crate::models::FeedItem;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

static OG_IMAGE_PROPERTY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta\s[^>]*?(?:property|name)\s*=\s*["']og:image(?::url)?["'][^>]*?\bcontent\s*=\s*["']([^"']+)["']"#,
    )
    .expect("og:image pattern is valid")
});

static OG_IMAGE_CONTENT_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta\s[^>]*?\bcontent\s*=\s*["']([^"']+)["'][^>]*?(?:property|name)\s*=\s*["']og:image(?::url)?["']"#,
    )
    .expect("og:image pattern is valid")
});

/// Find the first `og:image` meta tag in raw HTML and return its content.
///
/// This is a pattern match over the markup, not a DOM parse; it accepts either
/// attribute order and both quote styles. `&amp;` in the value is decoded.
pub fn extract_og_image(html: &str) -> Option<String> {
    [&*OG_IMAGE_PROPERTY_FIRST, &*OG_IMAGE_CONTENT_FIRST]
        .iter()
        .filter_map(|re| re.captures(html))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.get(1)?;
            Some((whole.start(), value.as_str()))
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, value)| value.trim().replace("&amp;", "&"))
        .filter(|value| !value.is_empty())
}

/// Resolves a candidate image URL for feed items.
#[derive(Debug, Clone)]
pub struct ImageResolver<T> {
    transport: T,
}

impl<T: Transport> ImageResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Walk the fallback chain for `item`. `None` means no image was found.
    #[instrument(level = "info", skip_all, fields(title = %item.title))]
    pub async fn resolve(&self, item: &FeedItem) -> Option<String> {
        if let Some(url) = &item.enclosure_url {
            debug!(%url, "Using enclosure image");
            return Some(url.clone());
        }
        if let Some(url) = &item.media_content_url {
            debug!(%url, "Using media:content image");
            return Some(url.clone());
        }

        match self.scrape_og_image(&item.link).await {
            Ok(Some(url)) => {
                debug!(%url, "Using og:image from article page");
                Some(url)
            }
            Ok(None) => {
                info!(link = %item.link, "No image found for item");
                None
            }
            Err(e) => {
                warn!(link = %item.link, error = %e, "Article page fetch failed; continuing without image");
                None
            }
        }
    }

    async fn scrape_og_image(&self, link: &str) -> Result<Option<String>> {
        let response = self
            .transport
            .send(HttpRequest::get(link).header("Accept", "text/html,application/xhtml+xml"))
            .await?;

        if !response.is_success() {
            debug!(status = response.status, "Article page returned non-success status");
            return Ok(None);
        }

        Ok(extract_og_image(&response.text()).map(|found| absolutize(link, &found)))
    }
}

fn absolutize(base: &str, candidate: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(candidate))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| candidate.to_string())
}
