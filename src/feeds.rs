//! Feed reading and aggregation.
//!
//! # Reading
//!
//! [`FeedReader`] is the capability "turn a feed URL into an ordered list of
//! items". [`HttpFeedReader`] implements it with one GET through the
//! [`Transport`] seam followed by [`parse_feed`], an event-driven `quick-xml`
//! parser that understands RSS 2.0 `<item>` and Atom `<entry>` elements
//! together with the `content:` and `media:` extensions.
//!
//! # Aggregation
//!
//! [`FeedAggregator`] walks the configured sources in order, one at a time.
//! A source that fails is logged and skipped; every other source contributes
//! at most `per_source_cap` items in feed order. Only an empty aggregate is
//! an error.

use crate::content::strip_markup;
use crate::error::{PipelineError, Result};
use crate::http::{HttpRequest, Transport};
use crate::models::FeedItem;
use crate::utils::collapse_whitespace;
use futures::stream::{self, StreamExt};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, info, instrument, warn};

const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

/// Capability to parse a feed URL into items, in feed order.
pub trait FeedReader {
    async fn read(&self, url: &str) -> Result<Vec<FeedItem>>;
}

/// [`FeedReader`] that downloads the document and parses it locally.
#[derive(Debug, Clone)]
pub struct HttpFeedReader<T> {
    transport: T,
}

impl<T: Transport> HttpFeedReader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> FeedReader for HttpFeedReader<T> {
    #[instrument(level = "info", skip(self))]
    async fn read(&self, url: &str) -> Result<Vec<FeedItem>> {
        let response = self
            .transport
            .send(HttpRequest::get(url).header("Accept", FEED_ACCEPT))
            .await
            .map_err(|e| PipelineError::FeedFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(PipelineError::FeedFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }

        parse_feed(&response.body).map_err(|e| PipelineError::FeedFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Combines several sources into one ordered list of items.
pub struct FeedAggregator<R> {
    reader: R,
}

impl<R: FeedReader> FeedAggregator<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read every source once, in order, keeping at most `per_source_cap` items from each.
    ///
    /// Failing sources are logged and contribute nothing. The result may be empty.
    pub async fn gather(&self, sources: &[String], per_source_cap: usize) -> Vec<FeedItem> {
        let reader = &self.reader;
        let batches: Vec<Vec<FeedItem>> = stream::iter(sources)
            .then(|source| async move {
                match reader.read(source).await {
                    Ok(items) => {
                        let available = items.len();
                        let kept: Vec<FeedItem> = items.into_iter().take(per_source_cap).collect();
                        info!(%source, available, kept = kept.len(), "Read feed source");
                        kept
                    }
                    Err(e) => {
                        warn!(%source, error = %e, "Skipping feed source");
                        Vec::new()
                    }
                }
            })
            .collect()
            .await;

        batches.into_iter().flatten().collect()
    }

    /// Like [`gather`](Self::gather), but an empty aggregate is an error.
    ///
    /// # Arguments
    ///
    /// * `sources` - Feed URLs, read in this order
    /// * `per_source_cap` - Maximum items kept from any one source
    ///
    /// # Returns
    ///
    /// Items from every readable source, grouped by source in source order.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoItemsFound`] when no source yields a single item.
    #[instrument(level = "info", skip_all, fields(sources = sources.len(), per_source_cap))]
    pub async fn collect(&self, sources: &[String], per_source_cap: usize) -> Result<Vec<FeedItem>> {
        let items = self.gather(sources, per_source_cap).await;
        if items.is_empty() {
            return Err(PipelineError::NoItemsFound);
        }
        info!(count = items.len(), "Aggregated feed items");
        Ok(items)
    }
}

/// Which child element of an item the parser is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Summary,
    Content,
    Other,
}

impl Field {
    fn from_name(name: &str) -> Self {
        match name {
            "title" => Field::Title,
            "link" => Field::Link,
            "description" | "summary" => Field::Summary,
            "content:encoded" | "content" => Field::Content,
            _ => Field::Other,
        }
    }
}

#[derive(Default)]
struct ItemBuilder {
    title: String,
    link: String,
    summary: String,
    content: String,
    enclosure_url: Option<String>,
    media_content_url: Option<String>,
    media_thumbnail_url: Option<String>,
}

impl ItemBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Other => return,
        };
        if !target.is_empty() && field == Field::Content {
            target.push(' ');
        }
        target.push_str(text);
    }

    /// Pick up references carried in attributes rather than text.
    fn read_attributes(&mut self, name: &str, e: &BytesStart<'_>) {
        match name {
            "link" => {
                let rel = attribute(e, "rel");
                if self.link.is_empty() && matches!(rel.as_deref(), None | Some("alternate")) {
                    if let Some(href) = attribute(e, "href") {
                        self.link = href;
                    }
                }
            }
            "enclosure" => {
                if self.enclosure_url.is_none() && is_image(e) {
                    self.enclosure_url = attribute(e, "url");
                }
            }
            "media:content" => {
                if self.media_content_url.is_none() && is_image(e) {
                    self.media_content_url = attribute(e, "url");
                }
            }
            "media:thumbnail" => {
                if self.media_thumbnail_url.is_none() {
                    self.media_thumbnail_url = attribute(e, "url");
                }
            }
            _ => {}
        }
    }

    fn build(self) -> Option<FeedItem> {
        let link = self.link.trim().to_string();
        if link.is_empty() {
            return None;
        }

        let title = collapse_whitespace(&self.title);
        let summary = Some(self.summary.trim().to_string()).filter(|s| !s.is_empty());
        let snippet = summary.as_deref().map(strip_markup).filter(|s| !s.is_empty());
        let raw_content = Some(self.content.trim().to_string()).filter(|s| !s.is_empty());

        Some(FeedItem {
            title: if title.is_empty() { "Untitled".to_string() } else { title },
            link,
            snippet,
            summary,
            raw_content,
            enclosure_url: self.enclosure_url,
            media_content_url: self.media_content_url.or(self.media_thumbnail_url),
        })
    }
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Media references without type hints are assumed to be images.
fn is_image(e: &BytesStart<'_>) -> bool {
    let medium_ok = attribute(e, "medium").is_none_or(|m| m.eq_ignore_ascii_case("image"));
    let type_ok = attribute(e, "type").is_none_or(|t| t.to_ascii_lowercase().starts_with("image/"));
    medium_ok && type_ok
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

/// Parse an RSS 2.0, RSS 1.0 or Atom document into items, preserving document order.
///
/// Items without a link are dropped. A document that is not a feed at all
/// (for example an HTML error page) is a [`PipelineError::Parse`].
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedItem>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    let mut saw_feed_root = false;

    let mut current: Option<ItemBuilder> = None;
    let mut depth = 0usize;
    let mut field = Field::Other;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                match current.as_mut() {
                    None => match name.as_str() {
                        "rss" | "feed" | "rdf:RDF" | "channel" => saw_feed_root = true,
                        "item" | "entry" => {
                            current = Some(ItemBuilder::default());
                            depth = 0;
                        }
                        _ => {}
                    },
                    Some(builder) => {
                        depth += 1;
                        if depth == 1 {
                            field = Field::from_name(&name);
                        }
                        builder.read_attributes(&name, &e);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(builder) = current.as_mut() {
                    builder.read_attributes(&element_name(&e), &e);
                }
            }
            Ok(Event::End(_)) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(item) = current.take().and_then(ItemBuilder::build) {
                            items.push(item);
                        }
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            field = Field::Other;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(builder) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| PipelineError::Parse(format!("bad text at {}: {}", reader.buffer_position(), err)))?;
                    builder.push_text(field, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(builder) = current.as_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                    builder.push_text(field, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::Parse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_feed_root {
        return Err(PipelineError::Parse("document is not an RSS or Atom feed".to_string()));
    }

    debug!(count = items.len(), "Parsed feed document");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::http::testing::FakeTransport;
    use reqwest::Method;
    use std::cell::RefCell;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <item>
      <title>First &amp; foremost</title>
      <link>https://example.com/first</link>
      <description><![CDATA[<p>Hello <b>there</b></p>]]></description>
      <content:encoded><![CDATA[<div>Full body</div>]]></content:encoded>
      <enclosure url="https://cdn.example.com/first.jpg" type="image/jpeg" length="123"/>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.com/second</link>
      <media:group>
        <media:content url="https://cdn.example.com/clip.mp4" medium="video"/>
        <media:content url="https://cdn.example.com/second.png" medium="image"/>
      </media:group>
    </item>
    <item>
      <title>No link</title>
    </item>
    <item>
      <link>https://example.com/third</link>
      <enclosure url="https://cdn.example.com/episode.mp3" type="audio/mpeg"/>
      <media:thumbnail url="https://cdn.example.com/third-thumb.jpg"/>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom example</title>
  <entry>
    <title type="html">Atom entry</title>
    <link rel="self" href="https://example.org/self/1"/>
    <link rel="alternate" type="text/html" href="https://example.org/posts/1"/>
    <summary>Short atom summary</summary>
    <content type="html">&lt;p&gt;Atom body&lt;/p&gt;</content>
  </entry>
</feed>"#;

    fn rss_with_items(prefix: &str, n: usize) -> String {
        let items: String = (1..=n)
            .map(|i| format!("<item><title>{prefix} {i}</title><link>https://{prefix}.example/{i}</link></item>"))
            .collect();
        format!("<rss version=\"2.0\"><channel><title>{prefix}</title>{items}</channel></rss>")
    }

    #[test]
    fn test_parse_rss_items() {
        let items = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(first.title, "First & foremost");
        assert_eq!(first.link, "https://example.com/first");
        assert_eq!(first.summary.as_deref(), Some("<p>Hello <b>there</b></p>"));
        assert_eq!(first.snippet.as_deref(), Some("Hello there"));
        assert_eq!(first.raw_content.as_deref(), Some("<div>Full body</div>"));
        assert_eq!(first.enclosure_url.as_deref(), Some("https://cdn.example.com/first.jpg"));
        assert_eq!(first.media_content_url, None);

        let second = &items[1];
        assert_eq!(second.media_content_url.as_deref(), Some("https://cdn.example.com/second.png"));
        assert_eq!(second.summary, None);

        let third = &items[2];
        assert_eq!(third.title, "Untitled");
        assert_eq!(third.enclosure_url, None);
        assert_eq!(third.media_content_url.as_deref(), Some("https://cdn.example.com/third-thumb.jpg"));
    }

    #[test]
    fn test_parse_atom_entry() {
        let items = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Atom entry");
        assert_eq!(items[0].link, "https://example.org/posts/1");
        assert_eq!(items[0].snippet.as_deref(), Some("Short atom summary"));
        assert_eq!(items[0].raw_content.as_deref(), Some("<p>Atom body</p>"));
    }

    #[test]
    fn test_parse_rejects_non_feed_documents() {
        let err = parse_feed(b"<html><body><p>Not a feed</p></body></html>").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_parse_empty_channel() {
        let items = parse_feed(b"<rss version=\"2.0\"><channel><title>Quiet</title></channel></rss>").unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_http_reader_maps_status_to_feed_fetch_error() {
        let fake = FakeTransport::new().on(
            Method::GET,
            "https://down.example/feed",
            HttpResponse::text_body(503, "text/plain", "maintenance"),
        );
        let reader = HttpFeedReader::new(&fake);
        let err = reader.read("https://down.example/feed").await.unwrap_err();
        assert!(matches!(err, PipelineError::FeedFetch { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_collect_caps_and_preserves_source_order() {
        let fake = FakeTransport::new()
            .on(
                Method::GET,
                "https://a.example/feed",
                HttpResponse::text_body(200, "application/rss+xml", &rss_with_items("a", 3)),
            )
            .on(
                Method::GET,
                "https://b.example/feed",
                HttpResponse::text_body(200, "application/rss+xml", &rss_with_items("b", 3)),
            );
        let aggregator = FeedAggregator::new(HttpFeedReader::new(&fake));
        let sources = vec!["https://a.example/feed".to_string(), "https://b.example/feed".to_string()];

        let items = aggregator.collect(&sources, 2).await.unwrap();
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a 1", "a 2", "b 1", "b 2"]);

        assert_eq!(fake.count(&Method::GET, "https://a.example/feed"), 1);
        assert_eq!(fake.count(&Method::GET, "https://b.example/feed"), 1);
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let fake = FakeTransport::new()
            .unreachable(Method::GET, "https://dead.example/feed")
            .on(
                Method::GET,
                "https://b.example/feed",
                HttpResponse::text_body(200, "application/rss+xml", &rss_with_items("b", 1)),
            );
        let aggregator = FeedAggregator::new(HttpFeedReader::new(&fake));
        let sources = vec!["https://dead.example/feed".to_string(), "https://b.example/feed".to_string()];

        let items = aggregator.collect(&sources, 3).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "b 1");
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_no_items_found() {
        let fake = FakeTransport::new()
            .unreachable(Method::GET, "https://dead.example/feed")
            .on(
                Method::GET,
                "https://html.example/feed",
                HttpResponse::text_body(200, "text/html", "<html><body>moved</body></html>"),
            );
        let aggregator = FeedAggregator::new(HttpFeedReader::new(&fake));
        let sources = vec!["https://dead.example/feed".to_string(), "https://html.example/feed".to_string()];

        assert!(aggregator.gather(&sources, 3).await.is_empty());
        let err = aggregator.collect(&sources, 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoItemsFound));
    }

    struct CountingReader {
        calls: RefCell<Vec<String>>,
    }

    impl FeedReader for CountingReader {
        async fn read(&self, url: &str) -> Result<Vec<FeedItem>> {
            self.calls.borrow_mut().push(url.to_string());
            Ok(vec![FeedItem {
                title: format!("from {url}"),
                link: url.to_string(),
                ..Default::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_sources_read_sequentially_in_given_order() {
        let reader = CountingReader {
            calls: RefCell::new(Vec::new()),
        };
        let aggregator = FeedAggregator::new(reader);
        let sources = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        aggregator.collect(&sources, 1).await.unwrap();
        assert_eq!(*aggregator.reader.calls.borrow(), sources);
    }
}
