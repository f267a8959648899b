//! Data models that flow through a batch run.
//!
//! - [`FeedItem`]: one normalized entry read from a feed source
//! - [`PostDraft`]: the body sent to the WordPress posts endpoint
//! - [`UploadedMedia`] / [`CreatedPost`]: identifiers handed back by WordPress
//! - [`ItemResult`] / [`BatchOutcome`]: what the run reports
//!
//! Feed items are produced once by the aggregator and never mutated. Results
//! are appended one per selected item and never changed after insertion.

use serde::{Deserialize, Serialize};

/// A single entry from a feed source, normalized across RSS and Atom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Plain-text rendition of the summary (markup stripped, whitespace collapsed).
    pub snippet: Option<String>,
    /// Summary/description exactly as the feed published it.
    pub summary: Option<String>,
    /// Full content as published, usually HTML.
    pub raw_content: Option<String>,
    pub enclosure_url: Option<String>,
    pub media_content_url: Option<String>,
}

/// Media object created by the WordPress media endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UploadedMedia {
    pub id: u64,
}

/// The post payload accepted by `POST /wp-json/wp/v2/posts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub status: &'static str,
    pub categories: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<u64>,
}

impl PostDraft {
    pub fn new(title: &str, content: String, category_id: u64, featured_media: Option<u64>) -> Self {
        Self {
            title: title.to_string(),
            content,
            status: "publish",
            categories: vec![category_id],
            featured_media,
        }
    }
}

/// Identifiers of a post WordPress accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPost {
    pub id: u64,
    #[serde(default)]
    pub link: String,
}

/// Outcome of one selected feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn published(post: CreatedPost) -> Self {
        Self {
            ok: true,
            id: Some(post.id),
            link: Some(post.link),
            title: None,
            error: None,
        }
    }

    pub fn failed(title: &str, error: impl ToString) -> Self {
        Self {
            ok: false,
            id: None,
            link: None,
            title: Some(title.to_string()),
            error: Some(error.to_string()),
        }
    }
}

/// Top-level result of a run, serialized as the program's output.
///
/// A completed batch is `success: true` even when every item failed; only a
/// fatal abort reports `success: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted: Option<Vec<ItemResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn completed(posted: Vec<ItemResult>) -> Self {
        Self {
            success: true,
            posted: Some(posted),
            error: None,
        }
    }

    pub fn aborted(error: impl ToString) -> Self {
        Self {
            success: false,
            posted: None,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_draft_serialization_without_media() {
        let draft = PostDraft::new("Hello", "<p>Body</p>".to_string(), 7, None);
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["status"], "publish");
        assert_eq!(json["categories"], serde_json::json!([7]));
        assert!(json.get("featured_media").is_none());
    }

    #[test]
    fn test_post_draft_serialization_with_media() {
        let draft = PostDraft::new("Hello", "<p>Body</p>".to_string(), 7, Some(42));
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["featured_media"], 42);
        assert_eq!(json["title"], "Hello");
    }

    #[test]
    fn test_item_result_shapes() {
        let ok = ItemResult::published(CreatedPost {
            id: 12,
            link: "https://blog.example/?p=12".to_string(),
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, serde_json::json!({"ok": true, "id": 12, "link": "https://blog.example/?p=12"}));

        let failed = ItemResult::failed("Broken", "post creation failed");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ok": false, "title": "Broken", "error": "post creation failed"})
        );
    }

    #[test]
    fn test_batch_outcome_shapes() {
        let done = serde_json::to_value(BatchOutcome::completed(vec![])).unwrap();
        assert_eq!(done, serde_json::json!({"success": true, "posted": []}));

        let aborted = serde_json::to_value(BatchOutcome::aborted("no feed items found in any source")).unwrap();
        assert_eq!(
            aborted,
            serde_json::json!({"success": false, "error": "no feed items found in any source"})
        );
    }

    #[test]
    fn test_created_post_tolerates_missing_link() {
        let post: CreatedPost = serde_json::from_str(r#"{"id": 5, "status": "publish"}"#).unwrap();
        assert_eq!(post.id, 5);
        assert_eq!(post.link, "");
    }
}
