//! Batch orchestration.
//!
//! One run moves through a fixed sequence of stages:
//!
//! ```text
//! Init ──self-test──▶ AuthVerified ──aggregate──▶ Aggregated ──items──▶ Completed
//!   │                     │                           │
//!   └─────────────────────┴───────────────────────────┴──▶ Aborted
//! ```
//!
//! Only rejected credentials and an empty aggregate abort the run. Once items
//! are selected, each one goes through image resolution, media upload, body
//! assembly and post creation inside its own failure boundary: whatever goes
//! wrong becomes that item's [`ItemResult`] and the run moves on. Every
//! selected item yields exactly one result, in selection order.

use crate::config::Settings;
use crate::content::build_body;
use crate::error::Result;
use crate::feeds::{FeedAggregator, FeedReader};
use crate::http::Transport;
use crate::images::ImageResolver;
use crate::media::MediaPublisher;
use crate::models::{BatchOutcome, CreatedPost, FeedItem, ItemResult, PostDraft};
use crate::wordpress::WordPressClient;
use futures::stream::{self, StreamExt};
use rand::{Rng, rng};
use tracing::{error, info, instrument, warn};

/// Which aggregated items a run publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// The first `n` items in aggregate order.
    FirstN(usize),
    /// A single item picked uniformly at random.
    RandomOne,
}

impl SelectionPolicy {
    pub fn select(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        match *self {
            SelectionPolicy::FirstN(n) => items.into_iter().take(n).collect(),
            SelectionPolicy::RandomOne => {
                if items.is_empty() {
                    return Vec::new();
                }
                let index = rng().random_range(0..items.len());
                items.into_iter().nth(index).into_iter().collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Init,
    AuthVerified,
    Aggregated,
    Completed,
    Aborted,
}

/// Drives one batch run against a WordPress site.
pub struct BatchOrchestrator<T, R> {
    transport: T,
    wordpress: WordPressClient<T>,
    aggregator: FeedAggregator<R>,
    images: ImageResolver<T>,
    sources: Vec<String>,
    per_source_cap: usize,
    category_id: u64,
    selection: SelectionPolicy,
}

impl<T: Transport + Clone, R: FeedReader> BatchOrchestrator<T, R> {
    pub fn new(transport: T, reader: R, settings: &Settings) -> Self {
        Self {
            wordpress: WordPressClient::new(transport.clone(), &settings.wp_url, settings.auth_header.clone()),
            images: ImageResolver::new(transport.clone()),
            aggregator: FeedAggregator::new(reader),
            transport,
            sources: settings.feeds.clone(),
            per_source_cap: settings.per_source_cap,
            category_id: settings.category_id,
            selection: settings.selection_policy(),
        }
    }

    /// Run the batch and fold the result into the program's output shape.
    pub async fn execute(&self) -> BatchOutcome {
        match self.run().await {
            Ok(results) => BatchOutcome::completed(results),
            Err(e) => BatchOutcome::aborted(e),
        }
    }

    /// Run the batch. `Err` only for fatal conditions.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len()))]
    pub async fn run(&self) -> Result<Vec<ItemResult>> {
        let mut stage = BatchStage::Init;
        let outcome = self.advance(&mut stage).await;
        if let Err(e) = &outcome {
            error!(from = ?stage, to = ?BatchStage::Aborted, fatal = e.is_fatal(), error = %e, "Batch aborted");
        }
        outcome
    }

    async fn advance(&self, stage: &mut BatchStage) -> Result<Vec<ItemResult>> {
        self.wordpress.self_test().await?;
        *stage = BatchStage::AuthVerified;
        info!(stage = ?stage, "Credentials verified");

        let items = self.aggregator.collect(&self.sources, self.per_source_cap).await?;
        *stage = BatchStage::Aggregated;
        info!(stage = ?stage, available = items.len(), "Feeds aggregated");

        let selected = self.selection.select(items);
        info!(policy = ?self.selection, selected = selected.len(), "Selected items to publish");

        let results: Vec<ItemResult> = stream::iter(selected.iter().enumerate())
            .then(|(index, item)| async move {
                match self.publish_item(item).await {
                    Ok(post) => ItemResult::published(post),
                    Err(e) => {
                        warn!(index, title = %item.title, error = %e, "Item failed; continuing with next");
                        ItemResult::failed(&item.title, e)
                    }
                }
            })
            .collect()
            .await;

        *stage = BatchStage::Completed;
        let published = results.iter().filter(|r| r.ok).count();
        info!(
            stage = ?stage,
            total = results.len(),
            published,
            failed = results.len() - published,
            "Batch completed"
        );
        Ok(results)
    }

    #[instrument(level = "info", skip_all, fields(title = %item.title, link = %item.link))]
    async fn publish_item(&self, item: &FeedItem) -> Result<CreatedPost> {
        let featured_media = match self.images.resolve(item).await {
            Some(url) => MediaPublisher::new(self.transport.clone(), &self.wordpress)
                .upload_or_skip(&url)
                .await
                .map(|media| media.id),
            None => None,
        };

        let draft = PostDraft::new(&item.title, build_body(item), self.category_id, featured_media);
        self.wordpress.create_post(&draft).await
    }
}
