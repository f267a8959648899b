//! Run settings.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! command-line flags and environment variables. The merged result is
//! validated up front so a bad configuration fails before any network call.
//!
//! # YAML file
//!
//! ```yaml
//! wp_url: https://blog.example
//! wp_username: autoposter
//! category_id: 12
//! items_per_run: 2
//! per_source_cap: 3
//! selection: first
//! feeds:
//!   - https://techcrunch.com/feed/
//!   - https://www.theverge.com/rss/index.xml
//! request_timeout_secs: 30
//! report_dir: /var/lib/wp_feed_poster/reports
//! ```

use crate::batch::SelectionPolicy;
use crate::cli::{Cli, SelectionMode};
use crate::error::{PipelineError, Result};
use crate::wordpress::build_auth_header;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_FEEDS: [&str; 5] = [
    "https://techcrunch.com/feed/",
    "https://www.theverge.com/rss/index.xml",
    "https://mashable.com/feed/",
    "https://www.marketingdive.com/feeds/news/",
    "https://www.socialmediatoday.com/feed",
];

const DEFAULT_ITEMS_PER_RUN: usize = 2;
const DEFAULT_PER_SOURCE_CAP: usize = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Contents of the optional YAML settings file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub wp_url: Option<String>,
    pub wp_username: Option<String>,
    pub wp_app_password: Option<String>,
    pub category_id: Option<u64>,
    pub items_per_run: Option<usize>,
    pub per_source_cap: Option<usize>,
    pub selection: Option<SelectionMode>,
    pub feeds: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub report_dir: Option<String>,
}

impl FileConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Validated settings for one run.
#[derive(Clone)]
pub struct Settings {
    pub wp_url: String,
    pub auth_header: String,
    pub category_id: u64,
    pub items_per_run: usize,
    pub per_source_cap: usize,
    pub selection: SelectionMode,
    pub feeds: Vec<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub report_dir: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("wp_url", &self.wp_url)
            .field("auth_header", &"<redacted>")
            .field("category_id", &self.category_id)
            .field("items_per_run", &self.items_per_run)
            .field("per_source_cap", &self.per_source_cap)
            .field("selection", &self.selection)
            .field("feeds", &self.feeds)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("report_dir", &self.report_dir)
            .finish()
    }
}

impl Settings {
    /// Read the YAML file named by `--config` (if any) and merge it with the CLI.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                info!(path = %path.display(), "Loaded settings file");
                FileConfig::from_yaml(&text)?
            }
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Merge CLI/env values over file values over defaults, then validate.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self> {
        let wp_url = cli
            .wp_url
            .clone()
            .or(file.wp_url)
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PipelineError::Config("WordPress base URL (WP_URL) is required".to_string()))?;

        match Url::parse(&wp_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(PipelineError::Config(format!(
                    "WordPress base URL must be an http(s) URL, got {wp_url:?}"
                )));
            }
        }

        let username = cli.wp_username.clone().or(file.wp_username);
        let password = cli.wp_app_password.clone().or(file.wp_app_password);
        let auth_header = build_auth_header(username.as_deref(), password.as_deref())?;

        let category_id = match cli.category_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                PipelineError::Config(format!("category id must be a positive integer, got {raw:?}"))
            })?,
            None => file
                .category_id
                .ok_or_else(|| PipelineError::Config("category id (WP_CATEGORY_ID) is required".to_string()))?,
        };
        if category_id == 0 {
            return Err(PipelineError::Config("category id must be a positive integer".to_string()));
        }

        let items_per_run = cli.items_per_run.or(file.items_per_run).unwrap_or(DEFAULT_ITEMS_PER_RUN);
        if items_per_run == 0 {
            return Err(PipelineError::Config("items per run must be at least 1".to_string()));
        }

        let per_source_cap = cli.per_source_cap.or(file.per_source_cap).unwrap_or(DEFAULT_PER_SOURCE_CAP);
        if per_source_cap == 0 {
            return Err(PipelineError::Config("per-source cap must be at least 1".to_string()));
        }

        let feeds: Vec<String> = if !cli.feeds.is_empty() {
            cli.feeds.clone()
        } else {
            file.feeds
                .unwrap_or_else(|| DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect())
        };
        let feeds: Vec<String> = feeds
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if feeds.is_empty() {
            return Err(PipelineError::Config("at least one feed source is required".to_string()));
        }

        let timeout_secs = cli
            .request_timeout_secs
            .or(file.request_timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(PipelineError::Config("request timeout must be at least 1 second".to_string()));
        }

        let settings = Settings {
            wp_url,
            auth_header,
            category_id,
            items_per_run,
            per_source_cap,
            selection: cli.selection.or(file.selection).unwrap_or(SelectionMode::First),
            feeds,
            request_timeout: Duration::from_secs(timeout_secs),
            user_agent: file
                .user_agent
                .unwrap_or_else(|| format!("wp_feed_poster/{}", env!("CARGO_PKG_VERSION"))),
            report_dir: cli.report_dir.clone().or(file.report_dir),
        };
        debug!(?settings, "Resolved settings");
        Ok(settings)
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        match self.selection {
            SelectionMode::First => SelectionPolicy::FirstN(self.items_per_run),
            SelectionMode::Random => SelectionPolicy::RandomOne,
        }
    }
}
