//! Command-line interface definitions.
//!
//! Every option can also come from the environment, which is how the tool is
//! usually driven from a scheduler or a serverless wrapper. Options left unset
//! fall back to the YAML file given with `--config`, then to built-in defaults
//! (see [`crate::config`]).

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// How items are picked from the aggregated feed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// The first N items, in source order
    First,
    /// One item chosen uniformly at random
    Random,
}

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment
/// WP_URL=https://blog.example WP_USERNAME=bot WP_APP_PASSWORD="abcd efgh ijkl" \
///   WP_CATEGORY_ID=12 wp_feed_poster
///
/// # Explicit feeds and a YAML file for the rest
/// wp_feed_poster -c poster.yaml --feed https://example.com/rss --items-per-run 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "FEED_POSTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the WordPress site
    #[arg(long, env = "WP_URL")]
    pub wp_url: Option<String>,

    /// WordPress username owning the application password
    #[arg(long, env = "WP_USERNAME")]
    pub wp_username: Option<String>,

    /// WordPress application password
    #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
    pub wp_app_password: Option<String>,

    /// Category id assigned to every published post
    #[arg(long, env = "WP_CATEGORY_ID")]
    pub category_id: Option<String>,

    /// How many items to publish per run
    #[arg(short = 'n', long, env = "ITEMS_PER_RUN")]
    pub items_per_run: Option<usize>,

    /// Maximum items taken from each feed source
    #[arg(long, env = "PER_SOURCE_CAP")]
    pub per_source_cap: Option<usize>,

    /// Item selection strategy
    #[arg(long, value_enum, env = "SELECTION")]
    pub selection: Option<SelectionMode>,

    /// Feed source URL (repeatable); replaces the configured list
    #[arg(long = "feed")]
    pub feeds: Vec<String>,

    /// Per-request deadline in seconds for every outbound call
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Directory where a JSON report of each run is written
    #[arg(long, env = "REPORT_DIR")]
    pub report_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "wp_feed_poster",
            "--wp-url",
            "https://blog.example",
            "--category-id",
            "12",
            "--feed",
            "https://a.example/rss",
            "--feed",
            "https://b.example/rss",
            "--selection",
            "random",
        ]);

        assert_eq!(cli.wp_url.as_deref(), Some("https://blog.example"));
        assert_eq!(cli.category_id.as_deref(), Some("12"));
        assert_eq!(cli.feeds.len(), 2);
        assert_eq!(cli.selection, Some(SelectionMode::Random));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["wp_feed_poster", "-c", "/etc/poster.yaml", "-n", "4"]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/poster.yaml")));
        assert_eq!(cli.items_per_run, Some(4));
    }
}
