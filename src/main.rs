//! # WP Feed Poster
//!
//! Picks fresh items from a set of RSS/Atom feeds and publishes them to a
//! WordPress site through its REST API, each with a featured image when one
//! can be found.
//!
//! ## Features
//!
//! - Reads RSS 2.0, RSS 1.0 (RDF) and Atom feeds, capped per source
//! - Resolves a lead image from the feed itself or the article's `og:image`
//! - Re-hosts the image in the WordPress media library
//! - Publishes a short excerpt with a source attribution link
//! - Isolates failures per item; one broken article never stops the batch
//!
//! ## Usage
//!
//! ```sh
//! WP_URL=https://blog.example WP_USERNAME=bot WP_APP_PASSWORD="abcd efgh" \
//!   WP_CATEGORY_ID=12 wp_feed_poster --items-per-run 2
//! ```
//!
//! The outcome is printed to stdout as JSON; logs go to stderr.
//!
//! ## Architecture
//!
//! One run is a short pipeline:
//! 1. **Settings**: merge defaults, the optional YAML file, flags and environment
//! 2. **Self-test**: verify the credentials against `users/me`
//! 3. **Aggregation**: read every feed source in order
//! 4. **Publishing**: image, media upload and post creation per selected item
//! 5. **Output**: JSON outcome on stdout, optional report file on disk

use chrono::Local;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod batch;
mod cli;
mod config;
mod content;
mod error;
mod feeds;
mod http;
mod images;
mod media;
mod models;
mod report;
mod utils;
mod wordpress;

use batch::BatchOrchestrator;
use cli::Cli;
use config::Settings;
use feeds::HttpFeedReader;
use http::ReqwestTransport;
use models::BatchOutcome;

#[tokio::main]
#[instrument]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let started_at = Local::now();
    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "wp_feed_poster starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, feeds = args.feeds.len(), "Parsed CLI arguments");

    let settings = match Settings::load(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            emit(&BatchOutcome::aborted(e));
            return ExitCode::FAILURE;
        }
    };

    let transport = match ReqwestTransport::new(&settings.user_agent, settings.request_timeout) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            emit(&BatchOutcome::aborted(e));
            return ExitCode::FAILURE;
        }
    };

    info!(
        wp_url = %settings.wp_url,
        sources = settings.feeds.len(),
        items_per_run = settings.items_per_run,
        selection = ?settings.selection,
        "Starting batch"
    );
    let orchestrator = BatchOrchestrator::new(transport.clone(), HttpFeedReader::new(transport), &settings);
    let outcome = orchestrator.execute().await;
    emit(&outcome);

    // ---- Optional run report ----
    if let Some(report_dir) = &settings.report_dir {
        if let Err(e) = report::write_report(&outcome, started_at, Local::now(), report_dir).await {
            error!(path = %report_dir, error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        success = outcome.success,
        "Execution complete"
    );

    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print the outcome as a single JSON document on stdout.
fn emit(outcome: &BatchOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "Failed to serialize outcome"),
    }
}
