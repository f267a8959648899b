//! Run reports.
//!
//! When a report directory is configured, each run leaves a JSON record of
//! its outcome next to the previous ones:
//!
//! ```text
//! report_dir/
//! └── 2026-05-06/
//!     ├── run-071500.json
//!     └── run-191500.json
//! ```
//!
//! The record wraps the same [`BatchOutcome`] printed to stdout with the
//! run's start and finish times.

use crate::models::BatchOutcome;
use crate::utils::ensure_writable_dir;
use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    started_at: String,
    finished_at: String,
    #[serde(flatten)]
    outcome: &'a BatchOutcome,
}

/// Write the outcome of one run to `{report_dir}/{date}/run-{HHMMSS}.json`.
///
/// Date and time come from `finished_at`. Returns the path written.
#[instrument(level = "info", skip_all, fields(report_dir = %report_dir))]
pub async fn write_report(
    outcome: &BatchOutcome,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    report_dir: &str,
) -> Result<String, Box<dyn Error>> {
    let report = RunReport {
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        outcome,
    };
    let json = serde_json::to_string_pretty(&report)?;

    let day_dir = format!(
        "{}/{}",
        report_dir.trim_end_matches('/'),
        finished_at.format("%Y-%m-%d")
    );
    if let Err(e) = ensure_writable_dir(&day_dir).await {
        error!(%day_dir, error = %e, "Report directory is not writable");
        return Err(e);
    }

    let path = format!("{}/run-{}.json", day_dir, finished_at.format("%H%M%S"));
    fs::write(&path, json).await?;
    info!(%path, "Wrote run report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemResult;
    use chrono::TimeZone;

    fn scratch_dir(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("wp_feed_poster-{}-{}", name, std::process::id()));
        dir.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_report_path_and_contents() {
        let dir = scratch_dir("report");
        let started = Local.with_ymd_and_hms(2026, 5, 6, 7, 14, 58).unwrap();
        let finished = Local.with_ymd_and_hms(2026, 5, 6, 7, 15, 0).unwrap();
        let outcome = BatchOutcome::completed(vec![ItemResult::failed("Broken", "post creation failed (HTTP 500)")]);

        let path = write_report(&outcome, started, finished, &format!("{dir}/")).await.unwrap();
        assert_eq!(path, format!("{dir}/2026-05-06/run-071500.json"));

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["success"], true);
        assert_eq!(written["posted"][0]["ok"], false);
        assert_eq!(written["posted"][0]["title"], "Broken");
        assert!(written["started_at"].as_str().unwrap().starts_with("2026-05-06T07:14:58"));
        assert!(written["finished_at"].as_str().unwrap().starts_with("2026-05-06T07:15:00"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_aborted_outcome_is_recorded() {
        let dir = scratch_dir("aborted");
        let now = Local.with_ymd_and_hms(2026, 1, 2, 23, 59, 59).unwrap();
        let outcome = BatchOutcome::aborted("no feed items found in any source");

        let path = write_report(&outcome, now, now, &dir).await.unwrap();
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["success"], false);
        assert_eq!(written["error"], "no feed items found in any source");
        assert!(written.get("posted").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
