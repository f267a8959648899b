//! Error taxonomy for a batch run.
//!
//! Errors fall into two families:
//!
//! - **Fatal**: configuration problems, rejected credentials and an empty
//!   aggregate. These abort the whole run and become the single top-level
//!   error of the [`BatchOutcome`](crate::models::BatchOutcome).
//! - **Recovered**: a failing feed source, a failed image download or media
//!   upload, or a rejected post. These are handled at the step (or item) that
//!   produced them and never escape it.
//!
//! Transport, parse and serialization failures are wrapped so `?` can be used
//! throughout; the step that receives them decides which family they land in.

use thiserror::Error;

/// Every failure a run can produce.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing WordPress credentials: username and application password are required")]
    MissingCredentials,

    #[error("WordPress rejected the credentials (HTTP {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    #[error("no feed items found in any source")]
    NoItemsFound,

    #[error("failed to read feed {url}: {reason}")]
    FeedFetch { url: String, reason: String },

    #[error("image download failed (HTTP {status}) for {url}")]
    ImageDownload { url: String, status: u16 },

    #[error("media upload failed (HTTP {status}): {body}")]
    MediaUpload { status: u16, body: String },

    #[error("post creation failed (HTTP {status}): {message}")]
    PostCreationFailed { status: u16, message: String },

    #[error("unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether this error aborts the whole batch rather than a single unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_)
                | PipelineError::MissingCredentials
                | PipelineError::AuthenticationFailed { .. }
                | PipelineError::NoItemsFound
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
