//! WordPress REST API client.
//!
//! All calls to the target site go through [`WordPressClient::request`], which
//! attaches the `Authorization` header and returns the status together with
//! the body as either parsed JSON or raw text. WordPress usually answers with
//! JSON, but proxies, security plugins and PHP fatals produce HTML or plain
//! text, so callers match on [`ResponseBody`] instead of assuming a shape.
//!
//! # Endpoints
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`self_test`](WordPressClient::self_test) | `GET /wp-json/wp/v2/users/me` |
//! | [`upload_media`](WordPressClient::upload_media) | `POST /wp-json/wp/v2/media` |
//! | [`create_post`](WordPressClient::create_post) | `POST /wp-json/wp/v2/posts` |

use crate::error::{PipelineError, Result};
use crate::http::{HttpRequest, Transport};
use crate::models::{CreatedPost, PostDraft, UploadedMedia};
use crate::utils::{collapse_whitespace, truncate_for_log};
use base64::Engine as _;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument};

/// Build the `Authorization` value for an application password.
///
/// Application passwords are displayed in groups separated by spaces; runs of
/// whitespace are collapsed to single spaces before encoding so pasted values
/// with odd spacing still authenticate.
///
/// # Arguments
///
/// * `username` - The WordPress user owning the application password
/// * `app_password` - The application password, spaces allowed
///
/// # Returns
///
/// A `Basic` credential ready for the `Authorization` header.
///
/// # Errors
///
/// [`PipelineError::MissingCredentials`] when either value is absent or blank.
pub fn build_auth_header(username: Option<&str>, app_password: Option<&str>) -> Result<String> {
    let username = username
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(PipelineError::MissingCredentials)?;
    let password = app_password
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .ok_or(PipelineError::MissingCredentials)?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    Ok(format!("Basic {encoded}"))
}

/// Body of a WordPress response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Structured(serde_json::Value),
    Raw(String),
}

impl ResponseBody {
    /// Human-readable error text: the JSON `message` field when present.
    pub fn message(&self) -> String {
        match self {
            ResponseBody::Structured(value) => value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| truncate_for_log(&value.to_string(), 500)),
            ResponseBody::Raw(text) => truncate_for_log(text, 500),
        }
    }

    fn decode<D: DeserializeOwned>(self, endpoint: &str) -> Result<D> {
        match self {
            ResponseBody::Structured(value) => {
                serde_json::from_value(value).map_err(|e| PipelineError::UnexpectedResponse {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })
            }
            ResponseBody::Raw(text) => Err(PipelineError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                reason: format!("expected JSON, got: {}", truncate_for_log(&text, 200)),
            }),
        }
    }
}

/// Result of one call to the REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Whether the status code is 2xx, regardless of how the body parsed.
    pub success: bool,
    pub status: u16,
    pub body: ResponseBody,
}

/// What to send with a request.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    Binary {
        bytes: Vec<u8>,
        filename: String,
        mime: String,
    },
}

/// Authenticated client for one WordPress site.
#[derive(Debug, Clone)]
pub struct WordPressClient<T> {
    transport: T,
    base_url: String,
    auth_header: String,
}

impl<T: Transport> WordPressClient<T> {
    pub fn new(transport: T, base_url: &str, auth_header: String) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send an authenticated request to `/wp-json/wp/v2/{path}`.
    ///
    /// Only transport failures are errors; any HTTP status comes back as an
    /// [`ApiResponse`].
    #[instrument(level = "debug", skip(self, payload))]
    pub async fn request(&self, path: &str, method: Method, payload: Option<Payload>) -> Result<ApiResponse> {
        let mut request = HttpRequest::new(method, self.endpoint(path))
            .header("Authorization", self.auth_header.as_str())
            .header("Accept", "application/json");

        request = match payload {
            Some(Payload::Json(value)) => request
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&value)?),
            Some(Payload::Binary { bytes, filename, mime }) => request
                .header(
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", filename.replace('"', "")),
                )
                .header("Content-Type", mime)
                .body(bytes),
            None => request,
        };

        let response = self.transport.send(request).await?;
        let body = match serde_json::from_slice::<serde_json::Value>(&response.body) {
            Ok(value) => ResponseBody::Structured(value),
            Err(_) => ResponseBody::Raw(response.text()),
        };

        debug!(status = response.status, "WordPress responded");
        Ok(ApiResponse {
            success: response.is_success(),
            status: response.status,
            body,
        })
    }

    /// Verify the credentials against `users/me` before doing any work.
    #[instrument(level = "info", skip(self))]
    pub async fn self_test(&self) -> Result<()> {
        let response = self
            .request("users/me", Method::GET, None)
            .await
            .map_err(|e| PipelineError::AuthenticationFailed {
                status: 0,
                message: e.to_string(),
            })?;

        if !response.success {
            let message = response.body.message();
            error!(status = response.status, %message, "Credential self-test rejected");
            return Err(PipelineError::AuthenticationFailed {
                status: response.status,
                message,
            });
        }

        let user = match &response.body {
            ResponseBody::Structured(value) => value
                .get("name")
                .or_else(|| value.get("slug"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            ResponseBody::Raw(_) => "unknown".to_string(),
        };
        info!(%user, "Authenticated with WordPress");
        Ok(())
    }

    /// Store raw image bytes in the media library.
    #[instrument(level = "info", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_media(&self, bytes: Vec<u8>, filename: &str, mime: &str) -> Result<UploadedMedia> {
        let payload = Payload::Binary {
            bytes,
            filename: filename.to_string(),
            mime: mime.to_string(),
        };
        let response = self.request("media", Method::POST, Some(payload)).await?;

        if !response.success {
            return Err(PipelineError::MediaUpload {
                status: response.status,
                body: response.body.message(),
            });
        }

        let media: UploadedMedia = response.body.decode("media")?;
        info!(media_id = media.id, "Uploaded media");
        Ok(media)
    }

    /// Publish a post.
    ///
    /// # Arguments
    ///
    /// * `draft` - Title, content, category and optional featured media id
    ///
    /// # Returns
    ///
    /// The id and permalink WordPress assigned to the new post.
    ///
    /// # Errors
    ///
    /// [`PipelineError::PostCreationFailed`] with the status and server message
    /// on a non-success answer, [`PipelineError::UnexpectedResponse`] when a
    /// success body lacks an id, or a transport error.
    #[instrument(level = "info", skip_all, fields(title = %draft.title))]
    pub async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost> {
        let payload = Payload::Json(serde_json::to_value(draft)?);
        let response = self.request("posts", Method::POST, Some(payload)).await?;

        if !response.success {
            return Err(PipelineError::PostCreationFailed {
                status: response.status,
                message: response.body.message(),
            });
        }

        let post: CreatedPost = response.body.decode("posts")?;
        info!(post_id = post.id, link = %post.link, "Created post");
        Ok(post)
    }
}
