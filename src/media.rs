//! Featured image upload.
//!
//! [`MediaPublisher`] downloads a resolved image and stores it in the
//! WordPress media library. Failures here never cost the post: callers use
//! [`MediaPublisher::upload_or_skip`] and publish without a featured image.

use crate::error::{PipelineError, Result};
use crate::http::{HttpRequest, Transport};
use crate::models::UploadedMedia;
use crate::wordpress::WordPressClient;
use tracing::{instrument, warn};
use url::Url;

const DEFAULT_MIME: &str = "image/jpeg";

/// Downloads images and re-uploads them to the target site.
pub struct MediaPublisher<'a, T> {
    transport: T,
    wordpress: &'a WordPressClient<T>,
}

impl<'a, T: Transport> MediaPublisher<'a, T> {
    pub fn new(transport: T, wordpress: &'a WordPressClient<T>) -> Self {
        Self { transport, wordpress }
    }

    /// Download `image_url` and upload the bytes as a media item.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ImageDownload`] when the image host answers with a
    /// non-success status, [`PipelineError::MediaUpload`] when WordPress
    /// rejects the upload, or a transport error.
    #[instrument(level = "info", skip(self))]
    pub async fn upload(&self, image_url: &str) -> Result<UploadedMedia> {
        let response = self
            .transport
            .send(HttpRequest::get(image_url).header("Accept", "image/*"))
            .await?;

        if !response.is_success() {
            return Err(PipelineError::ImageDownload {
                url: image_url.to_string(),
                status: response.status,
            });
        }

        let mime = mime_type(response.content_type.as_deref());
        let filename = filename_from_url(image_url, &mime);
        self.wordpress.upload_media(response.body, &filename, &mime).await
    }

    /// [`upload`](Self::upload), degrading every failure to `None`.
    pub async fn upload_or_skip(&self, image_url: &str) -> Option<UploadedMedia> {
        match self.upload(image_url).await {
            Ok(media) => Some(media),
            Err(e) => {
                warn!(url = %image_url, error = %e, "Image upload failed; posting without featured image");
                None
            }
        }
    }
}

/// MIME type from a `Content-Type` header, parameters stripped.
pub fn mime_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME.to_string())
}

/// Filename for an uploaded image: the last path segment of its URL.
///
/// Query and fragment are ignored and percent-escapes decoded. URLs without
/// a usable segment get `image.<ext>` with the extension taken from `mime`.
pub fn filename_from_url(image_url: &str, mime: &str) -> String {
    Url::parse(image_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.rev().find(|s| !s.is_empty()).map(str::to_string))
        })
        .map(|segment| {
            urlencoding::decode(&segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or(segment)
        })
        .map(|name| name.replace(['/', '\\', '"'], "_").trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("image.{}", extension_for(mime)))
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        _ => "jpg",
    }
}
