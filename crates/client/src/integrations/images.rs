//! Profile and product image hosting.
//!
//! Images go to ImgBB as a base64 multipart field. When no key is
//! configured, or the upload fails for any reason, callers get a generated
//! avatar URL instead.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::config::ImgbbConfig;

const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";

/// Errors from the image host.
#[derive(Debug, Error)]
pub enum ImageError {
    /// No API key configured.
    #[error("image host not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The host answered but did not accept the image.
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// An image to upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Deserialize)]
struct UploadData {
    url: String,
}

/// ImgBB client.
#[derive(Debug, Clone)]
pub struct ImageHost {
    client: reqwest::Client,
    config: Option<ImgbbConfig>,
}

impl ImageHost {
    /// Create an image host; `None` means every upload falls back.
    #[must_use]
    pub fn new(config: Option<ImgbbConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Image host that always falls back to avatars.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Upload an image and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::NotConfigured` without a key, or the transport
    /// or host error otherwise.
    #[instrument(skip(self, image), fields(file_name = %image.file_name, size = image.bytes.len()))]
    pub async fn upload(&self, image: &ImageUpload) -> Result<String, ImageError> {
        let config = self.config.as_ref().ok_or(ImageError::NotConfigured)?;

        let form = reqwest::multipart::Form::new()
            .text("image", STANDARD.encode(&image.bytes))
            .text("name", image.file_name.clone());

        let response = self
            .client
            .post(config.upload_url.as_str())
            .query(&[("key", config.api_key.expose_secret())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ImageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response.json().await?;
        Ok(body.data.url)
    }

    /// Upload `image` if given, otherwise (or on failure) return an avatar
    /// URL for `name`.
    pub async fn upload_or_avatar(&self, image: Option<&ImageUpload>, name: &str) -> String {
        let Some(image) = image else {
            return avatar_url(name);
        };

        match self.upload(image).await {
            Ok(url) => url,
            Err(ImageError::NotConfigured) => avatar_url(name),
            Err(e) => {
                warn!(error = %e, "Image upload failed, using avatar");
                avatar_url(name)
            }
        }
    }
}

/// Generated-avatar URL for a display name.
#[must_use]
pub fn avatar_url(name: &str) -> String {
    format!(
        "{AVATAR_BASE_URL}?name={}&background=random",
        urlencoding::encode(name.trim())
    )
}
