use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::graph::error_message;
use crate::model::{CloudinarySettings, Thumbnail};

/// Free-plan upload ceiling (100 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 104_857_600;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload service is not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("file is {size} bytes; uploads are limited to {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("invalid file name")]
    InvalidFileName,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to reach upload service: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload failed {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid upload url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UploadedMedia {
    pub secure_url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub resource_type: Option<String>,
}

impl UploadedMedia {
    /// A locally uploaded image offered alongside the Graph thumbnails.
    pub fn into_thumbnail(self, id: String) -> Thumbnail {
        Thumbnail {
            id,
            width: self.width.unwrap_or_default(),
            height: self.height.unwrap_or_default(),
            scale: 1.0,
            uri: self.secure_url,
            is_preferred: false,
            is_local_upload: true,
        }
    }
}

/// Unsigned uploads to a Cloudinary-compatible `/v1_1/{cloud}/upload` endpoint.
#[derive(Debug, Clone)]
pub struct MediaUploader {
    http: Client,
    endpoint: Url,
    preset: String,
}

impl MediaUploader {
    pub fn new(
        api_base: &str,
        settings: &CloudinarySettings,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let cloud_name = settings
            .cloud_name
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(UploadError::NotConfigured("cloud name"))?;
        let preset = settings
            .preset
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(UploadError::NotConfigured("upload preset"))?;

        let endpoint = Url::parse(api_base)
            .and_then(|base| base.join(&format!("v1_1/{}/upload", cloud_name)))
            .map_err(|err| UploadError::InvalidUrl(format!("{}: {}", api_base, err)))?;
        let http = Client::builder()
            .user_agent("fb-carousel/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            preset: preset.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip_all)]
    pub async fn upload_file<P: AsRef<Path>>(&self, file_path: P) -> Result<UploadedMedia, UploadError> {
        let file_path = file_path.as_ref();
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(UploadError::InvalidFileName)?;

        let size = fs::metadata(file_path).await?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size,
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let content = fs::read(file_path).await?;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(content)
                    .file_name(file_name.to_string())
                    .mime_str(content_type(file_path))?,
            )
            .text("upload_preset", self.preset.clone());

        let res = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = error_message(&body);
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(%message, "rate limited by upload service");
            }
            return Err(UploadError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadedMedia = res.json().await?;
        info!(file = file_name, url = %uploaded.secure_url, size, "uploaded media");
        Ok(uploaded)
    }
}

pub fn content_type(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
