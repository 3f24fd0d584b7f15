//! Assistant avatar storage.
//!
//! Uploads are validated (type and size) and then either written under the
//! local images directory and served by the backend, or pushed to Cloudinary
//! with a signed upload when credentials are configured.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::config::{CloudinaryConfig, Config};

pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
/// Public path prefix for locally stored images
pub const LOCAL_IMAGE_ROUTE: &str = "/api/images";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("Unsupported image format")]
    InvalidFormat,
    #[error("Image is too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },
    #[error("Image is empty")]
    Empty,
    #[error("Image not found")]
    NotFound,
    #[error("Image upload failed: {0}")]
    Upload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::Webp),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/gif" => Some(ImageFormat::Gif),
            "image/webp" => Some(ImageFormat::Webp),
            "image/bmp" | "image/x-ms-bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Recognise the format from magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else if bytes.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else {
            None
        }
    }
}

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
enum ImageStorage {
    Local { dir: PathBuf },
    Cloudinary { config: CloudinaryConfig, api_base: String },
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ImageService {
    storage: ImageStorage,
    max_bytes: usize,
    http: reqwest::Client,
}

impl ImageService {
    /// Cloudinary when configured, otherwise the local images directory
    pub fn new(config: &Config) -> Result<Self, ImageError> {
        match &config.cloudinary {
            Some(cloudinary) => {
                tracing::info!("Storing assistant images on Cloudinary ({})", cloudinary.cloud_name);
                Ok(Self::cloudinary(cloudinary.clone(), config.max_image_bytes))
            }
            None => Self::local(utils::assets::images_dir(), config.max_image_bytes),
        }
    }

    pub fn local(dir: PathBuf, max_bytes: usize) -> Result<Self, ImageError> {
        std::fs::create_dir_all(&dir)?;
        tracing::info!("Storing assistant images in {}", dir.display());
        Ok(Self {
            storage: ImageStorage::Local { dir },
            max_bytes,
            http: reqwest::Client::new(),
        })
    }

    pub fn cloudinary(config: CloudinaryConfig, max_bytes: usize) -> Self {
        Self {
            storage: ImageStorage::Cloudinary {
                config,
                api_base: CLOUDINARY_API_BASE.to_string(),
            },
            max_bytes,
            http: reqwest::Client::new(),
        }
    }

    /// Point Cloudinary uploads at another base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        if let ImageStorage::Cloudinary { api_base, .. } = &mut self.storage {
            *api_base = base.into();
        }
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check size and type. Magic bytes win; the declared content type and
    /// the file extension are fallbacks.
    pub fn validate(&self, upload: &UploadedImage) -> Result<ImageFormat, ImageError> {
        if upload.bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }

        ImageFormat::sniff(&upload.bytes)
            .or_else(|| {
                upload
                    .content_type
                    .as_deref()
                    .and_then(ImageFormat::from_mime_type)
            })
            .or_else(|| {
                upload
                    .file_name
                    .as_deref()
                    .and_then(|name| Path::new(name).extension())
                    .and_then(|ext| ext.to_str())
                    .and_then(ImageFormat::from_extension)
            })
            .ok_or(ImageError::InvalidFormat)
    }

    /// Validate and store an upload, returning the URL to save on the user.
    pub async fn store(&self, upload: UploadedImage) -> Result<String, ImageError> {
        let format = self.validate(&upload)?;

        match &self.storage {
            ImageStorage::Local { dir } => {
                let file_name = format!("{}.{}", Uuid::new_v4(), format.extension());
                tokio::fs::write(dir.join(&file_name), &upload.bytes).await?;
                tracing::debug!("Stored assistant image {}", file_name);
                Ok(format!("{LOCAL_IMAGE_ROUTE}/{file_name}"))
            }
            ImageStorage::Cloudinary { config, api_base } => {
                self.upload_to_cloudinary(config, api_base, upload, format)
                    .await
            }
        }
    }

    async fn upload_to_cloudinary(
        &self,
        config: &CloudinaryConfig,
        api_base: &str,
        upload: UploadedImage,
        format: ImageFormat,
    ) -> Result<String, ImageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = cloudinary_signature(&[("timestamp", timestamp.as_str())], &config.api_secret);

        let file_name = upload
            .file_name
            .unwrap_or_else(|| format!("assistant.{}", format.extension()));
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(file_name)
            .mime_str(format.mime_type())?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!(
            "{}/{}/image/upload",
            api_base.trim_end_matches('/'),
            config.cloud_name
        );
        let response = self.http.post(url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Cloudinary upload failed ({}): {}", status, body);
            return Err(ImageError::Upload(format!("status {status}")));
        }

        let body: CloudinaryUploadResponse = response.json().await?;
        body.secure_url
            .or(body.url)
            .ok_or_else(|| ImageError::Upload("response had no URL".to_string()))
    }

    /// Read a locally stored image for serving
    pub async fn read_local(&self, file_name: &str) -> Result<(Vec<u8>, ImageFormat), ImageError> {
        let ImageStorage::Local { dir } = &self.storage else {
            return Err(ImageError::NotFound);
        };

        let path = Path::new(file_name);
        let is_plain_name = path.file_name().and_then(|n| n.to_str()) == Some(file_name);
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension);
        let (true, Some(format)) = (is_plain_name, format) else {
            return Err(ImageError::NotFound);
        };

        match tokio::fs::read(dir.join(file_name)).await {
            Ok(bytes) => Ok((bytes, format)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ImageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, with the API secret appended, then hashed.
pub fn cloudinary_signature(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
