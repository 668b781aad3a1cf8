use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// URL prefix the asset directory is exposed under for playback.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Media kinds the analysis routine knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

/// Raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Flat on-disk directory holding one file per uploaded asset.
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open the asset directory, creating it when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(IngestError::Io)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist an upload and return its asset reference (the stored file name).
    pub async fn ingest(&self, owner_id: &str, upload: &AssetUpload) -> Result<String, IngestError> {
        if owner_id.trim().is_empty() {
            return Err(IngestError::MissingOwner);
        }
        if upload.bytes.is_empty() {
            return Err(IngestError::EmptyPayload);
        }

        let (extension, kind) = classify(upload)?;
        if kind == MediaKind::Image {
            image::guess_format(&upload.bytes)
                .map_err(|_| IngestError::UnsupportedMedia(format!("{} payload is not an image", extension)))?;
        }

        let asset_ref = derive_asset_ref(upload.file_name.as_deref(), extension);
        let path = self.root.join(&asset_ref);

        if let Err(e) = write_new(&path, &upload.bytes).await {
            let _ = fs::remove_file(&path).await;
            return Err(IngestError::Io(e));
        }

        tracing::info!(
            owner_id = %owner_id,
            asset_ref = %asset_ref,
            bytes = upload.bytes.len(),
            "Asset ingested"
        );

        Ok(asset_ref)
    }

    /// Absolute location of a stored asset.
    pub fn resolve(&self, asset_ref: &str) -> PathBuf {
        self.root.join(asset_ref)
    }

    /// Remove an asset whose job record could not be created.
    pub async fn remove(&self, asset_ref: &str) -> Result<(), IngestError> {
        fs::remove_file(self.resolve(asset_ref))
            .await
            .map_err(IngestError::Io)
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Work out the canonical extension and media kind from the file name,
/// falling back to the declared MIME type.
fn classify(upload: &AssetUpload) -> Result<(&'static str, MediaKind), IngestError> {
    let from_name = upload
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    if let Some(ext) = from_name {
        if let Some(found) = kind_for_extension(&ext) {
            return Ok(found);
        }
    }

    let mime = upload
        .content_type
        .as_deref()
        .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "video/mp4" => Ok(("mp4", MediaKind::Video)),
        "video/avi" | "video/x-msvideo" => Ok(("avi", MediaKind::Video)),
        "image/jpeg" | "image/jpg" => Ok(("jpg", MediaKind::Image)),
        "image/png" => Ok(("png", MediaKind::Image)),
        _ => Err(IngestError::UnsupportedMedia(
            upload
                .file_name
                .clone()
                .or_else(|| upload.content_type.clone())
                .unwrap_or_else(|| "unnamed upload".to_string()),
        )),
    }
}

fn kind_for_extension(ext: &str) -> Option<(&'static str, MediaKind)> {
    match ext {
        "mp4" => Some(("mp4", MediaKind::Video)),
        "avi" => Some(("avi", MediaKind::Video)),
        "jpg" | "jpeg" => Some(("jpg", MediaKind::Image)),
        "png" => Some(("png", MediaKind::Image)),
        _ => None,
    }
}

/// `<arrival millis>-<random>-<sanitized original stem>.<ext>`
fn derive_asset_ref(file_name: Option<&str>, extension: &str) -> String {
    let stem = file_name
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "asset".to_string());

    let suffix = Uuid::new_v4().simple().to_string();

    format!(
        "{}-{}-{}.{}",
        Utc::now().timestamp_millis(),
        &suffix[..8],
        stem,
        extension
    )
}

fn sanitize(stem: &str) -> String {
    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(64)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Owner identifier is required")]
    MissingOwner,

    #[error("Uploaded asset is empty")]
    EmptyPayload,

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Asset storage unavailable: {0}")]
    Io(#[from] std::io::Error),
}
