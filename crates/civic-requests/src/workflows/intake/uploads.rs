use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tracing::{debug, warn};

use super::domain::ImageMetadata;
use super::validation::{is_accepted_image_type, MAX_IMAGE_BYTES};

/// Public prefix under which stored images are referenced.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// The `image` part of a submission as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Reasons an upload is turned away before the workflow sees the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("Only image files are allowed")]
    UnsupportedType,
    #[error("Image size must be less than 5MB")]
    TooLarge,
}

/// Local directory holding citizen photos.
#[derive(Debug, Clone)]
pub struct UploadDirectory {
    root: PathBuf,
}

impl UploadDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Both the file extension and the declared type must name JPEG or PNG.
    pub fn screen(&self, upload: &ImageUpload) -> Result<(), UploadRejection> {
        let guessed = mime_guess::from_path(&upload.file_name)
            .first()
            .map(|guess| is_accepted_image_type(guess.essence_str()))
            .unwrap_or(false);

        if !guessed || !is_accepted_image_type(&upload.content_type) {
            return Err(UploadRejection::UnsupportedType);
        }
        if upload.bytes.len() as u64 > MAX_IMAGE_BYTES {
            return Err(UploadRejection::TooLarge);
        }
        Ok(())
    }

    /// Pick the stored name for an accepted upload without touching the disk, so the
    /// submission can be validated against its metadata first.
    pub fn stage(&self, upload: ImageUpload) -> StagedImage {
        let file_name = stored_file_name(&upload.file_name);
        StagedImage {
            metadata: ImageMetadata {
                content_type: upload.content_type,
                size_bytes: upload.bytes.len() as u64,
                path: format!("{PUBLIC_PREFIX}/{file_name}"),
            },
            dir: self.root.clone(),
            target: self.root.join(file_name),
            bytes: upload.bytes,
        }
    }
}

/// An accepted upload whose bytes are held in memory until the submission is known good.
#[derive(Debug)]
pub struct StagedImage {
    metadata: ImageMetadata,
    dir: PathBuf,
    target: PathBuf,
    bytes: Vec<u8>,
}

impl StagedImage {
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub async fn write(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&self.target, &self.bytes).await?;
        debug!(path = %self.target.display(), bytes = self.bytes.len(), "image stored");
        Ok(())
    }

    /// Remove a written file whose submission was not persisted. Failures are only logged.
    pub async fn discard(&self) {
        match tokio::fs::remove_file(&self.target).await {
            Ok(()) => debug!(path = %self.target.display(), "orphaned image removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.target.display(), error = %err, "failed to remove image")
            }
        }
    }
}

fn stored_file_name(original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("image-{}-{}{}", Utc::now().timestamp_millis(), suffix, extension)
}
