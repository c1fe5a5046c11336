//! Inline image resolution.
//!
//! Clients may embed images as `data:<mime>;base64,<payload>` entries in
//! `images[]`. Each one is written under the inline directory and replaced by a
//! `file://` URL, which the fetcher copies like any other asset.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use clipweave_models::{is_data_url, CompileRequest};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

const DATA_URL_PREFIX: &str = "data:";

/// Decoded `data:` URL payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "img",
        }
    }
}

/// Decode a base64 image `data:` URL.
pub fn parse_data_url(entry: &str) -> ApiResult<InlineImage> {
    if !is_data_url(entry) {
        return Err(ApiError::bad_request("Inline image must be a data: URL"));
    }

    let rest = &entry[DATA_URL_PREFIX.len()..];
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ApiError::bad_request("Inline image is missing its payload"))?;

    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| ApiError::bad_request("Inline images must be base64 encoded"))?
        .trim()
        .to_lowercase();

    if !mime_type.starts_with("image/") {
        return Err(ApiError::bad_request(format!(
            "Inline entry has non-image type {}",
            mime_type
        )));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::bad_request(format!("Inline image is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(ApiError::bad_request("Inline image is empty"));
    }

    Ok(InlineImage { mime_type, bytes })
}

/// Directory where decoded inline images wait for the fetch stage.
#[derive(Debug, Clone)]
pub struct InlineImageStore {
    dir: PathBuf,
}

impl InlineImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace every inline entry in `request.images` with a `file://` URL.
    ///
    /// Returns the files written; hand them to [`InlineImageStore::release`]
    /// once the job is over. On error nothing is left behind.
    pub async fn resolve(&self, request: &mut CompileRequest) -> ApiResult<Vec<PathBuf>> {
        let mut written = Vec::new();

        for entry in request.images.iter_mut() {
            if !is_data_url(entry) {
                continue;
            }

            match self.store(entry).await {
                Ok((path, url)) => {
                    written.push(path);
                    *entry = url;
                }
                Err(e) => {
                    self.release(&written).await;
                    return Err(e);
                }
            }
        }

        if !written.is_empty() {
            metrics::record_inline_images(written.len());
            debug!(count = written.len(), "Resolved inline images");
        }

        Ok(written)
    }

    async fn store(&self, entry: &str) -> ApiResult<(PathBuf, String)> {
        let image = parse_data_url(entry)?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ApiError::internal(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let path = self
            .dir
            .join(format!("{}.{}", Uuid::new_v4(), image.extension()));
        fs::write(&path, &image.bytes)
            .await
            .map_err(|e| ApiError::internal(format!("cannot write {}: {}", path.display(), e)))?;

        let url = Url::from_file_path(&path)
            .map_err(|_| ApiError::internal(format!("not an absolute path: {}", path.display())))?;

        Ok((path, url.to_string()))
    }

    /// Delete files produced by [`InlineImageStore::resolve`].
    pub async fn release(&self, files: &[PathBuf]) {
        for file in files {
            if let Err(e) = fs::remove_file(file).await {
                warn!("Failed to remove inline image {}: {}", file.display(), e);
            }
        }
    }
}
