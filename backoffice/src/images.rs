//! Image uploads to Drive and the read-through image proxy.

use crate::errors::ApiError;
use crate::links::normalize_thumbnail;
use crate::metrics_defs::IMAGE_UPLOADS;
use bytes::Bytes;
use google::{FileContent, FileStore, GoogleError};
use serde::Serialize;
use shared::counter;
use std::sync::Arc;

const DEFAULT_FILE_NAME: &str = "upload";

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub file_id: String,
    pub image_url: Option<String>,
}

/// A `file` part received from the admin UI.
#[derive(Debug)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    fn validate(&self, max_bytes: usize) -> Result<(), ApiError> {
        let is_image = self
            .content_type
            .as_deref()
            .is_some_and(|content_type| content_type.starts_with("image/"));
        if !is_image {
            return Err(ApiError::BadRequest("file must be an image".into()));
        }
        if self.bytes.is_empty() {
            return Err(ApiError::BadRequest("file is empty".into()));
        }
        if self.bytes.len() > max_bytes {
            return Err(ApiError::PayloadTooLarge);
        }
        Ok(())
    }
}

pub async fn upload_image(
    store: Arc<dyn FileStore>,
    upload: ImageUpload,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    upload.validate(max_bytes)?;

    let name = upload
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME);
    let content_type = upload.content_type.as_deref().unwrap_or_default();
    let size = upload.bytes.len();

    let file = store.upload(name, content_type, upload.bytes).await?;
    counter!(IMAGE_UPLOADS).increment(1);
    tracing::info!(file_id = %file.id, name = %name, size, "Uploaded image");

    Ok(UploadedImage {
        image_url: file.thumbnail_link.as_deref().map(normalize_thumbnail),
        file_id: file.id,
    })
}

/// Drive ids only contain URL-safe base64 characters.
pub fn is_valid_file_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub async fn fetch_image(store: Arc<dyn FileStore>, id: &str) -> Result<FileContent, ApiError> {
    if !is_valid_file_id(id) {
        return Err(ApiError::BadRequest(format!("invalid file id: {id}")));
    }

    match store.download(id).await {
        Ok(content) => Ok(content),
        Err(GoogleError::NotFound(_)) => Err(ApiError::NotFound(format!("file {id} not found"))),
        Err(e) => Err(e.into()),
    }
}
