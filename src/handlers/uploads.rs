use std::path::Path;

use axum::{
    body::Bytes,
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};

use crate::{error::AppError, storage::StorageState};

/// An image taken from the `image` field of a multipart upload.
#[derive(Debug)]
pub struct ImageUpload {
    pub bytes: Bytes,
    // Lower-cased, with the leading dot; empty when the file name has none.
    pub extension: String,
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::Validation(format!("Please upload an image less than {max_bytes} bytes"))
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_bytes)
    } else {
        AppError::Validation(err.body_text())
    }
}

fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// read_image
///
/// Pulls the `image` field out of a multipart body. The part must declare an
/// `image/*` content type and be at most `max_bytes` long.
pub async fn read_image(mut multipart: Multipart, max_bytes: usize) -> Result<ImageUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image"));
        if !is_image {
            return Err(AppError::Validation("Please upload an image file".into()));
        }
        let extension = extension_of(field.file_name());

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;
        if bytes.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        return Ok(ImageUpload { bytes, extension });
    }

    Err(AppError::Validation("Please upload a file".into()))
}

/// Best-effort removal of a stored asset. Failures are logged, never returned.
pub async fn discard_asset(storage: &StorageState, key: &str) {
    match storage.delete_object(key).await {
        Ok(true) => tracing::debug!(key, "asset removed"),
        Ok(false) => tracing::debug!(key, "asset already absent"),
        Err(e) => tracing::warn!(key, error = %e, "asset removal failed"),
    }
}
