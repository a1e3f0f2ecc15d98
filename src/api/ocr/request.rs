// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload handling for the OCR endpoint

use std::path::Path;

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Field, MultipartError};
use axum_extra::extract::Multipart;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::api::errors::ApiError;

/// The only accepted upload extension
const PDF_EXTENSION: &str = ".pdf";

/// Reject filenames that do not name a PDF
///
/// The check is on the client supplied name only and is case sensitive.
pub fn validate_filename(filename: &str) -> Result<(), ApiError> {
    if filename.ends_with(PDF_EXTENSION) {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(
            "Only PDF files are supported".to_string(),
        ))
    }
}

/// Advance to the first part that carries a filename
///
/// Parts without a filename (plain form values) are skipped.
pub async fn next_file_field(multipart: &mut Multipart) -> Result<(Field, String), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if let Some(filename) = field.file_name().map(str::to_string) {
            debug!(
                "Upload part '{}' carries file '{}'",
                field.name().unwrap_or_default(),
                filename
            );
            return Ok((field, filename));
        }
    }
    Err(ApiError::InvalidRequest("No file uploaded".to_string()))
}

/// An upload spooled to a temporary `.pdf` file
///
/// The file is removed when this value is dropped.
pub struct SavedUpload {
    file: NamedTempFile,
    size: usize,
}

impl SavedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Stream a file part to a fresh temporary file
pub async fn save_upload(mut field: Field) -> Result<SavedUpload, ApiError> {
    let file = tempfile::Builder::new()
        .prefix("ocr-upload-")
        .suffix(PDF_EXTENSION)
        .tempfile()
        .map_err(|e| ApiError::Internal(format!("Failed to create temporary file: {}", e)))?;

    let handle = file
        .as_file()
        .try_clone()
        .map_err(|e| ApiError::Internal(format!("Failed to open temporary file: {}", e)))?;
    let mut writer = tokio::fs::File::from_std(handle);

    let mut size = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(upload_error)? {
        size += chunk.len();
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to write upload: {}", e)))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write upload: {}", e)))?;

    if size == 0 {
        return Err(ApiError::InvalidRequest(
            "Uploaded file is empty".to_string(),
        ));
    }

    Ok(SavedUpload { file, size })
}

fn upload_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::InvalidRequest(err.body_text())
    }
}
