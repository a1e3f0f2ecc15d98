// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use std::time::Instant;

use axum::{extract::State, Json};
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::request::{next_file_field, save_upload, validate_filename};
use super::response::OcrResponse;
use crate::api::errors::ApiError;
use crate::api::server::AppState;
use crate::inference::run_inference;

/// POST /ocr - Convert an uploaded PDF to markdown
///
/// Accepts `multipart/form-data`; the first part carrying a filename is the
/// document, whatever its field name.
///
/// # Errors
/// - 400 Bad Request: not a `.pdf` filename, no file part, empty file
/// - 413 Payload Too Large: body exceeds the upload limit
/// - 503 Service Unavailable: model not loaded (a reload is started)
/// - 500 Internal Server Error: conversion failed
pub async fn ocr_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let started = Instant::now();
    let request_id = Uuid::new_v4();
    let mut multipart = multipart.map_err(|e| {
        warn!(%request_id, "Rejected OCR request: {}", e);
        ApiError::InvalidRequest(e.to_string())
    })?;

    // 1. Find the file part and validate its name before reading the body
    let (field, filename) = next_file_field(&mut multipart).await?;
    if let Err(e) = validate_filename(&filename) {
        warn!(%request_id, "Rejected upload '{}': not a PDF", filename);
        return Err(e);
    }

    // 2. Require a loaded model
    let slot = state.registry.document();
    let Some(model) = slot.current().await else {
        if slot.spawn_reload() {
            info!(%request_id, "🔄 Model not loaded, background reload started");
        }
        warn!(%request_id, "OCR request for '{}' refused: model not loaded", filename);
        return Err(ApiError::ServiceUnavailable(
            "Model not loaded. Service is still initializing.".to_string(),
        ));
    };

    // 3. Spool the upload and convert it
    let upload = save_upload(field).await?;
    info!(%request_id, "📥 Received '{}' ({} bytes)", filename, upload.size());

    let output = run_inference(Some(model.clone()), upload.path())
        .await
        .map_err(|e| {
            error!(%request_id, "OCR failed for '{}': {}", filename, e);
            ApiError::ProcessingFailed(format!("OCR processing failed: {}", e))
        })?;

    let response = OcrResponse::new(
        filename,
        output,
        model.name(),
        model.device(),
        started.elapsed(),
    );
    info!(
        %request_id,
        "✅ OCR complete for '{}': {} pages, {}ms",
        response.filename, response.page_count, response.processing_time_ms
    );
    Ok(Json(response))
}
