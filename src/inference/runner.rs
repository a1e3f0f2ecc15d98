// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-document inference
//!
//! Validates the input path, then hands the document to the model on the
//! blocking thread pool. Without a model the runner answers with fixed
//! placeholder markdown so the HTTP flow can be exercised end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{ComputeError, DocumentModel};

/// Markdown returned when no model is loaded
pub const PLACEHOLDER_MARKDOWN: &str =
    "# Dummy Markdown\n\nThis is a placeholder response because the model is missing.";

/// Errors produced by the inference runner
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// The input path does not reference an existing file
    #[error("PDF file does not exist at path: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The device ran out of memory during conversion
    #[error("GPU Out of Memory! The PDF is likely too large or complex. ({detail})")]
    ResourceExhausted { detail: String },

    /// Any other conversion failure, with the model's message
    #[error("{0}")]
    Inference(String),
}

impl From<ComputeError> for InferenceError {
    fn from(e: ComputeError) -> Self {
        match e {
            ComputeError::OutOfMemory(detail) => InferenceError::ResourceExhausted { detail },
            other => InferenceError::Inference(other.to_string()),
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    /// Extracted markdown
    pub markdown: String,
    /// Pages in the document (0 for placeholder output)
    pub page_count: usize,
}

/// Convert the PDF at `path` to markdown
///
/// The path is checked before the model is touched. With `model` absent the
/// placeholder markdown is returned. Once started, the conversion runs to
/// completion even if the caller goes away.
pub async fn run_inference(
    model: Option<Arc<dyn DocumentModel>>,
    path: &Path,
) -> Result<InferenceOutput, InferenceError> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        error!("File not found: {}", path.display());
        return Err(InferenceError::FileNotFound(path.to_path_buf()));
    }

    info!("📄 Starting inference on: {}", path.display());

    let Some(model) = model else {
        warn!("⚠️  Model is NOT loaded. Returning placeholder markdown.");
        return Ok(InferenceOutput {
            markdown: PLACEHOLDER_MARKDOWN.to_string(),
            page_count: 0,
        });
    };

    let started = Instant::now();
    let owned_path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || model.convert_single_pdf(&owned_path))
        .await
        .map_err(|e| InferenceError::Inference(format!("inference task failed: {}", e)))?;

    match result {
        Ok(conversion) => {
            info!(
                "✅ Inference completed: {} pages, {} chars, {}ms",
                conversion.metadata.page_count,
                conversion.text.len(),
                started.elapsed().as_millis()
            );
            Ok(InferenceOutput {
                markdown: conversion.text,
                page_count: conversion.metadata.page_count,
            })
        }
        Err(e) => {
            error!("❌ Inference failed: {}", e);
            Err(e.into())
        }
    }
}
