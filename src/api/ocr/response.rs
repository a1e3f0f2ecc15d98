// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::inference::InferenceOutput;
use crate::models::Device;

/// Response from OCR processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    /// Name of the uploaded file
    pub filename: String,
    /// Extracted markdown
    pub markdown: String,
    /// Pages in the document
    pub page_count: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Model used for conversion
    pub model: String,
    /// Device the model ran on ("cuda:0", "cpu")
    pub device: String,
}

impl OcrResponse {
    pub fn new(
        filename: String,
        output: InferenceOutput,
        model: &str,
        device: Device,
        elapsed: Duration,
    ) -> Self {
        Self {
            filename,
            markdown: output.markdown,
            page_count: output.page_count,
            processing_time_ms: elapsed.as_millis() as u64,
            model: model.to_string(),
            device: device.to_string(),
        }
    }
}
