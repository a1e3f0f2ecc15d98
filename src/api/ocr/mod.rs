// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR API endpoint module
//!
//! Provides POST /ocr for converting an uploaded PDF to markdown.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::ocr_handler;
pub use request::{validate_filename, SavedUpload};
pub use response::OcrResponse;
