// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Values come from (lowest to highest precedence) built-in defaults,
//! environment variables (optionally loaded from a `.env` file) and the
//! command line.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::DevicePreference;

/// Default upload limit (64MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for the OCR service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Interface to bind the HTTP listener to
    pub host: String,
    /// Port for the HTTP listener
    pub port: u16,
    /// Directory holding the document model weights
    /// (det_model.onnx, rec_model.onnx, ppocr_keys_v1.txt)
    pub model_dir: PathBuf,
    /// Directory holding the auxiliary layout model (layout.onnx)
    pub layout_model_dir: Option<PathBuf>,
    /// Reject layout weights whose signature deviates from the expected one
    pub layout_strict: bool,
    /// Compute device placement
    pub device: DevicePreference,
    /// Target raster width for PDF pages, in pixels
    pub render_width: u32,
    /// Maximum number of pages converted per document (0 = unlimited)
    pub max_pages: usize,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
    /// ONNX Runtime intra-op thread count
    pub intra_threads: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_dir: PathBuf::from("./models/ocr-onnx"),
            layout_model_dir: None,
            layout_strict: false,
            device: DevicePreference::Auto,
            render_width: 1600,
            max_pages: 0,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            intra_threads: 4,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        let defaults = Self::default();

        Self {
            host: env::var("API_HOST").unwrap_or(defaults.host),
            port: env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            model_dir: env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            layout_model_dir: env::var("LAYOUT_MODEL_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            layout_strict: env::var("LAYOUT_STRICT")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.layout_strict),
            device: env::var("DEVICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.device),
            render_width: env::var("RENDER_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.render_width),
            max_pages: env::var("MAX_PAGES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_pages),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            intra_threads: env::var("INTRA_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.intra_threads),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.render_width < 256 {
            return Err(format!(
                "render_width must be at least 256 pixels, got {}",
                self.render_width
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        if self.intra_threads == 0 {
            return Err("intra_threads must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Socket address the HTTP listener binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context(format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
