// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The document model contract
//!
//! A model handle is heavyweight and bound to one device. It is only ever
//! shared behind an `Arc` handed out by the registry.

use std::path::Path;

use image::DynamicImage;

use super::device::Device;
use super::error::ComputeError;

/// A region of a page that holds a picture rather than text
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    /// Zero-based page index
    pub page: usize,
    /// Layout label that produced the region (figure, chart, seal, ...)
    pub label: String,
    /// Region in page pixel coordinates: x, y, width, height
    pub bbox: [u32; 4],
}

/// Metadata produced alongside the converted text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionMetadata {
    /// Number of pages in the document
    pub page_count: usize,
    /// Number of pages actually converted (bounded by the page limit)
    pub pages_converted: usize,
    /// Number of recognised text lines
    pub line_count: usize,
    /// Whether the layout model contributed block labels
    pub layout_applied: bool,
}

/// Output of a single-document conversion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    /// Extracted markdown
    pub text: String,
    /// Picture regions found in the document
    pub images: Vec<ExtractedImage>,
    /// Conversion metadata
    pub metadata: ConversionMetadata,
}

/// A loaded document-to-markdown model
pub trait DocumentModel: Send + Sync {
    /// Short model identifier reported to API clients
    fn name(&self) -> &'static str;

    /// Device the model's weights live on
    fn device(&self) -> Device;

    /// Convert one PDF on disk into markdown
    ///
    /// This call is blocking and may take seconds per page; callers on the
    /// async runtime must move it onto the blocking pool.
    fn convert_single_pdf(&self, path: &Path) -> Result<Conversion, ComputeError>;
}

/// A labelled block found by a layout model
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRegion {
    /// Block label (doc_title, paragraph_title, text, table, figure, ...)
    pub label: String,
    /// Detection score (0.0-1.0)
    pub score: f32,
    /// Region in page pixel coordinates: x1, y1, x2, y2
    pub bbox: [f32; 4],
}

impl LayoutRegion {
    /// Whether a point lies inside the region
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.bbox[0] && x <= self.bbox[2] && y >= self.bbox[1] && y <= self.bbox[3]
    }

    /// Whether the region holds a picture rather than text
    pub fn is_picture(&self) -> bool {
        matches!(
            self.label.as_str(),
            "image" | "figure" | "chart" | "seal" | "header_image" | "footer_image"
        )
    }
}

/// A loaded page layout model
pub trait LayoutAnalyzer: Send + Sync {
    /// Short model identifier
    fn name(&self) -> &'static str;

    /// Find labelled blocks on a rendered page
    fn analyze(&self, page: &DynamicImage) -> Result<Vec<LayoutRegion>, ComputeError>;
}
