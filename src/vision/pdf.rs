// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PDF page rasterisation through PDFium
//!
//! PDFium keeps global state that must be initialised once per process, so
//! the binding lives in a process-wide cell and is shared by every caller.
//! All calls are blocking.

use std::path::Path;

use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use tracing::{debug, info};

use crate::models::ComputeError;

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Bind PDFium, preferring a library next to the binary over the system one
fn bind() -> Result<Pdfium, PdfiumError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())?;
    info!("✅ PDFium library bound");
    Ok(Pdfium::new(bindings))
}

/// The process-wide PDFium instance, bound on first use
///
/// A failed bind is not cached; the next call tries again.
pub fn pdfium() -> Result<&'static Pdfium, String> {
    PDFIUM
        .get_or_try_init(bind)
        .map_err(|e| format!("PDFium library unavailable: {}", e))
}

/// Check that the PDF renderer can be used
pub fn probe() -> Result<(), String> {
    pdfium().map(|_| ())
}

/// Render the pages of a PDF one at a time
///
/// `visit` receives the zero-based page index and the rendered page. At most
/// `max_pages` pages are rendered (0 renders all). Returns the document's
/// total page count.
pub fn for_each_page<F>(
    path: &Path,
    target_width: u32,
    max_pages: usize,
    mut visit: F,
) -> Result<usize, ComputeError>
where
    F: FnMut(usize, DynamicImage) -> Result<(), ComputeError>,
{
    let pdfium = pdfium().map_err(ComputeError::Failed)?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ComputeError::InvalidDocument(format!("{}: {}", path.display(), e)))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    let limit = if max_pages == 0 {
        page_count
    } else {
        page_count.min(max_pages)
    };
    debug!("Rendering {} of {} pages at {}px", limit, page_count, target_width);

    let config = PdfRenderConfig::new().set_target_width(target_width as i32);

    for (index, page) in pages.iter().enumerate().take(limit) {
        let bitmap = page.render_with_config(&config).map_err(|e| {
            ComputeError::Failed(format!("failed to render page {}: {}", index + 1, e))
        })?;
        visit(index, bitmap.as_image())?;
    }

    Ok(page_count)
}
