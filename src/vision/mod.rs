// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime and PDFium backed document models
//!
//! Components:
//! - `session` - ONNX Runtime sessions with CUDA/CPU placement
//! - `preprocessing` - Page and line tensors
//! - `detection` - Text line detection
//! - `recognition` - Text line recognition (CTC)
//! - `layout` - Page layout regions
//! - `pdf` - PDF rasterisation
//! - `markdown` - Block assembly into markdown
//! - `converter` - The document model and the model loaders

pub mod converter;
pub mod detection;
pub mod layout;
pub mod markdown;
pub mod pdf;
pub mod preprocessing;
pub mod recognition;
pub mod session;

use std::sync::Arc;

use tracing::info;

use crate::config::ServiceConfig;
use crate::models::{DocumentModel, LayoutAnalyzer, ModelRegistry, ModelSlot};

pub use converter::{LayoutModelLoader, PdfConverter, PdfConverterLoader, MODEL_NAME};

/// Build the registry for a configuration
///
/// The layout family is registered only when a layout model directory is
/// configured. Nothing is loaded here.
pub fn build_registry(config: &ServiceConfig) -> ModelRegistry {
    let layout = config.layout_model_dir.as_ref().map(|dir| {
        info!("Layout model family registered ({})", dir.display());
        Arc::new(ModelSlot::<dyn LayoutAnalyzer>::new(
            Arc::new(LayoutModelLoader::new(
                dir.clone(),
                config.layout_strict,
                config.intra_threads,
            )),
            config.device,
        ))
    });

    let document = Arc::new(ModelSlot::<dyn DocumentModel>::new(
        Arc::new(PdfConverterLoader::new(config, layout.clone())),
        config.device,
    ));

    let registry = ModelRegistry::new(document);
    match layout {
        Some(layout) => registry.with_layout(layout),
        None => registry,
    }
}
