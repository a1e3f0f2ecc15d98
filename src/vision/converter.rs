// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PDF to markdown conversion pipeline and the model loaders
//!
//! Pipeline per page: rasterise → layout (when the layout family is loaded)
//! → text line detection → recognition → markdown assembly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::GenericImageView;
use tracing::{debug, info, warn};

use super::detection::TextDetector;
use super::layout::LayoutModel;
use super::markdown::{assemble_page, join_pages, TextLine};
use super::pdf;
use super::preprocessing::crop_region;
use super::recognition::TextRecognizer;
use super::session::load_error;
use crate::config::ServiceConfig;
use crate::models::{
    ComputeError, Conversion, ConversionMetadata, Device, DocumentModel, ExtractedImage,
    LayoutAnalyzer, ModelLoadError, ModelLoader, ModelSlot,
};

/// Identifier reported for the document model
pub const MODEL_NAME: &str = "ppocr-markdown";

/// Detection weights inside the document model directory
pub const DETECTION_FILE: &str = "det_model.onnx";
/// Recognition weights inside the document model directory
pub const RECOGNITION_FILE: &str = "rec_model.onnx";
/// Character dictionary inside the document model directory
pub const DICTIONARY_FILE: &str = "ppocr_keys_v1.txt";
/// Layout weights inside the layout model directory
pub const LAYOUT_FILE: &str = "layout.onnx";

/// Lines recognised below this confidence are dropped
const MIN_LINE_CONFIDENCE: f32 = 0.3;

/// Document model: PDFium rasterisation plus OCR
pub struct PdfConverter {
    detector: TextDetector,
    recognizer: TextRecognizer,
    layout: Option<Arc<ModelSlot<dyn LayoutAnalyzer>>>,
    render_width: u32,
    max_pages: usize,
}

impl PdfConverter {
    pub fn new(
        detector: TextDetector,
        recognizer: TextRecognizer,
        layout: Option<Arc<ModelSlot<dyn LayoutAnalyzer>>>,
        render_width: u32,
        max_pages: usize,
    ) -> Self {
        Self {
            detector,
            recognizer,
            layout,
            render_width,
            max_pages,
        }
    }

    /// Recognise every detected line on a page
    fn recognise_lines(&self, page: &image::DynamicImage) -> Result<Vec<TextLine>, ComputeError> {
        let mut lines = Vec::new();
        for text_box in self.detector.detect(page)? {
            let Some(crop) = crop_region(page, text_box.x, text_box.y, text_box.width, text_box.height)
            else {
                continue;
            };

            let recognized = self.recognizer.recognize(&crop)?;
            if recognized.is_empty() || recognized.confidence < MIN_LINE_CONFIDENCE {
                continue;
            }

            lines.push(TextLine::new(
                recognized.text,
                [
                    text_box.x,
                    text_box.y,
                    text_box.x + text_box.width,
                    text_box.y + text_box.height,
                ],
                recognized.confidence,
            ));
        }
        Ok(lines)
    }
}

impl DocumentModel for PdfConverter {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn device(&self) -> Device {
        match (self.detector.device(), self.recognizer.device()) {
            (Device::Cuda(id), Device::Cuda(_)) => Device::Cuda(id),
            _ => Device::Cpu,
        }
    }

    fn convert_single_pdf(&self, path: &Path) -> Result<Conversion, ComputeError> {
        // Snapshot the layout model once so every page sees the same state
        let layout = self.layout.as_ref().and_then(|slot| slot.try_current());

        let mut pages = Vec::new();
        let mut images = Vec::new();
        let mut metadata = ConversionMetadata {
            layout_applied: layout.is_some(),
            ..Default::default()
        };

        let page_count = pdf::for_each_page(path, self.render_width, self.max_pages, |index, page| {
            let regions = match &layout {
                Some(analyzer) => match analyzer.analyze(&page) {
                    Ok(regions) => regions,
                    Err(e) if e.is_out_of_memory() => return Err(e),
                    Err(e) => {
                        warn!("⚠️  Layout analysis failed on page {}: {}", index + 1, e);
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };

            let lines = self.recognise_lines(&page)?;
            metadata.line_count += lines.len();

            let assembled = assemble_page(lines, &regions, page.dimensions().0 as f32);
            images.extend(assembled.pictures.iter().map(|region| ExtractedImage {
                page: index,
                label: region.label.clone(),
                bbox: [
                    region.bbox[0] as u32,
                    region.bbox[1] as u32,
                    (region.bbox[2] - region.bbox[0]) as u32,
                    (region.bbox[3] - region.bbox[1]) as u32,
                ],
            }));
            pages.push(assembled.markdown);
            debug!("Page {} converted", index + 1);
            Ok(())
        })?;

        metadata.page_count = page_count;
        metadata.pages_converted = pages.len();

        Ok(Conversion {
            text: join_pages(&pages),
            images,
            metadata,
        })
    }
}

fn require(path: PathBuf) -> Result<PathBuf, ModelLoadError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ModelLoadError::WeightsNotFound(path))
    }
}

/// Loader for the document family
pub struct PdfConverterLoader {
    model_dir: PathBuf,
    render_width: u32,
    max_pages: usize,
    intra_threads: usize,
    layout: Option<Arc<ModelSlot<dyn LayoutAnalyzer>>>,
}

impl PdfConverterLoader {
    pub fn new(config: &ServiceConfig, layout: Option<Arc<ModelSlot<dyn LayoutAnalyzer>>>) -> Self {
        Self {
            model_dir: config.model_dir.clone(),
            render_width: config.render_width,
            max_pages: config.max_pages,
            intra_threads: config.intra_threads,
            layout,
        }
    }
}

#[async_trait]
impl ModelLoader<dyn DocumentModel> for PdfConverterLoader {
    fn family(&self) -> &str {
        "document"
    }

    async fn load(&self, device: Device) -> Result<Arc<dyn DocumentModel>, ModelLoadError> {
        let det_path = require(self.model_dir.join(DETECTION_FILE))?;
        let rec_path = require(self.model_dir.join(RECOGNITION_FILE))?;
        let dict_path = require(self.model_dir.join(DICTIONARY_FILE))?;

        info!("Loading document model from {}", self.model_dir.display());

        let threads = self.intra_threads;
        let (detector, recognizer) = tokio::task::spawn_blocking(move || {
            let detector = TextDetector::load(&det_path, device, threads)
                .map_err(|e| load_error("document", device, &e))?;
            let recognizer = TextRecognizer::load(&rec_path, &dict_path, device, threads)
                .map_err(|e| load_error("document", device, &e))?;
            Ok::<_, ModelLoadError>((detector, recognizer))
        })
        .await
        .map_err(|e| ModelLoadError::Task(e.to_string()))??;

        Ok(Arc::new(PdfConverter::new(
            detector,
            recognizer,
            self.layout.clone(),
            self.render_width,
            self.max_pages,
        )))
    }
}

/// Loader for the auxiliary layout family
pub struct LayoutModelLoader {
    model_dir: PathBuf,
    strict: bool,
    intra_threads: usize,
}

impl LayoutModelLoader {
    pub fn new(model_dir: PathBuf, strict: bool, intra_threads: usize) -> Self {
        Self {
            model_dir,
            strict,
            intra_threads,
        }
    }
}

#[async_trait]
impl ModelLoader<dyn LayoutAnalyzer> for LayoutModelLoader {
    fn family(&self) -> &str {
        "layout"
    }

    async fn load(&self, device: Device) -> Result<Arc<dyn LayoutAnalyzer>, ModelLoadError> {
        let path = require(self.model_dir.join(LAYOUT_FILE))?;
        let (threads, strict) = (self.intra_threads, self.strict);

        let model = tokio::task::spawn_blocking(move || {
            LayoutModel::load(&path, device, threads, strict)
        })
        .await
        .map_err(|e| ModelLoadError::Task(e.to_string()))??;

        Ok(Arc::new(model))
    }
}
