// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page layout detection (PP-DocLayout family)
//!
//! Exported layout graphs differ in which auxiliary inputs they declare and
//! how wide their detection rows are. By default the signature is matched
//! loosely: input names are recognised by common aliases, extra output
//! columns are ignored and unknown class ids get a generic label. Strict
//! mode rejects anything but the canonical signature.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use ndarray::ArrayViewD;
use tracing::{debug, info, warn};

use super::preprocessing::preprocess_for_layout;
use super::session::{load_error, OnnxSession};
use crate::models::{ComputeError, Device, LayoutAnalyzer, LayoutRegion, ModelLoadError};

/// Class labels of the PP-DocLayout-L head, by class id
pub const LAYOUT_LABELS: &[&str] = &[
    "paragraph_title",
    "image",
    "text",
    "number",
    "abstract",
    "content",
    "figure_title",
    "formula",
    "table",
    "table_title",
    "reference",
    "doc_title",
    "footnote",
    "header",
    "algorithm",
    "footer",
    "seal",
    "chart_title",
    "chart",
    "formula_number",
    "header_image",
    "footer_image",
    "aside_text",
];

/// Default minimum score for a layout region
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

const IMAGE_ALIASES: &[&str] = &["image", "images", "x", "pixel_values", "input"];
const SHAPE_ALIASES: &[&str] = &["im_shape", "image_shape"];
const SCALE_ALIASES: &[&str] = &["scale_factor", "scale"];

/// How the graph's declared inputs are fed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSignature {
    pub image: String,
    pub im_shape: Option<String>,
    pub scale_factor: Option<String>,
}

impl LayoutSignature {
    /// Whether the graph rescales boxes to the original page itself
    pub fn rescales_boxes(&self) -> bool {
        self.scale_factor.is_some()
    }
}

/// Match declared input names against the expected layout signature
pub fn match_signature(inputs: &[String], strict: bool) -> Result<LayoutSignature, String> {
    let find = |aliases: &[&str]| -> Option<String> {
        let aliases = if strict { &aliases[..1] } else { aliases };
        inputs
            .iter()
            .find(|name| aliases.iter().any(|a| name.eq_ignore_ascii_case(a)))
            .cloned()
    };

    let im_shape = find(SHAPE_ALIASES);
    let scale_factor = find(SCALE_ALIASES);
    let image = match find(IMAGE_ALIASES) {
        Some(name) => name,
        None if strict => {
            return Err(format!("layout graph has no 'image' input (inputs: {:?})", inputs))
        }
        // Any input that is not an auxiliary one carries the image
        None => inputs
            .iter()
            .find(|name| Some(*name) != im_shape.as_ref() && Some(*name) != scale_factor.as_ref())
            .cloned()
            .ok_or_else(|| format!("layout graph has no image input (inputs: {:?})", inputs))?,
    };

    let known = [Some(&image), im_shape.as_ref(), scale_factor.as_ref()];
    let unknown: Vec<&String> = inputs
        .iter()
        .filter(|name| !known.contains(&Some(*name)))
        .collect();
    if !unknown.is_empty() {
        return Err(format!("layout graph declares unsupported inputs: {:?}", unknown));
    }

    Ok(LayoutSignature {
        image,
        im_shape,
        scale_factor,
    })
}

/// Label for a class id
fn label_for(class_id: usize, strict: bool) -> Result<String, ComputeError> {
    match LAYOUT_LABELS.get(class_id) {
        Some(label) => Ok((*label).to_string()),
        None if strict => Err(ComputeError::Failed(format!(
            "layout class id {} outside the known label set",
            class_id
        ))),
        None => Ok(format!("class_{}", class_id)),
    }
}

/// Parse detection rows `[class_id, score, x1, y1, x2, y2, ...]`
///
/// `scale` divides box coordinates into page space (1.0 when the graph
/// already rescaled them). Boxes are clamped to the page.
pub fn parse_detections(
    output: ArrayViewD<f32>,
    strict: bool,
    threshold: f32,
    scale: (f32, f32),
    page: (u32, u32),
) -> Result<Vec<LayoutRegion>, ComputeError> {
    let shape = output.shape();
    let width = shape.last().copied().unwrap_or(0);
    if width < 6 || (strict && width != 6) {
        return Err(ComputeError::Failed(format!(
            "unexpected layout output shape: {:?}",
            shape
        )));
    }

    let values: Vec<f32> = output.iter().copied().collect();
    let (scale_x, scale_y) = scale;
    let (page_w, page_h) = (page.0 as f32, page.1 as f32);

    let mut regions = Vec::new();
    for row in values.chunks_exact(width) {
        let score = row[1];
        if row[0] < 0.0 || score < threshold {
            continue;
        }

        let x1 = (row[2] / scale_x).clamp(0.0, page_w);
        let y1 = (row[3] / scale_y).clamp(0.0, page_h);
        let x2 = (row[4] / scale_x).clamp(0.0, page_w);
        let y2 = (row[5] / scale_y).clamp(0.0, page_h);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        regions.push(LayoutRegion {
            label: label_for(row[0] as usize, strict)?,
            score,
            bbox: [x1, y1, x2, y2],
        });
    }

    Ok(regions)
}

/// PP-DocLayout layout model
#[derive(Debug)]
pub struct LayoutModel {
    session: OnnxSession,
    signature: LayoutSignature,
    strict: bool,
    threshold: f32,
}

impl LayoutModel {
    /// Load the layout model (layout.onnx)
    pub fn load(
        model_path: &Path,
        device: Device,
        threads: usize,
        strict: bool,
    ) -> Result<Self, ModelLoadError> {
        let session = OnnxSession::load("layout", model_path, device, threads)
            .map_err(|e| load_error("layout", device, &e))?;
        let signature = match_signature(session.input_names(), strict).map_err(|reason| {
            ModelLoadError::IncompatibleArchitecture {
                family: "layout".to_string(),
                reason,
            }
        })?;

        if !strict && signature.image != "image" {
            warn!(
                "⚠️  Layout graph uses non-standard image input '{}'",
                signature.image
            );
        }
        info!(
            "✅ Layout model ready (inputs: image={}, im_shape={:?}, scale_factor={:?})",
            signature.image, signature.im_shape, signature.scale_factor
        );

        Ok(Self {
            session,
            signature,
            strict,
            threshold: DEFAULT_SCORE_THRESHOLD,
        })
    }
}

impl LayoutAnalyzer for LayoutModel {
    fn name(&self) -> &'static str {
        "pp-doclayout"
    }

    fn analyze(&self, page: &DynamicImage) -> Result<Vec<LayoutRegion>, ComputeError> {
        let inputs = preprocess_for_layout(page)?;
        let scale = if self.signature.rescales_boxes() {
            (1.0, 1.0)
        } else {
            (inputs.scale_factor[[0, 1]], inputs.scale_factor[[0, 0]])
        };

        let mut feeds = vec![(self.signature.image.clone(), inputs.image.into_dyn())];
        if let Some(name) = &self.signature.im_shape {
            feeds.push((name.clone(), inputs.im_shape.into_dyn()));
        }
        if let Some(name) = &self.signature.scale_factor {
            feeds.push((name.clone(), inputs.scale_factor.into_dyn()));
        }

        let output = self.session.run_named(feeds)?;
        let regions = parse_detections(
            output.view(),
            self.strict,
            self.threshold,
            scale,
            page.dimensions(),
        )?;

        debug!("Layout found {} regions", regions.len());
        Ok(regions)
    }
}
