// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text line detection
//!
//! The detection model outputs a probability map of shape `[1, 1, H, W]`
//! where each pixel is the probability of belonging to text. Connected
//! regions above the threshold become text boxes.

use std::path::Path;

use image::DynamicImage;
use ndarray::{ArrayViewD, IxDyn};
use tracing::debug;

use super::preprocessing::{preprocess_for_detection, PreprocessInfo, DET_INPUT_SIZE};
use super::session::OnnxSession;
use crate::models::{ComputeError, Device};

/// Default probability threshold for text pixels
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Minimum number of pixels in a region
const MIN_REGION_PIXELS: usize = 10;

/// The probability map marks shrunken text kernels; boxes are grown by this
/// fraction of their height on every side.
const UNCLIP_RATIO: f32 = 0.4;

/// A detected text box with location and confidence
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// X coordinate of top-left corner
    pub x: f32,
    /// Y coordinate of top-left corner
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
}

impl TextBox {
    /// Check if this text box is valid (reasonable dimensions)
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.confidence > 0.0
    }

    /// Calculate area of the bounding box
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Grow the box on every side, never past the origin
    fn unclip(&self, ratio: f32) -> Self {
        let pad = self.height * ratio;
        let x = (self.x - pad).max(0.0);
        let y = (self.y - pad).max(0.0);
        Self {
            x,
            y,
            width: self.x + self.width + pad - x,
            height: self.y + self.height + pad - y,
            confidence: self.confidence,
        }
    }

    /// Map a box from letterboxed model space into page space
    fn to_page(&self, info: &PreprocessInfo) -> Self {
        let (x0, y0) = info.map_to_original(self.x, self.y);
        let (x1, y1) = info.map_to_original(self.x + self.width, self.y + self.height);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            confidence: self.confidence,
        }
    }
}

/// Text detection model
#[derive(Debug)]
pub struct TextDetector {
    session: OnnxSession,
    threshold: f32,
}

impl TextDetector {
    /// Load the detection model (det_model.onnx)
    pub fn load(model_path: &Path, device: Device, threads: usize) -> anyhow::Result<Self> {
        let session = OnnxSession::load("text detection", model_path, device, threads)?;
        Ok(Self {
            session,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    /// Set the probability threshold for text pixels
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn device(&self) -> Device {
        self.session.device()
    }

    /// Detect text lines on a page, returned in page pixel coordinates
    pub fn detect(&self, page: &DynamicImage) -> Result<Vec<TextBox>, ComputeError> {
        let info = PreprocessInfo::new(page, DET_INPUT_SIZE);
        let input = preprocess_for_detection(page)?;
        let output = self.session.run_single(input)?;

        let boxes = extract_boxes(
            output.view(),
            DET_INPUT_SIZE as usize,
            DET_INPUT_SIZE as usize,
            self.threshold,
        )?;

        let boxes: Vec<TextBox> = boxes
            .iter()
            .map(|b| b.unclip(UNCLIP_RATIO).to_page(&info))
            .filter(TextBox::is_valid)
            .collect();

        debug!("Detected {} text regions", boxes.len());
        Ok(boxes)
    }
}

/// Turn a probability map into text boxes in input-image coordinates
///
/// Accepts `[1, 1, H, W]` or `[1, H, W]` maps. Boxes are sorted top to
/// bottom, then left to right.
pub fn extract_boxes(
    output: ArrayViewD<f32>,
    input_height: usize,
    input_width: usize,
    threshold: f32,
) -> Result<Vec<TextBox>, ComputeError> {
    let shape = output.shape();
    let (prob_height, prob_width) = match shape.len() {
        4 => (shape[2], shape[3]),
        3 => (shape[1], shape[2]),
        _ => {
            return Err(ComputeError::Failed(format!(
                "unexpected detection output shape: {:?}",
                shape
            )))
        }
    };
    let is_4d = shape.len() == 4;

    let prob = |x: usize, y: usize| -> f32 {
        if is_4d {
            output[IxDyn(&[0, 0, y, x])]
        } else {
            output[IxDyn(&[0, y, x])]
        }
    };

    let scale_y = input_height as f32 / prob_height as f32;
    let scale_x = input_width as f32 / prob_width as f32;

    let mut visited = vec![false; prob_height * prob_width];
    let mut text_boxes = Vec::new();

    for y in 0..prob_height {
        for x in 0..prob_width {
            if visited[y * prob_width + x] || prob(x, y) < threshold {
                continue;
            }

            // Flood fill the 4-connected region
            let mut stack = vec![(x, y)];
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
            let mut count = 0usize;
            let mut sum_conf = 0.0f32;

            while let Some((cx, cy)) = stack.pop() {
                let index = cy * prob_width + cx;
                if visited[index] {
                    continue;
                }
                let p = prob(cx, cy);
                if p < threshold {
                    continue;
                }

                visited[index] = true;
                count += 1;
                sum_conf += p;
                min_x = min_x.min(cx);
                max_x = max_x.max(cx);
                min_y = min_y.min(cy);
                max_y = max_y.max(cy);

                if cx > 0 {
                    stack.push((cx - 1, cy));
                }
                if cx + 1 < prob_width {
                    stack.push((cx + 1, cy));
                }
                if cy > 0 {
                    stack.push((cx, cy - 1));
                }
                if cy + 1 < prob_height {
                    stack.push((cx, cy + 1));
                }
            }

            if count > MIN_REGION_PIXELS {
                text_boxes.push(TextBox {
                    x: min_x as f32 * scale_x,
                    y: min_y as f32 * scale_y,
                    width: (max_x - min_x + 1) as f32 * scale_x,
                    height: (max_y - min_y + 1) as f32 * scale_y,
                    confidence: sum_conf / count as f32,
                });
            }
        }
    }

    text_boxes.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    Ok(text_boxes)
}
