// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text line recognition with CTC greedy decoding

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use image::DynamicImage;
use ndarray::{ArrayViewD, IxDyn};
use tracing::info;

use super::preprocessing::preprocess_for_recognition;
use super::session::OnnxSession;
use crate::models::{ComputeError, Device};

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Mean per-character confidence (0.0-1.0)
    pub confidence: f32,
}

impl RecognizedText {
    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Text recognition model plus its character dictionary
#[derive(Debug)]
pub struct TextRecognizer {
    session: OnnxSession,
    dictionary: Vec<char>,
}

impl TextRecognizer {
    /// Load the recognition model (rec_model.onnx) and dictionary (ppocr_keys_v1.txt)
    pub fn load(
        model_path: &Path,
        dict_path: &Path,
        device: Device,
        threads: usize,
    ) -> anyhow::Result<Self> {
        let dictionary = load_dictionary(dict_path)?;
        info!(
            "Loaded character dictionary with {} characters",
            dictionary.len()
        );

        let session = OnnxSession::load("text recognition", model_path, device, threads)?;
        Ok(Self {
            session,
            dictionary,
        })
    }

    pub fn device(&self) -> Device {
        self.session.device()
    }

    /// Recognize the text on a cropped line image
    pub fn recognize(&self, crop: &DynamicImage) -> Result<RecognizedText, ComputeError> {
        let input = preprocess_for_recognition(crop)?;
        let output = self.session.run_single(input)?;
        ctc_greedy_decode(output.view(), &self.dictionary)
    }
}

/// Load a character dictionary, one character per line
///
/// Index 0 is the CTC blank token and a trailing space is appended, matching
/// the class layout of PP-OCR recognition heads.
pub fn load_dictionary(path: &Path) -> anyhow::Result<Vec<char>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dictionary: {}", path.display()))?;

    let mut dictionary = vec!['\0'];
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }
    dictionary.push(' ');

    Ok(dictionary)
}

/// Greedy (best path) CTC decoding with blank removal and repeat collapsing
///
/// Accepts `[1, T, C]` or `[T, C]` probability tensors.
pub fn ctc_greedy_decode(
    output: ArrayViewD<f32>,
    dictionary: &[char],
) -> Result<RecognizedText, ComputeError> {
    let shape = output.shape();
    let (seq_len, num_classes, batched) = match shape.len() {
        3 => (shape[1], shape[2], true),
        2 => (shape[0], shape[1], false),
        _ => {
            return Err(ComputeError::Failed(format!(
                "unexpected recognition output shape: {:?}",
                shape
            )))
        }
    };

    let mut text = String::new();
    let mut total_confidence = 0.0f32;
    let mut chars = 0usize;
    let mut prev_index = 0usize;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = 0usize;

        for c in 0..num_classes {
            let prob = if batched {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };
            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        if max_index != 0 && max_index != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                total_confidence += max_prob;
                chars += 1;
            }
        }
        prev_index = max_index;
    }

    let confidence = if chars == 0 {
        0.0
    } else {
        (total_confidence / chars as f32).clamp(0.0, 1.0)
    };

    Ok(RecognizedText {
        text: text.trim().to_string(),
        confidence,
    })
}
