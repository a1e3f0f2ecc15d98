// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for model loading and model computation

use std::path::PathBuf;

use thiserror::Error;

use super::device::Device;

/// Errors raised while constructing a model handle
///
/// A failed load leaves the registry slot empty, so every variant is
/// recoverable by a later `load()` call.
#[derive(Error, Debug, Clone)]
pub enum ModelLoadError {
    /// A required weight or vocabulary file is missing
    #[error("Model weights not found: {}", .0.display())]
    WeightsNotFound(PathBuf),

    /// The weight file loaded but its graph does not match what the family expects
    #[error("Incompatible {family} model architecture: {reason}")]
    IncompatibleArchitecture { family: String, reason: String },

    /// The device ran out of memory while the weights were uploaded
    #[error("Out of memory while loading {family} model on {device}")]
    OutOfMemory { family: String, device: Device },

    /// Any other failure reported by the inference backend
    #[error("Failed to load {family} model on {device}: {message}")]
    Backend {
        family: String,
        device: Device,
        message: String,
    },

    /// The blocking load task panicked or was cancelled
    #[error("Model loading task failed: {0}")]
    Task(String),
}

/// Errors raised by a model handle while converting a document
///
/// This is the structured boundary between the compute backend and the
/// inference runner: device memory exhaustion is its own variant and never
/// has to be recovered from an error message downstream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    /// Device (or host staging) memory could not be allocated
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// The input could not be decoded as a document
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Any other failure inside the model
    #[error("{0}")]
    Failed(String),
}

impl ComputeError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, ComputeError::OutOfMemory(_))
    }
}

impl From<std::collections::TryReserveError> for ComputeError {
    fn from(e: std::collections::TryReserveError) -> Self {
        ComputeError::OutOfMemory(format!("tensor allocation failed: {}", e))
    }
}
