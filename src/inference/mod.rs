// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference runner: validates input and drives a document model
pub mod runner;

pub use runner::{run_inference, InferenceError, InferenceOutput, PLACEHOLDER_MARKDOWN};
