// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction and execution
//!
//! Sessions are built on the CUDA execution provider when the resolved device
//! is a GPU, falling back to the CPU provider if CUDA initialisation fails.
//! ONNX Runtime reports allocator failures only as error text, so this module
//! is the single place where such failures are turned into the structured
//! out-of-memory variants used by the rest of the crate.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayD};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use ort::ErrorCode;
use tracing::{debug, info, warn};

use crate::models::{ComputeError, Device, ModelLoadError};

/// Error fragments ONNX Runtime and CUDA emit when an allocation fails
const ALLOCATION_FAILURE_MARKERS: &[&str] = &[
    "out of memory",
    "failed to allocate",
    "cudaerrormemoryallocation",
    "cudnn_status_alloc_failed",
    "cublas_status_alloc_failed",
    "bad_alloc",
];

/// Whether a backend error message describes an allocation failure
///
/// ONNX Runtime has no status code for allocator failures, so these are
/// recognised by their text.
pub fn is_allocation_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    ALLOCATION_FAILURE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Status codes ONNX Runtime raises for graphs it cannot use
fn is_incompatible_graph(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::InvalidProtobuf | ErrorCode::InvalidGraph | ErrorCode::NotImplemented
    )
}

/// Classify a failure raised while running a session
pub fn compute_error(context: &str, err: impl fmt::Display) -> ComputeError {
    let message = format!("{}: {}", context, err);
    if is_allocation_failure(&message) {
        ComputeError::OutOfMemory(message)
    } else {
        ComputeError::Failed(message)
    }
}

/// Classify a failure raised while building a session
///
/// The ONNX Runtime status code is taken from the error chain when one is
/// present.
pub fn load_error(family: &str, device: Device, err: &anyhow::Error) -> ModelLoadError {
    let code = err.downcast_ref::<ort::Error>().map(|e| e.code());
    classify_load_error(family, device, code, format!("{:#}", err))
}

fn classify_load_error(
    family: &str,
    device: Device,
    code: Option<ErrorCode>,
    message: String,
) -> ModelLoadError {
    if is_allocation_failure(&message) {
        ModelLoadError::OutOfMemory {
            family: family.to_string(),
            device,
        }
    } else if code.is_some_and(is_incompatible_graph) {
        ModelLoadError::IncompatibleArchitecture {
            family: family.to_string(),
            reason: message,
        }
    } else {
        ModelLoadError::Backend {
            family: family.to_string(),
            device,
            message,
        }
    }
}

fn cpu_session(path: &Path, threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(threads)
        .context("Failed to set intra threads")?
        .commit_from_file(path)
        .context(format!("Failed to load ONNX model from {}", path.display()))
}

fn cuda_session(path: &Path, device_id: i32, threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CUDAExecutionProvider::default()
            .with_device_id(device_id)
            .build()
            .error_on_failure()])
        .context("Failed to set CUDA execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(threads)
        .context("Failed to set intra threads")?
        .commit_from_file(path)
        .context(format!("Failed to load ONNX model from {}", path.display()))
}

/// A loaded ONNX session bound to one device
///
/// `Session::run` needs exclusive access, so concurrent callers serialise
/// on the inner mutex.
pub struct OnnxSession {
    name: String,
    device: Device,
    session: Mutex<Session>,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxSession")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl OnnxSession {
    /// Build a session for `path` on `device`
    ///
    /// A CUDA failure falls back to the CPU provider; the returned session
    /// reports the device it actually runs on.
    pub fn load(name: &str, path: &Path, device: Device, threads: usize) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} model not found: {}", name, path.display());
        }

        let (session, device) = match device {
            Device::Cuda(id) => {
                info!("🚀 Initializing {} session on {}", name, device);
                match cuda_session(path, id, threads) {
                    Ok(session) => {
                        info!("✅ CUDA execution provider initialized for {}", name);
                        (session, device)
                    }
                    Err(e) => {
                        warn!("⚠️  CUDA execution provider failed for {}: {:#}", name, e);
                        warn!("   Falling back to CPU execution provider");
                        (cpu_session(path, threads)?, Device::Cpu)
                    }
                }
            }
            Device::Cpu => {
                info!("Initializing {} session on CPU", name);
                (cpu_session(path, threads)?, Device::Cpu)
            }
        };

        let inputs: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if inputs.is_empty() || outputs.is_empty() {
            anyhow::bail!(
                "{} model declares no inputs or outputs (inputs: {:?}, outputs: {:?})",
                name,
                inputs,
                outputs
            );
        }

        debug!(
            "{} session ready - inputs: {:?}, outputs: {:?}",
            name, inputs, outputs
        );

        Ok(Self {
            name: name.to_string(),
            device,
            session: Mutex::new(session),
            inputs,
            outputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Declared input names, in graph order
    pub fn input_names(&self) -> &[String] {
        &self.inputs
    }

    /// Run a single-input graph and return its first output
    pub fn run_single(&self, input: Array4<f32>) -> Result<ArrayD<f32>, ComputeError> {
        let value = Value::from_array(input)
            .map_err(|e| compute_error(&format!("{} input tensor", self.name), e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ComputeError::Failed(format!("{} session lock poisoned", self.name)))?;

        let outputs = session
            .run(ort::inputs![self.inputs[0].as_str() => value])
            .map_err(|e| compute_error(&format!("{} inference failed", self.name), e))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| compute_error(&format!("{} output tensor", self.name), e))?
            .to_owned();

        Ok(output)
    }

    /// Run a graph with several named inputs and return its first output
    pub fn run_named(&self, inputs: Vec<(String, ArrayD<f32>)>) -> Result<ArrayD<f32>, ComputeError> {
        let mut values = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            let value = Value::from_array(array)
                .map_err(|e| compute_error(&format!("{} input '{}'", self.name, name), e))?;
            values.push((name, value));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| ComputeError::Failed(format!("{} session lock poisoned", self.name)))?;

        let outputs = session
            .run(values)
            .map_err(|e| compute_error(&format!("{} inference failed", self.name), e))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| compute_error(&format!("{} output tensor", self.name), e))?
            .to_owned();

        Ok(output)
    }
}
