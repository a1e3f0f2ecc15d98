// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Compute device detection
//!
//! CUDA availability is answered by ONNX Runtime itself (the CUDA execution
//! provider reports whether its shared libraries can be loaded). The device
//! count is read from the driver's device nodes, narrowed by
//! `CUDA_VISIBLE_DEVICES` when it is set.

use std::fmt;
use std::str::FromStr;

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use tracing::{debug, info};

/// A compute backend a model handle is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// NVIDIA GPU with the given ordinal
    Cuda(i32),
    /// Host CPU
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda(id) => write!(f, "cuda:{}", id),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

/// Operator preference for device placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Prefer the GPU, fall back to the CPU
    #[default]
    Auto,
    /// Always use the CPU
    Cpu,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "gpu" | "cuda" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!("unknown device preference '{}', expected auto or cpu", other)),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Auto => write!(f, "auto"),
            DevicePreference::Cpu => write!(f, "cpu"),
        }
    }
}

/// Whether the CUDA execution provider can be used in this process
pub fn cuda_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            debug!("CUDA availability probe failed: {}", e);
            false
        }
    }
}

/// Number of CUDA devices visible to this process
pub fn cuda_device_count() -> usize {
    if !cuda_available() {
        return 0;
    }

    if let Ok(visible) = std::env::var("CUDA_VISIBLE_DEVICES") {
        return count_visible_devices(&visible);
    }

    std::fs::read_dir("/dev")
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| is_gpu_device_node(&entry.file_name().to_string_lossy()))
                .count()
        })
        .unwrap_or(0)
}

/// Resolve a preference into a concrete device
pub fn detect_device(preference: DevicePreference) -> Device {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Auto => {
            if cuda_available() {
                Device::Cuda(0)
            } else {
                Device::Cpu
            }
        }
    };

    info!("🚀 Device detected: {} (preference: {})", device, preference);
    device
}

/// Parse a `CUDA_VISIBLE_DEVICES` value into a device count
fn count_visible_devices(value: &str) -> usize {
    let value = value.trim();
    if value.is_empty() || value == "-1" || value.eq_ignore_ascii_case("none") {
        return 0;
    }

    value
        .split(',')
        .map(str::trim)
        .take_while(|id| !id.is_empty() && *id != "-1")
        .count()
}

/// `/dev/nvidia0`, `/dev/nvidia1`, ... but not `/dev/nvidiactl` or `/dev/nvidia-uvm`
fn is_gpu_device_node(name: &str) -> bool {
    name.strip_prefix("nvidia")
        .map(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
