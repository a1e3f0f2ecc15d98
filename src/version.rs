// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the GPU OCR Service

use std::ffi::CStr;

use serde_json::{Map, Value};

/// Service name reported by the health endpoints
pub const SERVICE_NAME: &str = "gpu-ocr-service";

/// Human readable service title
pub const SERVICE_TITLE: &str = "GPU OCR Service";

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-pdf-markdown-2025-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Build date
pub const BUILD_DATE: &str = "2025-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "pdf-to-markdown",
    "cuda-with-cpu-fallback",
    "layout-model",
    "degraded-startup",
    "lazy-model-reload",
];

/// Version of the `ort` bindings, pinned exactly in Cargo.toml
pub const ORT_CRATE_VERSION: &str = "2.0.0-rc.10";

/// Version of the ONNX Runtime library linked into this process
///
/// Asked from the runtime itself, so it reflects the binaries actually in
/// use rather than what the bindings were built against.
pub fn onnxruntime_version() -> Option<String> {
    // SAFETY: OrtGetApiBase takes no arguments and returns a pointer to a
    // static table owned by the runtime, or null.
    let base = unsafe { ort::sys::OrtGetApiBase() };
    if base.is_null() {
        return None;
    }

    // SAFETY: `base` is non-null and points at the runtime's static table;
    // GetVersionString returns a static NUL-terminated string or null.
    let raw = unsafe { ((*base).GetVersionString)() };
    if raw.is_null() {
        return None;
    }

    // SAFETY: checked non-null above; the string lives as long as the runtime.
    unsafe { CStr::from_ptr(raw) }
        .to_str()
        .ok()
        .map(str::to_string)
}

/// Library versions reported by `GET /health/detailed`
pub fn dependency_versions() -> Map<String, Value> {
    let mut versions = Map::new();
    versions.insert(
        "onnxruntime".to_string(),
        onnxruntime_version().map_or(Value::Null, Value::from),
    );
    versions.insert("ort".to_string(), Value::from(ORT_CRATE_VERSION));
    versions
}

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} {} ({})", SERVICE_TITLE, VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
