// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health and discovery endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use tracing::error;

use super::server::AppState;
use crate::models::{cuda_available, cuda_device_count};
use crate::version::{
    dependency_versions, get_version_info, SERVICE_NAME, SERVICE_TITLE, VERSION_NUMBER,
};

/// (method, path, summary) for every route
const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/", "Service entry point"),
    ("GET", "/docs", "Endpoint catalogue"),
    ("GET", "/health", "Readiness of the OCR model"),
    (
        "GET",
        "/health/detailed",
        "Model state, library versions and CUDA availability",
    ),
    (
        "POST",
        "/ocr",
        "Convert an uploaded PDF (multipart/form-data) to markdown",
    ),
];

/// GET /health - always 200
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let status = if state.registry.is_ready().await {
        "ready"
    } else {
        "model_not_loaded"
    };
    Json(json!({
        "status": status,
        "service": SERVICE_NAME,
    }))
}

/// GET /health/detailed
///
/// Probes the PDF renderer and the CUDA runtime on the blocking pool. A
/// failed probe answers 500 with `status: "unhealthy"`.
pub async fn detailed_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let probe = state.renderer_probe;
    let checks = tokio::task::spawn_blocking(move || {
        probe()?;
        Ok::<_, String>((cuda_available(), cuda_device_count()))
    })
    .await
    .map_err(|e| format!("health check task failed: {}", e))
    .and_then(|result| result);

    let (cuda, device_count) = match checks {
        Ok(values) => values,
        Err(e) => {
            error!("❌ Detailed health check failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "error": e,
                })),
            );
        }
    };

    let mut dependencies = dependency_versions();
    dependencies.insert("cuda_available".to_string(), Value::from(cuda));
    dependencies.insert("cuda_device_count".to_string(), Value::from(device_count));

    let mut body = json!({
        "status": "healthy",
        "model_loaded": state.registry.document().is_loaded().await,
        "version": VERSION_NUMBER,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "dependencies": dependencies,
    });
    if let Some(layout) = state.registry.layout() {
        body["layout_loaded"] = Value::from(layout.is_loaded().await);
    }

    (StatusCode::OK, Json(body))
}

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": SERVICE_TITLE.to_string() + " API",
        "docs": "/docs",
        "health": "/health",
        "detailed_health": "/health/detailed",
    }))
}

/// GET /docs
pub async fn docs_handler() -> Json<Value> {
    let endpoints: Vec<Value> = ENDPOINTS
        .iter()
        .map(|(method, path, summary)| {
            json!({
                "method": method,
                "path": path,
                "summary": summary,
            })
        })
        .collect();

    Json(json!({
        "service": SERVICE_NAME,
        "version": VERSION_NUMBER,
        "build": get_version_info(),
        "endpoints": endpoints,
    }))
}
