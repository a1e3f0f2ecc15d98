// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health and discovery endpoint tests

use std::sync::Arc;

use axum::http::StatusCode;
use gpu_ocr_service::api::create_router;
use gpu_ocr_service::version;
use tower::util::ServiceExt;

use crate::common::{get_request, json_body, registry_with, state_with, Behaviour, FakeLoader};

fn renderer_missing() -> Result<(), String> {
    Err("PDFium library unavailable: not found".to_string())
}

#[tokio::test]
async fn test_health_reports_model_not_loaded() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    let app = create_router(state_with(registry));

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "model_not_loaded");
    assert_eq!(body["service"], "gpu-ocr-service");
}

#[tokio::test]
async fn test_health_reports_ready_after_load() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    registry.load_all().await.unwrap();
    let app = create_router(state_with(registry));

    let body = json_body(app.oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_health_is_200_after_failed_load() {
    let loader = Arc::new(FakeLoader::failing());
    let registry = registry_with(loader.clone());
    assert!(registry.load_all().await.is_err());
    let app = create_router(state_with(registry));

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "model_not_loaded");
    // Health checks never trigger a load
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn test_detailed_health() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    registry.load_all().await.unwrap();
    let app = create_router(state_with(registry));

    let response = app.oneshot(get_request("/health/detailed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert!(body.get("layout_loaded").is_none());
    assert!(body["timestamp"].is_string());

    let dependencies = &body["dependencies"];
    assert_eq!(dependencies["ort"], version::ORT_CRATE_VERSION);
    assert_eq!(
        dependencies["onnxruntime"].as_str(),
        version::onnxruntime_version().as_deref()
    );
    assert!(dependencies["onnxruntime"]
        .as_str()
        .unwrap()
        .starts_with("1."));
    assert!(dependencies["cuda_available"].is_boolean());
    assert!(dependencies["cuda_device_count"].is_u64());
}

#[tokio::test]
async fn test_detailed_health_unhealthy_when_renderer_missing() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    let state = state_with(registry).with_renderer_probe(renderer_missing);
    let app = create_router(state);

    let response = app.oneshot(get_request("/health/detailed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert!(body["error"].as_str().unwrap().contains("PDFium"));
}

#[tokio::test]
async fn test_root_lists_entry_points() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    let app = create_router(state_with(registry));

    let body = json_body(app.oneshot(get_request("/")).await.unwrap()).await;
    assert_eq!(body["docs"], "/docs");
    assert_eq!(body["health"], "/health");
    assert_eq!(body["detailed_health"], "/health/detailed");
    assert!(body["message"].as_str().unwrap().contains("OCR"));
}

#[tokio::test]
async fn test_docs_catalogue() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    let app = create_router(state_with(registry));

    let response = app.oneshot(get_request("/docs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["service"], "gpu-ocr-service");
    assert_eq!(body["build"]["version"], version::VERSION_NUMBER);
    let paths: Vec<&str> = body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    for path in ["/", "/docs", "/health", "/health/detailed", "/ocr"] {
        assert!(paths.contains(&path), "missing {}", path);
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let registry = registry_with(Arc::new(FakeLoader::new(Behaviour::Succeed)));
    let app = create_router(state_with(registry));

    let response = app.oneshot(get_request("/v1/ocr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
