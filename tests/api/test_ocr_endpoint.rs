// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /ocr tests
//!
//! Upload validation, readiness gating, success payload and failure mapping.

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, http::StatusCode};
use gpu_ocr_service::{api::create_router, config::ServiceConfig, models::ComputeError};
use tower::util::ServiceExt;

use crate::common::*;

async fn loaded(behaviour: Behaviour) -> (Arc<FakeLoader>, axum::Router) {
    let loader = Arc::new(FakeLoader::new(behaviour));
    let registry = registry_with(loader.clone());
    registry.load_all().await.unwrap();
    (loader, create_router(state_with(registry)))
}

#[tokio::test]
async fn test_pdf_upload_returns_markdown() {
    let (loader, app) = loaded(Behaviour::Succeed).await;

    let response = app
        .oneshot(upload_request(multipart_body("file", "paper.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["filename"], "paper.pdf");
    assert_eq!(body["markdown"], FAKE_MARKDOWN);
    assert_eq!(body["pageCount"], 2);
    assert_eq!(body["model"], FAKE_MODEL_NAME);
    assert_eq!(body["device"], "cpu");
    assert!(body["processingTimeMs"].is_u64());
    assert_eq!(loader.model.calls(), 1);
}

#[tokio::test]
async fn test_any_field_name_is_accepted() {
    let (_, app) = loaded(Behaviour::Succeed).await;

    let response = app
        .oneshot(upload_request(multipart_body("document", "scan.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_non_pdf_is_rejected_without_model_call() {
    let (loader, app) = loaded(Behaviour::Succeed).await;

    let response = app
        .oneshot(upload_request(multipart_body("file", "notes.txt", b"plain text")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"detail": "Only PDF files are supported"})
    );
    assert_eq!(loader.model.calls(), 0);
}

#[tokio::test]
async fn test_non_pdf_is_rejected_before_readiness_check() {
    let loader = Arc::new(FakeLoader::new(Behaviour::Succeed));
    let app = create_router(state_with(registry_with(loader.clone())));

    let response = app
        .oneshot(upload_request(multipart_body("file", "image.png", b"\x89PNG")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn test_missing_file_part_is_rejected() {
    let (loader, app) = loaded(Behaviour::Succeed).await;

    let response = app
        .oneshot(upload_request(multipart_without_file()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "No file uploaded");
    assert_eq!(loader.model.calls(), 0);
}

#[tokio::test]
async fn test_empty_file_is_rejected() {
    let (loader, app) = loaded(Behaviour::Succeed).await;

    let response = app
        .oneshot(upload_request(multipart_body("file", "empty.pdf", b"")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"detail": "Uploaded file is empty"})
    );
    assert_eq!(loader.model.calls(), 0);
}

#[tokio::test]
async fn test_non_multipart_request_is_rejected() {
    let (_, app) = loaded(Behaviour::Succeed).await;

    let request = Request::builder()
        .method("POST")
        .uri("/ocr")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"file": "paper.pdf"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unloaded_model_is_503() {
    let loader = Arc::new(FakeLoader::failing());
    let app = create_router(state_with(registry_with(loader.clone())));

    let response = app
        .oneshot(upload_request(multipart_body("file", "paper.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await["detail"],
        "Model not loaded. Service is still initializing."
    );
}

#[tokio::test]
async fn test_503_starts_background_reload() {
    let loader = Arc::new(FakeLoader::new(Behaviour::Succeed));
    let registry = registry_with(loader.clone());
    let app = create_router(state_with(registry.clone()));

    let response = app
        .clone()
        .oneshot(upload_request(multipart_body("file", "paper.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // The reload runs in the background; the request itself never waits for it
    for _ in 0..50 {
        if registry.is_ready().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(registry.is_ready().await);
    assert_eq!(loader.loads(), 1);

    let response = app
        .oneshot(upload_request(multipart_body("file", "paper.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_out_of_memory_is_500_with_hint() {
    let (_, app) = loaded(Behaviour::Fail(ComputeError::OutOfMemory(
        "CUDA failure 2: out of memory".to_string(),
    )))
    .await;

    let response = app
        .oneshot(upload_request(multipart_body("file", "huge.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let detail = json_body(response).await["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.starts_with("OCR processing failed: GPU Out of Memory!"));
    assert!(detail.contains("too large or complex"));
}

#[tokio::test]
async fn test_conversion_failure_is_500() {
    let (_, app) = loaded(Behaviour::Fail(ComputeError::Failed(
        "corrupt xref table".to_string(),
    )))
    .await;

    let response = app
        .oneshot(upload_request(multipart_body("file", "broken.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"detail": "OCR processing failed: corrupt xref table"})
    );
}

#[tokio::test]
async fn test_upload_is_removed_after_request() {
    let (loader, app) = loaded(Behaviour::Succeed).await;

    let response = app
        .oneshot(upload_request(multipart_body("file", "paper.pdf", SAMPLE_PDF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let path = loader.model.last_path().unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let loader = Arc::new(FakeLoader::new(Behaviour::Succeed));
    let registry = registry_with(loader.clone());
    registry.load_all().await.unwrap();
    let config = ServiceConfig {
        max_upload_bytes: 1024,
        ..Default::default()
    };
    let app = create_router(state_with_config(registry, config));

    let content = vec![b'x'; 8 * 1024];
    let response = app
        .oneshot(upload_request(multipart_body("file", "big.pdf", &content)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(loader.model.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_uploads_share_one_model() {
    let (loader, app) = loaded(Behaviour::Succeed).await;

    let requests = (0..4).map(|i| {
        let app = app.clone();
        async move {
            app.oneshot(upload_request(multipart_body(
                "file",
                &format!("doc{}.pdf", i),
                SAMPLE_PDF,
            )))
            .await
            .unwrap()
            .status()
        }
    });
    let statuses = futures::future::join_all(requests).await;

    assert!(statuses.iter().all(|s| *s == StatusCode::OK));
    assert_eq!(loader.loads(), 1);
    assert_eq!(loader.model.calls(), 4);
}
