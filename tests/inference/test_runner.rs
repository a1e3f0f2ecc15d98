// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference runner behaviour with fake models

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use gpu_ocr_service::{
    inference::{run_inference, InferenceError, PLACEHOLDER_MARKDOWN},
    models::{ComputeError, DocumentModel},
};

use crate::common::{Behaviour, FakeModel, FAKE_MARKDOWN, SAMPLE_PDF};

fn sample_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(SAMPLE_PDF).unwrap();
    file
}

#[tokio::test]
async fn test_missing_path_is_file_not_found_with_model() {
    let model = Arc::new(FakeModel::new(Behaviour::Succeed));
    let handle: Arc<dyn DocumentModel> = model.clone();

    let err = run_inference(Some(handle), Path::new("/tmp/does-not-exist-ocr.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::FileNotFound(_)));
    assert!(err.to_string().contains("/tmp/does-not-exist-ocr.pdf"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_missing_path_is_file_not_found_without_model() {
    let err = run_inference(None, Path::new("/tmp/does-not-exist-ocr.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::FileNotFound(_)));
}

#[tokio::test]
async fn test_directory_path_is_file_not_found() {
    let model = Arc::new(FakeModel::new(Behaviour::Succeed));
    let handle: Arc<dyn DocumentModel> = model.clone();
    let dir = tempfile::tempdir().unwrap();

    let err = run_inference(Some(handle), dir.path()).await.unwrap_err();
    assert!(matches!(err, InferenceError::FileNotFound(_)));
    assert_eq!(model.calls(), 0);

    // No placeholder for a directory either
    let err = run_inference(None, dir.path()).await.unwrap_err();
    assert!(matches!(err, InferenceError::FileNotFound(_)));
}

#[tokio::test]
async fn test_placeholder_is_verbatim() {
    let file = sample_file();
    let output = run_inference(None, file.path()).await.unwrap();
    assert_eq!(
        output.markdown,
        "# Dummy Markdown\n\nThis is a placeholder response because the model is missing."
    );
    assert_eq!(output.markdown, PLACEHOLDER_MARKDOWN);
}

#[tokio::test]
async fn test_model_text_is_returned() {
    let file = sample_file();
    let model: Arc<dyn DocumentModel> = Arc::new(FakeModel::new(Behaviour::Succeed));

    let output = run_inference(Some(model), file.path()).await.unwrap();
    assert_eq!(output.markdown, FAKE_MARKDOWN);
    assert_eq!(output.page_count, 2);
}

#[tokio::test]
async fn test_out_of_memory_has_distinct_message() {
    let file = sample_file();
    let oom: Arc<dyn DocumentModel> = Arc::new(FakeModel::new(Behaviour::Fail(
        ComputeError::OutOfMemory("cudaErrorMemoryAllocation".to_string()),
    )));
    let other: Arc<dyn DocumentModel> = Arc::new(FakeModel::new(Behaviour::Fail(
        ComputeError::Failed("cudaErrorMemoryAllocation".to_string()),
    )));

    let oom_err = run_inference(Some(oom), file.path()).await.unwrap_err();
    let other_err = run_inference(Some(other), file.path()).await.unwrap_err();

    assert!(matches!(oom_err, InferenceError::ResourceExhausted { .. }));
    assert!(oom_err.to_string().starts_with("GPU Out of Memory!"));
    // Classification follows the variant, not the message text
    assert!(matches!(other_err, InferenceError::Inference(_)));
    assert_ne!(oom_err.to_string(), other_err.to_string());
}
