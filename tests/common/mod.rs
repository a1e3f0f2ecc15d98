// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: a fake document model, its loader and multipart bodies

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
};
use gpu_ocr_service::{
    api::AppState,
    config::ServiceConfig,
    models::{
        ComputeError, Conversion, ConversionMetadata, Device, DevicePreference, DocumentModel,
        ModelLoadError, ModelLoader, ModelRegistry, ModelSlot,
    },
};

pub const FAKE_MODEL_NAME: &str = "fake-ocr";
pub const FAKE_MARKDOWN: &str = "# Fake Document\n\nRecognised body text.";
pub const BOUNDARY: &str = "----ocr-test-boundary";

/// How the fake model answers a conversion
#[derive(Clone)]
pub enum Behaviour {
    Succeed,
    Fail(ComputeError),
}

/// Document model that never touches a real backend
pub struct FakeModel {
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_path: Mutex<Option<PathBuf>>,
}

impl FakeModel {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            last_path: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Path of the most recently converted file
    pub fn last_path(&self) -> Option<PathBuf> {
        self.last_path.lock().unwrap().clone()
    }
}

impl DocumentModel for FakeModel {
    fn name(&self) -> &'static str {
        FAKE_MODEL_NAME
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn convert_single_pdf(&self, path: &Path) -> Result<Conversion, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "upload must be on disk during conversion");
        *self.last_path.lock().unwrap() = Some(path.to_path_buf());

        match &self.behaviour {
            Behaviour::Succeed => Ok(Conversion {
                text: FAKE_MARKDOWN.to_string(),
                images: Vec::new(),
                metadata: ConversionMetadata {
                    page_count: 2,
                    pages_converted: 2,
                    ..Default::default()
                },
            }),
            Behaviour::Fail(e) => Err(e.clone()),
        }
    }
}

/// Loader handing out one shared `FakeModel`, or failing
pub struct FakeLoader {
    pub model: Arc<FakeModel>,
    pub fail: bool,
    pub delay: Duration,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            model: Arc::new(FakeModel::new(behaviour)),
            fail: false,
            delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Behaviour::Succeed)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader<dyn DocumentModel> for FakeLoader {
    fn family(&self) -> &str {
        "document"
    }

    async fn load(&self, _device: Device) -> Result<Arc<dyn DocumentModel>, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ModelLoadError::WeightsNotFound("/missing/det_model.onnx".into()));
        }
        Ok(self.model.clone())
    }
}

pub fn registry_with(loader: Arc<FakeLoader>) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::new(Arc::new(ModelSlot::<dyn DocumentModel>::new(
        loader,
        DevicePreference::Cpu,
    ))))
}

fn renderer_ok() -> Result<(), String> {
    Ok(())
}

pub fn state_with(registry: Arc<ModelRegistry>) -> AppState {
    state_with_config(registry, ServiceConfig::default())
}

pub fn state_with_config(registry: Arc<ModelRegistry>, config: ServiceConfig) -> AppState {
    AppState::new(registry, Arc::new(config)).with_renderer_probe(renderer_ok)
}

/// A multipart body with a single file part
pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A multipart body with a plain form value and no file part
pub fn multipart_without_file() -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    )
    .into_bytes()
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ocr")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";
