// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Registry lifecycle through the public API

use std::sync::Arc;
use std::time::Duration;

use gpu_ocr_service::{
    build_registry,
    config::ServiceConfig,
    models::{DevicePreference, ModelLoadError},
};

use crate::common::{registry_with, Behaviour, FakeLoader};

#[tokio::test]
async fn test_load_twice_returns_same_handle() {
    let loader = Arc::new(FakeLoader::new(Behaviour::Succeed));
    let registry = registry_with(loader.clone());

    let first = registry.document().load().await.unwrap();
    let second = registry.document().load().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn test_get_on_empty_registry_loads_once() {
    let loader = Arc::new(FakeLoader::new(Behaviour::Succeed));
    let registry = registry_with(loader.clone());
    assert!(!registry.is_ready().await);

    registry.document().get().await.unwrap();
    registry.document().get().await.unwrap();

    assert_eq!(loader.loads(), 1);
    assert!(registry.is_ready().await);
}

#[tokio::test]
async fn test_concurrent_first_loads_construct_once() {
    let loader =
        Arc::new(FakeLoader::new(Behaviour::Succeed).with_delay(Duration::from_millis(30)));
    let registry = registry_with(loader.clone());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.document().load().await })
        })
        .collect();

    let mut models = Vec::new();
    for handle in handles {
        models.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(loader.loads(), 1);
    assert!(models.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test]
async fn test_failed_load_is_retried_later() {
    let loader = Arc::new(FakeLoader::failing());
    let registry = registry_with(loader.clone());

    let err = registry.load_all().await.err().unwrap();
    assert!(matches!(err, ModelLoadError::WeightsNotFound(_)));
    assert!(registry.document().load().await.is_err());

    // Nothing is cached on failure
    assert_eq!(loader.loads(), 2);
    assert!(!registry.is_ready().await);
}

#[tokio::test]
async fn test_unload_all_empties_registry() {
    let loader = Arc::new(FakeLoader::new(Behaviour::Succeed));
    let registry = registry_with(loader.clone());
    registry.load_all().await.unwrap();

    registry.unload_all().await;
    assert!(!registry.is_ready().await);

    // A later load constructs a fresh handle
    registry.document().load().await.unwrap();
    assert_eq!(loader.loads(), 2);
}

#[tokio::test]
async fn test_registry_from_config_with_missing_weights() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        model_dir: dir.path().to_path_buf(),
        device: DevicePreference::Cpu,
        ..Default::default()
    };
    let registry = build_registry(&config);

    match registry.load_all().await {
        Err(ModelLoadError::WeightsNotFound(path)) => {
            assert!(path.starts_with(dir.path()));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("load must fail without weights"),
    }
    assert!(registry.layout().is_none());
}
