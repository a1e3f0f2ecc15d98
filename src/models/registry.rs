// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model registry: one lazily initialised slot per model family
//!
//! Each slot is `Empty` or `Loaded(handle)`. The `Empty -> Loaded`
//! transition runs under a per-slot initialisation lock with a second check
//! once the lock is held, so concurrent `load()` calls construct the model at
//! most once and all observe the same handle. A failed load leaves the slot
//! empty and the next access retries.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use super::device::{detect_device, Device, DevicePreference};
use super::error::ModelLoadError;
use super::handle::{DocumentModel, LayoutAnalyzer};

/// Constructs a model handle for one family on a given device
#[async_trait]
pub trait ModelLoader<M: ?Sized + Send + Sync>: Send + Sync {
    /// Family name used in logs and errors (e.g. "document", "layout")
    fn family(&self) -> &str;

    /// Build the handle; heavy work belongs on the blocking pool
    async fn load(&self, device: Device) -> Result<Arc<M>, ModelLoadError>;
}

/// A single-model slot
pub struct ModelSlot<M: ?Sized + Send + Sync + 'static> {
    family: String,
    preference: DevicePreference,
    loader: Arc<dyn ModelLoader<M>>,
    handle: RwLock<Option<Arc<M>>>,
    init_lock: Mutex<()>,
    loads: AtomicUsize,
    reload_pending: AtomicBool,
}

impl<M: ?Sized + Send + Sync + 'static> ModelSlot<M> {
    pub fn new(loader: Arc<dyn ModelLoader<M>>, preference: DevicePreference) -> Self {
        Self {
            family: loader.family().to_string(),
            preference,
            loader,
            handle: RwLock::new(None),
            init_lock: Mutex::new(()),
            loads: AtomicUsize::new(0),
            reload_pending: AtomicBool::new(false),
        }
    }

    /// Family name of this slot
    pub fn family(&self) -> &str {
        &self.family
    }

    /// The loaded handle, without triggering a load
    pub async fn current(&self) -> Option<Arc<M>> {
        self.handle.read().await.clone()
    }

    /// Non-blocking peek for synchronous callers
    ///
    /// Returns `None` while a load or unload holds the write lock.
    pub fn try_current(&self) -> Option<Arc<M>> {
        self.handle.try_read().ok().and_then(|handle| handle.clone())
    }

    /// Whether the slot currently holds a handle
    pub async fn is_loaded(&self) -> bool {
        self.handle.read().await.is_some()
    }

    /// Number of successful model constructions performed by this slot
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Load the model if the slot is empty, otherwise return the existing handle
    pub async fn load(&self) -> Result<Arc<M>, ModelLoadError> {
        if let Some(handle) = self.current().await {
            info!("{} model is already loaded", self.family);
            return Ok(handle);
        }

        let _guard = self.init_lock.lock().await;

        // Another caller may have finished loading while we waited for the lock
        if let Some(handle) = self.current().await {
            return Ok(handle);
        }

        info!("⏳ Loading {} model... This may take time.", self.family);
        let device = detect_device(self.preference);

        match self.loader.load(device).await {
            Ok(handle) => {
                *self.handle.write().await = Some(handle.clone());
                self.loads.fetch_add(1, Ordering::SeqCst);
                info!("✅ {} model successfully loaded on {}", self.family, device);
                Ok(handle)
            }
            Err(e) => {
                error!("❌ Failed to load {} model: {}", self.family, e);
                Err(e)
            }
        }
    }

    /// Return the loaded handle, loading it first if the slot is empty
    pub async fn get(&self) -> Result<Arc<M>, ModelLoadError> {
        match self.current().await {
            Some(handle) => Ok(handle),
            None => self.load().await,
        }
    }

    /// Start a background load unless the slot is loaded or a load is already running
    ///
    /// Returns `true` if a new load task was spawned.
    pub fn spawn_reload(self: &Arc<Self>) -> bool {
        if self
            .reload_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        if self.init_lock.try_lock().is_err() {
            self.reload_pending.store(false, Ordering::SeqCst);
            return false;
        }

        let slot = Arc::clone(self);
        tokio::spawn(async move {
            info!("🔄 Retrying {} model load in the background", slot.family);
            if let Err(e) = slot.load().await {
                warn!("⚠️  Background {} model load failed: {}", slot.family, e);
            }
            slot.reload_pending.store(false, Ordering::SeqCst);
        });

        true
    }

    /// Release the handle (shutdown only)
    ///
    /// Returns `true` if a handle was held. Device memory is freed once the
    /// last in-flight user drops its reference.
    pub async fn unload(&self) -> bool {
        let _guard = self.init_lock.lock().await;
        let Some(handle) = self.handle.write().await.take() else {
            return false;
        };

        let references = Arc::strong_count(&handle) - 1;
        if references > 0 {
            warn!(
                "⚠️  {} model still referenced by {} in-flight request(s); memory is released when they finish",
                self.family, references
            );
        }
        drop(handle);

        info!("✅ {} model released", self.family);
        true
    }
}

/// Registry of all model families used by the service
pub struct ModelRegistry {
    document: Arc<ModelSlot<dyn DocumentModel>>,
    layout: Option<Arc<ModelSlot<dyn LayoutAnalyzer>>>,
}

impl ModelRegistry {
    /// Create a registry with only the document family
    pub fn new(document: Arc<ModelSlot<dyn DocumentModel>>) -> Self {
        Self {
            document,
            layout: None,
        }
    }

    /// Register the auxiliary layout family
    pub fn with_layout(mut self, layout: Arc<ModelSlot<dyn LayoutAnalyzer>>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn document(&self) -> &Arc<ModelSlot<dyn DocumentModel>> {
        &self.document
    }

    pub fn layout(&self) -> Option<&Arc<ModelSlot<dyn LayoutAnalyzer>>> {
        self.layout.as_ref()
    }

    /// Whether the document model is loaded
    pub async fn is_ready(&self) -> bool {
        self.document.is_loaded().await
    }

    /// Load every family: the layout model first (optional), then the document model
    ///
    /// A layout failure is logged and does not stop the document model from
    /// loading. The document model's outcome is returned.
    pub async fn load_all(&self) -> Result<Arc<dyn DocumentModel>, ModelLoadError> {
        if let Some(layout) = &self.layout {
            if let Err(e) = layout.load().await {
                warn!("⚠️  Layout model unavailable, continuing without it: {}", e);
            }
        }

        self.document.load().await
    }

    /// Release every family (best effort)
    pub async fn unload_all(&self) {
        self.document.unload().await;
        if let Some(layout) = &self.layout {
            layout.unload().await;
        }
    }
}
