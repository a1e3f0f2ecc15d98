// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model handles, device placement and the model registry

pub mod device;
pub mod error;
pub mod handle;
pub mod registry;

pub use device::{cuda_available, cuda_device_count, detect_device, Device, DevicePreference};
pub use error::{ComputeError, ModelLoadError};
pub use handle::{
    Conversion, ConversionMetadata, DocumentModel, ExtractedImage, LayoutAnalyzer, LayoutRegion,
};
pub use registry::{ModelLoader, ModelRegistry, ModelSlot};
