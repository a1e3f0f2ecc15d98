// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod inference;
pub mod models;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_router, serve, AppState};
pub use config::ServiceConfig;
pub use inference::{run_inference, InferenceError, InferenceOutput};
pub use models::{Device, DevicePreference, DocumentModel, ModelRegistry};
pub use vision::build_registry;
