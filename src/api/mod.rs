// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP API
//!
//! - `server` - Router, middleware and lifecycle
//! - `health` - Health and discovery endpoints
//! - `ocr` - PDF upload endpoint
//! - `errors` - Error envelope

pub mod errors;
pub mod health;
pub mod ocr;
pub mod server;

pub use errors::{ApiError, ErrorResponse};
pub use ocr::OcrResponse;
pub use server::{create_router, serve, shutdown_signal, AppState, RendererProbe};
