// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Router construction and the HTTP server lifecycle

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::errors::ApiError;
use super::health::{detailed_health_handler, docs_handler, health_handler, root_handler};
use super::ocr::ocr_handler;
use crate::config::ServiceConfig;
use crate::models::ModelRegistry;
use crate::vision::pdf;

/// Checks that the PDF renderer is usable, reported by `/health/detailed`
pub type RendererProbe = fn() -> Result<(), String>;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub config: Arc<ServiceConfig>,
    pub renderer_probe: RendererProbe,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, config: Arc<ServiceConfig>) -> Self {
        Self {
            registry,
            config,
            renderer_probe: pdf::probe,
        }
    }

    /// Replace the renderer check used by the detailed health endpoint
    pub fn with_renderer_probe(mut self, probe: RendererProbe) -> Self {
        self.renderer_probe = probe;
        self
    }
}

/// Build the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    let routes = Router::new()
        // Discovery
        .route("/", get(root_handler))
        .route("/docs", get(docs_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/detailed", get(detailed_health_handler))
        // PDF to markdown
        .route("/ocr", post(ocr_handler));

    with_middleware(routes, body_limit).with_state(state)
}

/// Body limit, panic envelope, request tracing and CORS
fn with_middleware<S>(router: Router<S>, body_limit: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
}

/// Turn a handler panic into a 500 envelope
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };

    error!("💥 Unhandled error while serving request: {}", detail);
    ApiError::Internal(detail).into_response()
}

/// Serve until `shutdown` resolves, then release the models
pub async fn serve<F>(state: AppState, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry.clone();
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!("🌐 API server listening on http://{}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("🛑 API is shutting down...");
    registry.unload_all().await;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
