// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gpu_ocr_service::{
    api::{serve, shutdown_signal, AppState},
    cli::Cli,
    config::ServiceConfig,
    vision::build_registry,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging: RUST_LOG wins, otherwise info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 Starting {}...\n", gpu_ocr_service::version::get_version_string());
    println!("📦 BUILD VERSION: {}", gpu_ocr_service::version::VERSION);
    println!("📅 Build Date: {}", gpu_ocr_service::version::BUILD_DATE);
    println!();

    let cli = Cli::parse();
    let config = cli.apply(ServiceConfig::from_env());
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let addr = config.listen_addr()?;

    info!("📁 Document model directory: {}", config.model_dir.display());
    match &config.layout_model_dir {
        Some(dir) => info!("📐 Layout model directory: {}", dir.display()),
        None => info!("📐 Layout model: disabled"),
    }
    info!("🖥️  Device preference: {}", config.device);

    // Load before accepting traffic; a failure leaves the service degraded
    let registry = Arc::new(build_registry(&config));
    match registry.load_all().await {
        Ok(model) => info!("✅ Model ready: {} on {}", model.name(), model.device()),
        Err(e) => {
            warn!("⚠️  Model failed to load: {}", e);
            warn!("⚠️  Starting in degraded mode; /ocr answers 503 until a reload succeeds");
        }
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = AppState::new(registry, Arc::new(config));
    serve(state, listener, shutdown_signal()).await?;

    println!("👋 Shutdown complete");
    Ok(())
}
