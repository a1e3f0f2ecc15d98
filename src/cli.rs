// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Command line overrides for the service configuration

use std::path::PathBuf;

use clap::Parser;

use crate::config::ServiceConfig;
use crate::models::DevicePreference;

/// GPU OCR Service
#[derive(Parser, Debug, Default)]
#[command(name = "gpu-ocr-service")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Serve PDF to markdown conversion over HTTP", long_about = None)]
pub struct Cli {
    /// Interface to bind (overrides API_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides API_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Document model directory (overrides MODEL_DIR)
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Layout model directory (overrides LAYOUT_MODEL_DIR)
    #[arg(long)]
    pub layout_model_dir: Option<PathBuf>,

    /// Compute device: auto or cpu (overrides DEVICE)
    #[arg(long)]
    pub device: Option<DevicePreference>,
}

impl Cli {
    /// Apply the flags that were given on top of `config`
    pub fn apply(self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.model_dir {
            config.model_dir = dir;
        }
        if let Some(dir) = self.layout_model_dir {
            config.layout_model_dir = Some(dir);
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        config
    }
}
