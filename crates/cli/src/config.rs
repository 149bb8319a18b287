//! CLI configuration file

use anyhow::{Context, Result};
use booking_bridge::BookingConfig;
use scan_core::{OcrConfig, ScanSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the CLI can read from `--config`
///
/// Missing sections fall back to their defaults. Without a file the
/// booking section comes from the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanSettings,
    pub ocr: OcrConfig,
    pub booking: BookingConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self {
                booking: BookingConfig::from_env()?,
                ..Self::default()
            });
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))
    }
}
