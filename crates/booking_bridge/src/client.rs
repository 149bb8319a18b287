//! Booking service HTTP client

use anyhow::{Context, Result};
use reqwest::StatusCode;
use scan_core::{Booking, CanonicalPlate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration for the booking client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Base URL of the booking service (default: http://127.0.0.1:3000)
    pub base_url: String,
    /// Timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

impl BookingConfig {
    /// Defaults overridden by `PARKDESK_BOOKING_URL` and `PARKDESK_BOOKING_TIMEOUT`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PARKDESK_BOOKING_URL") {
            config.base_url = url;
        }
        if let Ok(timeout) = std::env::var("PARKDESK_BOOKING_TIMEOUT") {
            config.timeout_secs = timeout
                .parse()
                .context("PARKDESK_BOOKING_TIMEOUT must be a whole number of seconds")?;
        }

        Ok(config)
    }
}

/// Why a booking request did not produce an answer
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("booking service returned {0}")]
    Status(StatusCode),
    #[error("unreadable booking response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Booking service API client
pub struct BookingClient {
    config: BookingConfig,
    client: reqwest::Client,
}

impl BookingClient {
    /// Create a new booking client
    pub fn new(config: BookingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    /// Create a client with default configuration
    pub fn default_client() -> Result<Self> {
        Self::new(BookingConfig::default())
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Fetch the booking for a plate
    ///
    /// `Ok(None)` means the service answered 404.
    pub async fn find_booking(
        &self,
        plate: &CanonicalPlate,
    ) -> std::result::Result<Option<Booking>, BookingError> {
        let url = format!("{}/api/bookings", self.config.base_url.trim_end_matches('/'));
        debug!(%url, %plate, "Booking request");

        let response = self
            .client
            .get(&url)
            .query(&[("reg", plate.as_str())])
            .send()
            .await
            .map_err(BookingError::Transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BookingError::Status(status));
        }

        let booking = response.json().await.map_err(BookingError::Decode)?;
        Ok(Some(booking))
    }
}
