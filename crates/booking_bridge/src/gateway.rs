//! HTTP lookup gateway
//!
//! Maps booking service answers onto [`LookupResult`]: a booking is
//! `Found`, a 404 is `NotFound`, and anything else (transport failure,
//! other status, malformed body) is `Error`.

use crate::client::{BookingClient, BookingConfig};
use anyhow::Result;
use async_trait::async_trait;
use scan_core::{CanonicalPlate, LookupGateway, LookupResult};
use tracing::warn;

/// [`LookupGateway`] backed by the booking service
pub struct HttpLookupGateway {
    client: BookingClient,
}

impl HttpLookupGateway {
    /// Create a new gateway
    pub fn new(client: BookingClient) -> Self {
        Self { client }
    }

    /// Create a gateway from a client configuration
    pub fn from_config(config: BookingConfig) -> Result<Self> {
        Ok(Self::new(BookingClient::new(config)?))
    }
}

#[async_trait]
impl LookupGateway for HttpLookupGateway {
    async fn lookup(&self, plate: &CanonicalPlate) -> LookupResult {
        match self.client.find_booking(plate).await {
            Ok(Some(booking)) => LookupResult::Found(booking),
            Ok(None) => LookupResult::NotFound,
            Err(e) => {
                warn!(%plate, error = %e, "Booking lookup failed");
                LookupResult::Error(e.to_string())
            }
        }
    }
}
