//! Booking lookup
//!
//! The gateway trait the controller queries, plus a deterministic
//! in-memory gateway for demos and tests.

use crate::types::{Booking, CanonicalPlate, LookupResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Source of bookings keyed by canonical plate
#[async_trait]
pub trait LookupGateway: Send + Sync {
    async fn lookup(&self, plate: &CanonicalPlate) -> LookupResult;
}

/// The fixed demo bookings served by the mock gateway and demo server
pub fn demo_bookings() -> Vec<Booking> {
    let arrival = |d: u32, h: u32, m: u32| {
        Utc.with_ymd_and_hms(2024, 5, d, h, m, 0)
            .single()
            .unwrap_or_default()
    };

    vec![
        Booking {
            reg: "AB12CDE".to_string(),
            status: "Booked".to_string(),
            customer: "Jane Smith".to_string(),
            booking_id: "BK-100231".to_string(),
            product: "Meet & Greet".to_string(),
            terminal: "North".to_string(),
            arrival: arrival(1, 9, 30),
            phone: "07700 900123".to_string(),
        },
        Booking {
            reg: "GF12ABC".to_string(),
            status: "Arrived".to_string(),
            customer: "Arjun Patel".to_string(),
            booking_id: "BK-100587".to_string(),
            product: "Park & Ride".to_string(),
            terminal: "South".to_string(),
            arrival: arrival(3, 14, 5),
            phone: "07700 900456".to_string(),
        },
        Booking {
            reg: "LX21KTP".to_string(),
            status: "Departed".to_string(),
            customer: "Morag Campbell".to_string(),
            booking_id: "BK-100912".to_string(),
            product: "Valet".to_string(),
            terminal: "North".to_string(),
            arrival: arrival(6, 6, 45),
            phone: "07700 900789".to_string(),
        },
    ]
}

/// In-memory gateway over a fixed set of bookings
pub struct MockLookupGateway {
    bookings: HashMap<String, Booking>,
    latency: Option<Duration>,
}

impl MockLookupGateway {
    pub fn new(bookings: Vec<Booking>) -> Self {
        Self {
            bookings: bookings.into_iter().map(|b| (b.reg.clone(), b)).collect(),
            latency: None,
        }
    }

    /// Gateway over [`demo_bookings`]
    pub fn demo() -> Self {
        Self::new(demo_bookings())
    }

    /// Delay every answer, to mimic a network round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl Default for MockLookupGateway {
    fn default() -> Self {
        Self::demo()
    }
}

#[async_trait]
impl LookupGateway for MockLookupGateway {
    async fn lookup(&self, plate: &CanonicalPlate) -> LookupResult {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.bookings.get(plate.as_str()) {
            Some(booking) => LookupResult::Found(booking.clone()),
            None => LookupResult::NotFound,
        }
    }
}
