//! Booking Bridge for the parking desk
//!
//! Provides the HTTP side of booking lookups: a client for the booking
//! service's `GET /api/bookings?reg=` endpoint and a
//! [`scan_core::LookupGateway`] built on it.
//!
//! Copyright (c) 2025 Michael A Wright

pub mod client;
pub mod gateway;

pub use client::{BookingClient, BookingConfig};
pub use gateway::HttpLookupGateway;
