//! parkdesk demo booking server
//!
//! Serves the booking lookup API the scanner talks to, backed by the
//! fixed demo bookings.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use scan_core::lookup::demo_bookings;
use scan_core::{Booking, CanonicalPlate};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

struct AppState {
    bookings: HashMap<String, Booking>,
}

impl AppState {
    fn demo() -> Self {
        Self {
            bookings: demo_bookings()
                .into_iter()
                .map(|b| (b.reg.clone(), b))
                .collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("PARKDESK_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let app = app(Arc::new(AppState::demo()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Booking server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/bookings", get(find_booking))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct BookingQuery {
    reg: Option<String>,
}

async fn find_booking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingQuery>,
) -> Result<Json<Booking>, StatusCode> {
    let plate = query
        .reg
        .as_deref()
        .and_then(CanonicalPlate::from_manual)
        .ok_or(StatusCode::BAD_REQUEST)?;

    match state.bookings.get(plate.as_str()) {
        Some(booking) => {
            tracing::info!(%plate, "Booking served");
            Ok(Json(booking.clone()))
        }
        None => {
            tracing::info!(%plate, "No booking");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app(Arc::new(AppState::demo()))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_found_booking() {
        let (status, body) = get("/api/bookings?reg=AB12CDE").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["reg"], "AB12CDE");
        assert_eq!(json["bookingId"], "BK-100231");
        assert!(json["arrival"].as_str().unwrap().starts_with("2024-05-01T09:30:00"));
    }

    #[tokio::test]
    async fn test_query_is_normalized_like_manual_input() {
        let (status, _) = get("/api/bookings?reg=gf12%20abc").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_plate() {
        let (status, _) = get("/api/bookings?reg=ZZ99ZZZ").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_reg() {
        let (status, _) = get("/api/bookings").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/api/bookings?reg=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
