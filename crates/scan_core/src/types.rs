//! Core types for the plate scanning pipeline
//!
//! This module defines the values that flow through one capture cycle:
//! OCR output, the canonical plate used as a lookup key, and the booking
//! returned by the lookup service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one camera run (start -> stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text and confidence produced by one OCR pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOcrResult {
    /// Recognized text, possibly multi-line
    pub text: String,
    /// Engine-defined confidence, 0-100
    pub confidence: f32,
}

impl RawOcrResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Normalized registration mark used as the lookup key
///
/// Always uppercase with no whitespace. Plates from the normalizer
/// (camera path) hold only `[A-Z0-9]`; plates from
/// [`CanonicalPlate::from_manual`] keep any other characters the operator
/// typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPlate(String);

impl CanonicalPlate {
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    /// Build a lookup key from trusted user input
    ///
    /// Uppercases and drops whitespace; no plate-shape validation is applied.
    /// Returns `None` when nothing is left.
    pub fn from_manual(input: &str) -> Option<Self> {
        let value: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPlate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A booking as reported by the booking service
///
/// Field contents are defined by the service; only the shape is relied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub reg: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub booking_id: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub terminal: String,
    pub arrival: DateTime<Utc>,
    #[serde(default)]
    pub phone: String,
}

/// Result of a booking lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum LookupResult {
    /// A booking exists for the plate
    Found(Booking),
    /// The service has no booking for the plate
    NotFound,
    /// The service could not be asked (transport failure, bad status, bad body)
    Error(String),
}

impl LookupResult {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }

    pub fn booking(&self) -> Option<&Booking> {
        match self {
            LookupResult::Found(booking) => Some(booking),
            _ => None,
        }
    }
}

/// Lifecycle state of a scan controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Starting => "starting",
            ScanState::Running => "running",
            ScanState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Controller state plus the id of the active run, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStatus {
    pub state: ScanState,
    pub session: Option<SessionId>,
}

impl ScanStatus {
    pub fn idle() -> Self {
        Self {
            state: ScanState::Idle,
            session: None,
        }
    }

    /// True while `session` is the live, running session
    pub fn is_current(&self, session: SessionId) -> bool {
        self.state == ScanState::Running && self.session == Some(session)
    }
}

/// A selectable camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

/// Severity of a log line shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A timestamped line for the operator log panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// What a single capture cycle ended with
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// OCR text held nothing plate-shaped
    NoPlate { text: String, confidence: f32 },
    /// A plate was read but confidence was under the threshold
    BelowThreshold {
        plate: CanonicalPlate,
        confidence: f32,
    },
    /// A plate was read and looked up
    Lookup {
        plate: CanonicalPlate,
        confidence: f32,
        result: LookupResult,
    },
    /// Capture or OCR failed
    Failed { reason: String },
    /// The controller was stopped (or restarted) while the cycle was in flight
    Stale,
}
