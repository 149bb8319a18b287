//! Scan settings
//!
//! Operator-tunable values read by the controller and the scheduler.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Floor on the delay between captures, whatever the configured interval
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_millis(300);

/// Settings for automatic capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Delay between captures in milliseconds
    pub interval_ms: u64,
    /// Minimum OCR confidence (0-100) before a plate is looked up
    pub confidence_threshold: f32,
    /// Re-arm the scheduler after every cycle
    pub auto_capture: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1500,
            confidence_threshold: 45.0,
            auto_capture: true,
        }
    }
}

impl ScanSettings {
    /// Delay to arm the next capture with, clamped to [`MIN_SCAN_INTERVAL`]
    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.interval_ms).max(MIN_SCAN_INTERVAL)
    }

    /// Whether an OCR confidence clears the lookup gate
    pub fn passes_threshold(&self, confidence: f32) -> bool {
        confidence >= self.confidence_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ScanSettings::default();
        assert_eq!(settings.interval_ms, 1500);
        assert_eq!(settings.confidence_threshold, 45.0);
        assert!(settings.auto_capture);
    }

    #[test]
    fn test_scan_delay_clamped() {
        let settings = ScanSettings {
            interval_ms: 10,
            ..Default::default()
        };
        assert_eq!(settings.scan_delay(), MIN_SCAN_INTERVAL);

        let settings = ScanSettings {
            interval_ms: 2500,
            ..Default::default()
        };
        assert_eq!(settings.scan_delay(), Duration::from_millis(2500));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let settings = ScanSettings::default();
        assert!(settings.passes_threshold(45.0));
        assert!(settings.passes_threshold(90.0));
        assert!(!settings.passes_threshold(44.9));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: ScanSettings = serde_json::from_str(r#"{"interval_ms": 800}"#).unwrap();
        assert_eq!(settings.interval_ms, 800);
        assert_eq!(settings.confidence_threshold, 45.0);
        assert!(settings.auto_capture);
    }
}
