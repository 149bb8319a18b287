//! Scan controller
//!
//! Drives the capture cycle: camera frame -> OCR -> plate normalization ->
//! confidence gate -> booking lookup, re-arming the scheduler after each
//! cycle while auto-capture is on.
//!
//! State moves `Idle -> Starting -> Running -> Stopping -> Idle`. Every run
//! gets a fresh [`SessionId`]; timers and in-flight cycles carry it, and a
//! continuation only acts while its session is still the running one.

use crate::camera::{CameraError, CameraSession, MediaDevices};
use crate::lookup::LookupGateway;
use crate::normalize::normalize;
use crate::ocr::OcrEngine;
use crate::preprocess::prepare_for_ocr;
use crate::scheduler::ScanScheduler;
use crate::settings::ScanSettings;
use crate::types::{
    CameraDevice, CanonicalPlate, CycleOutcome, LogEntry, LogLevel, LookupResult, ScanState,
    ScanStatus, SessionId,
};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// The UI surface the controller reports to
pub trait ScanObserver: Send + Sync {
    /// Append a line to the operator log
    fn log(&self, entry: LogEntry);

    /// Show the result of a lookup
    fn show_booking(&self, result: &LookupResult);

    /// Interrupt the operator; used only for start-up failures
    fn alert(&self, message: &str);

    /// Called once per completed (non-stale) cycle
    fn cycle_completed(&self, _outcome: &CycleOutcome) {}
}

/// Errors returned by controller intents
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: ScanState,
        action: &'static str,
    },
    #[error("scanner is not running")]
    NotRunning,
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("OCR engine failed to start: {0}")]
    Ocr(String),
    #[error("start was cancelled by stop")]
    Cancelled,
}

/// Handle to a scan controller; clones share the same scanner
#[derive(Clone)]
pub struct ScanController {
    inner: Arc<Inner>,
}

struct Inner {
    status: watch::Sender<ScanStatus>,
    settings: watch::Sender<ScanSettings>,
    camera: Mutex<CameraSession>,
    scheduler: Arc<ScanScheduler>,
    /// Held for the whole of a cycle so cycles never overlap
    cycle_lock: Mutex<()>,
    ocr: Arc<dyn OcrEngine>,
    gateway: Arc<dyn LookupGateway>,
    observer: Arc<dyn ScanObserver>,
}

impl ScanController {
    /// Create an idle controller
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        ocr: Arc<dyn OcrEngine>,
        gateway: Arc<dyn LookupGateway>,
        observer: Arc<dyn ScanObserver>,
        settings: ScanSettings,
    ) -> Self {
        let (settings, settings_rx) = watch::channel(settings);
        let (status, _) = watch::channel(ScanStatus::idle());
        let scheduler = Arc::new(ScanScheduler::new(settings_rx));
        let camera = CameraSession::new(devices).with_scheduler(scheduler.clone());

        Self {
            inner: Arc::new(Inner {
                status,
                settings,
                camera: Mutex::new(camera),
                scheduler,
                cycle_lock: Mutex::new(()),
                ocr,
                gateway,
                observer,
            }),
        }
    }

    /// Current state and session
    pub fn status(&self) -> ScanStatus {
        *self.inner.status.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.inner.status.subscribe()
    }

    pub fn settings(&self) -> ScanSettings {
        *self.inner.settings.borrow()
    }

    /// True while a scan is scheduled and has not fired
    pub fn is_scan_pending(&self) -> bool {
        self.inner.scheduler.is_pending()
    }

    /// List cameras the operator can pick from
    pub async fn devices(&self) -> Result<Vec<CameraDevice>, ScanError> {
        let camera = self.inner.camera.lock().await;
        Ok(camera.devices().await?)
    }

    /// Start the camera and, with auto-capture on, the scan loop
    pub async fn start(&self, device_id: Option<&str>) -> Result<SessionId, ScanError> {
        let mut from = ScanState::Idle;
        let entered = self.inner.status.send_if_modified(|s| {
            if s.state == ScanState::Idle {
                s.state = ScanState::Starting;
                true
            } else {
                from = s.state;
                false
            }
        });
        if !entered {
            return Err(ScanError::InvalidTransition {
                from,
                action: "start",
            });
        }

        info!(device = ?device_id, "Scanner starting");
        self.log(LogLevel::Info, "Starting camera");

        // Hold the camera for the whole start so a concurrent stop() can only
        // release it after we are done with it
        let mut camera = self.inner.camera.lock().await;

        let handle = match camera.start(device_id).await {
            Ok(handle) => handle,
            Err(e) => {
                drop(camera);
                return Err(self.fail_start(e.into()));
            }
        };

        if let Err(e) = self.inner.ocr.init().await {
            camera.stop();
            drop(camera);
            return Err(self.fail_start(ScanError::Ocr(format!("{e:#}"))));
        }

        let session = SessionId::new();
        let promoted = self.inner.status.send_if_modified(|s| {
            if s.state == ScanState::Starting {
                *s = ScanStatus {
                    state: ScanState::Running,
                    session: Some(session),
                };
                true
            } else {
                false
            }
        });
        if !promoted {
            camera.stop();
            debug!("Start overtaken by stop");
            return Err(ScanError::Cancelled);
        }
        drop(camera);

        info!(%session, device = %handle.device_id, "Scanner running");
        self.log(
            LogLevel::Info,
            format!("Camera running ({})", handle.device_id),
        );
        self.arm(session);

        Ok(session)
    }

    /// Stop scanning and release the camera
    ///
    /// Takes effect immediately for any in-flight cycle: its result is
    /// dropped and it will not re-arm.
    pub async fn stop(&self) -> Result<(), ScanError> {
        let mut from = ScanState::Idle;
        let entered = self.inner.status.send_if_modified(|s| match s.state {
            ScanState::Running | ScanState::Starting => {
                *s = ScanStatus {
                    state: ScanState::Stopping,
                    session: None,
                };
                true
            }
            other => {
                from = other;
                false
            }
        });
        if !entered {
            return Err(ScanError::InvalidTransition {
                from,
                action: "stop",
            });
        }

        self.inner.scheduler.cancel();
        self.inner.camera.lock().await.stop();
        self.inner.status.send_replace(ScanStatus::idle());

        info!("Scanner stopped");
        self.log(LogLevel::Info, "Camera stopped");
        Ok(())
    }

    /// Move the running scanner to another camera
    pub async fn switch_camera(&self, device_id: &str) -> Result<(), ScanError> {
        let status = self.status();
        let session = match (status.state, status.session) {
            (ScanState::Running, Some(session)) => session,
            (ScanState::Idle, _) => return Err(ScanError::NotRunning),
            (from, _) => {
                return Err(ScanError::InvalidTransition {
                    from,
                    action: "switch camera",
                })
            }
        };

        let switched = {
            let mut camera = self.inner.camera.lock().await;
            camera.switch_device(device_id).await
        };

        match switched {
            Ok(handle) => {
                info!(%session, device = %handle.device_id, "Camera switched");
                self.log(
                    LogLevel::Info,
                    format!("Switched to camera {}", handle.device_id),
                );
                self.arm(session);
                Ok(())
            }
            Err(e) => {
                // The old stream is gone; fall back to idle
                self.inner.status.send_if_modified(|s| {
                    if s.is_current(session) {
                        *s = ScanStatus::idle();
                        true
                    } else {
                        false
                    }
                });
                self.inner.scheduler.cancel();
                error!(error = %e, device = device_id, "Camera switch failed");
                let message = format!("Camera error: {e}");
                self.log(LogLevel::Error, message.clone());
                self.inner.observer.alert(&message);
                Err(e.into())
            }
        }
    }

    /// Run one capture cycle now
    pub async fn capture_now(&self) -> Result<CycleOutcome, ScanError> {
        let status = self.status();
        match status.session {
            Some(session) if status.state == ScanState::Running => {
                // The cycle re-arms when it finishes
                self.inner.scheduler.cancel();
                Ok(self.run_cycle(session).await)
            }
            _ => Err(ScanError::NotRunning),
        }
    }

    /// Look up a plate typed by the operator
    ///
    /// The input is uppercased and stripped of whitespace, nothing more.
    /// Works in any state. Returns `None` for blank input.
    pub async fn manual_lookup(&self, input: &str) -> Option<LookupResult> {
        let Some(plate) = CanonicalPlate::from_manual(input) else {
            self.log(LogLevel::Warn, "Enter a registration to look up");
            return None;
        };

        info!(%plate, "Manual lookup");
        self.log(LogLevel::Info, format!("Looking up {plate}"));
        let result = self.inner.gateway.lookup(&plate).await;
        self.report_lookup(&plate, &result);
        Some(result)
    }

    /// Turn auto-capture on or off
    pub fn set_auto_capture(&self, enabled: bool) {
        self.inner
            .settings
            .send_modify(|s| s.auto_capture = enabled);

        if !enabled {
            self.inner.scheduler.cancel();
            return;
        }

        // An in-flight cycle re-arms itself when it finishes
        let idle = self.inner.cycle_lock.try_lock().is_ok();
        let status = self.status();
        if let (ScanState::Running, Some(session)) = (status.state, status.session) {
            if idle && !self.inner.scheduler.is_pending() {
                self.arm(session);
            }
        }
    }

    /// Change the delay between captures; used from the next arm on
    pub fn set_interval(&self, interval_ms: u64) {
        self.inner
            .settings
            .send_modify(|s| s.interval_ms = interval_ms);
    }

    /// Change the confidence needed before a lookup
    pub fn set_confidence_threshold(&self, threshold: f32) {
        self.inner
            .settings
            .send_modify(|s| s.confidence_threshold = threshold);
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.inner.status.borrow().is_current(session)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.inner.observer.log(LogEntry::new(level, message));
    }

    /// Put the state back to idle after a failed start and tell the operator
    fn fail_start(&self, err: ScanError) -> ScanError {
        let was_starting = self.inner.status.send_if_modified(|s| {
            if s.state == ScanState::Starting {
                *s = ScanStatus::idle();
                true
            } else {
                false
            }
        });

        error!(error = %err, "Scanner failed to start");
        if was_starting {
            let message = match &err {
                ScanError::Camera(e) => format!("Camera error: {e}"),
                other => other.to_string(),
            };
            self.log(LogLevel::Error, message.clone());
            self.inner.observer.alert(&message);
        }
        err
    }

    /// Schedule the next cycle for `session` if auto-capture is on
    fn arm(&self, session: SessionId) {
        if !self.inner.settings.borrow().auto_capture || !self.is_current(session) {
            return;
        }

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule_next(move || {
            if let Some(inner) = inner.upgrade() {
                let controller = ScanController { inner };
                tokio::spawn(async move {
                    controller.run_cycle(session).await;
                });
            }
        });
    }

    async fn run_cycle(&self, session: SessionId) -> CycleOutcome {
        let cycle = self.inner.cycle_lock.lock().await;
        if !self.is_current(session) {
            return CycleOutcome::Stale;
        }

        let outcome = self.cycle(session).await;
        if outcome == CycleOutcome::Stale {
            debug!(%session, "Dropping result of stale cycle");
            return outcome;
        }

        self.inner.observer.cycle_completed(&outcome);
        // Unlock before re-arming so set_auto_capture either sees the cycle
        // finished or has its setting seen by this arm
        drop(cycle);
        self.arm(session);
        outcome
    }

    async fn cycle(&self, session: SessionId) -> CycleOutcome {
        let frame = self.inner.camera.lock().await.capture_frame();
        if !self.is_current(session) {
            return CycleOutcome::Stale;
        }
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Frame capture failed");
                self.log(LogLevel::Warn, format!("Capture failed: {e}"));
                return CycleOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let ocr = self.inner.ocr.recognize(&prepare_for_ocr(&frame)).await;
        if !self.is_current(session) {
            return CycleOutcome::Stale;
        }
        let ocr = match ocr {
            Ok(ocr) => ocr,
            Err(e) => {
                warn!(error = %e, "OCR failed");
                self.log(LogLevel::Warn, format!("OCR failed: {e:#}"));
                return CycleOutcome::Failed {
                    reason: format!("{e:#}"),
                };
            }
        };
        debug!(text = %ocr.text.trim(), confidence = ocr.confidence, "OCR result");

        let Some(plate) = normalize(Some(&ocr.text)) else {
            self.log(LogLevel::Info, "No plate matched");
            return CycleOutcome::NoPlate {
                text: ocr.text,
                confidence: ocr.confidence,
            };
        };

        let settings = self.settings();
        if !settings.passes_threshold(ocr.confidence) {
            debug!(%plate, confidence = ocr.confidence, "Below confidence threshold");
            self.log(
                LogLevel::Info,
                format!(
                    "Read {plate} at {:.0}% (below {:.0}%)",
                    ocr.confidence, settings.confidence_threshold
                ),
            );
            return CycleOutcome::BelowThreshold {
                plate,
                confidence: ocr.confidence,
            };
        }

        info!(%plate, confidence = ocr.confidence, "Plate read");
        self.log(
            LogLevel::Info,
            format!("Read {plate} at {:.0}%", ocr.confidence),
        );

        let result = self.inner.gateway.lookup(&plate).await;
        if !self.is_current(session) {
            return CycleOutcome::Stale;
        }
        self.report_lookup(&plate, &result);

        CycleOutcome::Lookup {
            plate,
            confidence: ocr.confidence,
            result,
        }
    }

    fn report_lookup(&self, plate: &CanonicalPlate, result: &LookupResult) {
        match result {
            LookupResult::Found(booking) => {
                info!(%plate, booking = %booking.booking_id, "Booking found");
                self.log(
                    LogLevel::Info,
                    format!(
                        "Booking {} for {plate} ({})",
                        booking.booking_id, booking.status
                    ),
                );
            }
            LookupResult::NotFound => {
                info!(%plate, "No booking");
                self.log(LogLevel::Info, format!("No booking for {plate}"));
            }
            LookupResult::Error(reason) => {
                warn!(%plate, %reason, "Lookup failed");
                self.log(
                    LogLevel::Warn,
                    format!("Lookup failed for {plate}: {reason}"),
                );
            }
        }
        self.inner.observer.show_booking(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MockLookupGateway;
    use crate::test_support::{FakeDevices, RecordingObserver, ScriptedOcr};
    use crate::types::RawOcrResult;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        controller: ScanController,
        devices: Arc<FakeDevices>,
        ocr: Arc<ScriptedOcr>,
        observer: Arc<RecordingObserver>,
    }

    fn harness_with(devices: FakeDevices, ocr: ScriptedOcr, settings: ScanSettings) -> Harness {
        let devices = Arc::new(devices);
        let ocr = Arc::new(ocr);
        let observer = Arc::new(RecordingObserver::default());
        let controller = ScanController::new(
            devices.clone(),
            ocr.clone(),
            Arc::new(MockLookupGateway::demo()),
            observer.clone(),
            settings,
        );
        Harness {
            controller,
            devices,
            ocr,
            observer,
        }
    }

    fn harness(results: Vec<RawOcrResult>, settings: ScanSettings) -> Harness {
        harness_with(FakeDevices::new(), ScriptedOcr::new(results), settings)
    }

    fn manual() -> ScanSettings {
        ScanSettings {
            auto_capture: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let h = harness(vec![], manual());
        assert_eq!(h.controller.status(), ScanStatus::idle());

        let session = h.controller.start(None).await.unwrap();
        let status = h.controller.status();
        assert_eq!(status.state, ScanState::Running);
        assert_eq!(status.session, Some(session));
        assert_eq!(h.ocr.inits.load(Ordering::SeqCst), 1);
        assert_eq!(h.devices.open_streams(), 1);

        h.controller.stop().await.unwrap();
        assert_eq!(h.controller.status(), ScanStatus::idle());
        assert_eq!(h.devices.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_start_only_from_idle() {
        let h = harness(vec![], manual());
        h.controller.start(None).await.unwrap();

        let err = h.controller.start(None).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidTransition {
                from: ScanState::Running,
                action: "start"
            }
        ));
        assert_eq!(h.devices.open_streams(), 1);
    }

    #[tokio::test]
    async fn test_stop_from_idle_is_rejected() {
        let h = harness(vec![], manual());
        assert!(matches!(
            h.controller.stop().await,
            Err(ScanError::InvalidTransition {
                from: ScanState::Idle,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_camera_failure_returns_to_idle_and_alerts() {
        let h = harness_with(
            FakeDevices::new().failing(CameraError::PermissionDenied),
            ScriptedOcr::new(vec![]),
            ScanSettings::default(),
        );

        let err = h.controller.start(None).await.unwrap_err();
        assert!(matches!(err, ScanError::Camera(CameraError::PermissionDenied)));
        assert_eq!(h.controller.status(), ScanStatus::idle());
        assert_eq!(h.observer.alerts.lock().len(), 1);
        assert!(!h.controller.is_scan_pending());

        // Back in Idle, so another attempt reaches the camera again
        assert!(matches!(
            h.controller.start(None).await,
            Err(ScanError::Camera(CameraError::PermissionDenied))
        ));
        assert_eq!(h.devices.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_ocr_init_failure_releases_camera() {
        let h = harness_with(
            FakeDevices::new(),
            ScriptedOcr::new(vec![]).failing_init(),
            ScanSettings::default(),
        );

        let err = h.controller.start(None).await.unwrap_err();
        assert!(matches!(err, ScanError::Ocr(_)));
        assert_eq!(h.controller.status(), ScanStatus::idle());
        assert_eq!(h.devices.open_streams(), 0);
        assert_eq!(h.observer.alerts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_looks_up_confident_plate() {
        let h = harness(vec![RawOcrResult::new("AB12 CDE\n", 88.0)], manual());
        h.controller.start(None).await.unwrap();

        let outcome = h.controller.capture_now().await.unwrap();
        match outcome {
            CycleOutcome::Lookup { plate, result, .. } => {
                assert_eq!(plate.as_str(), "AB12CDE");
                assert_eq!(result.booking().unwrap().reg, "AB12CDE");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(h.observer.bookings.lock().len(), 1);
        assert_eq!(h.observer.outcomes.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_unknown_plate_not_found() {
        let h = harness(vec![RawOcrResult::new("ZZ99 ZZZ", 90.0)], manual());
        h.controller.start(None).await.unwrap();

        let outcome = h.controller.capture_now().await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Lookup {
                result: LookupResult::NotFound,
                ..
            }
        ));
        assert!(h.observer.has_message("No booking for ZZ99ZZZ"));
    }

    #[tokio::test]
    async fn test_confidence_gate() {
        let h = harness(vec![RawOcrResult::new("AB12 CDE", 44.0)], manual());
        h.controller.start(None).await.unwrap();

        let outcome = h.controller.capture_now().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::BelowThreshold { .. }));
        assert!(h.observer.bookings.lock().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_change_applies_to_next_cycle() {
        let h = harness(
            vec![
                RawOcrResult::new("AB12 CDE", 30.0),
                RawOcrResult::new("AB12 CDE", 30.0),
            ],
            manual(),
        );
        h.controller.start(None).await.unwrap();

        assert!(matches!(
            h.controller.capture_now().await.unwrap(),
            CycleOutcome::BelowThreshold { .. }
        ));

        h.controller.set_confidence_threshold(25.0);
        assert!(matches!(
            h.controller.capture_now().await.unwrap(),
            CycleOutcome::Lookup { .. }
        ));
    }

    #[tokio::test]
    async fn test_no_plate_logged() {
        let h = harness(vec![RawOcrResult::new("bad text no plate", 95.0)], manual());
        h.controller.start(None).await.unwrap();

        let outcome = h.controller.capture_now().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::NoPlate { .. }));
        assert!(h.observer.has_message("No plate matched"));
    }

    #[tokio::test]
    async fn test_capture_requires_running() {
        let h = harness(vec![], manual());
        assert!(matches!(
            h.controller.capture_now().await,
            Err(ScanError::NotRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_capture_repeats() {
        let h = harness(
            vec![
                RawOcrResult::new("AB12 CDE", 90.0),
                RawOcrResult::new("---", 90.0),
                RawOcrResult::new("GF12 ABC", 90.0),
            ],
            ScanSettings {
                interval_ms: 1000,
                auto_capture: true,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();
        assert!(h.controller.is_scan_pending());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(h.observer.outcomes.lock().len(), 2);
        assert!(h.controller.is_scan_pending());

        h.controller.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.observer.outcomes.lock().len(), 2);
        assert!(!h.controller.is_scan_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_applies_from_next_arm() {
        let h = harness(
            vec![
                RawOcrResult::new("---", 90.0),
                RawOcrResult::new("---", 90.0),
            ],
            ScanSettings {
                interval_ms: 1000,
                auto_capture: true,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();
        h.controller.set_interval(5000);
        assert_eq!(h.controller.settings().interval_ms, 5000);

        // The pending timer keeps its 1s delay
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.observer.outcomes.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(h.observer.outcomes.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(h.observer.outcomes.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabling_auto_capture_mid_cycle_waits_for_cycle_end() {
        let (ocr, entered, release) = ScriptedOcr::new(vec![
            RawOcrResult::new("---", 90.0),
            RawOcrResult::new("---", 90.0),
        ])
        .gated();
        let h = harness_with(
            FakeDevices::new(),
            ocr,
            ScanSettings {
                interval_ms: 1000,
                auto_capture: false,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();

        let cycle = tokio::spawn({
            let controller = h.controller.clone();
            async move { controller.capture_now().await }
        });
        entered.notified().await;

        h.controller.set_auto_capture(true);
        assert!(!h.controller.is_scan_pending());

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);

        release.notify_one();
        cycle.await.unwrap().unwrap();
        assert!(h.controller.is_scan_pending());

        // The next cycle waits a full interval after the first one ended
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_now_replaces_pending_timer() {
        let h = harness(
            vec![
                RawOcrResult::new("---", 90.0),
                RawOcrResult::new("---", 90.0),
            ],
            ScanSettings {
                interval_ms: 1000,
                auto_capture: true,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        h.controller.capture_now().await.unwrap();
        assert!(h.controller.is_scan_pending());

        // The timer armed at start would have fired at 1000ms
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ocr_failure_keeps_running_and_rearms() {
        let ocr = ScriptedOcr::new(vec![]);
        ocr.push_error("engine hiccup");
        let h = harness_with(
            FakeDevices::new(),
            ocr,
            ScanSettings {
                interval_ms: 1000,
                auto_capture: true,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let outcomes = h.observer.outcomes.lock().clone();
        assert!(matches!(outcomes.as_slice(), [CycleOutcome::Failed { .. }]));
        assert_eq!(h.controller.status().state, ScanState::Running);
        assert!(h.controller.is_scan_pending());
        assert!(h.observer.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stop_during_inflight_cycle_drops_result() {
        let (ocr, entered, release) =
            ScriptedOcr::new(vec![RawOcrResult::new("AB12 CDE", 90.0)]).gated();
        let h = harness_with(
            FakeDevices::new(),
            ocr,
            ScanSettings {
                interval_ms: 60_000,
                auto_capture: true,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();

        let cycle = tokio::spawn({
            let controller = h.controller.clone();
            async move { controller.capture_now().await }
        });
        entered.notified().await;

        h.controller.stop().await.unwrap();
        release.notify_one();

        let outcome = cycle.await.unwrap().unwrap();
        assert_eq!(outcome, CycleOutcome::Stale);
        assert!(!h.controller.is_scan_pending());
        assert!(h.observer.bookings.lock().is_empty());
        assert!(h.observer.outcomes.lock().is_empty());
        assert_eq!(h.controller.status(), ScanStatus::idle());
    }

    #[tokio::test]
    async fn test_cycle_from_previous_session_is_stale_after_restart() {
        let (ocr, entered, release) =
            ScriptedOcr::new(vec![RawOcrResult::new("AB12 CDE", 90.0)]).gated();
        let h = harness_with(FakeDevices::new(), ocr, manual());
        h.controller.start(None).await.unwrap();

        let cycle = tokio::spawn({
            let controller = h.controller.clone();
            async move { controller.capture_now().await }
        });
        entered.notified().await;

        h.controller.stop().await.unwrap();
        h.controller.start(None).await.unwrap();
        release.notify_one();

        assert_eq!(cycle.await.unwrap().unwrap(), CycleOutcome::Stale);
        assert!(h.observer.bookings.lock().is_empty());
        assert_eq!(h.controller.status().state, ScanState::Running);
    }

    #[tokio::test]
    async fn test_toggle_auto_capture() {
        let h = harness(
            vec![],
            ScanSettings {
                interval_ms: 60_000,
                auto_capture: false,
                ..Default::default()
            },
        );
        h.controller.start(None).await.unwrap();
        assert!(!h.controller.is_scan_pending());

        h.controller.set_auto_capture(true);
        assert!(h.controller.is_scan_pending());

        h.controller.set_auto_capture(false);
        assert!(!h.controller.is_scan_pending());
        assert!(!h.controller.settings().auto_capture);
    }

    #[tokio::test]
    async fn test_switch_camera_releases_old_stream() {
        let h = harness(vec![], manual());
        h.controller.start(Some("back")).await.unwrap();

        h.controller.switch_camera("front").await.unwrap();
        assert_eq!(h.devices.stopped(), vec!["back".to_string()]);
        assert_eq!(h.devices.open_streams(), 1);
        assert_eq!(h.controller.status().state, ScanState::Running);
    }

    #[tokio::test]
    async fn test_switch_to_missing_camera_goes_idle() {
        let h = harness(vec![], ScanSettings::default());
        h.controller.start(Some("back")).await.unwrap();

        let err = h.controller.switch_camera("missing").await.unwrap_err();
        assert!(matches!(err, ScanError::Camera(CameraError::NotFound)));
        assert_eq!(h.controller.status(), ScanStatus::idle());
        assert!(!h.controller.is_scan_pending());
        assert_eq!(h.devices.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_manual_lookup_in_any_state() {
        let h = harness(vec![], manual());

        let result = h.controller.manual_lookup(" ab12 cde ").await.unwrap();
        assert_eq!(result.booking().unwrap().reg, "AB12CDE");

        // No shape validation on the manual path
        assert_eq!(
            h.controller.manual_lookup("hello").await,
            Some(LookupResult::NotFound)
        );
        assert_eq!(h.observer.bookings.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_manual_lookup_blank_input() {
        let h = harness(vec![], manual());
        assert_eq!(h.controller.manual_lookup("   ").await, None);
        assert!(h.observer.bookings.lock().is_empty());
    }

    #[tokio::test]
    async fn test_devices() {
        let h = harness(vec![], manual());
        let devices = h.controller.devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "back");
    }
}
