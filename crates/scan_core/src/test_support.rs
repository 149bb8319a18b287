//! In-memory collaborators for unit tests

use crate::camera::{CameraError, MediaDevices, VideoConstraints, VideoStream};
use crate::controller::ScanObserver;
use crate::ocr::OcrEngine;
use crate::types::{CameraDevice, CycleOutcome, LogEntry, LookupResult, RawOcrResult};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageBuffer, Rgb};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Two cameras: "back" (1280x960) and "front" (size not yet known)
pub struct FakeDevices {
    secure: bool,
    supported: bool,
    failure: Option<CameraError>,
    requests: Mutex<Vec<VideoConstraints>>,
    stopped: Arc<Mutex<Vec<String>>>,
    opened: AtomicUsize,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            secure: true,
            supported: true,
            failure: None,
            requests: Mutex::new(Vec::new()),
            stopped: Arc::new(Mutex::new(Vec::new())),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn failing(mut self, error: CameraError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn requests(&self) -> Vec<VideoConstraints> {
        self.requests.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    pub fn open_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.stopped.lock().len()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn supports_capture(&self) -> bool {
        self.supported
    }

    async fn video_inputs(&self) -> Result<Vec<CameraDevice>, CameraError> {
        Ok(vec![
            CameraDevice {
                id: "back".to_string(),
                label: "Back camera".to_string(),
            },
            CameraDevice {
                id: "front".to_string(),
                label: "Front camera".to_string(),
            },
        ])
    }

    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        self.requests.lock().push(constraints.clone());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let (id, size) = match constraints {
            VideoConstraints::Facing(_) => ("back", Some((1280, 960))),
            VideoConstraints::Device(id) if id == "back" => ("back", Some((1280, 960))),
            VideoConstraints::Device(id) if id == "front" => ("front", None),
            VideoConstraints::Device(_) => return Err(CameraError::NotFound),
        };

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            id: id.to_string(),
            size,
            stopped: self.stopped.clone(),
        }))
    }
}

struct FakeStream {
    id: String,
    size: Option<(u32, u32)>,
    stopped: Arc<Mutex<Vec<String>>>,
}

impl VideoStream for FakeStream {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn current_frame(&mut self) -> Result<DynamicImage, CameraError> {
        let (w, h) = self.size.unwrap_or((320, 320));
        Ok(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            w,
            h,
            Rgb([255u8, 255u8, 255u8]),
        )))
    }

    fn stop_tracks(&mut self) {
        self.stopped.lock().push(self.id.clone());
    }
}

/// OCR engine that replays scripted results
///
/// With a gate set, every `recognize` call announces itself on `entered`
/// and then waits for `release` before returning.
pub struct ScriptedOcr {
    results: Mutex<VecDeque<anyhow::Result<RawOcrResult>>>,
    fail_init: bool,
    pub inits: AtomicUsize,
    pub calls: AtomicUsize,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedOcr {
    pub fn new(results: Vec<RawOcrResult>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().map(Ok).collect()),
            fail_init: false,
            inits: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn push_error(&self, message: &str) {
        self.results
            .lock()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Returns (entered, release)
    pub fn gated(mut self) -> (Self, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.gate = Some((entered.clone(), release.clone()));
        (self, entered, release)
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn init(&self) -> anyhow::Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            anyhow::bail!("language data missing");
        }
        Ok(())
    }

    async fn recognize(&self, _image: &GrayImage) -> anyhow::Result<RawOcrResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        let next = self.results.lock().pop_front();
        next.unwrap_or_else(|| Ok(RawOcrResult::new("", 0.0)))
    }
}

/// Observer that keeps everything it is shown
#[derive(Default)]
pub struct RecordingObserver {
    pub logs: Mutex<Vec<LogEntry>>,
    pub bookings: Mutex<Vec<LookupResult>>,
    pub alerts: Mutex<Vec<String>>,
    pub outcomes: Mutex<Vec<CycleOutcome>>,
}

impl RecordingObserver {
    pub fn messages(&self) -> Vec<String> {
        self.logs.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.logs.lock().iter().any(|e| e.message.contains(needle))
    }
}

impl ScanObserver for RecordingObserver {
    fn log(&self, entry: LogEntry) {
        self.logs.lock().push(entry);
    }

    fn show_booking(&self, result: &LookupResult) {
        self.bookings.lock().push(result.clone());
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().push(message.to_string());
    }

    fn cycle_completed(&self, outcome: &CycleOutcome) {
        self.outcomes.lock().push(outcome.clone());
    }
}
