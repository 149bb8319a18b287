//! Camera session
//!
//! Acquires and releases a video stream through a [`MediaDevices`]
//! capability and grabs frames from it. The session never touches a
//! preview surface; showing the live stream is the UI's job.

use crate::preprocess::{downscale_frame, FrameBuffer};
use crate::scheduler::ScanScheduler;
use crate::types::CameraDevice;
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Why a camera could not be started or read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera access requires a secure context")]
    Insecure,
    #[error("no media capture capability is available")]
    Unsupported,
    #[error("camera permission was denied")]
    PermissionDenied,
    #[error("no matching camera was found")]
    NotFound,
    #[error("camera is not started")]
    NotStarted,
    #[error("camera error: {0}")]
    Other(String),
}

/// Preferred camera direction when no device is named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    Environment,
    User,
}

/// What to ask the media layer for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoConstraints {
    /// This exact device
    Device(String),
    /// Best-effort facing preference
    Facing(FacingMode),
}

/// The platform's media-capture capability
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether the execution context allows camera access at all
    fn is_secure_context(&self) -> bool {
        true
    }

    /// Whether any media capture is available
    fn supports_capture(&self) -> bool {
        true
    }

    /// List video inputs
    async fn video_inputs(&self) -> Result<Vec<CameraDevice>, CameraError>;

    /// Open a video stream
    async fn open(&self, constraints: &VideoConstraints)
        -> Result<Box<dyn VideoStream>, CameraError>;
}

/// A live video stream
pub trait VideoStream: Send + Sync {
    /// Device the stream came from
    fn device_id(&self) -> &str;

    /// Native frame size, once the source has reported it
    fn native_size(&self) -> Option<(u32, u32)>;

    /// The current video frame
    fn current_frame(&mut self) -> Result<DynamicImage, CameraError>;

    /// Stop every track of the stream
    fn stop_tracks(&mut self);
}

/// Handle describing the stream a session holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub device_id: String,
    pub native_size: Option<(u32, u32)>,
}

/// Owns at most one camera stream
pub struct CameraSession {
    devices: Arc<dyn MediaDevices>,
    stream: Option<Box<dyn VideoStream>>,
    scheduler: Option<Arc<ScanScheduler>>,
}

impl CameraSession {
    /// Create a session over a media-capture capability
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: None,
            scheduler: None,
        }
    }

    /// Cancel this scheduler's pending scan whenever the camera stops
    pub fn with_scheduler(mut self, scheduler: Arc<ScanScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// List selectable cameras
    pub async fn devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        if !self.devices.supports_capture() {
            return Err(CameraError::Unsupported);
        }
        self.devices.video_inputs().await
    }

    /// Acquire a stream, releasing any stream already held
    ///
    /// With `device_id` the exact device is requested, otherwise an
    /// environment-facing camera is preferred.
    pub async fn start(&mut self, device_id: Option<&str>) -> Result<StreamHandle, CameraError> {
        if !self.devices.is_secure_context() {
            return Err(CameraError::Insecure);
        }
        if !self.devices.supports_capture() {
            return Err(CameraError::Unsupported);
        }

        self.release_stream();

        let constraints = match device_id {
            Some(id) => VideoConstraints::Device(id.to_string()),
            None => VideoConstraints::Facing(FacingMode::Environment),
        };
        debug!(?constraints, "Requesting camera stream");

        let stream = self.devices.open(&constraints).await?;
        let handle = StreamHandle {
            device_id: stream.device_id().to_string(),
            native_size: stream.native_size(),
        };
        info!(device = %handle.device_id, "Camera started");

        self.stream = Some(stream);
        Ok(handle)
    }

    /// Stop the current stream and start `device_id`
    pub async fn switch_device(&mut self, device_id: &str) -> Result<StreamHandle, CameraError> {
        self.stop();
        self.start(Some(device_id)).await
    }

    /// Release the stream and cancel any pending scan; a no-op when idle
    pub fn stop(&mut self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel();
        }
        self.release_stream();
    }

    /// True while a stream is held
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Grab the current frame, scaled to the capture width
    pub fn capture_frame(&mut self) -> Result<FrameBuffer, CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::NotStarted)?;
        let native_size = stream.native_size();
        let frame = stream.current_frame()?;
        Ok(downscale_frame(&frame, native_size))
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            info!(device = %stream.device_id(), "Camera stopped");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}
