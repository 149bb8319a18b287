//! Image-folder camera
//!
//! A [`MediaDevices`] backend that treats directories of still images as
//! cameras, so the scanner can run headless against recorded frames.
//! Every directory under the root that holds images is one device; its
//! stream yields the images in file-name order and loops.

use crate::camera::{CameraError, MediaDevices, VideoConstraints, VideoStream};
use crate::types::CameraDevice;
use async_trait::async_trait;
use image::DynamicImage;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// How deep below the root to look for frame directories
const MAX_DEPTH: usize = 3;

/// Directories of images exposed as cameras
pub struct FolderCamera {
    root: PathBuf,
}

impl FolderCamera {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaDevices for FolderCamera {
    async fn video_inputs(&self) -> Result<Vec<CameraDevice>, CameraError> {
        let root = self.root.clone();
        run_blocking(move || scan_devices(&root)).await
    }

    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        let root = self.root.clone();
        let constraints = constraints.clone();
        let stream = run_blocking(move || open_stream(&root, &constraints)).await?;
        Ok(Box::new(stream))
    }
}

/// Directory walks and image headers are file I/O; keep them off the runtime
async fn run_blocking<T, F>(work: F) -> Result<T, CameraError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CameraError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CameraError::Other(format!("folder camera task failed: {e}")))?
}

fn scan_devices(root: &Path) -> Result<Vec<CameraDevice>, CameraError> {
    if !root.is_dir() {
        return Err(CameraError::NotFound);
    }

    let mut devices = Vec::new();
    for entry in WalkDir::new(root).max_depth(MAX_DEPTH).sort_by_file_name() {
        let entry = entry.map_err(|e| match e.io_error() {
            Some(io) => io_error(io),
            None => CameraError::Other(e.to_string()),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        if !image_files(entry.path())?.is_empty() {
            let label = entry
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| entry.path().display().to_string());
            devices.push(CameraDevice {
                id: entry.path().display().to_string(),
                label,
            });
        }
    }

    Ok(devices)
}

fn open_stream(root: &Path, constraints: &VideoConstraints) -> Result<FolderStream, CameraError> {
    let dir = match constraints {
        VideoConstraints::Device(id) => PathBuf::from(id),
        // No facing information on disk; take the first device
        VideoConstraints::Facing(_) => scan_devices(root)?
            .into_iter()
            .next()
            .map(|device| PathBuf::from(device.id))
            .ok_or(CameraError::NotFound)?,
    };

    let frames = image_files(&dir)?;
    if frames.is_empty() {
        return Err(CameraError::NotFound);
    }

    let native_size = image::image_dimensions(&frames[0]).ok();
    debug!(dir = %dir.display(), frames = frames.len(), "Opened folder camera");

    Ok(FolderStream {
        id: dir.display().to_string(),
        frames,
        next: 0,
        native_size,
        live: true,
    })
}

struct FolderStream {
    id: String,
    frames: Vec<PathBuf>,
    next: usize,
    native_size: Option<(u32, u32)>,
    live: bool,
}

impl VideoStream for FolderStream {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.native_size
    }

    fn current_frame(&mut self) -> Result<DynamicImage, CameraError> {
        if !self.live {
            return Err(CameraError::NotStarted);
        }

        let path = &self.frames[self.next % self.frames.len()];
        self.next = self.next.wrapping_add(1);
        image::open(path).map_err(|e| CameraError::Other(format!("{}: {e}", path.display())))
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }
}

fn image_files(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_error(&e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn io_error(e: &io::Error) -> CameraError {
    match e.kind() {
        io::ErrorKind::NotFound => CameraError::NotFound,
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        _ => CameraError::Other(e.to_string()),
    }
}
