//! Frame preprocessing module
//!
//! Handles the image work between the camera and the OCR engine:
//! - Downscaling a video frame to the fixed capture width
//! - Grayscale conversion
//! - Contrast equalization

use image::{imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;
use std::time::Instant;

/// Width every captured frame is scaled to
pub const CAPTURE_WIDTH: u32 = 640;

/// Aspect ratio assumed when the source has not reported its size yet
const FALLBACK_ASPECT: (u32, u32) = (16, 9);

/// A captured, downscaled video frame
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// RGB pixels, `CAPTURE_WIDTH` wide
    pub image: RgbImage,
    /// Native size reported by the source, if known at capture time
    pub source_size: Option<(u32, u32)>,
    /// When the frame was grabbed
    pub captured_at: Instant,
}

impl FrameBuffer {
    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Output size for a frame whose native size is `source_size`
///
/// Width is always [`CAPTURE_WIDTH`]; height follows the source aspect
/// ratio, or 16:9 when the source size is unknown or degenerate.
pub fn capture_dimensions(source_size: Option<(u32, u32)>) -> (u32, u32) {
    let (w, h) = source_size
        .filter(|(w, h)| *w > 0 && *h > 0)
        .unwrap_or(FALLBACK_ASPECT);

    let height = (u64::from(CAPTURE_WIDTH) * u64::from(h) + u64::from(w) / 2) / u64::from(w);
    (CAPTURE_WIDTH, height.clamp(1, u64::from(u32::MAX)) as u32)
}

/// Draw `frame` into a capture-width buffer
pub fn downscale_frame(frame: &DynamicImage, source_size: Option<(u32, u32)>) -> FrameBuffer {
    let (width, height) = capture_dimensions(source_size);
    let image = image::imageops::resize(&frame.to_rgb8(), width, height, FilterType::Triangle);

    FrameBuffer {
        image,
        source_size,
        captured_at: Instant::now(),
    }
}

/// Prepare a captured frame for OCR
pub fn prepare_for_ocr(frame: &FrameBuffer) -> GrayImage {
    let gray = DynamicImage::ImageRgb8(frame.image.clone()).to_luma8();
    equalize_histogram(&gray)
}
