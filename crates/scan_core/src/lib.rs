//! Core scanning pipeline for parkdesk
//!
//! This crate holds the license-plate scanner behind the parking desk:
//! camera session, capture scheduling, OCR, plate normalization, and the
//! controller that ties them to a booking lookup. It has no UI; a front
//! end drives it through [`controller::ScanController`] and receives
//! output through [`controller::ScanObserver`].

pub mod camera;
pub mod controller;
pub mod folder_camera;
pub mod lookup;
pub mod normalize;
pub mod ocr;
pub mod preprocess;
pub mod scheduler;
pub mod settings;
pub mod types;

#[cfg(test)]
mod test_support;

pub use camera::{CameraError, CameraSession, MediaDevices};
pub use controller::{ScanController, ScanError, ScanObserver};
pub use folder_camera::FolderCamera;
pub use lookup::{LookupGateway, MockLookupGateway};
pub use normalize::normalize;
pub use ocr::{OcrConfig, OcrEngine, TesseractOcr};
pub use settings::ScanSettings;
pub use types::*;
