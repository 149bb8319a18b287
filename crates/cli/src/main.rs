//! parkdesk CLI
//!
//! Terminal front end for the parking desk plate scanner: runs the scan
//! loop against folders of recorded frames and exposes the individual
//! pipeline stages (normalize, OCR, lookup) for troubleshooting.
//!
//! Copyright (c) 2025 Michael A Wright

mod config;
mod observer;

use anyhow::{bail, Context, Result};
use booking_bridge::{BookingConfig, HttpLookupGateway};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use observer::ConsoleObserver;
use scan_core::preprocess::{downscale_frame, prepare_for_ocr};
use scan_core::{
    normalize, CanonicalPlate, FolderCamera, LookupGateway, LookupResult, MediaDevices,
    MockLookupGateway, OcrEngine, ScanController, ScanSettings, TesseractOcr,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[allow(dead_code)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nCommit: ",
    env!("BUILT_GIT_COMMIT_HASH"),
    "\nBuilt:  ",
    env!("BUILT_TIME_UTC"),
    "\nHost:   ",
    env!("BUILT_HOST"),
);

#[derive(Parser)]
#[command(name = "parkdesk")]
#[command(about = "License plate scanner for the parking desk", long_about = None)]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// JSON config file with scan, ocr and booking sections
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce OCR text to a canonical plate
    Normalize {
        /// Raw OCR text; each argument is normalized separately
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Look up a booking for a typed registration
    Lookup {
        /// Registration as typed (case and spaces are ignored)
        plate: String,

        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Run OCR over a single image
    Ocr {
        /// Image file
        #[arg(value_name = "IMAGE")]
        path: PathBuf,

        /// Confidence needed before the plate would be looked up
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// List the cameras found under a frames directory
    Devices {
        /// Root directory; each sub-directory of images is a camera
        #[arg(long)]
        frames: PathBuf,
    },

    /// Run the scanner
    Scan {
        /// Root directory; each sub-directory of images is a camera
        #[arg(long)]
        frames: PathBuf,

        /// Camera id from `parkdesk devices` (default: first camera)
        #[arg(long)]
        device: Option<String>,

        #[command(flatten)]
        tuning: ScanArgs,

        /// Stop after this many cycles (default: run until Ctrl-C)
        #[arg(long)]
        cycles: Option<u32>,

        #[command(flatten)]
        gateway: GatewayArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Delay between captures in milliseconds
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Minimum OCR confidence (0-100) before a lookup
    #[arg(long)]
    threshold: Option<f32>,

    /// Capture only on demand instead of on a timer
    #[arg(long)]
    no_auto: bool,
}

impl ScanArgs {
    fn apply(&self, mut settings: ScanSettings) -> ScanSettings {
        if let Some(interval) = self.interval {
            settings.interval_ms = interval;
        }
        if let Some(threshold) = self.threshold {
            settings.confidence_threshold = threshold;
        }
        if self.no_auto {
            settings.auto_capture = false;
        }
        settings
    }
}

#[derive(Args, Debug, Default)]
struct GatewayArgs {
    /// Answer from the built-in demo bookings instead of the service
    #[arg(long)]
    mock: bool,

    /// Booking service URL
    #[arg(long, value_name = "URL", conflicts_with = "mock")]
    base_url: Option<String>,
}

impl GatewayArgs {
    fn build(&self, mut config: BookingConfig) -> Result<Arc<dyn LookupGateway>> {
        if self.mock {
            return Ok(Arc::new(MockLookupGateway::demo()));
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        info!(base_url = %config.base_url, "Using booking service");
        Ok(Arc::new(HttpLookupGateway::from_config(config)?))
    }
}

/// Booking as JSON, or a one-line reason there is none
fn lookup_report(result: &LookupResult) -> Result<String> {
    match result {
        LookupResult::Found(booking) => {
            serde_json::to_string_pretty(booking).context("Failed to render booking")
        }
        LookupResult::NotFound => Ok("not found".to_string()),
        LookupResult::Error(reason) => Ok(format!("error: {reason}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(
        target_triple = built_info::TARGET,
        profile = built_info::PROFILE,
        "parkdesk starting"
    );
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalize { text } => {
            for line in text {
                match normalize(Some(&line)) {
                    Some(plate) => println!("{line:?} -> {plate}"),
                    None => println!("{line:?} -> no plate matched"),
                }
            }
            Ok(())
        }
        Commands::Lookup { plate, gateway } => {
            let Some(plate) = CanonicalPlate::from_manual(&plate) else {
                bail!("Registration is empty");
            };
            let gateway = gateway.build(config.booking)?;
            println!("{}", lookup_report(&gateway.lookup(&plate).await)?);
            Ok(())
        }
        Commands::Ocr { path, threshold } => {
            let frame = image::open(&path)
                .with_context(|| format!("Failed to open image {}", path.display()))?;
            let buffer = downscale_frame(&frame, Some((frame.width(), frame.height())));

            let engine = TesseractOcr::new(config.ocr);
            let raw = engine.recognize(&prepare_for_ocr(&buffer)).await?;

            let settings = ScanArgs {
                threshold,
                ..ScanArgs::default()
            }
            .apply(config.scan);

            println!("Text:       {:?}", raw.text.trim());
            println!("Confidence: {:.1}", raw.confidence);
            match normalize(Some(&raw.text)) {
                Some(plate) if settings.passes_threshold(raw.confidence) => {
                    println!("Plate:      {plate}");
                }
                Some(plate) => println!(
                    "Plate:      {plate} (below threshold {:.1}, would not be looked up)",
                    settings.confidence_threshold
                ),
                None => println!("Plate:      none"),
            }
            Ok(())
        }
        Commands::Devices { frames } => {
            let devices = FolderCamera::new(frames).video_inputs().await?;
            if devices.is_empty() {
                println!("No cameras found");
            }
            for device in devices {
                println!("{}\t{}", device.label, device.id);
            }
            Ok(())
        }
        Commands::Scan {
            frames,
            device,
            tuning,
            cycles,
            gateway,
        } => {
            let settings = tuning.apply(config.scan);
            let gateway = gateway.build(config.booking)?;
            let (tx, mut completed) = mpsc::unbounded_channel();

            let controller = ScanController::new(
                Arc::new(FolderCamera::new(frames)),
                Arc::new(TesseractOcr::new(config.ocr)),
                gateway,
                Arc::new(ConsoleObserver::new().with_cycle_channel(tx)),
                settings,
            );

            controller
                .start(device.as_deref())
                .await
                .context("Scanner failed to start")?;

            if settings.auto_capture {
                let mut done = 0;
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Interrupted");
                            break;
                        }
                        outcome = completed.recv() => {
                            if outcome.is_none() {
                                break;
                            }
                            done += 1;
                            if cycles.is_some_and(|n| done >= n) {
                                break;
                            }
                        }
                    }
                }
            } else {
                for _ in 0..cycles.unwrap_or(1) {
                    controller.capture_now().await?;
                }
            }

            controller.stop().await?;
            Ok(())
        }
    }
}
