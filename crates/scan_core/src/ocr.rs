//! OCR module
//!
//! Defines the OCR collaborator the controller talks to and a Tesseract
//! implementation (via leptess). Tesseract runs on its own worker thread;
//! loading the language data happens once, on first use, and the loaded
//! engine is reused for every later frame.

use crate::types::RawOcrResult;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::GrayImage;
use leptess::{LepTess, Variable};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, info};

/// Text recognizer used by the scan controller
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// One-time setup (language load). Safe to call repeatedly.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Recognize the text in a grayscale frame
    async fn recognize(&self, image: &GrayImage) -> Result<RawOcrResult>;
}

/// Tesseract settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// tessdata directory; `None` uses Tesseract's default lookup
    pub data_path: Option<String>,
    /// Language code (default: eng)
    pub language: String,
    /// Characters Tesseract may emit; `None` disables the whitelist
    pub char_whitelist: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            language: "eng".to_string(),
            char_whitelist: Some("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ".to_string()),
        }
    }
}

struct OcrJob {
    png: Vec<u8>,
    reply: oneshot::Sender<Result<RawOcrResult>>,
}

/// Tesseract-backed [`OcrEngine`]
pub struct TesseractOcr {
    config: OcrConfig,
    worker: OnceCell<mpsc::Sender<OcrJob>>,
}

impl TesseractOcr {
    /// Create an engine; nothing is loaded until the first `init`/`recognize`
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            worker: OnceCell::new(),
        }
    }

    async fn worker(&self) -> Result<&mpsc::Sender<OcrJob>> {
        self.worker
            .get_or_try_init(|| spawn_worker(self.config.clone()))
            .await
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new(OcrConfig::default())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn init(&self) -> Result<()> {
        self.worker().await.map(|_| ())
    }

    async fn recognize(&self, image: &GrayImage) -> Result<RawOcrResult> {
        let worker = self.worker().await?;

        // leptess takes encoded image data, not raw pixels
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .context("Failed to encode frame as PNG")?;

        let (reply, response) = oneshot::channel();
        worker
            .send(OcrJob { png, reply })
            .map_err(|_| anyhow!("Tesseract worker has stopped"))?;

        response
            .await
            .context("Tesseract worker dropped the request")?
    }
}

async fn spawn_worker(config: OcrConfig) -> Result<mpsc::Sender<OcrJob>> {
    let (jobs, queue) = mpsc::channel::<OcrJob>();
    let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

    std::thread::Builder::new()
        .name("tesseract".to_string())
        .spawn(move || {
            let mut tesseract = match init_tesseract(&config) {
                Ok(tesseract) => {
                    let _ = ready_tx.send(Ok(()));
                    tesseract
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while let Ok(job) = queue.recv() {
                let _ = job.reply.send(recognize_png(&mut tesseract, &job.png));
            }
            debug!("Tesseract worker exiting");
        })
        .context("Failed to spawn Tesseract worker thread")?;

    ready_rx
        .await
        .context("Tesseract worker exited during startup")??;

    info!("Tesseract ready");
    Ok(jobs)
}

fn init_tesseract(config: &OcrConfig) -> Result<LepTess> {
    let mut tesseract = LepTess::new(config.data_path.as_deref(), &config.language)
        .context("Failed to initialize Tesseract. Is Tesseract installed?")?;

    if let Some(whitelist) = &config.char_whitelist {
        tesseract
            .set_variable(Variable::TesseditCharWhitelist, whitelist)
            .map_err(|_| anyhow!("Failed to set Tesseract character whitelist"))?;
    }

    Ok(tesseract)
}

/// Run Tesseract over PNG bytes and report text plus mean confidence
fn recognize_png(tesseract: &mut LepTess, png: &[u8]) -> Result<RawOcrResult> {
    tesseract
        .set_image_from_mem(png)
        .context("Failed to load image into Tesseract")?;

    let text = tesseract
        .get_utf8_text()
        .context("Failed to extract text from image")?;
    let confidence = tesseract.mean_text_conf().clamp(0, 100) as f32;

    Ok(RawOcrResult { text, confidence })
}
