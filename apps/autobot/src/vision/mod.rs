//! Image-to-text capability, used when a form control has no readable label.
//!
//! The production backend pipes a screenshot into the `tesseract` binary
//! (`tesseract stdin stdout`). Results are best-effort and may be empty.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const DEFAULT_BINARY: &str = "tesseract";
/// Page segmentation mode 6: assume a single uniform block of text.
const DEFAULT_PSM: u8 = 6;
const OCR_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Failed to run OCR backend: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR backend failed: {0}")]
    Backend(String),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ImageToText: Send + Sync {
    async fn read_text(&self, image: &[u8]) -> Result<String, VisionError>;
}

/// Tesseract OCR via its command-line interface.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    psm: u8,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            psm: DEFAULT_PSM,
        }
    }

    async fn run(&self, image: &[u8]) -> Result<String, VisionError> {
        let mut child = Command::new(&self.binary)
            .arg("stdin")
            .arg("stdout")
            .arg("--psm")
            .arg(self.psm.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisionError::Backend(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

#[async_trait]
impl ImageToText for TesseractOcr {
    async fn read_text(&self, image: &[u8]) -> Result<String, VisionError> {
        let text = tokio::time::timeout(OCR_TIMEOUT, self.run(image))
            .await
            .map_err(|_| VisionError::Timeout(OCR_TIMEOUT))??;
        debug!(text_length = text.len(), "OCR completed");
        Ok(text)
    }
}
