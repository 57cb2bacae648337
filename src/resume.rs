//! Resume text extraction
//!
//! Binary PDF in, concatenated page text out. The default extractor shells
//! out to poppler's `pdftotext`, streaming the document through stdin.

use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Leading bytes of every PDF file
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Default time allowed for one extraction
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait ResumeTextExtractor: Send + Sync {
    /// Text of every page, in order, separated by newlines.
    ///
    /// Any failure is reported as [`BrowserError::ExtractionUnavailable`].
    async fn extract_text(&self, pdf: &[u8]) -> Result<String>;
}

/// Configuration for the `pdftotext` subprocess
#[derive(Debug, Clone)]
pub struct PdftotextConfig {
    /// Path to the executable (or "pdftotext" if in PATH)
    pub executable: String,
    pub timeout: Duration,
    /// Keep the physical layout instead of reading order
    pub layout: bool,
}

impl Default for PdftotextConfig {
    fn default() -> Self {
        Self { executable: "pdftotext".to_string(), timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS), layout: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PdftotextExtractor {
    config: PdftotextConfig,
}

impl PdftotextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PdftotextConfig) -> Self {
        Self { config }
    }

    /// Check that the executable can be started
    pub async fn check_installation(&self) -> Result<String> {
        let output = Command::new(&self.config.executable)
            .arg("-v")
            .output()
            .await
            .map_err(|e| unavailable(format!("{} not found: {}", self.config.executable, e)))?;
        // pdftotext prints its version banner on stderr
        let banner = String::from_utf8_lossy(&output.stderr);
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn run(&self, pdf: &[u8]) -> Result<String> {
        let mut cmd = Command::new(&self.config.executable);
        if self.config.layout {
            cmd.arg("-layout");
        }
        cmd.arg("-enc")
            .arg("UTF-8")
            .arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("Running {:?} on {} bytes", cmd, pdf.len());
        let mut child =
            cmd.spawn().map_err(|e| unavailable(format!("failed to start {}: {}", self.config.executable, e)))?;

        let mut stdin = child.stdin.take().ok_or_else(|| unavailable("stdin not captured".to_string()))?;
        let payload = pdf.to_vec();
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        });

        let output = child.wait_with_output().await.map_err(|e| unavailable(e.to_string()))?;
        if let Ok(Err(e)) = writer.await {
            log::debug!("pdftotext closed stdin early: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("pdftotext exited with {:?}: {}", output.status.code(), stderr.trim());
            return Err(unavailable(format!("pdftotext failed: {}", stderr.trim())));
        }

        Ok(join_pages(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl ResumeTextExtractor for PdftotextExtractor {
    async fn extract_text(&self, pdf: &[u8]) -> Result<String> {
        if !pdf.starts_with(PDF_MAGIC) {
            return Err(unavailable("payload is not a PDF document".to_string()));
        }
        tokio::time::timeout(self.config.timeout, self.run(pdf))
            .await
            .map_err(|_| unavailable(format!("pdftotext timed out after {}s", self.config.timeout.as_secs())))?
    }
}

fn unavailable(reason: String) -> BrowserError {
    BrowserError::ExtractionUnavailable(reason)
}

/// Pages come back separated by form feeds
fn join_pages(raw: &str) -> String {
    raw.split('\u{c}')
        .map(str::trim_end)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
