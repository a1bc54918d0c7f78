//! Handing finished recordings to whoever consumes them

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::audio::PcmFormat;

/// A finalized WAV file with a valid header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedRecording {
    pub session_id: String,
    pub path: PathBuf,
    pub format: PcmFormat,
    /// Payload bytes after the 44-byte header
    pub data_len: u64,
    pub duration_secs: f64,
}

/// Receives the result of each capture session
#[async_trait::async_trait]
pub trait RecordingHandler: Send + Sync {
    /// A session was finalized
    async fn on_recorded(&self, recording: &FinishedRecording) -> Result<()>;

    /// A session was discarded; there is no output
    async fn on_cancelled(&self, session_id: &str) -> Result<()>;
}

/// Stores finished recordings under `<root>/reviews/<file name>`
pub struct ReviewUploader {
    root: PathBuf,
}

impl ReviewUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn reviews_dir(&self) -> PathBuf {
        self.root.join("reviews")
    }

    /// Where `recording` lands once uploaded
    pub fn destination(&self, recording: &FinishedRecording) -> Result<PathBuf> {
        let file_name = recording
            .path
            .file_name()
            .with_context(|| format!("Recording has no file name: {}", recording.path.display()))?;
        Ok(self.reviews_dir().join(file_name))
    }
}

#[async_trait::async_trait]
impl RecordingHandler for ReviewUploader {
    async fn on_recorded(&self, recording: &FinishedRecording) -> Result<()> {
        let destination = self.destination(recording)?;

        tokio::fs::create_dir_all(self.reviews_dir())
            .await
            .context("Failed to create reviews directory")?;

        let copied = tokio::fs::copy(&recording.path, &destination)
            .await
            .with_context(|| format!("Failed to upload {}", recording.path.display()))?;

        info!(
            "Uploaded recording {} to {} ({} bytes, {:.1}s)",
            recording.session_id,
            destination.display(),
            copied,
            recording.duration_secs
        );

        Ok(())
    }

    async fn on_cancelled(&self, session_id: &str) -> Result<()> {
        info!("Recording {} cancelled, nothing to upload", session_id);
        Ok(())
    }
}
