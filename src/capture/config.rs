use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::PcmFormat;
use crate::error::{CaptureError, CaptureResult};

const MAX_SESSION_ID_LEN: usize = 128;

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "review-6f1c...")
    pub session_id: String,

    /// PCM format, fixed for the whole session
    /// Default: 16kHz mono 16-bit
    pub format: PcmFormat,

    /// Destination WAV file, created (or truncated) when capture starts
    pub output_path: PathBuf,
}

impl SessionConfig {
    pub fn new(session_id: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            format: PcmFormat::SPEECH,
            output_path: output_path.into(),
        }
    }

    /// Session with a generated id writing `<dir>/<session_id>.wav`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let session_id = generate_session_id();
        let output_path = dir.as_ref().join(format!("{}.wav", session_id));
        Self::new(session_id, output_path)
    }

    /// Session writing `<dir>/<session_id>.wav` for a caller-chosen id
    ///
    /// The id becomes a file name, so it must pass `validate_session_id`.
    pub fn for_session(dir: impl AsRef<Path>, session_id: impl Into<String>) -> CaptureResult<Self> {
        let session_id = session_id.into();
        validate_session_id(&session_id)?;

        let output_path = dir.as_ref().join(format!("{}.wav", session_id));
        Ok(Self::new(session_id, output_path))
    }

    pub fn with_format(mut self, format: PcmFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::in_dir("recordings")
    }
}

pub fn generate_session_id() -> String {
    format!("review-{}", uuid::Uuid::new_v4())
}

/// Accept ids of 1 to 128 characters from `[A-Za-z0-9_-]`
pub fn validate_session_id(session_id: &str) -> CaptureResult<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(CaptureError::InvalidSessionId(session_id.to_string()))
    }
}
