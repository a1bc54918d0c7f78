use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::state::SessionState;
use crate::audio::PcmFormat;

/// Snapshot of a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: SessionState,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    pub output_path: PathBuf,

    pub format: PcmFormat,

    /// Payload bytes written so far (header excluded)
    pub bytes_written: u64,

    /// Captured audio duration in seconds
    pub duration_secs: f64,

    /// Whether the background capture loop is still running
    pub capture_active: bool,
}
