//! Capture session management
//!
//! This module provides the `CaptureSession` abstraction that manages:
//! - Raw PCM capture from an input device on a background task
//! - Streaming the payload to disk behind a reserved WAV header
//! - Finalizing (header patch) or cancelling (file removal)
//! - Handing finished recordings to a `RecordingHandler`

mod capture_loop;
mod config;
mod handoff;
mod session;
mod state;
mod stats;

pub use config::{generate_session_id, validate_session_id, SessionConfig};
pub use handoff::{FinishedRecording, RecordingHandler, ReviewUploader};
pub use session::CaptureSession;
pub use state::{SessionState, SharedState};
pub use stats::SessionStats;
