use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::audio::DeviceError;
use crate::capture::SessionState;

/// Errors raised by a capture session
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The input device could not be opened; no output file was created
    #[error("failed to open input device: {0}")]
    DeviceOpen(#[source] DeviceError),

    /// The input device opened but refused to start
    #[error("failed to start input device: {0}")]
    DeviceStart(#[source] DeviceError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// Payload size on disk disagrees with the bytes counted by the capture loop
    #[error("payload length mismatch: capture loop counted {counted} bytes, file holds {on_disk}")]
    LengthMismatch { counted: u64, on_disk: u64 },

    #[error("payload of {0} bytes does not fit in a RIFF header")]
    PayloadTooLarge(u64),

    #[error("unsupported PCM format: {0}")]
    UnsupportedFormat(String),

    /// Session ids name the output file and may only use `[A-Za-z0-9_-]`
    #[error("invalid session id {0:?}")]
    InvalidSessionId(String),

    #[error("invalid WAV header: {0}")]
    InvalidHeader(String),

    #[error("capture task failed: {0}")]
    TaskFailed(String),
}

impl CaptureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
