pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod http;

pub use audio::{
    encode_header, input_device, rewrite_header, AudioFile, DeviceError, InputDevice, InputSource,
    Microphone, PcmFormat, WavHeader, WavReplayDevice, HEADER_LEN,
};
pub use capture::{
    CaptureSession, FinishedRecording, RecordingHandler, ReviewUploader, SessionConfig,
    SessionState, SessionStats,
};
pub use config::Config;
pub use error::{CaptureError, CaptureResult};
pub use http::{create_router, AppState};
