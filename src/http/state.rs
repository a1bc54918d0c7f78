use crate::audio::{input_device, InputDevice, InputSource, PcmFormat};
use crate::capture::{CaptureSession, RecordingHandler};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds the input device for a new session
pub type DeviceFactory = Arc<dyn Fn(&InputSource) -> Box<dyn InputDevice> + Send + Sync>;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active capture sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<CaptureSession>>>>,

    /// Directory new recordings are written to
    pub recordings_dir: PathBuf,

    /// Format every new session captures in
    pub format: PcmFormat,

    /// Receives finished and cancelled recordings
    pub handler: Arc<dyn RecordingHandler>,

    pub device_factory: DeviceFactory,
}

impl AppState {
    pub fn new(
        recordings_dir: impl Into<PathBuf>,
        format: PcmFormat,
        handler: Arc<dyn RecordingHandler>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            recordings_dir: recordings_dir.into(),
            format,
            handler,
            device_factory: Arc::new(input_device),
        }
    }

    pub fn with_device_factory(mut self, device_factory: DeviceFactory) -> Self {
        self.device_factory = device_factory;
        self
    }
}
