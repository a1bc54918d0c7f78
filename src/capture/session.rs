use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::capture_loop::{CaptureLoop, LoopOutcome};
use super::config::SessionConfig;
use super::handoff::FinishedRecording;
use super::state::{SessionState, SharedState};
use super::stats::SessionStats;
use crate::audio::{wav, InputDevice, PcmFormat};
use crate::error::{CaptureError, CaptureResult};

type CaptureTask = JoinHandle<CaptureResult<LoopOutcome>>;

/// One recording attempt: microphone → WAV file
///
/// `start` hands the device to a background capture loop; `finish` or `cancel`
/// may be called from any task and stop it.
pub struct CaptureSession {
    /// Session configuration
    config: SessionConfig,

    /// When the session was created
    created_at: DateTime<Utc>,

    /// Lifecycle state, read by the capture loop after every device read
    state: Arc<SharedState>,

    /// Payload bytes written so far, published by the capture loop
    bytes_written: Arc<AtomicU64>,

    /// Set while the capture loop owns the device, cleared when it exits
    capture_active: Arc<AtomicBool>,

    /// Handle for the capture loop
    capture_task: Mutex<Option<CaptureTask>>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Self {
        info!(
            "Creating capture session: {} -> {}",
            config.session_id,
            config.output_path.display()
        );

        Self {
            config,
            created_at: Utc::now(),
            state: Arc::new(SharedState::new(SessionState::Idle)),
            bytes_written: Arc::new(AtomicU64::new(0)),
            capture_active: Arc::new(AtomicBool::new(false)),
            capture_task: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn output_path(&self) -> &Path {
        &self.config.output_path
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Open `device`, reserve the header and start capturing in the background
    ///
    /// Microphone permission must already be granted; a device that is refused
    /// access fails to open. If the device cannot be opened no file is created.
    /// Opening and starting the device run on the blocking pool.
    pub async fn start(&self, device: Box<dyn InputDevice>) -> CaptureResult<()> {
        let mut task = self.capture_task.lock().await;

        let current = self.state.load();
        if current != SessionState::Idle {
            return Err(CaptureError::InvalidState {
                expected: SessionState::Idle,
                actual: current,
            });
        }

        let format = self.config.format;
        format.validate()?;
        let path = self.config.output_path.clone();

        info!(
            "Starting capture session {} on {} ({}Hz, {} channels, {}-bit)",
            self.config.session_id,
            device.name(),
            format.sample_rate,
            format.channels,
            format.bits_per_sample
        );

        let (device, file) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || prepare_capture(device, format, &path))
                .await
                .map_err(|e| CaptureError::TaskFailed(e.to_string()))??
        };

        let buffer_size = device
            .min_buffer_size()
            .filter(|&size| size > 0)
            .unwrap_or_else(|| format.fallback_buffer_size());

        self.bytes_written.store(0, Ordering::SeqCst);
        self.capture_active.store(true, Ordering::SeqCst);
        self.state.set(SessionState::Recording);

        let capture_loop = CaptureLoop {
            device,
            file,
            path,
            state: Arc::clone(&self.state),
            progress: Arc::clone(&self.bytes_written),
            buffer_size,
        };
        let active = Arc::clone(&self.capture_active);
        *task = Some(tokio::task::spawn_blocking(move || {
            let outcome = capture_loop.run();
            active.store(false, Ordering::SeqCst);
            outcome
        }));

        info!("Capture session {} recording", self.config.session_id);

        Ok(())
    }

    /// Stop capturing and write the final WAV header
    ///
    /// The recording is returned only once the header is on disk.
    pub async fn finish(&self) -> CaptureResult<FinishedRecording> {
        self.state
            .transition(SessionState::Recording, SessionState::Finalizing)
            .map_err(|actual| CaptureError::InvalidState {
                expected: SessionState::Recording,
                actual,
            })?;

        // `start` holds this lock until the loop handle is stored
        let mut task = self.capture_task.lock().await;

        info!("Finalizing capture session: {}", self.config.session_id);

        let outcome = match join_capture(task.take()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Capture session {} failed: {}", self.config.session_id, e);
                self.state.set(SessionState::Failed);
                return Err(e);
            }
        };

        if let Some(device_error) = &outcome.device_error {
            warn!(
                "Finalizing {} with {} bytes captured before device error: {}",
                self.config.session_id, outcome.bytes_written, device_error
            );
        }

        match self.write_final_header(outcome.bytes_written) {
            Ok(recording) => {
                self.state.set(SessionState::Completed);
                info!(
                    "Capture session {} completed: {} ({} bytes, {:.1}s)",
                    recording.session_id,
                    recording.path.display(),
                    recording.data_len,
                    recording.duration_secs
                );
                Ok(recording)
            }
            Err(e) => {
                error!("Failed to finalize {}: {}", self.config.session_id, e);
                self.state.set(SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Stop capturing and delete the output file
    pub async fn cancel(&self) -> CaptureResult<()> {
        self.state
            .transition(SessionState::Recording, SessionState::Cancelled)
            .map_err(|actual| CaptureError::InvalidState {
                expected: SessionState::Recording,
                actual,
            })?;

        // `start` holds this lock until the loop handle is stored
        let mut task = self.capture_task.lock().await;

        info!("Cancelling capture session: {}", self.config.session_id);

        if let Err(e) = join_capture(task.take()).await {
            warn!(
                "Capture loop for {} ended with error: {}",
                self.config.session_id, e
            );
        }

        remove_output(&self.config.output_path)?;

        info!("Capture session {} cancelled", self.config.session_id);

        Ok(())
    }

    /// Get current session statistics
    ///
    /// Never waits on the capture loop, so it answers while `finish` or
    /// `cancel` are joining a blocked read.
    pub async fn get_stats(&self) -> SessionStats {
        let capture_active = self.capture_active.load(Ordering::SeqCst);
        let bytes_written = self.bytes_written.load(Ordering::SeqCst);

        SessionStats {
            session_id: self.config.session_id.clone(),
            state: self.state.load(),
            created_at: self.created_at,
            output_path: self.config.output_path.clone(),
            format: self.config.format,
            bytes_written,
            duration_secs: self.config.format.duration_secs(bytes_written),
            capture_active,
        }
    }

    /// Header is derived from the file length; the loop's count must agree with it
    fn write_final_header(&self, counted: u64) -> CaptureResult<FinishedRecording> {
        let path = &self.config.output_path;
        let format = self.config.format;

        let on_disk = wav::payload_len(path)?;
        if on_disk != counted {
            return Err(CaptureError::LengthMismatch { counted, on_disk });
        }

        wav::write_header(path, on_disk, format)?;

        Ok(FinishedRecording {
            session_id: self.config.session_id.clone(),
            path: path.clone(),
            format,
            data_len: on_disk,
            duration_secs: format.duration_secs(on_disk),
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Let an orphaned loop exit and release its device
        if self
            .state
            .transition(SessionState::Recording, SessionState::Cancelled)
            .is_ok()
        {
            warn!(
                "Capture session {} dropped while recording; output left at {}",
                self.config.session_id,
                self.config.output_path.display()
            );
        }
    }
}

async fn join_capture(task: Option<CaptureTask>) -> CaptureResult<LoopOutcome> {
    let task = task.ok_or_else(|| CaptureError::TaskFailed("capture loop not running".to_string()))?;

    task.await
        .map_err(|e| CaptureError::TaskFailed(e.to_string()))?
}

/// Open and start `device` and reserve the output file
///
/// On failure the device is released and no output is left behind.
fn prepare_capture(
    mut device: Box<dyn InputDevice>,
    format: PcmFormat,
    path: &Path,
) -> CaptureResult<(Box<dyn InputDevice>, File)> {
    device.open(format).map_err(CaptureError::DeviceOpen)?;

    let file = match create_output(path) {
        Ok(file) => file,
        Err(e) => {
            device.release();
            return Err(e);
        }
    };

    if let Err(e) = device.start() {
        device.release();
        if let Err(remove_err) = remove_output(path) {
            warn!("Failed to remove {}: {}", path.display(), remove_err);
        }
        return Err(CaptureError::DeviceStart(e));
    }

    Ok((device, file))
}

/// Create or truncate the output file and reserve the header
fn create_output(path: &Path) -> CaptureResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CaptureError::io(parent, e))?;
    }

    let mut file = File::create(path).map_err(|e| CaptureError::io(path, e))?;
    wav::write_placeholder(&mut file).map_err(|e| CaptureError::io(path, e))?;

    Ok(file)
}

fn remove_output(path: &Path) -> CaptureResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CaptureError::io(path, e)),
    }
}
