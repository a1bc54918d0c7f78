use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::SharedState;
use crate::audio::{DeviceError, InputDevice};
use crate::error::{CaptureError, CaptureResult};

/// How the capture loop ended
#[derive(Debug)]
pub(crate) struct LoopOutcome {
    /// Payload bytes appended after the header placeholder
    pub bytes_written: u64,
    /// Device read error that ended the loop early, if any
    pub device_error: Option<DeviceError>,
}

/// Background half of a capture session
///
/// Owns the device and the output file while the session is recording.
pub(crate) struct CaptureLoop {
    pub device: Box<dyn InputDevice>,
    pub file: File,
    pub path: PathBuf,
    pub state: Arc<SharedState>,
    /// Published copy of the byte counter for status queries
    pub progress: Arc<AtomicU64>,
    pub buffer_size: usize,
}

impl CaptureLoop {
    /// Read from the device and append to the file until the session leaves `Recording`
    ///
    /// The device is stopped and released before this returns, on every path.
    pub fn run(self) -> CaptureResult<LoopOutcome> {
        let CaptureLoop {
            mut device,
            mut file,
            path,
            state,
            progress,
            buffer_size,
        } = self;

        info!(
            "Capture loop started on {} ({} byte buffer)",
            device.name(),
            buffer_size
        );

        let mut buf = vec![0u8; buffer_size];
        let mut bytes_written: u64 = 0;
        let mut device_error = None;

        let result = loop {
            if !state.is_recording() {
                break Ok(());
            }

            match device.read(&mut buf) {
                Ok(n) => {
                    // Stop may have been requested while the read was blocked
                    if !state.is_recording() {
                        debug!("Stop observed after read, dropping {} bytes", n);
                        break Ok(());
                    }
                    let n = n.min(buf.len());
                    if n == 0 {
                        continue;
                    }
                    if let Err(e) = file.write_all(&buf[..n]) {
                        break Err(CaptureError::io(&path, e));
                    }
                    bytes_written += n as u64;
                    progress.store(bytes_written, Ordering::SeqCst);
                }
                Err(DeviceError::EndOfStream) => {
                    info!("Input exhausted after {} bytes", bytes_written);
                    break Ok(());
                }
                Err(e) => {
                    warn!("Device read failed after {} bytes: {}", bytes_written, e);
                    device_error = Some(e);
                    break Ok(());
                }
            }
        };

        if let Err(e) = device.stop() {
            warn!("Failed to stop {}: {}", device.name(), e);
        }
        device.release();

        result?;
        file.flush().map_err(|e| CaptureError::io(&path, e))?;

        info!("Capture loop finished: {} bytes written", bytes_written);

        Ok(LoopOutcome {
            bytes_written,
            device_error,
        })
    }
}
