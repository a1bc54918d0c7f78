use std::path::PathBuf;
use thiserror::Error;

use super::wav::PcmFormat;

/// Errors reported by an input device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no input device available")]
    NoDevice,

    /// Microphone access was not granted
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("device is busy")]
    Busy,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("stream error: {0}")]
    Stream(String),

    /// The device returned an error code from a read
    #[error("read failed with code {0}")]
    Read(i32),

    #[error("device disconnected")]
    Disconnected,

    /// A finite source has no more samples
    #[error("end of input stream")]
    EndOfStream,
}

/// Pull-based raw PCM input device
///
/// Lifecycle: `open` → `start` → `read`* → `stop` → `release`.
/// `release` consumes the handle so a device can only be released once.
/// Reads block until samples are available and may return fewer bytes than
/// requested; `Ok(0)` means nothing was available this time around.
pub trait InputDevice: Send {
    /// Open the device for `format`
    fn open(&mut self, format: PcmFormat) -> Result<(), DeviceError>;

    /// Minimum read size in bytes, if the device can report one
    fn min_buffer_size(&self) -> Option<usize>;

    fn start(&mut self) -> Result<(), DeviceError>;

    /// Read raw little-endian PCM bytes into `buf`
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Release the device handle
    fn release(self: Box<Self>);

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Where captured audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Default system microphone
    Microphone,
    /// Replay the PCM payload of an existing WAV file
    File(PathBuf),
}

/// Create an (unopened) input device for `source`
pub fn input_device(source: &InputSource) -> Box<dyn InputDevice> {
    match source {
        InputSource::Microphone => Box::new(super::microphone::Microphone::new()),
        InputSource::File(path) => Box::new(super::file::WavReplayDevice::new(path.clone()).paced()),
    }
}
