use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::device::{DeviceError, InputDevice};
use super::wav::{PcmFormat, WavHeader, HEADER_LEN};

/// A finished WAV recording, decoded with a standard WAV reader
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            samples,
        })
    }

    /// Payload size in bytes of the decoded samples
    pub fn data_len(&self) -> u64 {
        self.samples.len() as u64 * (self.bits_per_sample as u64 / 8)
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }

    /// Read and validate the raw 44-byte header of a WAV file
    pub fn read_header(path: impl AsRef<Path>) -> Result<WavHeader> {
        let path = path.as_ref();
        let mut bytes = [0u8; HEADER_LEN];

        File::open(path)
            .and_then(|mut f| f.read_exact(&mut bytes))
            .with_context(|| format!("Failed to read WAV header: {}", path.display()))?;

        Ok(WavHeader::decode(&bytes)?)
    }
}

/// Replays the PCM payload of a WAV file as an input device
///
/// Used for batch capture and for exercising the capture pipeline without a
/// microphone. When paced, reads are throttled to the file's real-time rate.
pub struct WavReplayDevice {
    path: PathBuf,
    name: String,
    reader: Option<WavReader<BufReader<File>>>,
    format: Option<PcmFormat>,
    started: bool,
    paced: bool,
}

impl WavReplayDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("replay:{}", path.display()),
            path,
            reader: None,
            format: None,
            started: false,
            paced: false,
        }
    }

    /// Throttle reads to real time
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }
}

impl InputDevice for WavReplayDevice {
    fn open(&mut self, format: PcmFormat) -> Result<(), DeviceError> {
        if self.reader.is_some() {
            return Err(DeviceError::Busy);
        }

        let reader = WavReader::open(&self.path).map_err(|e| match e {
            hound::Error::IoError(_) => DeviceError::NoDevice,
            other => DeviceError::UnsupportedFormat(other.to_string()),
        })?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
            return Err(DeviceError::UnsupportedFormat(format!(
                "{} holds {}-bit {:?} samples, replay needs 16-bit integer PCM",
                self.path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        let file_format = PcmFormat::new(spec.sample_rate, spec.channels, spec.bits_per_sample);
        if file_format != format {
            return Err(DeviceError::UnsupportedFormat(format!(
                "{} is {}Hz/{}ch/{}-bit, session wants {}Hz/{}ch/{}-bit",
                self.path.display(),
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample,
                format.sample_rate,
                format.channels,
                format.bits_per_sample
            )));
        }

        self.reader = Some(reader);
        self.format = Some(format);
        Ok(())
    }

    fn min_buffer_size(&self) -> Option<usize> {
        None
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        if self.reader.is_none() {
            return Err(DeviceError::NoDevice);
        }
        self.started = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if !self.started {
            return Err(DeviceError::Stream("replay not started".to_string()));
        }
        let reader = self.reader.as_mut().ok_or(DeviceError::NoDevice)?;

        let mut written = 0;
        for (slot, sample) in buf.chunks_exact_mut(2).zip(reader.samples::<i16>()) {
            let sample = sample.map_err(|e| DeviceError::Stream(e.to_string()))?;
            slot.copy_from_slice(&sample.to_le_bytes());
            written += 2;
        }

        if written == 0 && buf.len() >= 2 {
            return Err(DeviceError::EndOfStream);
        }

        if let (true, Some(format)) = (self.paced, self.format) {
            std::thread::sleep(Duration::from_secs_f64(format.duration_secs(written as u64)));
        }

        Ok(written)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.started = false;
        Ok(())
    }

    fn release(self: Box<Self>) {
        info!("Replay device released: {}", self.name);
    }

    fn name(&self) -> &str {
        &self.name
    }
}
