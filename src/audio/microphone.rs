//! Microphone input using cpal
//!
//! cpal delivers samples through a push callback and its `Stream` is not `Send`,
//! so the stream lives on its own thread. The callback converts samples to
//! little-endian 16-bit PCM and forwards them over a channel; `read` pulls from
//! that channel, which gives the capture loop the blocking pull-based read it
//! expects.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::device::{DeviceError, InputDevice};
use super::wav::PcmFormat;

/// How long a read waits for the callback before returning a zero-length read
const READ_POLL: Duration = Duration::from_millis(100);

enum StreamCommand {
    Play(Sender<Result<(), DeviceError>>),
    Pause,
    Shutdown,
}

struct StreamInfo {
    name: String,
    min_buffer_size: Option<usize>,
}

/// Default system microphone
pub struct Microphone {
    name: String,
    min_buffer_size: Option<usize>,
    samples_rx: Option<Receiver<Vec<u8>>>,
    pending: VecDeque<u8>,
    control_tx: Option<Sender<StreamCommand>>,
    stream_thread: Option<JoinHandle<()>>,
    capturing: Arc<AtomicBool>,
}

impl Microphone {
    pub fn new() -> Self {
        Self {
            name: "microphone".to_string(),
            min_buffer_size: None,
            samples_rx: None,
            pending: VecDeque::new(),
            control_tx: None,
            stream_thread: None,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Names of the available input devices
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    fn shutdown(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(control_tx) = self.control_tx.take() {
            let _ = control_tx.send(StreamCommand::Shutdown);
        }
        if let Some(thread) = self.stream_thread.take() {
            if thread.join().is_err() {
                error!("Microphone stream thread panicked");
            }
        }
        self.samples_rx = None;
        self.pending.clear();
    }
}

impl Default for Microphone {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDevice for Microphone {
    fn open(&mut self, format: PcmFormat) -> Result<(), DeviceError> {
        if self.control_tx.is_some() {
            return Err(DeviceError::Busy);
        }
        if format.bits_per_sample != 16 {
            return Err(DeviceError::UnsupportedFormat(format!(
                "{}-bit samples",
                format.bits_per_sample
            )));
        }

        let (samples_tx, samples_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let capturing = Arc::clone(&self.capturing);

        let thread = std::thread::Builder::new()
            .name("microphone-stream".to_string())
            .spawn(move || run_stream(format, samples_tx, control_rx, ready_tx, capturing))
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let info = match ready_rx.recv() {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(DeviceError::Disconnected);
            }
        };

        info!(
            "Microphone opened: {} ({}Hz, {} channels, min buffer {:?} bytes)",
            info.name, format.sample_rate, format.channels, info.min_buffer_size
        );

        self.name = info.name;
        self.min_buffer_size = info.min_buffer_size;
        self.samples_rx = Some(samples_rx);
        self.control_tx = Some(control_tx);
        self.stream_thread = Some(thread);

        Ok(())
    }

    fn min_buffer_size(&self) -> Option<usize> {
        self.min_buffer_size
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        let control_tx = self.control_tx.as_ref().ok_or(DeviceError::NoDevice)?;
        let (reply_tx, reply_rx) = mpsc::channel();

        self.capturing.store(true, Ordering::SeqCst);
        control_tx
            .send(StreamCommand::Play(reply_tx))
            .map_err(|_| DeviceError::Disconnected)?;

        let result = reply_rx.recv().map_err(|_| DeviceError::Disconnected)?;
        if result.is_err() {
            self.capturing.store(false, Ordering::SeqCst);
        }
        result
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let samples_rx = self.samples_rx.as_ref().ok_or(DeviceError::NoDevice)?;

        if self.pending.is_empty() {
            match samples_rx.recv_timeout(READ_POLL) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(DeviceError::Disconnected),
            }
        }

        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }

        Ok(n)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(control_tx) = &self.control_tx {
            control_tx
                .send(StreamCommand::Pause)
                .map_err(|_| DeviceError::Disconnected)?;
        }

        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.shutdown();
        info!("Microphone released: {}", self.name);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        if self.stream_thread.is_some() {
            warn!("Microphone dropped without release");
            self.shutdown();
        }
    }
}

/// Owns the cpal stream for its whole lifetime
fn run_stream(
    format: PcmFormat,
    samples_tx: Sender<Vec<u8>>,
    control_rx: Receiver<StreamCommand>,
    ready_tx: Sender<Result<StreamInfo, DeviceError>>,
    capturing: Arc<AtomicBool>,
) {
    let (stream, info) = match build_stream(format, samples_tx, capturing) {
        Ok(built) => built,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(info)).is_err() {
        return;
    }

    while let Ok(command) = control_rx.recv() {
        match command {
            StreamCommand::Play(reply_tx) => {
                let result = stream.play().map_err(|e| DeviceError::Stream(e.to_string()));
                let _ = reply_tx.send(result);
            }
            StreamCommand::Pause => {
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause microphone stream: {}", e);
                }
            }
            StreamCommand::Shutdown => break,
        }
    }

    debug!("Microphone stream thread exiting");
}

fn build_stream(
    format: PcmFormat,
    samples_tx: Sender<Vec<u8>>,
    capturing: Arc<AtomicBool>,
) -> Result<(cpal::Stream, StreamInfo), DeviceError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(DeviceError::NoDevice)?;
    let name = device.name().unwrap_or_else(|_| "microphone".to_string());

    let supported = device
        .supported_input_configs()
        .map_err(|e| DeviceError::Stream(e.to_string()))?
        .filter(|range| {
            range.channels() == format.channels
                && range.min_sample_rate().0 <= format.sample_rate
                && range.max_sample_rate().0 >= format.sample_rate
                && matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32)
        })
        // Prefer native 16-bit over converting from float
        .min_by_key(|range| range.sample_format() != SampleFormat::I16)
        .ok_or_else(|| {
            DeviceError::UnsupportedFormat(format!(
                "{} does not capture {}Hz with {} channels",
                name, format.sample_rate, format.channels
            ))
        })?;

    let min_buffer_size = match supported.buffer_size() {
        SupportedBufferSize::Range { min, .. } if *min > 0 => {
            Some(*min as usize * format.block_align() as usize)
        }
        _ => None,
    };

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let on_error = |err: cpal::StreamError| error!("Microphone stream error: {}", err);

    let stream = match supported.sample_format() {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if capturing.load(Ordering::SeqCst) {
                    let bytes = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                    let _ = samples_tx.send(bytes);
                }
            },
            on_error,
            None,
        ),
        _ => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if capturing.load(Ordering::SeqCst) {
                    let bytes = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .flat_map(|s| s.to_le_bytes())
                        .collect();
                    let _ = samples_tx.send(bytes);
                }
            },
            on_error,
            None,
        ),
    }
    .map_err(|e| match e {
        BuildStreamError::DeviceNotAvailable => DeviceError::NoDevice,
        BuildStreamError::StreamConfigNotSupported => {
            DeviceError::UnsupportedFormat(format!("{:?}", config))
        }
        other => DeviceError::Stream(other.to_string()),
    })?;

    Ok((
        stream,
        StreamInfo {
            name,
            min_buffer_size,
        },
    ))
}
