// Shared test doubles for capture tests
//
// `ScriptedDevice` plays back a fixed list of read results so tests can drive
// the capture loop through short reads, failures and blocked reads.

#![allow(dead_code)]

use hearme_recorder::audio::{DeviceError, InputDevice, PcmFormat};
use hearme_recorder::capture::CaptureSession;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// One scripted response to `read`
pub enum Step {
    /// Return these bytes
    Data(Vec<u8>),
    /// Return `Ok(0)`
    Empty,
    /// Fail the read
    Fail(DeviceError),
    /// Block until the test sends bytes (or drops the sender)
    Block(Receiver<Vec<u8>>),
}

/// Counters the test can inspect after the device has been moved into a session
#[derive(Default)]
pub struct DeviceCounters {
    pub opened: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub released: AtomicUsize,
    pub reads: AtomicUsize,
    pub last_buffer_len: AtomicUsize,
}

impl DeviceCounters {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct ScriptedDevice {
    steps: VecDeque<Step>,
    min_buffer_size: Option<usize>,
    open_error: Option<DeviceError>,
    open_gate: Option<Receiver<()>>,
    counters: Arc<DeviceCounters>,
}

impl ScriptedDevice {
    pub fn new(steps: Vec<Step>) -> (Self, Arc<DeviceCounters>) {
        let counters = Arc::new(DeviceCounters::default());
        let device = Self {
            steps: steps.into(),
            min_buffer_size: None,
            open_error: None,
            open_gate: None,
            counters: Arc::clone(&counters),
        };
        (device, counters)
    }

    pub fn with_min_buffer_size(mut self, size: usize) -> Self {
        self.min_buffer_size = Some(size);
        self
    }

    pub fn failing_open(mut self, error: DeviceError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Block `open` until the test signals (or drops the sender)
    pub fn gated_open(mut self, gate: Receiver<()>) -> Self {
        self.open_gate = Some(gate);
        self
    }

    pub fn boxed(self) -> Box<dyn InputDevice> {
        Box::new(self)
    }
}

impl InputDevice for ScriptedDevice {
    fn open(&mut self, _format: PcmFormat) -> Result<(), DeviceError> {
        if let Some(gate) = self.open_gate.take() {
            let _ = gate.recv();
        }
        if let Some(err) = self.open_error.take() {
            return Err(err);
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn min_buffer_size(&self) -> Option<usize> {
        self.min_buffer_size
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.counters.last_buffer_len.store(buf.len(), Ordering::SeqCst);

        let data = match self.steps.pop_front() {
            Some(Step::Data(data)) => data,
            Some(Step::Empty) => return Ok(0),
            Some(Step::Fail(err)) => return Err(err),
            Some(Step::Block(rx)) => rx.recv().map_err(|_| DeviceError::Disconnected)?,
            None => return Err(DeviceError::EndOfStream),
        };

        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(self: Box<Self>) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Split `total` bytes of `value` into reads of `chunk` bytes
pub fn data_steps(total: usize, chunk: usize, value: u8) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let n = remaining.min(chunk);
        steps.push(Step::Data(vec![value; n]));
        remaining -= n;
    }
    steps
}

/// Poll `condition` until it holds, panicking after a few seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}

/// Wait for the background capture loop to exit on its own
pub async fn wait_for_capture_end(session: &CaptureSession) {
    for _ in 0..1000 {
        if !session.get_stats().await.capture_active {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("capture loop did not exit");
}
