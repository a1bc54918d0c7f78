pub mod device;
pub mod file;
pub mod microphone;
pub mod wav;

pub use device::{input_device, DeviceError, InputDevice, InputSource};
pub use file::{AudioFile, WavReplayDevice};
pub use microphone::Microphone;
pub use wav::{encode_header, rewrite_header, PcmFormat, WavHeader, HEADER_LEN};
