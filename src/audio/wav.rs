//! Canonical 44-byte RIFF/WAVE header for linear PCM
//!
//! Capture writes a zeroed placeholder of `HEADER_LEN` bytes, streams the payload
//! after it, and patches the real header in place once the payload size is known.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{CaptureError, CaptureResult};

/// Size of the canonical PCM WAV header
pub const HEADER_LEN: usize = 44;

/// Bytes counted by ChunkSize beyond the data payload
const RIFF_OVERHEAD: u32 = 36;

/// Largest payload a RIFF header can describe
pub const MAX_DATA_LEN: u64 = (u32::MAX - RIFF_OVERHEAD) as u64;

const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_SIZE: u32 = 16;

/// Sample width the capture pipeline records
const SAMPLE_BITS: u16 = 16;

/// Linear PCM stream parameters, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono)
    pub channels: u16,
    /// Bits per sample (16 for linear PCM)
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 16kHz mono 16-bit, what the review recorder captures
    pub const SPEECH: PcmFormat = PcmFormat {
        sample_rate: 16000,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Reject formats the capture pipeline cannot record or describe in a header
    ///
    /// Only 16-bit linear PCM is captured; the derived header fields must fit
    /// their 32- and 16-bit slots.
    pub fn validate(&self) -> CaptureResult<()> {
        let unsupported =
            |reason: String| -> CaptureResult<()> { Err(CaptureError::UnsupportedFormat(reason)) };

        if self.sample_rate == 0 {
            return unsupported("sample rate must be non-zero".to_string());
        }
        if self.channels == 0 {
            return unsupported("channel count must be non-zero".to_string());
        }
        if self.bits_per_sample != SAMPLE_BITS {
            return unsupported(format!(
                "{}-bit samples, only {}-bit PCM is captured",
                self.bits_per_sample, SAMPLE_BITS
            ));
        }
        if self.checked_byte_rate().is_none() || self.checked_block_align().is_none() {
            return unsupported(format!(
                "{}Hz x {} channels overflows the header byte rate",
                self.sample_rate, self.channels
            ));
        }

        Ok(())
    }

    pub fn checked_byte_rate(&self) -> Option<u32> {
        self.sample_rate
            .checked_mul(self.channels as u32)?
            .checked_mul(self.bits_per_sample as u32 / 8)
    }

    pub fn checked_block_align(&self) -> Option<u16> {
        self.channels.checked_mul(self.bits_per_sample / 8)
    }

    /// Saturates on formats that fail `validate`
    pub fn byte_rate(&self) -> u32 {
        self.checked_byte_rate().unwrap_or(u32::MAX)
    }

    /// Saturates on formats that fail `validate`
    pub fn block_align(&self) -> u16 {
        self.checked_block_align().unwrap_or(u16::MAX)
    }

    /// Read buffer size used when a device cannot report its minimum
    pub fn fallback_buffer_size(&self) -> usize {
        self.sample_rate as usize * 2
    }

    /// Playback duration of `data_len` payload bytes
    pub fn duration_secs(&self, data_len: u64) -> f64 {
        match self.byte_rate() {
            0 => 0.0,
            rate => data_len as f64 / rate as f64,
        }
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::SPEECH
    }
}

/// Decoded view of a canonical PCM WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// RIFF ChunkSize (payload + 36)
    pub chunk_size: u32,
    pub audio_format: u16,
    pub format: PcmFormat,
    pub byte_rate: u32,
    pub block_align: u16,
    /// data Subchunk2Size
    pub data_len: u32,
}

impl WavHeader {
    /// Build the header describing `data_len` payload bytes
    pub fn for_payload(data_len: u64, format: PcmFormat) -> CaptureResult<Self> {
        format.validate()?;
        if data_len > MAX_DATA_LEN {
            return Err(CaptureError::PayloadTooLarge(data_len));
        }
        let data_len = data_len as u32;

        Ok(Self {
            chunk_size: data_len + RIFF_OVERHEAD,
            audio_format: PCM_FORMAT_TAG,
            format,
            byte_rate: format.byte_rate(),
            block_align: format.block_align(),
            data_len,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(b"RIFF");
        buf[4..8].copy_from_slice(&self.chunk_size.to_le_bytes());
        buf[8..12].copy_from_slice(b"WAVE");
        buf[12..16].copy_from_slice(b"fmt ");
        buf[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
        buf[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        buf[22..24].copy_from_slice(&self.format.channels.to_le_bytes());
        buf[24..28].copy_from_slice(&self.format.sample_rate.to_le_bytes());
        buf[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        buf[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        buf[34..36].copy_from_slice(&self.format.bits_per_sample.to_le_bytes());
        buf[36..40].copy_from_slice(b"data");
        buf[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        buf
    }

    /// Parse and validate a canonical 44-byte PCM header
    pub fn decode(bytes: &[u8]) -> CaptureResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CaptureError::InvalidHeader(format!(
                "expected {} bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let tag = |range: std::ops::Range<usize>, expected: &[u8; 4]| -> CaptureResult<()> {
            if &bytes[range.clone()] != expected {
                return Err(CaptureError::InvalidHeader(format!(
                    "expected {:?} at offset {}",
                    String::from_utf8_lossy(expected),
                    range.start
                )));
            }
            Ok(())
        };
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        tag(0..4, b"RIFF")?;
        tag(8..12, b"WAVE")?;
        tag(12..16, b"fmt ")?;
        tag(36..40, b"data")?;

        let fmt_size = u32_at(16);
        if fmt_size != FMT_CHUNK_SIZE {
            return Err(CaptureError::InvalidHeader(format!(
                "fmt chunk size {} is not {}",
                fmt_size, FMT_CHUNK_SIZE
            )));
        }

        let audio_format = u16_at(20);
        if audio_format != PCM_FORMAT_TAG {
            return Err(CaptureError::InvalidHeader(format!(
                "audio format {} is not PCM",
                audio_format
            )));
        }

        let header = Self {
            chunk_size: u32_at(4),
            audio_format,
            format: PcmFormat {
                channels: u16_at(22),
                sample_rate: u32_at(24),
                bits_per_sample: u16_at(34),
            },
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            data_len: u32_at(40),
        };

        if header.chunk_size != header.data_len.wrapping_add(RIFF_OVERHEAD) {
            return Err(CaptureError::InvalidHeader(format!(
                "chunk size {} disagrees with data size {}",
                header.chunk_size, header.data_len
            )));
        }

        Ok(header)
    }
}

/// Encode the header for `data_len` payload bytes
///
/// Pure: the same inputs always produce the same 44 bytes.
pub fn encode_header(data_len: u64, format: PcmFormat) -> CaptureResult<[u8; HEADER_LEN]> {
    Ok(WavHeader::for_payload(data_len, format)?.encode())
}

/// Reserve header space at the start of a fresh output stream
pub fn write_placeholder<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(&[0u8; HEADER_LEN])
}

/// Payload length implied by the file size (`len - 44`)
pub fn payload_len(path: impl AsRef<Path>) -> CaptureResult<u64> {
    let path = path.as_ref();
    let len = std::fs::metadata(path)
        .map_err(|e| CaptureError::io(path, e))?
        .len();

    len.checked_sub(HEADER_LEN as u64).ok_or_else(|| {
        CaptureError::InvalidHeader(format!(
            "{} is {} bytes, shorter than a WAV header",
            path.display(),
            len
        ))
    })
}

/// Overwrite the first 44 bytes of `path` with the header for `data_len` bytes
///
/// The payload after the header is left untouched.
pub fn write_header(path: impl AsRef<Path>, data_len: u64, format: PcmFormat) -> CaptureResult<()> {
    let path = path.as_ref();
    let header = encode_header(data_len, format)?;

    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| CaptureError::io(path, e))?;

    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.write_all(&header))
        .and_then(|_| file.sync_all())
        .map_err(|e| CaptureError::io(path, e))?;

    debug!("Wrote WAV header to {} ({} data bytes)", path.display(), data_len);

    Ok(())
}

/// Re-derive the header from the file length and write it
///
/// Returns the payload length the header now declares.
pub fn rewrite_header(path: impl AsRef<Path>, format: PcmFormat) -> CaptureResult<u64> {
    let path = path.as_ref();
    let data_len = payload_len(path)?;
    write_header(path, data_len, format)?;

    info!(
        "Rewrote WAV header for {} from file length ({} data bytes)",
        path.display(),
        data_len
    );

    Ok(data_len)
}
