// Tests for the canonical 44-byte PCM WAV header
//
// These verify the byte layout, decoding, and that files patched with the
// header are readable by a standard WAV decoder.

use anyhow::Result;
use hearme_recorder::audio::wav::{self, MAX_DATA_LEN};
use hearme_recorder::audio::{encode_header, PcmFormat, WavHeader, HEADER_LEN};
use hearme_recorder::CaptureError;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
}

/// Write a placeholder header followed by `payload`, as the capture loop does
fn write_raw_capture(path: &std::path::Path, payload: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    wav::write_placeholder(&mut file)?;
    file.write_all(payload)?;
    Ok(())
}

#[test]
fn test_header_layout_speech_format() -> Result<()> {
    let header = encode_header(32000, PcmFormat::SPEECH)?;

    assert_eq!(header.len(), HEADER_LEN);
    assert_eq!(&header[0..4], b"RIFF");
    assert_eq!(u32_at(&header, 4), 32036);
    assert_eq!(&header[8..12], b"WAVE");
    assert_eq!(&header[12..16], b"fmt ");
    assert_eq!(u32_at(&header, 16), 16);
    assert_eq!(u16_at(&header, 20), 1, "PCM format tag");
    assert_eq!(u16_at(&header, 22), 1, "mono");
    assert_eq!(u32_at(&header, 24), 16000);
    assert_eq!(u32_at(&header, 28), 32000, "byte rate");
    assert_eq!(u16_at(&header, 32), 2, "block align");
    assert_eq!(u16_at(&header, 34), 16);
    assert_eq!(&header[36..40], b"data");
    assert_eq!(u32_at(&header, 40), 32000);

    Ok(())
}

#[test]
fn test_chunk_sizes_track_payload_length() -> Result<()> {
    for data_len in [0u64, 1, 2, 100, 3200, 32000, 1_000_000, MAX_DATA_LEN] {
        let header = encode_header(data_len, PcmFormat::SPEECH)?;
        assert_eq!(u32_at(&header, 4) as u64, data_len + 36, "ChunkSize for {}", data_len);
        assert_eq!(u32_at(&header, 40) as u64, data_len, "Subchunk2Size for {}", data_len);
    }
    Ok(())
}

#[test]
fn test_header_is_deterministic() -> Result<()> {
    let format = PcmFormat::new(44100, 2, 16);
    assert_eq!(encode_header(4410, format)?, encode_header(4410, format)?);
    Ok(())
}

#[test]
fn test_stereo_derived_fields() -> Result<()> {
    let header = encode_header(0, PcmFormat::new(48000, 2, 16))?;

    assert_eq!(u16_at(&header, 22), 2);
    assert_eq!(u32_at(&header, 28), 48000 * 2 * 2);
    assert_eq!(u16_at(&header, 32), 4);

    Ok(())
}

#[test]
fn test_zero_length_header_is_valid() -> Result<()> {
    let header = encode_header(0, PcmFormat::SPEECH)?;
    let decoded = WavHeader::decode(&header)?;

    assert_eq!(decoded.data_len, 0);
    assert_eq!(decoded.chunk_size, 36);
    assert_eq!(decoded.format, PcmFormat::SPEECH);

    Ok(())
}

#[test]
fn test_payload_too_large_is_rejected() {
    let result = encode_header(MAX_DATA_LEN + 1, PcmFormat::SPEECH);
    assert!(matches!(result, Err(CaptureError::PayloadTooLarge(n)) if n == MAX_DATA_LEN + 1));
}

#[test]
fn test_decode_round_trips_fields() -> Result<()> {
    let format = PcmFormat::new(22050, 1, 16);
    let original = WavHeader::for_payload(1234, format)?;
    let decoded = WavHeader::decode(&original.encode())?;

    assert_eq!(decoded, original);
    assert_eq!(decoded.byte_rate, 44100);
    assert_eq!(decoded.block_align, 2);

    Ok(())
}

#[test]
fn test_decode_rejects_placeholder() {
    let placeholder = [0u8; HEADER_LEN];
    assert!(matches!(
        WavHeader::decode(&placeholder),
        Err(CaptureError::InvalidHeader(_))
    ));
}

#[test]
fn test_decode_rejects_short_buffer() {
    assert!(WavHeader::decode(b"RIFF").is_err());
}

#[test]
fn test_decode_rejects_inconsistent_sizes() -> Result<()> {
    let mut header = encode_header(100, PcmFormat::SPEECH)?;
    header[4..8].copy_from_slice(&0u32.to_le_bytes());

    assert!(matches!(
        WavHeader::decode(&header),
        Err(CaptureError::InvalidHeader(_))
    ));

    Ok(())
}

#[test]
fn test_decode_rejects_non_pcm() -> Result<()> {
    let mut header = encode_header(100, PcmFormat::SPEECH)?;
    header[20..22].copy_from_slice(&3u16.to_le_bytes()); // IEEE float

    assert!(WavHeader::decode(&header).is_err());

    Ok(())
}

#[test]
fn test_patched_file_reads_back_with_hound() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("patched.wav");

    let samples: Vec<i16> = (0..1600).map(|i| (i * 7 % 2000) as i16 - 1000).collect();
    let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    write_raw_capture(&path, &payload)?;

    wav::write_header(&path, payload.len() as u64, PcmFormat::SPEECH)?;

    let reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());

    let decoded: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(decoded, samples);

    Ok(())
}

#[test]
fn test_write_header_leaves_payload_untouched() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("untouched.wav");
    let payload = vec![0xABu8; 500];
    write_raw_capture(&path, &payload)?;

    wav::write_header(&path, 500, PcmFormat::SPEECH)?;

    let bytes = fs::read(&path)?;
    assert_eq!(bytes.len(), HEADER_LEN + 500);
    assert_eq!(&bytes[HEADER_LEN..], payload.as_slice());

    Ok(())
}

#[test]
fn test_rewrite_from_file_length_matches_counter_header() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("rewrite.wav");
    write_raw_capture(&path, &vec![0u8; 6400])?;

    wav::write_header(&path, 6400, PcmFormat::SPEECH)?;
    let from_counter = fs::read(&path)?;

    let data_len = wav::rewrite_header(&path, PcmFormat::SPEECH)?;
    let from_length = fs::read(&path)?;

    assert_eq!(data_len, 6400);
    assert_eq!(&from_counter[..HEADER_LEN], &from_length[..HEADER_LEN]);

    Ok(())
}

#[test]
fn test_rewrite_repairs_zeroed_header() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("interrupted.wav");
    write_raw_capture(&path, &vec![0u8; 3200])?;

    let data_len = wav::rewrite_header(&path, PcmFormat::SPEECH)?;
    assert_eq!(data_len, 3200);

    let header = fs::read(&path)?;
    let decoded = WavHeader::decode(&header[..HEADER_LEN])?;
    assert_eq!(decoded.data_len, 3200);
    assert_eq!(decoded.chunk_size, 3236);

    Ok(())
}

#[test]
fn test_payload_len_rejects_truncated_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("tiny.wav");
    fs::write(&path, [0u8; 10])?;

    assert!(matches!(
        wav::payload_len(&path),
        Err(CaptureError::InvalidHeader(_))
    ));

    Ok(())
}

#[test]
fn test_format_helpers() {
    let format = PcmFormat::SPEECH;
    assert_eq!(format.byte_rate(), 32000);
    assert_eq!(format.block_align(), 2);
    assert_eq!(format.fallback_buffer_size(), 32000);
    assert_eq!(format.duration_secs(16000), 0.5);
    assert_eq!(PcmFormat::default(), PcmFormat::SPEECH);
}

#[test]
fn test_format_validation() {
    assert!(PcmFormat::SPEECH.validate().is_ok());
    assert!(PcmFormat::new(48000, 2, 16).validate().is_ok());

    for format in [
        PcmFormat::new(0, 1, 16),
        PcmFormat::new(16000, 0, 16),
        PcmFormat::new(16000, 1, 8),
        PcmFormat::new(16000, 1, 24),
        PcmFormat::new(u32::MAX, 2, 16),
        PcmFormat::new(16000, u16::MAX, 16),
    ] {
        assert!(
            matches!(format.validate(), Err(CaptureError::UnsupportedFormat(_))),
            "{:?} should be rejected",
            format
        );
    }
}

#[test]
fn test_overflowing_format_never_reaches_a_header() {
    let format = PcmFormat::new(u32::MAX, 2, 16);

    assert_eq!(format.checked_byte_rate(), None);
    assert!(matches!(
        encode_header(100, format),
        Err(CaptureError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_zero_channel_header_is_rejected() {
    assert!(encode_header(0, PcmFormat::new(16000, 0, 16)).is_err());
}
