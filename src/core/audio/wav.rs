//! Uncompressed WAV container encoding.
//!
//! The realtime service streams headerless PCM16; this module wraps the
//! accumulated samples in a canonical 44-byte RIFF/WAVE header so the result
//! is playable on its own.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

/// Size of the canonical PCM header (RIFF + fmt + data chunk headers).
pub const WAV_HEADER_SIZE: usize = 44;

/// Sample rate produced by the realtime service.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// MIME type of the encoded container.
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),
}

/// Format parameters written into the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for WavFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl WavFormat {
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    fn validate(&self) -> Result<(), WavError> {
        if self.bits_per_sample != 16 {
            return Err(WavError::UnsupportedFormat(format!(
                "{} bits per sample (only 16-bit PCM is supported)",
                self.bits_per_sample
            )));
        }
        // Wider layouts switch to WAVE_FORMAT_EXTENSIBLE, which is not 44 bytes.
        if self.channels == 0 || self.channels > 2 {
            return Err(WavError::UnsupportedFormat(format!(
                "{} channels (expected 1 or 2)",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(WavError::UnsupportedFormat("sample rate 0".to_string()));
        }
        Ok(())
    }
}

/// Encode interleaved 16-bit samples as a WAV file.
///
/// Empty input yields a bare 44-byte header with a zero-length data chunk.
pub fn encode_wav(samples: &[i16], format: WavFormat) -> Result<Vec<u8>, WavError> {
    format.validate()?;

    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| WavError::EncodingFailed(format!("Failed to create WAV writer: {e}")))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| WavError::EncodingFailed(format!("Failed to write sample: {e}")))?;
        }

        writer
            .finalize()
            .map_err(|e| WavError::EncodingFailed(format!("Failed to finalize WAV: {e}")))?;
    }

    Ok(bytes)
}

/// Encode with the realtime service's native format (24 kHz mono PCM16).
pub fn encode_default(samples: &[i16]) -> Result<Vec<u8>, WavError> {
    encode_wav(samples, WavFormat::default())
}

/// Fields of a canonical 44-byte PCM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_size: u32,
    pub fmt_chunk_size: u32,
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the first 44 bytes of a container produced by [`encode_wav`].
    pub fn parse(bytes: &[u8]) -> Result<Self, WavError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(WavError::MalformedHeader(format!(
                "expected at least {WAV_HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let tag = |offset: usize, expected: &[u8; 4]| -> Result<(), WavError> {
            if &bytes[offset..offset + 4] != expected {
                return Err(WavError::MalformedHeader(format!(
                    "missing {:?} tag at offset {offset}",
                    String::from_utf8_lossy(expected)
                )));
            }
            Ok(())
        };
        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        tag(0, b"RIFF")?;
        tag(8, b"WAVE")?;
        tag(12, b"fmt ")?;
        tag(36, b"data")?;

        Ok(Self {
            chunk_size: u32_at(4),
            fmt_chunk_size: u32_at(16),
            format_code: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    pub fn format(&self) -> WavFormat {
        WavFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }
}
