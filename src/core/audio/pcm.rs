//! Append-only buffer for one turn's 16-bit PCM audio.
//!
//! Fragments arrive as raw little-endian byte chunks (already base64-decoded)
//! and are merged strictly in arrival order. A fragment must hold a whole
//! number of samples; anything else is rejected without touching the buffer.

use thiserror::Error;

/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PcmError {
    #[error("audio fragment of {0} bytes is not a whole number of 16-bit samples")]
    OddLengthFragment(usize),
}

/// Ordered accumulator of signed 16-bit samples.
#[derive(Debug, Default, Clone)]
pub struct PcmAccumulator {
    samples: Vec<i16>,
}

impl PcmAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a little-endian PCM16 fragment.
    ///
    /// Returns the number of samples appended. An odd-length fragment leaves
    /// the accumulator unchanged.
    pub fn append(&mut self, fragment: &[u8]) -> Result<usize, PcmError> {
        if fragment.len() % BYTES_PER_SAMPLE != 0 {
            return Err(PcmError::OddLengthFragment(fragment.len()));
        }

        let added = fragment.len() / BYTES_PER_SAMPLE;
        self.samples.reserve(added);
        self.samples.extend(
            fragment
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );
        Ok(added)
    }

    /// Copy of the samples accumulated so far.
    pub fn snapshot(&self) -> Vec<i16> {
        self.samples.clone()
    }

    /// Consume the accumulator and hand over its samples without copying.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size of the accumulated audio in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.samples.len() * BYTES_PER_SAMPLE
    }
}
