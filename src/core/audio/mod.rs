//! PCM accumulation and WAV container encoding.

pub mod pcm;
pub mod wav;

pub use pcm::{BYTES_PER_SAMPLE, PcmAccumulator, PcmError};
pub use wav::{
    DEFAULT_SAMPLE_RATE, WAV_CONTENT_TYPE, WAV_HEADER_SIZE, WavError, WavFormat, WavHeader,
    encode_default, encode_wav,
};
