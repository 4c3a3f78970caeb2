pub mod audio;
pub mod error;
pub mod providers;
pub mod publisher;
pub mod realtime;
pub mod storage;
pub mod synthesizer;

// Re-export commonly used types for convenience
pub use audio::{PcmAccumulator, WavFormat, WavHeader, encode_wav};
pub use error::{Rejection, SynthesisError};
pub use publisher::ResultPublisher;
pub use realtime::{
    ProtocolSession, RealtimeClient, RealtimeConfig, SessionState, SynthesisRequest, TurnScript,
    TurnSpec,
};
pub use storage::{GcsStorage, ObjectStoreStorage, StorageBackend, StorageError};
pub use synthesizer::{SpeechSynthesizer, SynthesisResult};
