//! Error taxonomy for a single synthesis request.
//!
//! Every variant is terminal for the request that produced it. Nothing in the
//! core retries; the HTTP layer decides whether the caller may try again.

use crate::core::storage::StorageError;

/// Why the remote service refused to finish a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The turn ended as `incomplete` because of policy screening.
    ContentFilter,
    /// Any other refusal reported by the remote service.
    Remote(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::ContentFilter => write!(f, "content rejected by the content filter"),
            Rejection::Remote(message) => write!(f, "{message}"),
        }
    }
}

/// Terminal errors surfaced by the synthesis pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    /// Malformed or unexpected data from the remote service.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote service rejected the turn.
    #[error("Remote rejection: {0}")]
    RemoteRejection(Rejection),

    /// The connection failed to open, dropped, or closed early.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Publishing the finished container failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The caller abandoned the request before it finished.
    #[error("Synthesis cancelled by caller")]
    Cancelled,
}

impl SynthesisError {
    pub fn content_filter() -> Self {
        SynthesisError::RemoteRejection(Rejection::ContentFilter)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        SynthesisError::RemoteRejection(Rejection::Remote(message.into()))
    }

    /// True only for content-filter rejections.
    pub fn is_content_filter(&self) -> bool {
        matches!(
            self,
            SynthesisError::RemoteRejection(Rejection::ContentFilter)
        )
    }

    /// Whether sending the same request again could plausibly succeed.
    ///
    /// Transport and storage failures are environmental; protocol errors and
    /// rejections will repeat for the same input.
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(
            self,
            SynthesisError::Transport(_) | SynthesisError::Storage(_)
        )
    }
}
