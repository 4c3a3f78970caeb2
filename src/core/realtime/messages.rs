//! WebSocket message types for the realtime speech API.
//!
//! - **Outgoing** ([`ClientEvent`]): `session.update`,
//!   `conversation.item.create`, `response.create`.
//! - **Incoming** ([`ServerEvent`]): audio and transcript deltas, transcript
//!   completion, response completion and errors. Every other event type is
//!   surfaced as [`ServerEvent::Other`] and ignored by the session.
//!
//! Audio arrives base64-encoded inside JSON text frames; [`ServerEvent::parse`]
//! decodes it so the session only ever sees raw PCM bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::script::TurnSpec;

/// Modalities requested for every response.
pub const RESPONSE_MODALITIES: [&str; 2] = ["audio", "text"];

/// Output audio format requested from the service.
pub const OUTPUT_AUDIO_FORMAT: &str = "pcm16";

/// `status` of a response that finished normally.
pub const STATUS_COMPLETED: &str = "completed";

/// `status` of a response cut short (content filter, token limit, ...).
pub const STATUS_INCOMPLETE: &str = "incomplete";

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Session-level settings sent once per connection.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub modalities: Vec<String>,
    pub output_audio_format: String,
}

/// A single content block of a conversation item.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// A user message added to the conversation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// Parameters of a `response.create` request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseSettings {
    pub modalities: Vec<String>,
    pub instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// Events sent to the realtime service.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionSettings },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseSettings },
}

impl ClientEvent {
    pub fn session_update(voice: Option<&str>) -> Self {
        ClientEvent::SessionUpdate {
            session: SessionSettings {
                voice: voice.map(str::to_string),
                modalities: modalities(),
                output_audio_format: OUTPUT_AUDIO_FORMAT.to_string(),
            },
        }
    }

    /// The turn's text and instructions, JSON-encoded into one `input_text` block.
    pub fn conversation_item(turn: &TurnSpec) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem {
                kind: "message".to_string(),
                role: "user".to_string(),
                content: vec![ContentBlock {
                    kind: "input_text".to_string(),
                    text: turn.content_payload(),
                }],
            },
        }
    }

    pub fn response_create(instructions: &str, voice: Option<&str>) -> Self {
        ClientEvent::ResponseCreate {
            response: ResponseSettings {
                modalities: modalities(),
                instructions: instructions.to_string(),
                voice: voice.map(str::to_string),
            },
        }
    }

    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate { .. } => "response.create",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn modalities() -> Vec<String> {
    RESPONSE_MODALITIES.iter().map(|m| m.to_string()).collect()
}

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Events received from the realtime service, already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Raw little-endian PCM16 bytes for the current turn.
    AudioDelta(Vec<u8>),

    /// Incremental transcript text.
    TranscriptDelta(String),

    /// Authoritative full transcript for the current turn.
    TranscriptDone(String),

    /// The audio stream of the current turn has ended.
    AudioDone,

    /// The current turn has finished.
    TurnDone {
        status: String,
        reason: Option<String>,
        error: Option<String>,
    },

    /// The service reported an error.
    Error { message: String },

    /// Any other event type; carries the type name.
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 audio in {event}: {source}")]
    Base64 {
        event: String,
        #[source]
        source: base64::DecodeError,
    },
}

impl ServerEvent {
    /// Parse a text frame from the service.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        #[derive(Deserialize)]
        struct MessageTypePeek {
            #[serde(rename = "type")]
            message_type: String,
        }

        let peek: MessageTypePeek = serde_json::from_str(text)?;

        match peek.message_type.as_str() {
            "response.audio.delta" | "response.output_audio.delta" => {
                #[derive(Deserialize)]
                struct AudioDeltaMessage {
                    delta: String,
                }

                let msg: AudioDeltaMessage = serde_json::from_str(text)?;
                let bytes = BASE64
                    .decode(msg.delta.as_bytes())
                    .map_err(|source| ParseError::Base64 {
                        event: peek.message_type.clone(),
                        source,
                    })?;
                Ok(ServerEvent::AudioDelta(bytes))
            }
            "response.audio_transcript.delta" | "response.output_audio_transcript.delta" => {
                #[derive(Deserialize)]
                struct TranscriptDeltaMessage {
                    delta: String,
                }

                let msg: TranscriptDeltaMessage = serde_json::from_str(text)?;
                Ok(ServerEvent::TranscriptDelta(msg.delta))
            }
            "response.audio_transcript.done" | "response.output_audio_transcript.done" => {
                #[derive(Deserialize)]
                struct TranscriptDoneMessage {
                    transcript: String,
                }

                let msg: TranscriptDoneMessage = serde_json::from_str(text)?;
                Ok(ServerEvent::TranscriptDone(msg.transcript))
            }
            "response.audio.done" | "response.output_audio.done" => Ok(ServerEvent::AudioDone),
            "response.done" => {
                #[derive(Deserialize)]
                struct ResponseDoneMessage {
                    response: ResponseBody,
                }

                #[derive(Deserialize)]
                struct ResponseBody {
                    status: String,
                    #[serde(default)]
                    status_details: Option<StatusDetails>,
                }

                #[derive(Deserialize)]
                struct StatusDetails {
                    #[serde(default)]
                    reason: Option<String>,
                    #[serde(default)]
                    error: Option<ErrorBody>,
                }

                let msg: ResponseDoneMessage = serde_json::from_str(text)?;
                let (reason, error) = match msg.response.status_details {
                    Some(details) => (details.reason, details.error.and_then(|e| e.message)),
                    None => (None, None),
                };
                Ok(ServerEvent::TurnDone {
                    status: msg.response.status,
                    reason,
                    error,
                })
            }
            "error" => {
                #[derive(Deserialize)]
                struct ErrorMessage {
                    error: ErrorBody,
                }

                let msg: ErrorMessage = serde_json::from_str(text)?;
                Ok(ServerEvent::Error {
                    message: msg
                        .error
                        .message
                        .unwrap_or_else(|| "unknown error".to_string()),
                })
            }
            _ => Ok(ServerEvent::Other(peek.message_type)),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::AudioDelta(_) => "audio.delta",
            ServerEvent::TranscriptDelta(_) => "transcript.delta",
            ServerEvent::TranscriptDone(_) => "transcript.done",
            ServerEvent::AudioDone => "audio.done",
            ServerEvent::TurnDone { .. } => "response.done",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Other(kind) => kind,
        }
    }

    /// `response.done` with status `incomplete` because of the content filter.
    pub fn is_content_filtered(&self) -> bool {
        match self {
            ServerEvent::TurnDone { status, reason, .. } => {
                status == STATUS_INCOMPLETE
                    && reason
                        .as_deref()
                        .is_some_and(|r| r == "content_filter" || r == "content-filter")
            }
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}
