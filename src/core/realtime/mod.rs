//! Realtime speech API integration.
//!
//! One connection carries a fixed [`TurnScript`]; the final turn's audio is
//! encoded as WAV and handed back to the caller for publishing.
//!
//! - [`script`]: requests and turn scripts
//! - [`messages`]: outbound client events and inbound event parsing
//! - [`session`]: the I/O-free protocol state machine
//! - [`client`]: WebSocket driver for the session
//! - [`config`]: endpoint and protocol-variant settings

pub mod client;
pub mod config;
pub mod messages;
pub mod script;
pub mod session;


pub use client::{RealtimeClient, RealtimeStream, connect, drive};
pub use config::{DEFAULT_RESPONSE_INSTRUCTIONS, RealtimeConfig};
pub use messages::{ClientEvent, ParseError, ServerEvent};
pub use script::{
    DEFAULT_READING_INSTRUCTIONS, ScriptError, SynthesisRequest, TurnScript, TurnSpec,
};
pub use session::{
    CompletedTurn, ProtocolSession, SessionAction, SessionOptions, SessionState, TurnAccumulator,
};
