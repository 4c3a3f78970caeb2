//! Connection and protocol-variant settings for the realtime speech API.

use std::time::Duration;

use url::Url;

use crate::core::error::SynthesisError;

/// Directive sent with every `response.create`. The turn's content block is a
/// JSON document of `{text, instructions}`; this tells the model what to do
/// with it.
pub const DEFAULT_RESPONSE_INSTRUCTIONS: &str = "Please speak using the given instructions. \
You will receive a json with text, and speaking instructions. Repeat the text, making \
adjustments based on the instructions if needed (Treat it as SSML).";

/// Settings for one realtime connection.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// API key sent as a bearer token. Empty disables the header (local mocks).
    pub api_key: String,

    /// WebSocket endpoint without query parameters.
    pub url: String,

    /// Model appended as the `model` query parameter.
    pub model: String,

    /// Voice used when the request does not name one.
    pub default_voice: Option<String>,

    /// Prepend a disposable warm-up turn to every script.
    pub warm_up_turn: bool,

    /// Send `session.update` once before the first turn.
    pub session_update: bool,

    /// Directive sent with each `response.create`.
    pub response_instructions: String,

    /// Limit on the WebSocket handshake.
    pub connect_timeout: Duration,

    /// Idle limit between inbound events. `None` waits indefinitely.
    pub turn_timeout: Option<Duration>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: Self::DEFAULT_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            default_voice: None,
            warm_up_turn: false,
            session_update: false,
            response_instructions: DEFAULT_RESPONSE_INSTRUCTIONS.to_string(),
            connect_timeout: Duration::from_secs(10),
            turn_timeout: None,
        }
    }
}

impl RealtimeConfig {
    pub const DEFAULT_URL: &'static str = "wss://api.openai.com/v1/realtime";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-realtime-preview-2024-10-01";

    /// Build the WebSocket URL with the `model` query parameter.
    ///
    /// ```text
    /// wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01
    /// ```
    pub fn websocket_url(&self) -> Result<Url, SynthesisError> {
        let mut url = Url::parse(&self.url).map_err(|e| {
            SynthesisError::Transport(format!("invalid realtime URL {:?}: {e}", self.url))
        })?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(SynthesisError::Transport(format!(
                    "realtime URL must use ws or wss, got {other}"
                )));
            }
        }

        if !self.model.is_empty() {
            url.query_pairs_mut().append_pair("model", &self.model);
        }
        Ok(url)
    }

    /// `Authorization` header value, if a key is configured.
    pub fn auth_header(&self) -> Option<String> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.api_key))
        }
    }

    /// Voice for a request: the request's own, else the configured default.
    pub fn resolve_voice<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or_else(|| {
            self.default_voice
                .as_deref()
                .filter(|v| !v.trim().is_empty())
        })
    }
}
