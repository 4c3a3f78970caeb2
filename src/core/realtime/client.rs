//! WebSocket driver for [`ProtocolSession`].
//!
//! Opens the connection, hands inbound events to the session one at a time,
//! writes whatever the session asks for, and closes the connection on every
//! exit path before returning.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError,
        handshake::client::generate_key,
        http::Request,
        http::header::{AUTHORIZATION, USER_AGENT},
        protocol::Message,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::RealtimeConfig;
use super::messages::{ClientEvent, ServerEvent};
use super::script::TurnScript;
use super::session::{CompletedTurn, ProtocolSession, SessionAction, SessionOptions};
use crate::core::error::SynthesisError;

pub type RealtimeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client for the realtime speech API. One connection per [`run`](Self::run).
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    config: RealtimeConfig,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Build a session for `script`, falling back to the configured voice.
    pub fn new_session(&self, script: TurnScript, voice: Option<&str>) -> ProtocolSession {
        ProtocolSession::new(
            script,
            SessionOptions {
                voice: self.config.resolve_voice(voice).map(str::to_string),
                response_instructions: self.config.response_instructions.clone(),
                session_update: self.config.session_update,
            },
        )
    }

    /// Connect and drive `session` until it terminates.
    pub async fn run(
        &self,
        session: &mut ProtocolSession,
        cancel: &CancellationToken,
    ) -> Result<CompletedTurn, SynthesisError> {
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = connect(&self.config) => Some(result),
        };

        let mut ws = match connected {
            None => {
                session.cancel();
                info!("Synthesis cancelled while connecting");
                return Err(SynthesisError::Cancelled);
            }
            Some(Err(e)) => {
                session.on_transport_closed(&e.to_string());
                return Err(e);
            }
            Some(Ok(ws)) => ws,
        };

        drive(&mut ws, session, cancel, self.config.turn_timeout).await
    }
}

/// Open the WebSocket with the realtime handshake headers.
pub async fn connect(config: &RealtimeConfig) -> Result<RealtimeStream, SynthesisError> {
    let url = config.websocket_url()?;
    debug!("Connecting to realtime WebSocket: {}", url);

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(SynthesisError::Transport(format!(
                "realtime URL has no host: {url}"
            )));
        }
    };

    let mut builder = Request::builder()
        .method("GET")
        .uri(url.as_str())
        .header("Host", host)
        .header("Upgrade", "websocket")
        .header("Connection", "upgrade")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Version", "13")
        .header("OpenAI-Beta", "realtime=v1")
        .header(USER_AGENT, concat!("roshi/", env!("CARGO_PKG_VERSION")));

    if let Some(auth) = config.auth_header() {
        builder = builder.header(AUTHORIZATION, auth);
    }

    let request = builder
        .body(())
        .map_err(|e| SynthesisError::Transport(format!("Failed to create request: {e}")))?;

    match timeout(config.connect_timeout, connect_async(request)).await {
        Ok(Ok((ws, response))) => {
            info!(
                "Realtime WebSocket connected, response status: {:?}",
                response.status()
            );
            Ok(ws)
        }
        Ok(Err(e)) => Err(SynthesisError::Transport(format!(
            "WebSocket connection failed: {e}"
        ))),
        Err(_) => Err(SynthesisError::Transport(format!(
            "connection timed out after {}s",
            config.connect_timeout.as_secs()
        ))),
    }
}

/// Drive `session` over an already-open stream, then close it.
///
/// Generic over the stream so tests can use any duplex transport.
pub async fn drive<S>(
    ws: &mut S,
    session: &mut ProtocolSession,
    cancel: &CancellationToken,
    turn_timeout: Option<Duration>,
) -> Result<CompletedTurn, SynthesisError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let result = drive_until_terminal(ws, session, cancel, turn_timeout).await;

    close_quietly(ws).await;

    match &result {
        Ok(turn) => info!(
            samples = turn.sample_count,
            bytes = turn.container.len(),
            "Realtime session finished"
        ),
        Err(SynthesisError::Cancelled) => info!("Realtime session cancelled"),
        Err(e) => error!("Realtime session failed: {}", e),
    }
    result
}

/// Outcome of waiting for the next frame.
enum Step {
    Cancelled,
    Frame(Message),
    Failed(WsError),
    Ended,
    TimedOut(Duration),
}

async fn drive_until_terminal<S>(
    ws: &mut S,
    session: &mut ProtocolSession,
    cancel: &CancellationToken,
    turn_timeout: Option<Duration>,
) -> Result<CompletedTurn, SynthesisError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let opening = session.on_connected()?;
    if let Err(e) = send_all(ws, opening).await {
        return Err(transport_failure(session, e));
    }

    loop {
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Step::Cancelled,
            step = next_step(ws, turn_timeout) => step,
        };

        let message = match step {
            Step::Frame(message) => message,
            Step::Cancelled => {
                session.cancel();
                return Err(SynthesisError::Cancelled);
            }
            Step::Failed(e) => {
                return Err(transport_failure(session, format!("WebSocket error: {e}")));
            }
            Step::Ended => {
                return Err(transport_failure(session, "stream ended".to_string()));
            }
            Step::TimedOut(limit) => {
                return Err(transport_failure(
                    session,
                    format!("no event received within {}s", limit.as_secs()),
                ));
            }
        };

        let event = match message {
            Message::Text(text) => match ServerEvent::parse(&text) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "Failed to parse realtime message: {} - raw: {}",
                        e,
                        text.as_str()
                    );
                    return Err(session
                        .on_malformed_frame(e.to_string())
                        .unwrap_or_else(|| SynthesisError::Protocol(e.to_string())));
                }
            },
            Message::Close(frame) => {
                info!("Realtime WebSocket closed by server: {:?}", frame);
                let detail = frame
                    .map(|f| format!("close frame {} {}", u16::from(f.code), f.reason.as_str()))
                    .unwrap_or_else(|| "close frame".to_string());
                return Err(transport_failure(session, detail));
            }
            Message::Binary(data) => {
                debug!("Ignoring binary frame of {} bytes", data.len());
                continue;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        debug!(event = %event.kind(), "Realtime event");

        match session.handle_event(event) {
            SessionAction::Continue => {}
            SessionAction::Send(events) => {
                if let Err(e) = send_all(ws, events).await {
                    return Err(transport_failure(session, e));
                }
            }
            SessionAction::Finalize(turn) => return Ok(turn),
            SessionAction::Fail(e) => return Err(e),
        }
    }
}

async fn next_step<S>(ws: &mut S, turn_timeout: Option<Duration>) -> Step
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let next = match turn_timeout {
        Some(limit) => match timeout(limit, ws.next()).await {
            Ok(next) => next,
            Err(_) => return Step::TimedOut(limit),
        },
        None => ws.next().await,
    };

    match next {
        Some(Ok(message)) => Step::Frame(message),
        Some(Err(e)) => Step::Failed(e),
        None => Step::Ended,
    }
}

async fn send_all<S>(ws: &mut S, events: Vec<ClientEvent>) -> Result<(), String>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    for event in events {
        let json = event
            .to_json()
            .map_err(|e| format!("Failed to serialize {}: {e}", event.kind()))?;
        debug!(event = %event.kind(), "Sending realtime event");
        ws.send(Message::Text(json.into()))
            .await
            .map_err(|e| format!("Failed to send {}: {e}", event.kind()))?;
    }
    Ok(())
}

fn transport_failure(session: &mut ProtocolSession, detail: String) -> SynthesisError {
    session
        .on_transport_closed(&detail)
        .unwrap_or(SynthesisError::Transport(detail))
}

/// Best-effort close; secondary errors are logged and dropped.
async fn close_quietly<S>(ws: &mut S)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match ws.close().await {
        Ok(()) => debug!("Realtime WebSocket closed"),
        Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
        Err(e) => warn!("Failed to close realtime WebSocket: {}", e),
    }
}
