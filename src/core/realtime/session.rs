//! The protocol session state machine.
//!
//! [`ProtocolSession`] owns the bookkeeping for one connection: which turn is
//! in flight, the live [`TurnAccumulator`], and whether the session has reached
//! a terminal state. It performs no I/O. The driver in `client.rs` feeds it one
//! inbound event at a time and executes the [`SessionAction`] it returns.
//!
//! ```text
//! Connecting ──on_connected──▶ AwaitingTurnResponse(0)
//!     AwaitingTurnResponse(i) ──TurnDone ok, i < last──▶ AwaitingTurnResponse(i+1)
//!     AwaitingTurnResponse(last) ──TurnDone ok──▶ TerminatingSuccess
//!     any non-terminal ──error / filter / close / cancel──▶ TerminatingError
//! ```

use tracing::{debug, info, warn};

use super::messages::{ClientEvent, STATUS_COMPLETED, ServerEvent};
use super::script::TurnScript;
use crate::core::audio::{PcmAccumulator, encode_default};
use crate::core::error::SynthesisError;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingTurnResponse(usize),
    TerminatingSuccess,
    TerminatingError,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::TerminatingSuccess | SessionState::TerminatingError
        )
    }
}

/// Per-turn audio and transcript. Replaced wholesale at every turn boundary.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    pcm: PcmAccumulator,
    transcript: String,
}

impl TurnAccumulator {
    pub fn samples(&self) -> Vec<i16> {
        self.pcm.snapshot()
    }

    pub fn sample_count(&self) -> usize {
        self.pcm.len()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

/// Output of the final turn, ready for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTurn {
    /// Encoded WAV container.
    pub container: Vec<u8>,
    pub transcript: String,
    pub sample_count: usize,
}

/// What the driver must do after an event.
#[derive(Debug)]
pub enum SessionAction {
    /// Nothing to do; keep reading.
    Continue,
    /// Send these events, in order, then keep reading.
    Send(Vec<ClientEvent>),
    /// The final turn finished. Close the connection and publish.
    Finalize(CompletedTurn),
    /// The session failed. Close the connection and report the error.
    Fail(SynthesisError),
}

/// Settings that shape the outbound messages of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub voice: Option<String>,
    pub response_instructions: String,
    pub session_update: bool,
}

pub struct ProtocolSession {
    state: SessionState,
    script: TurnScript,
    options: SessionOptions,
    turn: TurnAccumulator,
}

impl ProtocolSession {
    pub fn new(script: TurnScript, options: SessionOptions) -> Self {
        Self {
            state: SessionState::Connecting,
            script,
            options,
            turn: TurnAccumulator::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn script(&self) -> &TurnScript {
        &self.script
    }

    /// The live accumulator.
    pub fn current_turn(&self) -> &TurnAccumulator {
        &self.turn
    }

    /// Messages to send once the connection is open.
    ///
    /// Moves `Connecting` to `AwaitingTurnResponse(0)`.
    pub fn on_connected(&mut self) -> Result<Vec<ClientEvent>, SynthesisError> {
        if self.state != SessionState::Connecting {
            return Err(SynthesisError::Protocol(format!(
                "connection opened in state {:?}",
                self.state
            )));
        }

        let mut events = Vec::with_capacity(3);
        if self.options.session_update {
            events.push(ClientEvent::session_update(self.options.voice.as_deref()));
        }
        events.extend(self.turn_requests(0)?);

        self.turn = TurnAccumulator::default();
        self.state = SessionState::AwaitingTurnResponse(0);
        info!(turns = self.script.len(), "Realtime session started");
        Ok(events)
    }

    /// Apply one inbound event.
    pub fn handle_event(&mut self, event: ServerEvent) -> SessionAction {
        let index = match self.state {
            SessionState::AwaitingTurnResponse(index) => index,
            SessionState::TerminatingSuccess | SessionState::TerminatingError => {
                debug!(event = %event.kind(), "Ignoring event after termination");
                return SessionAction::Continue;
            }
            SessionState::Connecting => {
                if let ServerEvent::Other(kind) = &event {
                    debug!(event = %kind, "Ignoring event before session start");
                    return SessionAction::Continue;
                }
                return self.fail(SynthesisError::Protocol(format!(
                    "received {} before the session started",
                    event.kind()
                )));
            }
        };

        match event {
            ServerEvent::AudioDelta(bytes) => {
                match self.turn.pcm.append(&bytes) {
                    Ok(added) => {
                        debug!(turn = index, samples = added, "Audio delta");
                        SessionAction::Continue
                    }
                    Err(e) => self.fail(SynthesisError::Protocol(e.to_string())),
                }
            }
            ServerEvent::TranscriptDelta(text) => {
                self.turn.transcript.push_str(&text);
                SessionAction::Continue
            }
            ServerEvent::TranscriptDone(text) => {
                self.turn.transcript = text;
                SessionAction::Continue
            }
            ServerEvent::AudioDone => {
                debug!(
                    turn = index,
                    samples = self.turn.sample_count(),
                    "Audio stream finished"
                );
                SessionAction::Continue
            }
            ServerEvent::Error { message } => {
                warn!(turn = index, %message, "Realtime service reported an error");
                self.fail(SynthesisError::remote(message))
            }
            ref done @ ServerEvent::TurnDone { .. } if done.is_content_filtered() => {
                warn!(turn = index, "Turn rejected by content filter");
                self.fail(SynthesisError::content_filter())
            }
            ServerEvent::TurnDone {
                status,
                reason,
                error,
            } => {
                if status != STATUS_COMPLETED {
                    let detail = error.or(reason).unwrap_or_else(|| "no details".to_string());
                    return self.fail(SynthesisError::remote(format!(
                        "turn ended with status {status} ({detail})"
                    )));
                }
                self.complete_turn(index)
            }
            ServerEvent::Other(kind) => {
                debug!(turn = index, event = %kind, "Ignoring event");
                SessionAction::Continue
            }
        }
    }

    /// The connection closed or errored. Returns the error to report if the
    /// session had not already terminated.
    pub fn on_transport_closed(&mut self, detail: &str) -> Option<SynthesisError> {
        if self.state.is_terminal() {
            return None;
        }
        let stage = match self.state {
            SessionState::Connecting => "before the session started".to_string(),
            SessionState::AwaitingTurnResponse(i) => format!("during turn {i}"),
            _ => String::new(),
        };
        self.state = SessionState::TerminatingError;
        self.turn = TurnAccumulator::default();
        Some(SynthesisError::Transport(format!(
            "connection closed {stage}: {detail}"
        )))
    }

    /// A frame that could not be decoded. Returns the error to report if the
    /// session had not already terminated.
    pub fn on_malformed_frame(&mut self, detail: impl Into<String>) -> Option<SynthesisError> {
        if self.state.is_terminal() {
            return None;
        }
        match self.fail(SynthesisError::Protocol(detail.into())) {
            SessionAction::Fail(error) => Some(error),
            _ => None,
        }
    }

    /// The caller abandoned the request. Returns false if already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = SessionState::TerminatingError;
        self.turn = TurnAccumulator::default();
        true
    }

    /// Publishing the final turn failed after the session had succeeded.
    pub fn record_publish_failure(&mut self) {
        if self.state == SessionState::TerminatingSuccess {
            self.state = SessionState::TerminatingError;
        }
    }

    fn complete_turn(&mut self, index: usize) -> SessionAction {
        if !self.script.is_final(index) {
            let discarded = self.turn.sample_count();
            self.turn = TurnAccumulator::default();
            let next = index + 1;
            return match self.turn_requests(next) {
                Ok(events) => {
                    self.state = SessionState::AwaitingTurnResponse(next);
                    info!(
                        turn = next,
                        discarded_samples = discarded,
                        "Advancing to next turn"
                    );
                    SessionAction::Send(events)
                }
                Err(e) => self.fail(e),
            };
        }

        let finished = std::mem::take(&mut self.turn);
        let sample_count = finished.pcm.len();
        let transcript = finished.transcript;
        match encode_default(&finished.pcm.into_samples()) {
            Ok(container) => {
                self.state = SessionState::TerminatingSuccess;
                info!(turn = index, samples = sample_count, "Final turn completed");
                SessionAction::Finalize(CompletedTurn {
                    container,
                    transcript,
                    sample_count,
                })
            }
            Err(e) => self.fail(SynthesisError::Protocol(format!(
                "failed to encode audio: {e}"
            ))),
        }
    }

    fn turn_requests(&self, index: usize) -> Result<Vec<ClientEvent>, SynthesisError> {
        let turn = self.script.turn(index).ok_or_else(|| {
            SynthesisError::Protocol(format!("turn {index} is not in the script"))
        })?;
        Ok(vec![
            ClientEvent::conversation_item(turn),
            ClientEvent::response_create(
                &self.options.response_instructions,
                self.options.voice.as_deref(),
            ),
        ])
    }

    fn fail(&mut self, error: SynthesisError) -> SessionAction {
        self.state = SessionState::TerminatingError;
        self.turn = TurnAccumulator::default();
        SessionAction::Fail(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::WAV_HEADER_SIZE;
    use crate::core::realtime::script::{SynthesisRequest, TurnSpec};

    fn session(turns: usize) -> ProtocolSession {
        let mut specs: Vec<TurnSpec> = (0..turns - 1)
            .map(|i| TurnSpec::new(format!("warm-up {i}"), ""))
            .collect();
        specs.push(TurnSpec::new("Hello", ""));
        ProtocolSession::new(
            TurnScript::new(specs).unwrap(),
            SessionOptions {
                voice: None,
                response_instructions: "Speak".to_string(),
                session_update: false,
            },
        )
    }

    fn done() -> ServerEvent {
        ServerEvent::TurnDone {
            status: "completed".to_string(),
            reason: None,
            error: None,
        }
    }

    fn finalize(action: SessionAction) -> CompletedTurn {
        match action {
            SessionAction::Finalize(turn) => turn,
            other => panic!("expected Finalize, got {other:?}"),
        }
    }

    #[test]
    fn test_on_connected_sends_first_turn() {
        let mut session = session(1);
        let events = session.on_connected().unwrap();

        assert_eq!(session.state(), SessionState::AwaitingTurnResponse(0));
        let kinds: Vec<_> = events.iter().map(ClientEvent::kind).collect();
        assert_eq!(kinds, ["conversation.item.create", "response.create"]);

        assert!(session.on_connected().is_err());
    }

    #[test]
    fn test_session_update_sent_first_when_enabled() {
        let request = SynthesisRequest::new("Hi").with_voice("alloy");
        let mut session = ProtocolSession::new(
            TurnScript::for_request(&request, false).unwrap(),
            SessionOptions {
                voice: request.voice().map(str::to_string),
                response_instructions: "Speak".to_string(),
                session_update: true,
            },
        );

        let events = session.on_connected().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ClientEvent::session_update(Some("alloy")));
    }

    #[test]
    fn test_single_turn_produces_container_and_transcript() {
        let mut session = session(1);
        session.on_connected().unwrap();

        for event in [
            ServerEvent::AudioDelta(vec![0x01, 0x00, 0x02, 0x00]),
            ServerEvent::TranscriptDelta("H".to_string()),
            ServerEvent::TranscriptDelta("i".to_string()),
            ServerEvent::TranscriptDone("Hi".to_string()),
            ServerEvent::AudioDone,
        ] {
            assert!(matches!(
                session.handle_event(event),
                SessionAction::Continue
            ));
        }

        let turn = finalize(session.handle_event(done()));
        assert_eq!(turn.container.len(), 48);
        assert_eq!(&turn.container[WAV_HEADER_SIZE..], &[0x01, 0x00, 0x02, 0x00]);
        assert_eq!(turn.transcript, "Hi");
        assert_eq!(turn.sample_count, 2);
        assert_eq!(session.state(), SessionState::TerminatingSuccess);
    }

    #[test]
    fn test_transcript_done_overrides_deltas() {
        let mut session = session(1);
        session.on_connected().unwrap();

        session.handle_event(ServerEvent::TranscriptDelta("Helo wrld".to_string()));
        session.handle_event(ServerEvent::TranscriptDone("Hello world".to_string()));
        assert_eq!(session.current_turn().transcript(), "Hello world");
    }

    #[test]
    fn test_warm_up_turn_output_is_discarded() {
        let mut session = session(2);
        session.on_connected().unwrap();

        session.handle_event(ServerEvent::AudioDelta(vec![0xAA, 0xAA, 0xBB, 0xBB]));
        session.handle_event(ServerEvent::TranscriptDone("warm".to_string()));

        match session.handle_event(done()) {
            SessionAction::Send(events) => {
                let kinds: Vec<_> = events.iter().map(ClientEvent::kind).collect();
                assert_eq!(kinds, ["conversation.item.create", "response.create"]);
            }
            other => panic!("expected Send, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::AwaitingTurnResponse(1));
        assert_eq!(session.current_turn().sample_count(), 0);
        assert_eq!(session.current_turn().transcript(), "");

        session.handle_event(ServerEvent::AudioDelta(vec![0x05, 0x00]));
        session.handle_event(ServerEvent::TranscriptDone("real".to_string()));

        let turn = finalize(session.handle_event(done()));
        assert_eq!(&turn.container[WAV_HEADER_SIZE..], &[0x05, 0x00]);
        assert_eq!(turn.transcript, "real");
    }

    #[test]
    fn test_content_filter_terminates_without_result() {
        let mut session = session(1);
        session.on_connected().unwrap();
        session.handle_event(ServerEvent::AudioDelta(vec![0x01, 0x00]));

        let action = session.handle_event(ServerEvent::TurnDone {
            status: "incomplete".to_string(),
            reason: Some("content_filter".to_string()),
            error: None,
        });
        match action {
            SessionAction::Fail(e) => assert!(e.is_content_filter()),
            other => panic!("expected Fail, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::TerminatingError);
    }

    #[test]
    fn test_content_filter_during_warm_up_does_not_advance() {
        let mut session = session(2);
        session.on_connected().unwrap();

        let action = session.handle_event(ServerEvent::TurnDone {
            status: "incomplete".to_string(),
            reason: Some("content-filter".to_string()),
            error: None,
        });
        assert!(matches!(action, SessionAction::Fail(ref e) if e.is_content_filter()));
        assert_eq!(session.state(), SessionState::TerminatingError);
    }

    #[test]
    fn test_other_incomplete_status_is_remote_rejection() {
        let mut session = session(1);
        session.on_connected().unwrap();

        let action = session.handle_event(ServerEvent::TurnDone {
            status: "incomplete".to_string(),
            reason: Some("max_output_tokens".to_string()),
            error: None,
        });
        match action {
            SessionAction::Fail(SynthesisError::RemoteRejection(rejection)) => {
                assert!(rejection.to_string().contains("max_output_tokens"));
            }
            other => panic!("expected remote rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_error_event_terminates() {
        let mut session = session(2);
        session.on_connected().unwrap();

        let action = session.handle_event(ServerEvent::Error {
            message: "Invalid voice".to_string(),
        });
        match action {
            SessionAction::Fail(e) => {
                assert!(!e.is_content_filter());
                assert_eq!(e.to_string(), "Remote rejection: Invalid voice");
            }
            other => panic!("expected Fail, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::TerminatingError);
    }

    #[test]
    fn test_odd_length_audio_is_protocol_error() {
        let mut session = session(1);
        session.on_connected().unwrap();

        let action = session.handle_event(ServerEvent::AudioDelta(vec![0x01, 0x00, 0x02]));
        assert!(matches!(
            action,
            SessionAction::Fail(SynthesisError::Protocol(_))
        ));
        assert_eq!(session.state(), SessionState::TerminatingError);
    }

    #[test]
    fn test_events_after_termination_are_ignored() {
        let mut session = session(1);
        session.on_connected().unwrap();
        session.handle_event(ServerEvent::AudioDelta(vec![0x01, 0x00]));
        let turn = finalize(session.handle_event(done()));

        assert!(matches!(
            session.handle_event(ServerEvent::AudioDelta(vec![0x09, 0x00])),
            SessionAction::Continue
        ));
        assert!(matches!(
            session.handle_event(ServerEvent::Error {
                message: "late".to_string()
            }),
            SessionAction::Continue
        ));
        assert_eq!(session.state(), SessionState::TerminatingSuccess);
        assert_eq!(&turn.container[WAV_HEADER_SIZE..], &[0x01, 0x00]);
        assert!(session.on_transport_closed("closed").is_none());
    }

    #[test]
    fn test_late_deltas_after_final_turn_leave_no_audio() {
        let mut session = session(1);
        session.on_connected().unwrap();
        session.handle_event(ServerEvent::TranscriptDelta("Hel".to_string()));
        finalize(session.handle_event(done()));

        session.handle_event(ServerEvent::AudioDelta(vec![0x02, 0x00, 0x03, 0x00]));
        session.handle_event(ServerEvent::TranscriptDelta("lo".to_string()));
        session.handle_event(ServerEvent::TranscriptDone("late".to_string()));

        assert_eq!(session.state(), SessionState::TerminatingSuccess);
        assert_eq!(session.current_turn().sample_count(), 0);
        assert_eq!(session.current_turn().transcript(), "");
    }

    #[test]
    fn test_turn_done_before_start_is_protocol_error() {
        let mut session = session(1);
        assert!(matches!(
            session.handle_event(ServerEvent::Other("session.created".to_string())),
            SessionAction::Continue
        ));
        assert!(matches!(
            session.handle_event(done()),
            SessionAction::Fail(SynthesisError::Protocol(_))
        ));
    }

    #[test]
    fn test_transport_close_mid_turn() {
        let mut session = session(1);
        session.on_connected().unwrap();
        session.handle_event(ServerEvent::AudioDelta(vec![0x01, 0x00]));

        let error = session.on_transport_closed("reset by peer").unwrap();
        assert!(matches!(error, SynthesisError::Transport(_)));
        assert!(error.to_string().contains("during turn 0"));
        assert_eq!(session.state(), SessionState::TerminatingError);
        assert_eq!(session.current_turn().sample_count(), 0);
    }

    #[test]
    fn test_malformed_frame_fails_live_session_only() {
        let mut session = session(1);
        session.on_connected().unwrap();
        assert!(matches!(
            session.on_malformed_frame("bad json"),
            Some(SynthesisError::Protocol(_))
        ));
        assert!(session.on_malformed_frame("again").is_none());
    }

    #[test]
    fn test_cancel_and_publish_failure() {
        let mut session = session(1);
        session.on_connected().unwrap();
        assert!(session.cancel());
        assert!(!session.cancel());
        assert_eq!(session.state(), SessionState::TerminatingError);

        let mut session = self::session(1);
        session.on_connected().unwrap();
        finalize(session.handle_event(done()));
        session.record_publish_failure();
        assert_eq!(session.state(), SessionState::TerminatingError);
    }
}
