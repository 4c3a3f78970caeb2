//! Request-level entry point: script, session, publish.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::error::SynthesisError;
use crate::core::publisher::ResultPublisher;
use crate::core::realtime::{RealtimeClient, RealtimeConfig, SynthesisRequest, TurnScript};

/// Public location of the published audio plus what was spoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub audio_url: String,
    pub transcript: String,
}

/// Runs one realtime session per request and publishes the final turn.
///
/// Holds no per-request state; share it freely across concurrent requests.
#[derive(Clone)]
pub struct SpeechSynthesizer {
    client: RealtimeClient,
    publisher: ResultPublisher,
}

impl SpeechSynthesizer {
    pub fn new(config: RealtimeConfig, publisher: ResultPublisher) -> Self {
        Self {
            client: RealtimeClient::new(config),
            publisher,
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        self.client.config()
    }

    pub fn publisher(&self) -> &ResultPublisher {
        &self.publisher
    }

    /// Synthesize `request` using the configured turn policy.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResult, SynthesisError> {
        let script = TurnScript::for_request(request, self.config().warm_up_turn)
            .map_err(|e| SynthesisError::Protocol(format!("invalid request: {e}")))?;
        self.synthesize_script(script, request.voice(), cancel)
            .await
    }

    /// Run an explicit script. Only the last turn is published.
    pub async fn synthesize_script(
        &self,
        script: TurnScript,
        voice: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResult, SynthesisError> {
        let turns = script.len();
        let mut session = self.client.new_session(script, voice);
        info!(turns, "Starting synthesis");

        let turn = self.client.run(&mut session, cancel).await?;

        match self.publisher.publish(turn.container).await {
            Ok(audio_url) => Ok(SynthesisResult {
                audio_url,
                transcript: turn.transcript,
            }),
            Err(e) => {
                session.record_publish_failure();
                warn!("Discarding synthesized audio after publish failure");
                Err(SynthesisError::Storage(e))
            }
        }
    }
}
