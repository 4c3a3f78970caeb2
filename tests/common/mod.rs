//! Shared fixtures: a reactive mock of the realtime service and helpers that
//! build a synthesizer against it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use roshi::config::{ServerConfig, StorageBackendKind};
use roshi::core::publisher::ResultPublisher;
use roshi::core::realtime::RealtimeConfig;
use roshi::core::storage::StorageBackend;
use roshi::core::synthesizer::SpeechSynthesizer;

/// What the mock says in answer to one `response.create`.
#[derive(Clone)]
pub struct TurnReply {
    pub pcm: Vec<u8>,
    pub transcript: String,
    pub status: &'static str,
    pub reason: Option<&'static str>,
}

impl TurnReply {
    pub fn completed(pcm: &[u8], transcript: &str) -> Self {
        Self {
            pcm: pcm.to_vec(),
            transcript: transcript.to_string(),
            status: "completed",
            reason: None,
        }
    }

    pub fn filtered() -> Self {
        Self {
            pcm: Vec::new(),
            transcript: String::new(),
            status: "incomplete",
            reason: Some("content_filter"),
        }
    }
}

pub struct RealtimeMock {
    pub url: String,
    handle: JoinHandle<Vec<Value>>,
}

impl RealtimeMock {
    /// Every client message received before the connection closed.
    pub async fn received(self) -> Vec<Value> {
        self.handle.await.expect("mock task panicked")
    }
}

/// Accept one connection; answer each `response.create` with the next reply.
pub async fn spawn_realtime_mock(replies: Vec<TurnReply>) -> RealtimeMock {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut replies: VecDeque<TurnReply> = replies.into();
        let mut received = Vec::new();

        loop {
            let message = match tokio::time::timeout(Duration::from_secs(10), ws.next()).await {
                Ok(Some(Ok(message))) => message,
                _ => break,
            };
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let event: Value = serde_json::from_str(text.as_str()).unwrap();
            let is_response_create = event["type"] == "response.create";
            received.push(event);
            if !is_response_create {
                continue;
            }

            let Some(reply) = replies.pop_front() else {
                break;
            };
            for event in reply_events(&reply) {
                if ws.send(Message::Text(event.to_string().into())).await.is_err() {
                    return received;
                }
            }
        }
        received
    });

    RealtimeMock {
        url: format!("ws://{addr}"),
        handle,
    }
}

fn reply_events(reply: &TurnReply) -> Vec<Value> {
    let mut events = vec![json!({"type": "response.created", "response": {"id": "resp"}})];
    if !reply.pcm.is_empty() {
        events.push(json!({"type": "response.audio.delta", "delta": BASE64.encode(&reply.pcm)}));
        events.push(json!({
            "type": "response.audio_transcript.done",
            "transcript": reply.transcript,
        }));
        events.push(json!({"type": "response.audio.done"}));
    }
    events.push(json!({
        "type": "response.done",
        "response": {
            "status": reply.status,
            "status_details": reply.reason.map(|r| json!({"type": reply.status, "reason": r})),
        }
    }));
    events
}

pub fn realtime_config(url: &str, warm_up_turn: bool) -> RealtimeConfig {
    RealtimeConfig {
        api_key: "sk-test".to_string(),
        url: url.to_string(),
        warm_up_turn,
        connect_timeout: Duration::from_secs(2),
        turn_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    }
}

pub fn synthesizer(
    url: &str,
    warm_up_turn: bool,
    storage: Arc<dyn StorageBackend>,
) -> SpeechSynthesizer {
    SpeechSynthesizer::new(
        realtime_config(url, warm_up_turn),
        ResultPublisher::new(storage, "audio/"),
    )
}

pub fn server_config(realtime_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8080,
        app_version: "9.9.9".to_string(),
        environment: "test".to_string(),
        openai_api_key: Some("sk-test".to_string()),
        realtime_url: realtime_url.to_string(),
        realtime_model: RealtimeConfig::DEFAULT_MODEL.to_string(),
        default_voice: None,
        warm_up_turn: false,
        session_update: false,
        turn_timeout_seconds: Some(5),
        connect_timeout_seconds: 2,
        storage_backend: StorageBackendKind::Gcs,
        storage_bucket: Some("unused".to_string()),
        storage_prefix: "audio/".to_string(),
        audio_dir: std::env::temp_dir(),
        public_base_url: "http://localhost:8080".to_string(),
        google_credentials: None,
        gcp_project_id: None,
        secret_prefix: "roshi-server-env-vars".to_string(),
    }
}
