use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::realtime::SynthesisRequest;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for the send_message endpoint
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendMessageRequest {
    /// The text to read aloud
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(example = "Hello, world!"))]
    pub text: Option<String>,
    /// Voice override; the configured default is used when absent
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(example = "alloy"))]
    pub voice: Option<String>,
    /// How the text should be read
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Response body for a successful synthesis
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendMessageResponse {
    /// Public URL of the WAV file
    pub audio_url: String,
    /// What the model said, as reported by the service
    pub transcript: String,
    /// Always null on success
    pub error: Option<String>,
}

/// Handler for the /send_message endpoint
///
/// The synthesis runs in its own task. If the client disconnects, the drop
/// guard cancels the token and the remote session is closed.
#[cfg_attr(
    feature = "openapi",
    utoipa::path(
        post,
        path = "/send_message",
        request_body = SendMessageRequest,
        responses(
            (status = 200, description = "Audio synthesized and published", body = SendMessageResponse),
            (status = 400, description = "Malformed body, or missing or blank text"),
            (status = 422, description = "Rejected by the content filter"),
            (status = 502, description = "Realtime service failed or rejected the turn"),
            (status = 500, description = "Publishing failed")
        ),
        tag = "tts"
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> AppResult<Json<SendMessageResponse>> {
    let Json(body) = body.map_err(|rejection| {
        warn!(status = %rejection.status(), "Rejected request body");
        AppError::BadRequest(rejection.body_text())
    })?;
    let text = body
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Text is required".to_string()))?;

    let request = SynthesisRequest {
        text,
        voice: body.voice,
        instructions: body.instructions,
    };
    info!(
        text_len = request.text.len(),
        voice = request.voice().unwrap_or("default"),
        "Synthesis request received"
    );

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let synthesizer = state.synthesizer.clone();
    let task = tokio::spawn(async move { synthesizer.synthesize(&request, &cancel).await });

    let result = task.await.map_err(|e| {
        error!("Synthesis task failed: {}", e);
        AppError::InternalServerError(format!("synthesis task failed: {e}"))
    })?;
    guard.disarm();

    let synthesized = result?;
    Ok(Json(SendMessageResponse {
        audio_url: synthesized.audio_url,
        transcript: synthesized.transcript,
        error: None,
    }))
}
