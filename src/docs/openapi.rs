//! OpenAPI specification and documentation
//!
//! Only compiled when the `openapi` feature is enabled.

use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

use crate::handlers::{
    api::HealthResponse,
    send_message::{SendMessageRequest, SendMessageResponse},
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roshi API",
        version = "0.1.0",
        description = "Text-to-speech relay: reads text through a realtime speech model and publishes the result as a WAV file"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::api::health_check,
        crate::handlers::send_message::send_message,
    ),
    components(schemas(HealthResponse, SendMessageRequest, SendMessageResponse)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tts", description = "Text-to-speech synthesis")
    )
)]
pub struct ApiDoc;

/// Routes serving the document:
/// - `GET /docs/openapi.json`
/// - `GET /docs/openapi.yaml`
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/docs/openapi.json", get(openapi_json_handler))
        .route("/docs/openapi.yaml", get(openapi_yaml_handler))
}

async fn openapi_json_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn openapi_yaml_handler() -> ([(axum::http::header::HeaderName, &'static str); 1], String) {
    let yaml = spec_yaml().unwrap_or_else(|e| format!("Error generating YAML: {e}"));
    ([(axum::http::header::CONTENT_TYPE, "application/yaml")], yaml)
}

/// OpenAPI document as YAML, used by the `openapi` CLI command
pub fn spec_yaml() -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&ApiDoc::openapi())
}

/// OpenAPI document as JSON
pub fn spec_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ApiDoc::openapi())
}
