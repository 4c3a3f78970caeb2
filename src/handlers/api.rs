use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    /// Deployed version
    #[cfg_attr(feature = "openapi", schema(example = "0.1.0"))]
    pub app_version: String,
    /// Whether a realtime API key is configured
    pub has_key: bool,
    /// Deployment environment label
    #[cfg_attr(feature = "openapi", schema(example = "production"))]
    pub env: String,
    #[cfg_attr(feature = "openapi", schema(example = "OK"))]
    pub status: String,
}

/// Health check handler
/// Returns the deployed version and whether the server can reach the model
#[cfg_attr(
    feature = "openapi",
    utoipa::path(
        get,
        path = "/",
        responses((status = 200, description = "Server is running", body = HealthResponse)),
        tag = "health"
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        app_version: state.config.app_version.clone(),
        has_key: state.config.has_api_key(),
        env: state.config.environment.clone(),
        status: "OK".to_string(),
    })
}
