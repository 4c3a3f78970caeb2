use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::StorageBackendKind;
use crate::handlers::{api, send_message};
use crate::state::AppState;

pub fn create_api_router(state: &AppState) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/", get(api::health_check))
        .route("/send_message", post(send_message::send_message));

    // Local audio is served from the same origin as the API
    let router = match state.config.storage_backend {
        StorageBackendKind::Local => {
            router.nest_service("/audio", ServeDir::new(&state.config.audio_dir))
        }
        StorageBackendKind::Gcs => router,
    };

    router.layer(TraceLayer::new_for_http())
}
