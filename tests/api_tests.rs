mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use common::{TurnReply, server_config, spawn_realtime_mock, synthesizer};
use roshi::core::audio::{WAV_HEADER_SIZE, WavHeader};
use roshi::core::storage::ObjectStoreStorage;
use roshi::{routes, state::AppState};

fn app_with(realtime_url: &str, storage: Arc<ObjectStoreStorage>) -> Router {
    let state = AppState::with_synthesizer(
        server_config(realtime_url),
        synthesizer(realtime_url, false, storage),
    );
    routes::api::create_api_router(&state).with_state(state)
}

async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/send_message")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));
    let app = app_with("ws://127.0.0.1:9", storage);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "OK");
    assert_eq!(json["appVersion"], "9.9.9");
    assert_eq!(json["hasKey"], true);
    assert_eq!(json["env"], "test");
}

#[tokio::test]
async fn test_send_message_requires_text() {
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));

    for body in [json!({}), json!({"text": ""}), json!({"text": "   "})] {
        let app = app_with("ws://127.0.0.1:9", storage.clone());
        let (status, json) = post_json(app, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Text is required");
        assert!(json["response"].is_null());
    }
}

#[tokio::test]
async fn test_send_message_publishes_audio() {
    let mock = spawn_realtime_mock(vec![TurnReply::completed(&[1, 0, 2, 0, 3, 0], "Hello")]).await;
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));
    let app = app_with(&mock.url, storage.clone());

    let (status, json) = post_json(
        app,
        json!({"text": "Hello", "voice": "alloy", "instructions": "Whisper it"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transcript"], "Hello");
    assert!(json["error"].is_null());

    let url = json["audioUrl"].as_str().unwrap();
    let key = url.strip_prefix("http://cdn.test/").unwrap();
    assert!(key.starts_with("audio/response_"));
    assert!(key.ends_with(".wav"));

    let bytes = storage
        .store()
        .get(&ObjectPath::from(key))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(bytes.len(), WAV_HEADER_SIZE + 6);
    assert_eq!(WavHeader::parse(&bytes).unwrap().data_size, 6);

    let received = mock.received().await;
    let kinds: Vec<&str> = received.iter().filter_map(|m| m["type"].as_str()).collect();
    assert_eq!(kinds, vec!["conversation.item.create", "response.create"]);
    assert_eq!(received[1]["response"]["voice"], "alloy");
}

#[tokio::test]
async fn test_send_message_content_filter() {
    let mock = spawn_realtime_mock(vec![TurnReply::filtered()]).await;
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));
    let app = app_with(&mock.url, storage.clone());

    let (status, json) = post_json(app, json!({"text": "something rude"})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("content filter"));
    assert!(json["response"].is_null());

    let listed = storage.store().list_with_delimiter(None).await.unwrap();
    assert!(listed.objects.is_empty());
    assert!(listed.common_prefixes.is_empty());
}

#[tokio::test]
async fn test_send_message_unreachable_service() {
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));
    let app = app_with("ws://127.0.0.1:9", storage);

    let (status, json) = post_json(app, json!({"text": "Hello"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["response"].is_null());
}

#[tokio::test]
async fn test_send_message_rejects_malformed_body() {
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));

    for (content_type, raw) in [
        ("application/json", "{\"text\": "),
        ("application/json", "{\"text\": 5}"),
        ("text/plain", "{\"text\": \"Hello\"}"),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri("/send_message")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(raw))
            .unwrap();

        let app = app_with("ws://127.0.0.1:9", storage.clone());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(!json["error"].as_str().unwrap().is_empty());
        assert!(json["response"].is_null());
    }
}
