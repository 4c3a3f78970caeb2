mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{TurnReply, spawn_realtime_mock, synthesizer};
use roshi::core::realtime::{SynthesisRequest, TurnScript, TurnSpec};
use roshi::core::storage::{ObjectStoreStorage, StorageBackend, StorageError, StorageResult};
use roshi::core::{Rejection, SynthesisError};

fn samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Backend whose writes always fail.
#[derive(Default)]
struct FailingStorage {
    saves: AtomicUsize,
    made_public: AtomicUsize,
}

#[async_trait]
impl StorageBackend for FailingStorage {
    async fn save(&self, _key: &str, _bytes: Bytes, _content_type: &str) -> StorageResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::WriteFailed("bucket is read-only".to_string()))
    }

    async fn make_public(&self, _key: &str) -> StorageResult<()> {
        self.made_public.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://cdn.test/{key}")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_warm_up_audio_is_discarded() {
    let warm_up_pcm = [9, 9, 9, 9];
    let final_pcm = [1, 0, 0xFF, 0x7F, 0, 0x80, 0xFE, 0xFF];
    let mock = spawn_realtime_mock(vec![
        TurnReply::completed(&warm_up_pcm, "Hello."),
        TurnReply::completed(&final_pcm, "Good morning"),
    ])
    .await;

    let dir = TempDir::new().unwrap();
    let storage = Arc::new(ObjectStoreStorage::local(dir.path(), "http://localhost:8080/audio").unwrap());
    let synth = synthesizer(&mock.url, true, storage);

    let result = synth
        .synthesize(
            &SynthesisRequest::new("Good morning"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.transcript, "Good morning");
    let key = result
        .audio_url
        .strip_prefix("http://localhost:8080/audio/")
        .unwrap();

    // The written file is a valid mono 24 kHz PCM16 WAV holding only the final turn.
    let mut reader = hound::WavReader::open(dir.path().join(key)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.bits_per_sample, 16);
    let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(read, samples(&final_pcm));

    let received = mock.received().await;
    let creates = received
        .iter()
        .filter(|m| m["type"] == "response.create")
        .count();
    assert_eq!(creates, 2);
}

#[tokio::test]
async fn test_explicit_script_publishes_last_turn() {
    let mock = spawn_realtime_mock(vec![
        TurnReply::completed(&[1, 0], "one"),
        TurnReply::completed(&[2, 0], "two"),
        TurnReply::completed(&[3, 0, 4, 0], "three"),
    ])
    .await;

    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));
    let synth = synthesizer(&mock.url, false, storage);

    let script = TurnScript::new(vec![
        TurnSpec::new("one", "plain"),
        TurnSpec::new("two", "plain"),
        TurnSpec::new("three", "plain"),
    ])
    .unwrap();

    let result = synth
        .synthesize_script(script, Some("verse"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.transcript, "three");

    let received = mock.received().await;
    let items: Vec<&Value> = received
        .iter()
        .filter(|m| m["type"] == "conversation.item.create")
        .collect();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_rejection_on_final_turn_publishes_nothing() {
    let mock = spawn_realtime_mock(vec![
        TurnReply::completed(&[1, 0], "Hello."),
        TurnReply::filtered(),
    ])
    .await;

    let dir = TempDir::new().unwrap();
    let storage = Arc::new(ObjectStoreStorage::local(dir.path(), "http://localhost/audio").unwrap());
    let synth = synthesizer(&mock.url, true, storage);

    let err = synth
        .synthesize(&SynthesisRequest::new("nope"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SynthesisError::RemoteRejection(Rejection::ContentFilter)
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let mock = spawn_realtime_mock(vec![TurnReply::completed(&[1, 0], "late")]).await;
    let storage = Arc::new(ObjectStoreStorage::in_memory("http://cdn.test"));
    let synth = synthesizer(&mock.url, false, storage);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = synth
        .synthesize(&SynthesisRequest::new("Hello"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Cancelled));
}

#[tokio::test]
async fn test_publish_failure_surfaces_storage_error() {
    let mock = spawn_realtime_mock(vec![TurnReply::completed(&[1, 0, 2, 0], "Hello")]).await;
    let storage = Arc::new(FailingStorage::default());
    let synth = synthesizer(&mock.url, false, storage.clone());

    let err = synth
        .synthesize(&SynthesisRequest::new("Hello"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SynthesisError::Storage(StorageError::WriteFailed(message)) => {
            assert!(message.contains("read-only"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(storage.saves.load(Ordering::SeqCst), 1);
    assert_eq!(storage.made_public.load(Ordering::SeqCst), 0);
}
