//! End-to-end engine tests: builder wiring, the offline scenario, and
//! replay on reconnect.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bifrost::backend::EventStream;
use bifrost::net::StaticSignal;
use bifrost::store::{StoreAdapter, StoreConfig};
use bifrost::types::{GenerationRequest, GenerationResult, QueueItem, QueueMethod};
use bifrost::{
    Bifrost, BifrostError, GenerationBackend, NetworkState, ReplayTransport, Result,
};

struct EchoBackend;

#[async_trait]
impl GenerationBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate_content(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        Ok(GenerationResult::new("echo", request.inputs.join(" ")))
    }

    async fn stream_content(&self, request: &GenerationRequest) -> Result<EventStream> {
        let result = GenerationResult::new("echo", request.inputs.join(" "));
        Ok(Box::pin(tokio_stream::iter([Ok(
            bifrost::StreamEvent::Done { result },
        )])))
    }
}

struct UnreachableBackend;

#[async_trait]
impl GenerationBackend for UnreachableBackend {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn generate_content(&self, _request: &GenerationRequest) -> Result<GenerationResult> {
        Err(BifrostError::Network("no route to host".into()))
    }

    async fn stream_content(&self, _request: &GenerationRequest) -> Result<EventStream> {
        Err(BifrostError::Network("no route to host".into()))
    }
}

#[derive(Default)]
struct RecordingTransport {
    replayed: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn count(&self) -> usize {
        self.replayed.lock().unwrap().len()
    }
}

#[async_trait]
impl ReplayTransport for RecordingTransport {
    async fn replay(&self, item: &QueueItem) -> Result<()> {
        self.replayed.lock().unwrap().push(item.endpoint.clone());
        Ok(())
    }
}

fn request() -> GenerationRequest {
    GenerationRequest::new("demo", vec!["Write a tagline".into()]).purpose("general")
}

async fn wait_for_empty_queue(engine: &Bifrost) {
    for _ in 0..100 {
        if engine.queue_len().unwrap() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queue never drained");
}

#[tokio::test]
async fn build_without_a_replay_target_fails() {
    let err = Bifrost::builder().build().unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
}

#[tokio::test]
async fn generate_round_trips_through_a_custom_backend() {
    let engine = Bifrost::builder()
        .backend(Arc::new(EchoBackend))
        .transport(Arc::new(RecordingTransport::default()))
        .store(StoreConfig::InMemory)
        .build()
        .unwrap();

    let result = engine.generate(&request()).await.unwrap();
    assert_eq!(result.text, "Write a tagline");
    assert_eq!(result.provider, "echo");

    let history = engine.history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], result);
}

#[tokio::test]
async fn offline_generation_yields_fallback_and_queues_replay() {
    let engine = Bifrost::builder()
        .backend(Arc::new(UnreachableBackend))
        .transport(Arc::new(RecordingTransport::default()))
        .connectivity(StaticSignal(false))
        .store(StoreConfig::InMemory)
        .build()
        .unwrap();

    assert_eq!(engine.network_state(), NetworkState::Offline);

    let result = engine.generate(&request()).await.unwrap();
    assert_eq!(result.provider, "offline-fallback");
    assert!(result.text.contains("Write a tagline"));
    assert_eq!(engine.queue_len().unwrap(), 1);
}

#[tokio::test]
async fn reconnect_replays_queued_work_exactly_once() {
    let transport = Arc::new(RecordingTransport::default());
    let engine = Bifrost::builder()
        .backend(Arc::new(UnreachableBackend))
        .transport(Arc::clone(&transport))
        .connectivity(StaticSignal(false))
        .store(StoreConfig::InMemory)
        .build()
        .unwrap();

    engine.generate(&request()).await.unwrap();
    assert_eq!(engine.queue_len().unwrap(), 1);

    engine.set_online(true);
    wait_for_empty_queue(&engine).await;
    assert_eq!(transport.count(), 1);

    // a repeated online event must not replay anything again
    engine.set_online(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.count(), 1);
    assert_eq!(engine.queue_len().unwrap(), 0);
}

#[tokio::test]
async fn startup_drain_replays_items_from_an_earlier_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    // a previous session left work behind
    {
        let store = StoreAdapter::open(&StoreConfig::Path(path.clone()));
        store
            .enqueue_item(QueueMethod::Post, "/api/generate", None)
            .unwrap();
    }

    let transport = Arc::new(RecordingTransport::default());
    let engine = Bifrost::builder()
        .backend(Arc::new(EchoBackend))
        .transport(Arc::clone(&transport))
        .store(StoreConfig::Path(path))
        .build()
        .unwrap();

    wait_for_empty_queue(&engine).await;
    assert_eq!(transport.count(), 1);
}

#[tokio::test]
async fn manual_drain_is_available_to_hosts() {
    let transport = Arc::new(RecordingTransport::default());
    let engine = Bifrost::builder()
        .backend(Arc::new(UnreachableBackend))
        .transport(Arc::clone(&transport))
        .connectivity(StaticSignal(false))
        .store(StoreConfig::InMemory)
        .build()
        .unwrap();

    engine.generate(&request()).await.unwrap();

    // still offline; the host decides to retry anyway
    let outcome = engine.drain_queue().await.unwrap();
    assert_eq!(outcome.replayed, 1);
    assert_eq!(engine.queue_len().unwrap(), 0);
}

#[tokio::test]
async fn network_state_follows_host_events() {
    let engine = Bifrost::builder()
        .backend(Arc::new(EchoBackend))
        .transport(Arc::new(RecordingTransport::default()))
        .store(StoreConfig::InMemory)
        .build()
        .unwrap();

    assert_eq!(engine.network_state(), NetworkState::Online);
    engine.set_online(false);
    assert_eq!(engine.network_state(), NetworkState::Offline);
    engine.set_online(true);
    assert_eq!(engine.network_state(), NetworkState::Online);
}

#[tokio::test]
async fn settings_round_trip() {
    let engine = Bifrost::builder()
        .backend(Arc::new(EchoBackend))
        .transport(Arc::new(RecordingTransport::default()))
        .store(StoreConfig::InMemory)
        .build()
        .unwrap();

    engine
        .put_setting("refresh_minutes", &serde_json::json!(15))
        .unwrap();
    let got: Option<serde_json::Value> = engine.setting("refresh_minutes").unwrap();
    assert_eq!(got, Some(serde_json::json!(15)));

    let missing: Option<serde_json::Value> = engine.setting("absent").unwrap();
    assert!(missing.is_none());
}
