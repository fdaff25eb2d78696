//! Tests for streaming generation: pass-through, cached replays, the
//! paced offline fallback stream, and the request ceiling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bifrost::backend::EventStream;
use bifrost::fallback;
use bifrost::limit::SlidingWindow;
use bifrost::net::{NetworkMonitor, StaticSignal};
use bifrost::store::{StoreAdapter, StoreConfig};
use bifrost::types::{GenerationRequest, GenerationResult, QueueItem, StreamEvent};
use bifrost::{
    BifrostError, GenerationBackend, OfflineQueue, ProviderRouter, ReplayTransport, Result,
    ResultCache, RouterConfig,
};
use futures_util::StreamExt;

struct NoopTransport;

#[async_trait]
impl ReplayTransport for NoopTransport {
    async fn replay(&self, _item: &QueueItem) -> Result<()> {
        Ok(())
    }
}

/// Streams fixed chunks followed by the assembled result.
struct ChunkingBackend {
    chunks: Vec<&'static str>,
}

#[async_trait]
impl GenerationBackend for ChunkingBackend {
    fn name(&self) -> &str {
        "chunking"
    }

    async fn generate_content(&self, _request: &GenerationRequest) -> Result<GenerationResult> {
        Ok(GenerationResult::new("chunking", self.chunks.concat()))
    }

    async fn stream_content(&self, _request: &GenerationRequest) -> Result<EventStream> {
        let result = GenerationResult::new("chunking", self.chunks.concat());
        let events: Vec<Result<StreamEvent>> = self
            .chunks
            .iter()
            .map(|c| {
                Ok(StreamEvent::Chunk {
                    text: c.to_string(),
                })
            })
            .chain(std::iter::once(Ok(StreamEvent::Done { result })))
            .collect();
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

/// Accepts the request and then never yields anything.
struct HangingBackend;

#[async_trait]
impl GenerationBackend for HangingBackend {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate_content(&self, _request: &GenerationRequest) -> Result<GenerationResult> {
        std::future::pending().await
    }

    async fn stream_content(&self, _request: &GenerationRequest) -> Result<EventStream> {
        Ok(Box::pin(futures_util::stream::pending()))
    }
}

fn router(online: bool, config: RouterConfig) -> ProviderRouter {
    let store = Arc::new(StoreAdapter::open(&StoreConfig::InMemory));
    let monitor = Arc::new(NetworkMonitor::new(&StaticSignal(online)));
    let queue = Arc::new(OfflineQueue::new(Arc::clone(&store), Arc::new(NoopTransport)));
    ProviderRouter::new(
        store,
        queue,
        monitor,
        Arc::new(ResultCache::new()),
        SlidingWindow::new(),
        config,
    )
}

fn request() -> GenerationRequest {
    GenerationRequest::new("demo", vec!["Write a tagline".into()]).purpose("general")
}

async fn collect(mut stream: EventStream) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.expect("stream error"));
    }
    events
}

fn reassemble(events: &[StreamEvent]) -> (String, GenerationResult) {
    let mut text = String::new();
    let mut done = None;
    for event in events {
        match event {
            StreamEvent::Chunk { text: chunk } => text.push_str(chunk),
            StreamEvent::Done { result } => done = Some(result.clone()),
        }
    }
    (text, done.expect("missing Done event"))
}

#[tokio::test]
async fn backend_stream_passes_chunks_through() {
    let mut router = router(true, RouterConfig::default());
    router.set_backend(Arc::new(ChunkingBackend {
        chunks: vec!["Hel", "lo ", "world"],
    }));

    let events = collect(router.generate_stream(&request()).await.unwrap()).await;
    let (text, done) = reassemble(&events);
    assert_eq!(text, "Hello world");
    assert_eq!(done.text, "Hello world");
    assert_eq!(done.provider, "chunking");
}

#[tokio::test]
async fn streamed_result_lands_in_the_cache() {
    let mut router = router(true, RouterConfig::default());
    router.set_backend(Arc::new(ChunkingBackend {
        chunks: vec!["Hello"],
    }));

    let events = collect(router.generate_stream(&request()).await.unwrap()).await;
    let (_, done) = reassemble(&events);

    // the non-streaming call now hits the cache with the streamed result
    let cached = router.generate(&request()).await.unwrap();
    assert_eq!(cached, done);
}

#[tokio::test]
async fn cache_hit_streams_full_text_then_done() {
    let mut router = router(true, RouterConfig::default());
    router.set_backend(Arc::new(ChunkingBackend {
        chunks: vec!["Hello"],
    }));

    let primed = router.generate(&request()).await.unwrap();
    let events = collect(router.generate_stream(&request()).await.unwrap()).await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        StreamEvent::Chunk {
            text: primed.text.clone()
        }
    );
    assert_eq!(events[1], StreamEvent::Done { result: primed });
}

#[tokio::test]
async fn offline_stream_reassembles_the_template() {
    let router = router(false, RouterConfig::default());

    let events = collect(router.generate_stream(&request()).await.unwrap()).await;
    let (text, done) = reassemble(&events);

    let expected = fallback::offline_template(Some("general"), &["Write a tagline".to_string()]);
    assert_eq!(text, expected);
    assert_eq!(done.text, expected);
    assert_eq!(done.provider, "offline-fallback");
    // more than one chunk, so callers see incremental delivery
    assert!(events.len() > 2);
}

#[tokio::test(start_paused = true)]
async fn offline_chunks_are_paced() {
    let delay = Duration::from_millis(30);
    let config = RouterConfig {
        chunk_delay: delay,
        ..RouterConfig::default()
    };
    let router = router(false, config);

    let start = tokio::time::Instant::now();
    let events = collect(router.generate_stream(&request()).await.unwrap()).await;
    let elapsed = start.elapsed();

    // one delay between each pair of chunks (the Done event is not paced)
    let chunks = events.len() - 1;
    assert!(chunks > 1);
    assert!(elapsed >= delay * (chunks as u32 - 1));
}

#[tokio::test(start_paused = true)]
async fn hung_stream_is_closed_with_timeout() {
    let config = RouterConfig {
        request_timeout: Duration::from_secs(5),
        ..RouterConfig::default()
    };
    let mut router = router(true, config);
    router.set_backend(Arc::new(HangingBackend));

    let mut stream = router.generate_stream(&request()).await.unwrap();
    let event = stream.next().await.expect("expected a terminal error");
    assert!(matches!(event, Err(BifrostError::Timeout(5))));
    // the channel closes after the terminal error
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn hung_request_times_out_onto_the_offline_path() {
    let config = RouterConfig {
        request_timeout: Duration::from_secs(5),
        ..RouterConfig::default()
    };
    let mut router = router(true, config);
    router.set_backend(Arc::new(HangingBackend));

    // a timeout counts as a connectivity failure, so the caller still
    // receives a usable result
    let result = router.generate(&request()).await.unwrap();
    assert_eq!(result.provider, "offline-fallback");
}
