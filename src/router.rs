//! Provider routing.
//!
//! The router is the orchestrator of the resilience chain. Every request
//! walks the same tiers:
//!
//! 1. client-side rate limit (fail fast, no network)
//! 2. result cache, keyed by request fingerprint
//! 3. locally configured provider matching `request.provider`
//! 4. the remote backend
//! 5. offline path: queue the request for replay and synthesize the
//!    deterministic template fallback
//!
//! A provider name that doesn't map onto the closed [`LocalProvider`]
//! enumeration simply skips tier 3 — it's a backend-side provider. The
//! offline path is taken only when the monitor reports Offline or the
//! backend failed with a connectivity-class error; an online
//! provider-reported failure propagates to the caller.
//!
//! Identical in-flight requests are intentionally not deduplicated: two
//! concurrent calls with equal fingerprints may both miss the cache and
//! both contact a provider. Wasteful, not incorrect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{instrument, warn};

use crate::backend::{EventStream, GenerationBackend, ProviderDiscovery};
use crate::cache::ResultCache;
use crate::error::{BifrostError, Result};
use crate::fallback::{self, FALLBACK_PROVIDER};
use crate::limit::SlidingWindow;
use crate::net::NetworkMonitor;
use crate::queue::OfflineQueue;
use crate::store::{Namespace, StoreAdapter};
use crate::telemetry;
use crate::types::{
    GenerationRequest, GenerationResult, LocalProvider, ProviderDescriptor, ProviderKind,
    QueueMethod, StreamEvent, merge_descriptors,
};

/// Default request ceiling: five minutes, after which the attempt (or the
/// streaming channel) is forcibly closed with `Timeout`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default delay between offline fallback chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Router behaviour knobs.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Continue to the backend when a local provider fails. When unset, a
    /// local failure propagates to the caller.
    pub fallback_to_backend: bool,
    /// Hard ceiling on any single attempt.
    pub request_timeout: Duration,
    /// Pacing between offline fallback chunks (bounded-time release, not
    /// tied to any provider's wall-clock).
    pub chunk_delay: Duration,
    /// Endpoint offline generation requests are queued against.
    pub generate_endpoint: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fallback_to_backend: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            generate_endpoint: crate::backend::GENERATE_ENDPOINT.to_string(),
        }
    }
}

/// Orchestrates cache, providers, backend, and the offline path.
pub struct ProviderRouter {
    cache: Arc<ResultCache>,
    limiter: SlidingWindow,
    local: HashMap<LocalProvider, Arc<dyn GenerationBackend>>,
    local_descriptors: Vec<ProviderDescriptor>,
    backend: Option<Arc<dyn GenerationBackend>>,
    discovery: Option<Arc<dyn ProviderDiscovery>>,
    store: Arc<StoreAdapter>,
    queue: Arc<OfflineQueue>,
    monitor: Arc<NetworkMonitor>,
    config: RouterConfig,
}

impl ProviderRouter {
    /// Create a router with no providers registered.
    pub fn new(
        store: Arc<StoreAdapter>,
        queue: Arc<OfflineQueue>,
        monitor: Arc<NetworkMonitor>,
        cache: Arc<ResultCache>,
        limiter: SlidingWindow,
        config: RouterConfig,
    ) -> Self {
        Self {
            cache,
            limiter,
            local: HashMap::new(),
            local_descriptors: Vec::new(),
            backend: None,
            discovery: None,
            store,
            queue,
            monitor,
            config,
        }
    }

    /// Register a locally configured provider. Requests whose provider
    /// name maps onto `provider` (case-insensitively) are attempted here
    /// before the backend.
    pub fn register_local(
        &mut self,
        provider: LocalProvider,
        backend: Arc<dyn GenerationBackend>,
        default_model: Option<String>,
    ) {
        let mut descriptor = ProviderDescriptor::available(provider.name(), ProviderKind::Local);
        descriptor.default_model = default_model;
        self.local_descriptors.push(descriptor);
        self.local.insert(provider, backend);
    }

    /// Set the remote backend capability.
    pub fn set_backend(&mut self, backend: Arc<dyn GenerationBackend>) {
        self.backend = Some(backend);
    }

    /// Set the provider discovery capability.
    pub fn set_discovery(&mut self, discovery: Arc<dyn ProviderDiscovery>) {
        self.discovery = Some(discovery);
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Produce a result for the request, never hard-failing while offline.
    #[instrument(skip(self, request), fields(provider = %request.provider, operation = "generate"))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.limiter.check("generate")?;

        let fingerprint = request.fingerprint();
        if let Some(hit) = self.cache.get(&fingerprint) {
            Self::record("generate", "cache", true);
            return Ok(hit);
        }

        if let Some(local) = self.local_backend(&request.provider) {
            match self.attempt(local.as_ref(), request).await {
                Ok(result) => {
                    self.cache.insert(fingerprint, result.clone());
                    Self::record("generate", "local", true);
                    return Ok(result);
                }
                Err(e) if self.config.fallback_to_backend => {
                    warn!(provider = %request.provider, error = %e, "local provider failed, trying backend");
                }
                Err(e) => {
                    Self::record("generate", "local", false);
                    return Err(e);
                }
            }
        }

        if let Some(backend) = &self.backend {
            match self.attempt(backend.as_ref(), request).await {
                Ok(result) => {
                    self.cache.insert(fingerprint, result.clone());
                    self.persist_history(&result);
                    Self::record("generate", "backend", true);
                    return Ok(result);
                }
                Err(e) if self.take_offline_path(&e) => {
                    warn!(error = %e, "backend unreachable, taking offline path");
                }
                Err(e) => {
                    Self::record("generate", "backend", false);
                    return Err(e);
                }
            }
        } else if self.monitor.is_online() {
            Self::record("generate", "backend", false);
            return Err(BifrostError::NoBackend);
        }

        Ok(self.offline_fallback(request, fingerprint))
    }

    /// Produce a chunked stream for the request.
    ///
    /// Mirrors [`generate()`](Self::generate): a cache hit streams the
    /// cached text; the offline path streams the template fallback in
    /// paced increments. Dropping the returned stream cancels delivery;
    /// already-delivered chunks are not rolled back and queued items stay
    /// queued.
    #[instrument(skip(self, request), fields(provider = %request.provider, operation = "generate_stream"))]
    pub async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        self.limiter.check("generate_stream")?;

        let fingerprint = request.fingerprint();
        if let Some(hit) = self.cache.get(&fingerprint) {
            Self::record("generate_stream", "cache", true);
            return Ok(Box::pin(tokio_stream::iter([
                Ok(StreamEvent::Chunk {
                    text: hit.text.clone(),
                }),
                Ok(StreamEvent::Done { result: hit }),
            ])));
        }

        if let Some(local) = self.local_backend(&request.provider) {
            match self.attempt_stream(local.clone(), request).await {
                Ok(stream) => {
                    Self::record("generate_stream", "local", true);
                    return Ok(stream);
                }
                Err(e) if self.config.fallback_to_backend => {
                    warn!(provider = %request.provider, error = %e, "local provider failed, trying backend");
                }
                Err(e) => {
                    Self::record("generate_stream", "local", false);
                    return Err(e);
                }
            }
        }

        if let Some(backend) = &self.backend {
            match self.attempt_stream(backend.clone(), request).await {
                Ok(stream) => {
                    Self::record("generate_stream", "backend", true);
                    return Ok(stream);
                }
                Err(e) if self.take_offline_path(&e) => {
                    warn!(error = %e, "backend unreachable, taking offline path");
                }
                Err(e) => {
                    Self::record("generate_stream", "backend", false);
                    return Err(e);
                }
            }
        } else if self.monitor.is_online() {
            Self::record("generate_stream", "backend", false);
            return Err(BifrostError::NoBackend);
        }

        Ok(self.offline_fallback_stream(request, fingerprint))
    }

    // ========================================================================
    // Provider listing
    // ========================================================================

    /// List providers: remote discovery merged with local configuration,
    /// de-duplicated by name with local winning ties. The merged listing
    /// is persisted to the `providers` namespace.
    #[instrument(skip(self), fields(operation = "list_providers"))]
    pub async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>> {
        self.limiter.check("list_providers")?;

        let remote = match &self.discovery {
            Some(discovery) if self.monitor.is_online() => {
                match discovery.list_providers().await {
                    Ok(list) => list,
                    Err(e) if e.is_connectivity() => {
                        warn!(error = %e, "provider discovery unreachable, listing local only");
                        Vec::new()
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => Vec::new(),
        };

        let merged = merge_descriptors(self.local_descriptors.clone(), remote);
        for descriptor in &merged {
            if let Err(e) = self
                .store
                .put(Namespace::Providers, Some(&descriptor.name), descriptor)
            {
                warn!(provider = %descriptor.name, error = %e, "failed to persist provider descriptor");
            }
        }
        Ok(merged)
    }

    /// Recent generation history from the `prompts` namespace, newest
    /// first.
    pub fn history(&self, limit: usize) -> Result<Vec<GenerationResult>> {
        let mut results: Vec<GenerationResult> = self.store.get_all(Namespace::Prompts)?;
        results.truncate(limit);
        Ok(results)
    }

    // ========================================================================
    // Chain internals
    // ========================================================================

    fn local_backend(&self, name: &str) -> Option<&Arc<dyn GenerationBackend>> {
        // names outside the closed enumeration are backend-side providers
        let provider = LocalProvider::from_name(name).ok()?;
        self.local.get(&provider)
    }

    /// Whether a backend failure routes the request onto the offline path.
    fn take_offline_path(&self, error: &BifrostError) -> bool {
        !self.monitor.is_online() || error.is_connectivity()
    }

    /// Single attempt against a generation capability, under the request
    /// ceiling.
    async fn attempt(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let ceiling = self.config.request_timeout;
        match timeout(ceiling, backend.generate_content(request)).await {
            Ok(result) => result,
            Err(_) => Err(BifrostError::Timeout(ceiling.as_secs())),
        }
    }

    /// Start a streaming attempt and supervise it: events are forwarded
    /// through a bounded channel, the request ceiling closes the channel
    /// with `Timeout`, and the terminal `Done` result is cached and
    /// persisted to history.
    async fn attempt_stream(
        &self,
        backend: Arc<dyn GenerationBackend>,
        request: &GenerationRequest,
    ) -> Result<EventStream> {
        use futures_util::StreamExt;

        let ceiling = self.config.request_timeout;
        let mut inner = match timeout(ceiling, backend.stream_content(request)).await {
            Ok(stream) => stream?,
            Err(_) => return Err(BifrostError::Timeout(ceiling.as_secs())),
        };

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let cache = Arc::clone(&self.cache);
        let store = Arc::clone(&self.store);
        let fingerprint = request.fingerprint();
        let deadline = tokio::time::Instant::now() + ceiling;

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = inner.next() => event,
                    _ = tokio::time::sleep_until(deadline) => {
                        let _ = tx
                            .send(Err(BifrostError::Timeout(ceiling.as_secs())))
                            .await;
                        return;
                    }
                };
                let Some(event) = event else { return };

                if let Ok(StreamEvent::Done { result }) = &event {
                    cache.insert(fingerprint.clone(), result.clone());
                    if let Err(e) = store.put(Namespace::Prompts, Some(&result.id), result) {
                        warn!(error = %e, "failed to persist streamed result");
                    }
                }
                let terminal = event.is_err();
                if tx.send(event).await.is_err() || terminal {
                    return; // consumer dropped the stream, or the stream broke
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    /// The offline path: queue the request for replay and synthesize the
    /// deterministic template result.
    fn offline_fallback(
        &self,
        request: &GenerationRequest,
        fingerprint: String,
    ) -> GenerationResult {
        self.enqueue_for_replay(request);

        let text = fallback::offline_template(request.purpose.as_deref(), &request.inputs);
        let result = GenerationResult::new(FALLBACK_PROVIDER, text)
            .metadata("offline", serde_json::json!(true))
            .metadata(
                "requested_provider",
                serde_json::json!(request.provider.clone()),
            );
        self.cache.insert(fingerprint, result.clone());
        metrics::counter!(telemetry::FALLBACKS_TOTAL).increment(1);
        Self::record("generate", "fallback", true);
        result
    }

    /// Streaming offline path: the template text is released in paced
    /// chunks to preserve the chunked-delivery contract for callers.
    fn offline_fallback_stream(
        &self,
        request: &GenerationRequest,
        fingerprint: String,
    ) -> EventStream {
        let result = self.offline_fallback(request, fingerprint);
        let chunks = fallback::chunk_template(&result.text);
        let delay = self.config.chunk_delay;

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for (i, text) in chunks.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(StreamEvent::Chunk { text })).await.is_err() {
                    return; // consumer cancelled
                }
            }
            let _ = tx.send(Ok(StreamEvent::Done { result })).await;
        });
        Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))
    }

    fn enqueue_for_replay(&self, request: &GenerationRequest) {
        let body = match serde_json::to_value(request) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "could not serialize request for offline queue");
                return;
            }
        };
        if let Err(e) = self.queue.enqueue(
            QueueMethod::Post,
            &self.config.generate_endpoint,
            Some(&body),
        ) {
            // the caller still gets the fallback result
            warn!(error = %e, "failed to enqueue offline request");
        }
    }

    fn persist_history(&self, result: &GenerationResult) {
        if let Err(e) = self.store.put(Namespace::Prompts, Some(&result.id), result) {
            warn!(error = %e, "failed to persist generation history");
        }
    }

    fn record(operation: &'static str, path: &'static str, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "operation" => operation,
            "path" => path,
            "status" => status,
        )
        .increment(1);
    }
}
