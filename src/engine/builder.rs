//! Builder for configuring engine instances.

use std::sync::Arc;
use std::time::Duration;

use super::Bifrost;
use crate::backend::{GenerationBackend, HttpBackend, ProviderDiscovery, ReplayTransport};
use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, ResultCache};
use crate::error::{BifrostError, Result};
use crate::limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, SlidingWindow};
use crate::net::{ConnectivitySignal, NetworkMonitor, StaticSignal};
use crate::queue::OfflineQueue;
use crate::router::{ProviderRouter, RouterConfig};
use crate::store::{StoreAdapter, StoreConfig};
use crate::types::LocalProvider;

/// Builder for configuring engine instances.
///
/// ```rust,no_run
/// use bifrost::Bifrost;
///
/// # fn main() -> bifrost::Result<()> {
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let engine = Bifrost::builder()
///     .backend_url("https://app.example.com")
///     .build()?;
/// # Ok(())
/// # })
/// # }
/// ```
pub struct BifrostBuilder {
    backend: Option<Arc<dyn GenerationBackend>>,
    discovery: Option<Arc<dyn ProviderDiscovery>>,
    transport: Option<Arc<dyn ReplayTransport>>,
    backend_url: Option<String>,
    connectivity: Option<Box<dyn ConnectivitySignal>>,
    store_config: StoreConfig,
    cache_capacity: u64,
    cache_ttl: Duration,
    rate_limit: (u32, Duration),
    locals: Vec<(LocalProvider, Arc<dyn GenerationBackend>, Option<String>)>,
    router_config: RouterConfig,
}

impl BifrostBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            discovery: None,
            transport: None,
            backend_url: None,
            connectivity: None,
            store_config: StoreConfig::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            rate_limit: (DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW),
            locals: Vec::new(),
            router_config: RouterConfig::default(),
        }
    }

    /// Configure the application backend by URL. Sets the generation,
    /// discovery, and replay capabilities to an [`HttpBackend`] unless
    /// overridden by the explicit setters.
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    /// Set a custom remote generation capability.
    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set a custom provider discovery capability.
    pub fn discovery(mut self, discovery: Arc<dyn ProviderDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Set a custom replay transport for queue drains.
    pub fn transport<T: ReplayTransport + 'static>(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport as Arc<dyn ReplayTransport>);
        self
    }

    /// Register a locally configured provider.
    pub fn local_provider(
        mut self,
        provider: LocalProvider,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        self.locals.push((provider, backend, None));
        self
    }

    /// Register a locally configured provider with a default model.
    pub fn local_provider_with_model(
        mut self,
        provider: LocalProvider,
        backend: Arc<dyn GenerationBackend>,
        default_model: impl Into<String>,
    ) -> Self {
        self.locals.push((provider, backend, Some(default_model.into())));
        self
    }

    /// Set the host's connectivity signal. Defaults to always-online.
    pub fn connectivity(mut self, signal: impl ConnectivitySignal + 'static) -> Self {
        self.connectivity = Some(Box::new(signal));
        self
    }

    /// Configure where durable data lives.
    pub fn store(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Set the result cache capacity and TTL.
    pub fn cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        self
    }

    /// Set the client-side rate limit (max requests per window).
    pub fn rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limit = (max_requests, window);
        self
    }

    /// Continue to the backend when a local provider fails (default: on).
    pub fn fallback_to_backend(mut self, on: bool) -> Self {
        self.router_config.fallback_to_backend = on;
        self
    }

    /// Hard ceiling on any single attempt (default: 5 minutes).
    pub fn request_timeout(mut self, ceiling: Duration) -> Self {
        self.router_config.request_timeout = ceiling;
        self
    }

    /// Pacing between offline fallback chunks (default: 30 ms).
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.router_config.chunk_delay = delay;
        self
    }

    /// Build the engine and start its drain listener.
    ///
    /// Requires a tokio runtime context (the listener task is spawned
    /// here). Fails with `Configuration` when no backend URL, custom
    /// backend, or replay transport is configured — the engine needs at
    /// least a replay target for queued offline work.
    pub fn build(self) -> Result<Bifrost> {
        let http = self.backend_url.as_ref().map(|url| Arc::new(HttpBackend::new(url.clone())));

        let backend: Option<Arc<dyn GenerationBackend>> = self
            .backend
            .or_else(|| http.clone().map(|h| h as Arc<dyn GenerationBackend>));
        let discovery: Option<Arc<dyn ProviderDiscovery>> = self
            .discovery
            .or_else(|| http.clone().map(|h| h as Arc<dyn ProviderDiscovery>));
        let transport: Arc<dyn ReplayTransport> = self
            .transport
            .or_else(|| http.map(|h| h as Arc<dyn ReplayTransport>))
            .ok_or_else(|| {
                BifrostError::Configuration(
                    "a backend URL or replay transport is required".into(),
                )
            })?;

        let signal = self
            .connectivity
            .unwrap_or_else(|| Box::new(StaticSignal(true)));

        let store = Arc::new(StoreAdapter::open(&self.store_config));
        let monitor = Arc::new(NetworkMonitor::new(signal.as_ref()));
        let cache = Arc::new(ResultCache::with_config(self.cache_capacity, self.cache_ttl));
        let queue = Arc::new(OfflineQueue::new(Arc::clone(&store), transport));
        let limiter = SlidingWindow::with_config(self.rate_limit.0, self.rate_limit.1);

        let mut router = ProviderRouter::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&monitor),
            cache,
            limiter,
            self.router_config,
        );
        for (provider, local_backend, default_model) in self.locals {
            router.register_local(provider, local_backend, default_model);
        }
        if let Some(backend) = backend {
            router.set_backend(backend);
        }
        if let Some(discovery) = discovery {
            router.set_discovery(discovery);
        }

        Ok(Bifrost::new(Arc::new(router), queue, store, monitor))
    }
}

impl Default for BifrostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
