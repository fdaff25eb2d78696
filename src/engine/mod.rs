//! The engine context object.
//!
//! [`Bifrost`] wires the store, cache, queue, monitor, and router
//! together and owns the background drain listener. It is constructed
//! once at startup via [`Bifrost::builder()`], passed by reference to all
//! call sites, and torn down at process exit — there is no global
//! singleton and no hidden re-initialization.

mod builder;

pub use builder::BifrostBuilder;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::backend::EventStream;
use crate::error::Result;
use crate::net::{NetworkMonitor, NetworkState};
use crate::queue::{DrainOutcome, OfflineQueue};
use crate::router::ProviderRouter;
use crate::store::{Namespace, StoreAdapter};
use crate::types::{GenerationRequest, GenerationResult, ProviderDescriptor};

/// The resilience engine.
///
/// All generation traffic goes through [`generate()`](Self::generate) /
/// [`generate_stream()`](Self::generate_stream); the engine keeps
/// requests working across unreliable networks by walking the router's
/// tier chain and replaying queued work on reconnect.
pub struct Bifrost {
    router: Arc<ProviderRouter>,
    queue: Arc<OfflineQueue>,
    store: Arc<StoreAdapter>,
    monitor: Arc<NetworkMonitor>,
    listener: JoinHandle<()>,
}

impl std::fmt::Debug for Bifrost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bifrost").finish_non_exhaustive()
    }
}

impl Bifrost {
    /// Start configuring an engine.
    pub fn builder() -> BifrostBuilder {
        BifrostBuilder::new()
    }

    pub(crate) fn new(
        router: Arc<ProviderRouter>,
        queue: Arc<OfflineQueue>,
        store: Arc<StoreAdapter>,
        monitor: Arc<NetworkMonitor>,
    ) -> Self {
        let listener = Self::spawn_listener(
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&monitor),
        );
        Self {
            router,
            queue,
            store,
            monitor,
            listener,
        }
    }

    /// Background task: drain the queue once at startup when already
    /// online, then on every Offline → Online transition. Reconnect is
    /// also the moment the store retries its durable backing.
    fn spawn_listener(
        queue: Arc<OfflineQueue>,
        store: Arc<StoreAdapter>,
        monitor: Arc<NetworkMonitor>,
    ) -> JoinHandle<()> {
        let mut rx = monitor.subscribe();
        tokio::spawn(async move {
            if monitor.is_online() {
                store.promote_fallback();
                if let Err(e) = queue.drain().await {
                    warn!(error = %e, "startup queue drain failed");
                }
            }
            loop {
                if rx.changed().await.is_err() {
                    return; // monitor dropped, engine is shutting down
                }
                let state = *rx.borrow_and_update();
                if state.is_online() {
                    store.promote_fallback();
                    if let Err(e) = queue.drain().await {
                        warn!(error = %e, "reconnect queue drain failed");
                    }
                }
            }
        })
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Produce a result for the request. While offline the caller always
    /// receives a usable result (template fallback at worst).
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.router.generate(request).await
    }

    /// Produce a chunked stream for the request. Dropping the stream
    /// cancels delivery.
    pub async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        self.router.generate_stream(request).await
    }

    /// List known providers (discovery merged with local configuration).
    pub async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>> {
        self.router.list_providers().await
    }

    /// Recent generation history, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<GenerationResult>> {
        self.router.history(limit)
    }

    // ========================================================================
    // Connectivity and queue
    // ========================================================================

    /// Current network state.
    pub fn network_state(&self) -> NetworkState {
        self.monitor.state()
    }

    /// Deliver a connectivity event from the host. An Offline → Online
    /// transition triggers a queue drain.
    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    /// Number of requests awaiting replay.
    pub fn queue_len(&self) -> Result<u64> {
        self.queue.len()
    }

    /// Run a drain pass immediately. Mostly useful for hosts that want to
    /// retry on their own schedule; no-ops when a drain is in progress.
    pub async fn drain_queue(&self) -> Result<DrainOutcome> {
        self.queue.drain().await
    }

    // ========================================================================
    // Settings and raw store access
    // ========================================================================

    /// Read a setting by name.
    pub fn setting<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.store.get(Namespace::Settings, name)
    }

    /// Store a setting by name.
    pub fn put_setting<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.store.put(Namespace::Settings, Some(name), value)?;
        Ok(())
    }

    /// The underlying store, for the host's own namespaces (health
    /// snapshots, scorecards, AI metrics).
    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }
}

impl Drop for Bifrost {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
