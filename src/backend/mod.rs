//! External collaborator seams.
//!
//! The engine never talks to a vendor API directly; it goes through these
//! traits. [`HttpBackend`] implements all three against the application
//! backend's JSON API. Vendor-specific wire adapters live behind that
//! backend and are out of scope here.

mod http;

pub use http::{GENERATE_ENDPOINT, HttpBackend};

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::Result;
use crate::types::{GenerationRequest, GenerationResult, ProviderDescriptor, QueueItem, StreamEvent};

/// A pinned, boxed stream of generation events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A generation capability: local provider or remote backend.
///
/// Implementations must distinguish connectivity failures
/// ([`BifrostError::Network`](crate::BifrostError::Network) /
/// [`Timeout`](crate::BifrostError::Timeout)) from provider-reported
/// failures ([`Generation`](crate::BifrostError::Generation)); the router
/// routes onto the offline path only for the former.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name, used in logs and metrics labels.
    fn name(&self) -> &str;

    /// Produce a complete result for the request.
    async fn generate_content(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Produce a chunked stream for the request.
    ///
    /// A well-formed stream yields zero or more `Chunk` events followed by
    /// exactly one `Done`.
    async fn stream_content(&self, request: &GenerationRequest) -> Result<EventStream>;
}

/// Remote provider discovery.
#[async_trait]
pub trait ProviderDiscovery: Send + Sync {
    /// List the providers the backend can currently reach.
    async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>>;
}

/// Replays queued offline requests during drains.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    /// Re-issue a queued request. `Ok(())` deletes the item; an error
    /// increments its retry counter.
    async fn replay(&self, item: &QueueItem) -> Result<()>;
}
