//! Bifrost - client-side resilience engine for LLM generation
//!
//! This crate keeps AI-generation requests working across unreliable
//! networks and unreliable providers. It unifies a fingerprint-keyed
//! result cache, a provider-selection/fallback chain, a durable offline
//! queue with ordered replay, and a network-state monitor that triggers
//! replay on reconnect. While offline, callers always receive a usable
//! result — a deterministic template fallback at worst — and the real
//! request is queued for automatic replay.
//!
//! # Example
//!
//! ```rust,no_run
//! use bifrost::{Bifrost, GenerationRequest};
//!
//! #[tokio::main]
//! async fn main() -> bifrost::Result<()> {
//!     let engine = Bifrost::builder()
//!         .backend_url("https://app.example.com")
//!         .build()?;
//!
//!     let request = GenerationRequest::new("demo", vec!["Write a tagline".into()])
//!         .purpose("general");
//!     let result = engine.generate(&request).await?;
//!
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! Hosts that receive their own connectivity events feed them in with
//! [`Bifrost::set_online()`]; an Offline → Online transition drains the
//! offline queue in enqueue order.

pub mod backend;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod limit;
pub mod net;
pub mod queue;
pub mod router;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use backend::{EventStream, GenerationBackend, HttpBackend, ProviderDiscovery, ReplayTransport};
pub use cache::ResultCache;
pub use engine::{Bifrost, BifrostBuilder};
pub use error::{BifrostError, Result};
pub use net::{ConnectivitySignal, NetworkMonitor, NetworkState};
pub use queue::{DrainOutcome, MAX_RETRY_ATTEMPTS, OfflineQueue};
pub use router::{ProviderRouter, RouterConfig};
pub use store::{Namespace, StoreAdapter, StoreConfig};

// Re-export all types
pub use types::{
    GenerationOptions, GenerationRequest, GenerationResult, LocalProvider, ProviderDescriptor,
    ProviderKind, QueueItem, QueueMethod, StreamEvent, Usage, merge_descriptors,
};
