//! Core types shared across the engine.

pub mod provider;
pub mod queue;
pub mod request;
pub mod response;

pub use provider::{LocalProvider, ProviderDescriptor, ProviderKind, merge_descriptors};
pub use queue::{QueueItem, QueueMethod};
pub use request::{GenerationOptions, GenerationRequest};
pub use response::{GenerationResult, StreamEvent, Usage};
