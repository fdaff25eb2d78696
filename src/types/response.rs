//! Generation results and streaming events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token/cost accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Total tokens consumed.
    pub tokens: u32,
    /// Estimated cost in the provider's billing currency.
    pub cost: f64,
}

/// The outcome of one successful generation attempt.
///
/// Produced exactly once per attempt — by the backend, a local provider,
/// or the offline template fallback — and owned by whichever component
/// produced it until handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Unique result id.
    pub id: String,
    /// When the result was produced.
    pub created_at: DateTime<Utc>,
    /// Provider that produced the result ("offline-fallback" for template
    /// results).
    pub provider: String,
    /// Model that produced the result, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Generated text.
    pub text: String,
    /// Token/cost accounting, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Free-form result metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl GenerationResult {
    /// Create a result with a fresh id and the current timestamp.
    pub fn new(provider: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            provider: provider.into(),
            model: None,
            text: text.into(),
            usage: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set usage accounting.
    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Events yielded by streaming generation.
///
/// A well-formed stream is zero or more `Chunk`s followed by exactly one
/// `Done` carrying the assembled result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// An incremental text chunk.
    Chunk { text: String },
    /// Terminal event with the complete result.
    Done { result: GenerationResult },
}
