//! Generation request and its deterministic fingerprint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sampling and delivery options for a generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the caller wants chunked delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl GenerationOptions {
    /// Create options with all fields unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Set the maximum token count.
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Request chunked delivery.
    pub fn stream(mut self, on: bool) -> Self {
        self.stream = Some(on);
        self
    }
}

/// A request for AI generation.
///
/// Immutable once built. Identity is defined by [`fingerprint()`](Self::fingerprint):
/// two requests with equal fingerprints are treated as the same request by
/// the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Target provider name (matched case-insensitively against locally
    /// configured providers, otherwise forwarded to the backend).
    pub provider: String,
    /// Model override; `None` lets the provider pick its default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Input texts, interpolated into prompts (and into the offline
    /// template when no provider is reachable).
    pub inputs: Vec<String>,
    /// What the generation is for ("general", "code", ...). Selects the
    /// offline template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Sampling and delivery options.
    #[serde(default)]
    pub options: GenerationOptions,
    /// Free-form request context. A `BTreeMap` so serialization order is
    /// deterministic — required for stable fingerprints.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Create a request for the given provider and inputs.
    pub fn new(provider: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            inputs,
            purpose: None,
            options: GenerationOptions::default(),
            context: BTreeMap::new(),
        }
    }

    /// Set the model override.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the request purpose.
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Set the generation options.
    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a context entry.
    pub fn context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Deterministic fingerprint of this request, used as the cache key.
    ///
    /// The canonical serialized form: struct fields serialize in declaration
    /// order and the context map is sorted, so identical requests always
    /// produce byte-identical fingerprints within and across processes.
    pub fn fingerprint(&self) -> String {
        // serialization of these types cannot fail
        serde_json::to_string(self).expect("request serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_deterministic() {
        let a = GenerationRequest::new("demo", vec!["Write a tagline".into()])
            .purpose("general")
            .context("lang", serde_json::json!("en"));
        let b = GenerationRequest::new("demo", vec!["Write a tagline".into()])
            .purpose("general")
            .context("lang", serde_json::json!("en"));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_context_order_independent() {
        let a = GenerationRequest::new("demo", vec!["x".into()])
            .context("a", serde_json::json!(1))
            .context("b", serde_json::json!(2));
        let b = GenerationRequest::new("demo", vec!["x".into()])
            .context("b", serde_json::json!(2))
            .context("a", serde_json::json!(1));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_differs_on_inputs() {
        let a = GenerationRequest::new("demo", vec!["x".into()]);
        let b = GenerationRequest::new("demo", vec!["y".into()]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_differs_on_options() {
        let a = GenerationRequest::new("demo", vec!["x".into()]);
        let b = GenerationRequest::new("demo", vec!["x".into()])
            .options(GenerationOptions::new().temperature(0.2));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = GenerationRequest::new("demo", vec!["x".into()])
            .model("demo-1")
            .purpose("code");
        let json = serde_json::to_string(&req).unwrap();
        let back: GenerationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
