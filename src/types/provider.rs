//! Provider descriptors and the closed local-provider enumeration.

use serde::{Deserialize, Serialize};

use crate::error::{BifrostError, Result};

/// Where a provider runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Configured in this client, attempted before the backend.
    Local,
    /// Reached through the application backend.
    Remote,
}

/// A provider as seen by callers: discovery results merged with local
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider name (unique after merging; local configuration wins ties).
    pub name: String,
    /// Whether the provider is currently usable.
    pub available: bool,
    /// Where the provider runs.
    pub kind: ProviderKind,
    /// Model used when a request doesn't specify one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Last reported provider error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderDescriptor {
    /// Descriptor for an available provider.
    pub fn available(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            available: true,
            kind,
            default_model: None,
            error: None,
        }
    }

    /// Set the default model.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

/// The closed set of providers this client can run locally.
///
/// UI-facing provider names map onto this enumeration through
/// [`from_name()`](Self::from_name); unknown names are rejected with a
/// typed error rather than silently defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalProvider {
    /// Built-in demo provider (canned generation, no network).
    Demo,
    /// Ollama instance reachable on localhost.
    Ollama,
    /// Browser/webview-embedded model runtime.
    WebLlm,
}

impl LocalProvider {
    /// The canonical name for this provider.
    pub fn name(self) -> &'static str {
        match self {
            LocalProvider::Demo => "demo",
            LocalProvider::Ollama => "ollama",
            LocalProvider::WebLlm => "webllm",
        }
    }

    /// Map a UI-facing name onto the enumeration, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "demo" => Ok(LocalProvider::Demo),
            "ollama" => Ok(LocalProvider::Ollama),
            "webllm" | "web-llm" => Ok(LocalProvider::WebLlm),
            _ => Err(BifrostError::UnknownProvider(name.to_string())),
        }
    }
}

impl std::fmt::Display for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Merge remote discovery results with locally configured descriptors.
///
/// De-duplicates by name (case-insensitive); when both sides know a
/// provider, the local descriptor wins. Local entries keep their relative
/// order, followed by remote-only entries in discovery order.
pub fn merge_descriptors(
    local: Vec<ProviderDescriptor>,
    remote: Vec<ProviderDescriptor>,
) -> Vec<ProviderDescriptor> {
    let mut merged = local;
    for candidate in remote {
        let known = merged
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(&candidate.name));
        if !known {
            merged.push(candidate);
        }
    }
    merged
}
