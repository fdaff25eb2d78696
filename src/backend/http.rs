//! HTTP client for the application backend.
//!
//! Implements the generation, discovery, and replay seams against a JSON
//! API:
//!
//! - `POST {base}/api/generate` → [`GenerationResult`]
//! - `POST {base}/api/generate/stream` → newline-delimited [`StreamEvent`]s
//! - `GET {base}/api/providers` → `[ProviderDescriptor]`
//!
//! Connectivity failures surface as `Network`/`Timeout`; non-2xx responses
//! as `Http`; a 2xx carrying a provider failure as `Generation`; malformed
//! stream lines as `Parse`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::{EventStream, GenerationBackend, ProviderDiscovery, ReplayTransport};
use crate::error::{BifrostError, Result};
use crate::types::{GenerationRequest, GenerationResult, ProviderDescriptor, QueueItem, QueueMethod, StreamEvent};

/// Path the router enqueues offline generation requests against.
pub const GENERATE_ENDPOINT: &str = "/api/generate";

const STREAM_ENDPOINT: &str = "/api/generate/stream";
const PROVIDERS_ENDPOINT: &str = "/api/providers";

/// Buffer between the response reader task and the consumer.
const STREAM_BUFFER: usize = 64;

/// A 2xx body that nonetheless reports failure.
#[derive(Deserialize)]
struct BackendFailure {
    error: String,
}

/// reqwest-based client for the application backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a backend client with a custom `reqwest::Client`
    /// (connection pools, proxies, per-request timeouts).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success response into the error taxonomy.
    async fn error_for(response: reqwest::Response) -> BifrostError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        BifrostError::Http { status, message }
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "backend"
    }

    async fn generate_content(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let response = self
            .client
            .post(self.url(GENERATE_ENDPOINT))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body = response.text().await?;
        // a 2xx can still carry a provider-reported failure
        if let Ok(failure) = serde_json::from_str::<BackendFailure>(&body) {
            return Err(BifrostError::Generation(failure.error));
        }
        serde_json::from_str(&body).map_err(|e| BifrostError::Parse(e.to_string()))
    }

    async fn stream_content(&self, request: &GenerationRequest) -> Result<EventStream> {
        let response = self
            .client
            .post(self.url(STREAM_ENDPOINT))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(BifrostError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                match std::str::from_utf8(&chunk) {
                    Ok(text) => buffer.push_str(text),
                    Err(e) => {
                        let _ = tx.send(Err(BifrostError::Parse(e.to_string()))).await;
                        return;
                    }
                }
                // emit every complete line; keep the partial tail buffered
                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StreamEvent>(line) {
                        Ok(event) => {
                            if tx.send(Ok(event)).await.is_err() {
                                return; // consumer dropped the stream
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(BifrostError::Parse(e.to_string()))).await;
                            return;
                        }
                    }
                }
            }
            // a trailing line without a newline is still a payload
            let tail = buffer.trim();
            if !tail.is_empty() {
                let event = serde_json::from_str::<StreamEvent>(tail)
                    .map_err(|e| BifrostError::Parse(e.to_string()));
                let _ = tx.send(event).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl ProviderDiscovery for HttpBackend {
    async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>> {
        let response = self.client.get(self.url(PROVIDERS_ENDPOINT)).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| BifrostError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ReplayTransport for HttpBackend {
    async fn replay(&self, item: &QueueItem) -> Result<()> {
        debug!(id = item.id, endpoint = %item.endpoint, "replaying queued request");
        let method = match item.method {
            QueueMethod::Post => reqwest::Method::POST,
            QueueMethod::Put => reqwest::Method::PUT,
            QueueMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, self.url(&item.endpoint));
        if let Some(body) = &item.body {
            builder = builder.json(body);
        }
        let response = builder.timeout(Duration::from_secs(30)).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let backend = HttpBackend::new("http://localhost:3000/");
        assert_eq!(
            backend.url(GENERATE_ENDPOINT),
            "http://localhost:3000/api/generate"
        );
    }
}
