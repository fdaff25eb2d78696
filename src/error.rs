//! Bifrost error types

/// Bifrost error types
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    // Network/transport errors
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Client-side sliding-window limit hit. Raised before any network
    /// attempt is made.
    #[error("rate limit exceeded: {current}/{max} requests in window")]
    RateLimitExceeded { current: u32, max: u32 },

    // Generation errors
    /// The provider responded but signalled failure.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("stream error: {0}")]
    Stream(String),

    /// Malformed streamed payload.
    #[error("parse error: {0}")]
    Parse(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("no backend configured")]
    NoBackend,

    /// Provider name does not map to any known local provider.
    /// Unknown names are rejected rather than silently defaulted.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Persistence errors
    #[error("store error: {0}")]
    Store(String),
}

impl BifrostError {
    /// Whether this error indicates a connectivity problem rather than a
    /// provider-reported failure.
    ///
    /// Connectivity-class errors route the request onto the offline path
    /// (template fallback + queue) instead of being surfaced to the caller.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BifrostError::Network(_) | BifrostError::Timeout(_))
    }

    /// Whether this error is transient and worth retrying on a later drain.
    pub fn is_transient(&self) -> bool {
        match self {
            BifrostError::Network(_) | BifrostError::Timeout(_) | BifrostError::Stream(_) => true,
            // 5xx and 429 are server-side conditions that may clear
            BifrostError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BifrostError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest doesn't expose the configured ceiling; report 0 and
            // let the router attach its own ceiling where it applies one
            BifrostError::Timeout(0)
        } else if err.is_connect() || err.is_request() {
            BifrostError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            BifrostError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BifrostError::Network(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for BifrostError {
    fn from(err: rusqlite::Error) -> Self {
        BifrostError::Store(err.to_string())
    }
}

/// Result type alias for Bifrost operations
pub type Result<T> = std::result::Result<T, BifrostError>;
