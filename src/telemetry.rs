//! Telemetry metric name constants.
//!
//! Centralised metric names for bifrost operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bifrost_`. Counters end in `_total`,
//! gauges use the bare quantity name.
//!
//! # Common labels
//!
//! - `provider` — provider name attempted (e.g. "demo", "backend")
//! - `operation` — engine operation ("generate", "generate_stream", "list_providers")
//! - `status` — outcome: "ok" or "error"
//! - `path` — which tier answered: "cache", "local", "backend", "fallback"

/// Total generation requests dispatched through the router.
///
/// Labels: `operation`, `path`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bifrost_requests_total";

/// Total result-cache hits.
pub const CACHE_HITS_TOTAL: &str = "bifrost_cache_hits_total";

/// Total result-cache misses.
pub const CACHE_MISSES_TOTAL: &str = "bifrost_cache_misses_total";

/// Total requests rejected by the client-side rate limiter.
///
/// Labels: `operation`.
pub const RATE_LIMITED_TOTAL: &str = "bifrost_rate_limited_total";

/// Total template-fallback results synthesized while offline.
pub const FALLBACKS_TOTAL: &str = "bifrost_fallbacks_total";

/// Total items enqueued into the offline queue.
pub const QUEUE_ENQUEUED_TOTAL: &str = "bifrost_queue_enqueued_total";

/// Total queue drain passes started.
pub const QUEUE_DRAINS_TOTAL: &str = "bifrost_queue_drains_total";

/// Total queued items replayed successfully during drains.
pub const QUEUE_REPLAYED_TOTAL: &str = "bifrost_queue_replayed_total";

/// Total queued items dropped after exceeding the retry ceiling.
pub const QUEUE_EXPIRED_TOTAL: &str = "bifrost_queue_expired_total";

/// Total operations that fell back to the ephemeral store because the
/// durable store was unavailable.
pub const STORE_FALLBACK_TOTAL: &str = "bifrost_store_fallback_total";
