//! Persistent store adapter.
//!
//! Schema'd named collections (key → JSON record) backed by SQLite, with
//! an in-memory fallback when the durable store cannot be opened. Each
//! namespace is written by exactly one owning component (router history,
//! provider listing, queue, settings), so the store's own per-operation
//! atomicity is sufficient — no cross-component locking.
//!
//! # Degradation
//!
//! If opening the durable store fails, every operation silently targets
//! the in-memory fallback and a single warning is logged; callers never
//! see the failure. [`StoreAdapter::promote_fallback()`] later performs a
//! one-shot copy of fallback-persisted data into the durable store the
//! next time it opens successfully (not continuous sync).

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::path::PathBuf;
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{BifrostError, Result};
use crate::telemetry;
use crate::types::{QueueItem, QueueMethod};

/// The named collections inside the store.
///
/// The offline queue is a seventh namespace (`offline_queue`) with a
/// store-assigned auto-incrementing key; it is exposed through the
/// dedicated queue methods rather than the generic record API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Provider descriptors, keyed by name.
    Providers,
    /// Generation history, keyed by result id.
    Prompts,
    /// Health snapshots, keyed by timestamp.
    Health,
    /// Repository scorecards, keyed by repo identifier.
    Scorecards,
    /// AI usage metrics, keyed by repo identifier.
    AiMetrics,
    /// Settings, keyed by setting name.
    Settings,
}

impl Namespace {
    /// Collection name as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Providers => "providers",
            Namespace::Prompts => "prompts",
            Namespace::Health => "health",
            Namespace::Scorecards => "scorecards",
            Namespace::AiMetrics => "ai_metrics",
            Namespace::Settings => "settings",
        }
    }

    /// All record namespaces, used by the fallback migration pass.
    pub(crate) const ALL: [Namespace; 6] = [
        Namespace::Providers,
        Namespace::Prompts,
        Namespace::Health,
        Namespace::Scorecards,
        Namespace::AiMetrics,
        Namespace::Settings,
    ];
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw record operations implemented by both backing stores.
///
/// Values are JSON text; the adapter layers typed (de)serialization on
/// top so both backends stay symmetrical.
pub(crate) trait StoreBackend: Send + Sync {
    fn get_raw(&self, ns: Namespace, key: &str) -> Result<Option<String>>;
    /// All records in a namespace, newest first.
    fn get_all_raw(&self, ns: Namespace) -> Result<Vec<(String, String)>>;
    fn put_raw(&self, ns: Namespace, key: &str, json: &str) -> Result<()>;
    fn clear(&self, ns: Namespace) -> Result<()>;

    fn enqueue_item(
        &self,
        method: QueueMethod,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<QueueItem>;
    /// Queue items in enqueue (id) order.
    fn queue_items(&self) -> Result<Vec<QueueItem>>;
    fn delete_item(&self, id: i64) -> Result<()>;
    fn bump_retry(&self, id: i64) -> Result<()>;
    fn queue_len(&self) -> Result<u64>;
}

/// Where the adapter keeps its durable data.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// SQLite at the platform data directory (`<data>/bifrost/store.db`).
    DefaultPath,
    /// SQLite at an explicit path.
    Path(PathBuf),
    /// No durable store; everything is ephemeral. Useful for tests and
    /// hosts without a writable filesystem.
    InMemory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::DefaultPath
    }
}

/// Namespaced persistent store with graceful in-memory degradation.
pub struct StoreAdapter {
    durable: RwLock<Option<SqliteStore>>,
    fallback: MemoryStore,
    path: Option<PathBuf>,
}

impl StoreAdapter {
    /// Open the store per the given configuration.
    ///
    /// Never fails outright: if the durable store cannot be opened, the
    /// adapter starts on the in-memory fallback and logs a warning.
    pub fn open(config: &StoreConfig) -> Self {
        let path = match config {
            StoreConfig::InMemory => None,
            StoreConfig::Path(p) => Some(p.clone()),
            StoreConfig::DefaultPath => SqliteStore::default_path().ok(),
        };

        let durable = match &path {
            None => None,
            Some(p) => match SqliteStore::open(p) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "durable store unavailable, using in-memory fallback");
                    None
                }
            },
        };

        Self {
            durable: RwLock::new(durable),
            fallback: MemoryStore::new(),
            path,
        }
    }

    /// Whether operations are currently hitting the durable store.
    pub fn is_durable(&self) -> bool {
        self.durable.read().is_ok_and(|d| d.is_some())
    }

    /// One-shot migration of fallback data into the durable store.
    ///
    /// Attempts to (re)open the durable store; on success, copies every
    /// fallback-persisted record and queue item into it and switches all
    /// subsequent operations over. No-op when already durable or when no
    /// path is configured.
    pub fn promote_fallback(&self) {
        if self.is_durable() {
            return;
        }
        let Some(path) = &self.path else { return };
        let store = match SqliteStore::open(path) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "durable store still unavailable");
                return;
            }
        };

        if let Err(e) = self.copy_fallback_into(&store) {
            warn!(error = %e, "fallback migration failed, staying on in-memory store");
            return;
        }

        info!(path = %path.display(), "durable store recovered, fallback data migrated");
        if let Ok(mut durable) = self.durable.write() {
            *durable = Some(store);
        }
    }

    fn copy_fallback_into(&self, store: &SqliteStore) -> Result<()> {
        for ns in Namespace::ALL {
            for (key, json) in self.fallback.get_all_raw(ns)? {
                store.put_raw(ns, &key, &json)?;
            }
        }
        for item in self.fallback.queue_items()? {
            store.enqueue_item(item.method, &item.endpoint, item.body.as_ref())?;
            self.fallback.delete_item(item.id)?;
        }
        Ok(())
    }

    /// Run an operation against the durable store when available,
    /// degrading to the fallback (with a warning) on durable failure.
    fn with_backend<T>(&self, f: impl Fn(&dyn StoreBackend) -> Result<T>) -> Result<T> {
        if let Ok(guard) = self.durable.read()
            && let Some(durable) = guard.as_ref()
        {
            match f(durable) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    metrics::counter!(telemetry::STORE_FALLBACK_TOTAL).increment(1);
                    warn!(error = %e, "durable store operation failed, degrading to in-memory fallback");
                }
            }
        }
        f(&self.fallback)
    }

    // ========================================================================
    // Record API
    // ========================================================================

    /// Fetch a record by key.
    pub fn get<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Result<Option<T>> {
        let raw = self.with_backend(|b| b.get_raw(ns, key))?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Fetch every record in a namespace, newest first.
    ///
    /// Records that no longer deserialize (schema drift) are skipped.
    pub fn get_all<T: DeserializeOwned>(&self, ns: Namespace) -> Result<Vec<T>> {
        let raw = self.with_backend(|b| b.get_all_raw(ns))?;
        Ok(raw
            .into_iter()
            .filter_map(|(_, json)| serde_json::from_str(&json).ok())
            .collect())
    }

    /// Store a record. When `key` is `None` a fresh UUID key is assigned.
    /// Returns the key the record was stored under.
    pub fn put<T: Serialize>(&self, ns: Namespace, key: Option<&str>, value: &T) -> Result<String> {
        let key = match key {
            Some(k) => k.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let json = serde_json::to_string(value)?;
        self.with_backend(|b| b.put_raw(ns, &key, &json))?;
        Ok(key)
    }

    /// Remove every record in a namespace.
    pub fn clear(&self, ns: Namespace) -> Result<()> {
        self.with_backend(|b| b.clear(ns))
    }

    // ========================================================================
    // Offline queue namespace
    // ========================================================================

    /// Append an item to the offline queue; the store assigns its id.
    pub fn enqueue_item(
        &self,
        method: QueueMethod,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<QueueItem> {
        self.with_backend(|b| b.enqueue_item(method, endpoint, body))
    }

    /// All queued items in enqueue order.
    pub fn queue_items(&self) -> Result<Vec<QueueItem>> {
        self.with_backend(|b| b.queue_items())
    }

    /// Delete a queued item.
    pub fn delete_item(&self, id: i64) -> Result<()> {
        self.with_backend(|b| b.delete_item(id))
    }

    /// Increment a queued item's retry counter.
    pub fn bump_retry(&self, id: i64) -> Result<()> {
        self.with_backend(|b| b.bump_retry(id))
    }

    /// Number of items currently queued.
    pub fn queue_len(&self) -> Result<u64> {
        self.with_backend(|b| b.queue_len())
    }
}

// Keep the error type available for backend implementations.
pub(crate) fn corrupt(what: &str) -> BifrostError {
    BifrostError::Store(format!("corrupt record: {what}"))
}
