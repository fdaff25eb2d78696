//! Ephemeral fallback store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use super::{Namespace, StoreBackend};
use crate::error::Result;
use crate::types::{QueueItem, QueueMethod};

/// A single in-memory record: JSON text plus an insertion sequence for
/// newest-first ordering.
struct Record {
    json: String,
    seq: u64,
}

struct Inner {
    records: HashMap<(Namespace, String), Record>,
    queue: Vec<QueueItem>,
    next_seq: u64,
    next_queue_id: i64,
}

/// In-memory store with the same semantics as [`SqliteStore`](super::SqliteStore).
///
/// Used when the durable store is unavailable, and as the whole store in
/// `StoreConfig::InMemory` mode. Data does not survive the process.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: HashMap::new(),
                queue: Vec::new(),
                next_seq: 0,
                next_queue_id: 1,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryStore {
    fn get_raw(&self, ns: Namespace, key: &str) -> Result<Option<String>> {
        let inner = self.lock();
        Ok(inner
            .records
            .get(&(ns, key.to_string()))
            .map(|r| r.json.clone()))
    }

    fn get_all_raw(&self, ns: Namespace) -> Result<Vec<(String, String)>> {
        let inner = self.lock();
        let mut rows: Vec<_> = inner
            .records
            .iter()
            .filter(|((n, _), _)| *n == ns)
            .map(|((_, key), record)| (record.seq, key.clone(), record.json.clone()))
            .collect();
        // newest first, matching the sqlite created_at ordering
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows.into_iter().map(|(_, k, j)| (k, j)).collect())
    }

    fn put_raw(&self, ns: Namespace, key: &str, json: &str) -> Result<()> {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.insert(
            (ns, key.to_string()),
            Record {
                json: json.to_string(),
                seq,
            },
        );
        Ok(())
    }

    fn clear(&self, ns: Namespace) -> Result<()> {
        let mut inner = self.lock();
        inner.records.retain(|(n, _), _| *n != ns);
        Ok(())
    }

    fn enqueue_item(
        &self,
        method: QueueMethod,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<QueueItem> {
        let mut inner = self.lock();
        let id = inner.next_queue_id;
        inner.next_queue_id += 1;
        let item = QueueItem {
            id,
            endpoint: endpoint.to_string(),
            method,
            body: body.cloned(),
            enqueued_at: Utc::now(),
            retry_count: 0,
        };
        inner.queue.push(item.clone());
        Ok(item)
    }

    fn queue_items(&self) -> Result<Vec<QueueItem>> {
        let inner = self.lock();
        let mut items = inner.queue.clone();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    fn delete_item(&self, id: i64) -> Result<()> {
        let mut inner = self.lock();
        inner.queue.retain(|i| i.id != id);
        Ok(())
    }

    fn bump_retry(&self, id: i64) -> Result<()> {
        let mut inner = self.lock();
        if let Some(item) = inner.queue.iter_mut().find(|i| i.id == id) {
            item.retry_count += 1;
        }
        Ok(())
    }

    fn queue_len(&self) -> Result<u64> {
        Ok(self.lock().queue.len() as u64)
    }
}
