//! SQLite-backed durable store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{Namespace, StoreBackend, corrupt};
use crate::error::{BifrostError, Result};
use crate::types::{QueueItem, QueueMethod};

/// Versioned migrations, applied in order on open. `PRAGMA user_version`
/// records how many have run; adding a namespace or index means appending
/// a new entry, never editing an existing one.
const MIGRATIONS: &[&str] = &[
    // v1: record collections + offline queue
    r#"
    CREATE TABLE IF NOT EXISTS records (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (namespace, key)
    );
    CREATE INDEX IF NOT EXISTS idx_records_created
        ON records(namespace, created_at);

    CREATE TABLE IF NOT EXISTS offline_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        endpoint TEXT NOT NULL,
        method TEXT NOT NULL,
        body TEXT,
        enqueued_at TEXT NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_queue_enqueued
        ON offline_queue(enqueued_at);
    "#,
];

/// Durable store at a SQLite database file.
///
/// The connection sits behind a `Mutex`; operations are short
/// single-statement transactions, so contention is negligible for a
/// single-client engine.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BifrostError::Store(format!("create store directory: {e}")))?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// The platform-default database path (`<data_dir>/bifrost/store.db`).
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or_else(|| BifrostError::Store("could not determine data directory".into()))?;
        Ok(data_dir.join("bifrost").join("store.db"))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply any migrations newer than the recorded schema version.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        for (i, migration) in MIGRATIONS.iter().enumerate().skip(version as usize) {
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", (i + 1) as i64)?;
        }
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt("timestamp"))
}

fn parse_method(s: &str) -> Result<QueueMethod> {
    match s {
        "POST" => Ok(QueueMethod::Post),
        "PUT" => Ok(QueueMethod::Put),
        "DELETE" => Ok(QueueMethod::Delete),
        _ => Err(corrupt("queue method")),
    }
}

impl StoreBackend for SqliteStore {
    fn get_raw(&self, ns: Namespace, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        let data = conn
            .query_row(
                "SELECT data FROM records WHERE namespace = ?1 AND key = ?2",
                params![ns.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    fn get_all_raw(&self, ns: Namespace) -> Result<Vec<(String, String)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT key, data FROM records WHERE namespace = ?1
             ORDER BY created_at DESC, key DESC",
        )?;
        let rows = stmt
            .query_map(params![ns.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn put_raw(&self, ns: Namespace, key: &str, json: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO records (namespace, key, data, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![ns.as_str(), key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&self, ns: Namespace) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM records WHERE namespace = ?1",
            params![ns.as_str()],
        )?;
        Ok(())
    }

    fn enqueue_item(
        &self,
        method: QueueMethod,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<QueueItem> {
        let enqueued_at = Utc::now();
        let body_json = body.map(serde_json::Value::to_string);
        let conn = self.lock();
        conn.execute(
            "INSERT INTO offline_queue (endpoint, method, body, enqueued_at, retry_count)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![endpoint, method.as_str(), body_json, enqueued_at.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        Ok(QueueItem {
            id,
            endpoint: endpoint.to_string(),
            method,
            body: body.cloned(),
            enqueued_at,
            retry_count: 0,
        })
    }

    fn queue_items(&self) -> Result<Vec<QueueItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, endpoint, method, body, enqueued_at, retry_count
             FROM offline_queue ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (id, endpoint, method, body, enqueued_at, retry_count) in rows {
            let body = match body {
                Some(json) => Some(serde_json::from_str(&json).map_err(|_| corrupt("queue body"))?),
                None => None,
            };
            items.push(QueueItem {
                id,
                endpoint,
                method: parse_method(&method)?,
                body,
                enqueued_at: parse_timestamp(&enqueued_at)?,
                retry_count,
            });
        }
        Ok(items)
    }

    fn delete_item(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM offline_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn bump_retry(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE offline_queue SET retry_count = retry_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn queue_len(&self) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
