//! Offline queue item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP method for a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueMethod {
    Post,
    Put,
    Delete,
}

impl QueueMethod {
    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueMethod::Post => "POST",
            QueueMethod::Put => "PUT",
            QueueMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for QueueMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutating request captured while offline, awaiting replay.
///
/// Created when a request cannot complete while offline; `retry_count`
/// increments on each failed replay, and the item is deleted on success
/// or once the count reaches the drain's retry ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned id; also defines replay order.
    pub id: i64,
    /// Target endpoint path.
    pub endpoint: String,
    /// HTTP method to replay with.
    pub method: QueueMethod,
    /// Request body, when the method carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// When the item was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed replay attempts so far.
    pub retry_count: u32,
}
