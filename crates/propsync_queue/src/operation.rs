//! Pending sync operations.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Priority of a pending operation.
///
/// Higher priorities drain first. Variants are ordered so that
/// `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Background work, drained last.
    Low,
    /// Default priority.
    Medium,
    /// Drained before routine work.
    High,
    /// Drained first.
    Critical,
}

impl Priority {
    /// Number of priority tiers.
    pub const COUNT: usize = 4;

    /// Tier index, 0 for the highest priority.
    pub fn tier(&self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    /// All priorities in drain order (highest first).
    pub fn drain_order() -> [Priority; Self::COUNT] {
        [
            Priority::Critical,
            Priority::High,
            Priority::Medium,
            Priority::Low,
        ]
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// A pending unit of work awaiting replay against the remote store.
///
/// # Fields
///
/// - `id`: unique identifier, assigned at creation
/// - `kind`: tag resolving to a registered executor (e.g. `"entity_update"`)
/// - `payload`: opaque bytes interpreted only by the executor
/// - `priority`: drain ordering tier
/// - `created_at_ms`: enqueue timestamp, FIFO tie-break within a tier
/// - `retry_count` / `max_retries`: retry budget bookkeeping
/// - `last_error`: diagnostic from the most recent failed attempt
///
/// Only the retry bookkeeping and `last_error` mutate after creation;
/// `id`, `kind` and `payload` are fixed for the operation's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Unique operation ID.
    pub id: String,
    /// Executor tag.
    pub kind: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Drain priority.
    pub priority: Priority,
    /// Creation timestamp in milliseconds since the UNIX epoch.
    pub created_at_ms: u64,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Attempt budget; the operation is terminal once `retry_count` reaches it.
    pub max_retries: u32,
    /// Diagnostic from the most recent failure.
    pub last_error: Option<String>,
}

impl SyncOperation {
    /// Creates a new operation with a fresh id and the default retry budget.
    pub fn new(kind: impl Into<String>, payload: Vec<u8>, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
            priority,
            created_at_ms: now_ms(),
            retry_count: 0,
            max_retries: 3,
            last_error: None,
        }
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Records a failed attempt's diagnostic.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Returns true once the retry budget is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn tier_indices_follow_drain_order() {
        for (i, p) in Priority::drain_order().iter().enumerate() {
            assert_eq!(p.tier(), i);
        }
    }

    #[test]
    fn new_operation_defaults() {
        let op = SyncOperation::new("entity_update", vec![1, 2, 3], Priority::High);
        assert!(!op.id.is_empty());
        assert_eq!(op.kind, "entity_update");
        assert_eq!(op.payload_size(), 3);
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.max_retries, 3);
        assert!(op.last_error.is_none());
        assert!(!op.is_exhausted());
    }

    #[test]
    fn unique_ids() {
        let a = SyncOperation::new("k", vec![], Priority::Low);
        let b = SyncOperation::new("k", vec![], Priority::Low);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn exhaustion_with_zero_budget() {
        let op = SyncOperation::new("k", vec![], Priority::Low).with_max_retries(0);
        assert!(op.is_exhausted());
    }

    #[test]
    fn record_error_keeps_identity_fields() {
        let mut op = SyncOperation::new("file_upload", vec![9], Priority::Critical);
        let id = op.id.clone();
        op.record_error("connection reset");
        assert_eq!(op.id, id);
        assert_eq!(op.kind, "file_upload");
        assert_eq!(op.payload, vec![9]);
        assert_eq!(op.last_error.as_deref(), Some("connection reset"));
    }
}
