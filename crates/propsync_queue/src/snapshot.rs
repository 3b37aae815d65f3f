//! Queue snapshot encoding and persistence.
//!
//! A snapshot captures the pending operations so a queue can survive a
//! process restart. Executors are not serializable; a restored operation's
//! `kind` must resolve against a live executor registration, and one that
//! does not is reported as a permanent failure when it is next drained.

use crate::operation::SyncOperation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Errors from snapshot encoding or storage.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// CBOR encoding failed.
    #[error("snapshot encode error: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("snapshot decode error: {0}")]
    Decode(String),

    /// Snapshot was written by an unsupported format version.
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: u16,
    },

    /// Underlying store I/O failed.
    #[error("snapshot store error: {0}")]
    Io(#[from] std::io::Error),
}

/// A serializable snapshot of the pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Format version.
    pub version: u16,
    /// Pending operations in drain order.
    pub operations: Vec<SyncOperation>,
}

impl QueueSnapshot {
    /// Creates a snapshot of the given operations.
    pub fn new(operations: Vec<SyncOperation>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            operations,
        }
    }

    /// Encodes to CBOR bytes.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|e| SnapshotError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes from CBOR bytes, rejecting unknown format versions.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: QueueSnapshot =
            ciborium::de::from_reader(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

/// Persistence collaborator for queue snapshots.
///
/// Optional; used only to survive process restarts.
pub trait QueueStore: Send + Sync {
    /// Persists a snapshot, replacing any previous one.
    fn save(&self, snapshot: &QueueSnapshot) -> Result<(), SnapshotError>;

    /// Loads the most recent snapshot, if one exists.
    fn load(&self) -> Result<Option<QueueSnapshot>, SnapshotError>;
}

/// File-backed queue store.
///
/// Writes go to a temporary sibling file first and are renamed into place,
/// so a crash mid-write never corrupts the previous snapshot.
#[derive(Debug)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    /// Creates a store writing to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl QueueStore for FileQueueStore {
    fn save(&self, snapshot: &QueueSnapshot) -> Result<(), SnapshotError> {
        let bytes = snapshot.encode()?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<QueueSnapshot>, SnapshotError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(QueueSnapshot::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory queue store for tests and hosts without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryQueueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryQueueStore {
    fn save(&self, snapshot: &QueueSnapshot) -> Result<(), SnapshotError> {
        let bytes = snapshot.encode()?;
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<Option<QueueSnapshot>, SnapshotError> {
        let guard = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_deref() {
            Some(bytes) => Ok(Some(QueueSnapshot::decode(bytes)?)),
            None => Ok(None),
        }
    }
}
