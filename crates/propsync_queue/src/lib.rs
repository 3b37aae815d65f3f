//! # propsync Queue
//!
//! Operation queue and conflict resolution types for propsync.
//!
//! This crate provides:
//! - [`SyncOperation`]: a pending unit of work with retry bookkeeping
//! - [`SyncOperationQueue`]: priority-ordered, FIFO-stable pending queue
//! - Queue snapshot encoding and pluggable [`QueueStore`] persistence
//! - Pure conflict detection and merge strategies
//!
//! ## Key Invariants
//!
//! - Queue ordering is priority descending, insertion order within a tier
//! - A drain snapshot removes the entire queue contents in one atomic step
//! - An operation's `id`, `kind` and `payload` never change after creation
//! - Conflict resolution is pure and performs no I/O

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod operation;
mod queue;
mod snapshot;

pub use conflict::{
    check_consistency, merge, ConflictRecord, ConsistencyReport, FieldDifference, MergeStrategy,
};
pub use operation::{Priority, SyncOperation};
pub use queue::SyncOperationQueue;
pub use snapshot::{
    FileQueueStore, MemoryQueueStore, QueueSnapshot, QueueStore, SnapshotError, SNAPSHOT_VERSION,
};
