//! # propsync Engine
//!
//! Client-side synchronization engine for propsync.
//!
//! This crate provides:
//! - Sync coordinator with single-flight drain passes
//! - Retry scheduling with exponential backoff and failure classification
//! - Connectivity state machine (online/offline gating)
//! - Status broadcasting to host-supplied listeners
//! - Per-kind executor registry
//!
//! ## Architecture
//!
//! Callers enqueue operations; the [`SyncCoordinator`] drains the queue when
//! online — on enqueue, on reconnect, on a periodic tick, or on demand via
//! [`SyncCoordinator::force_sync`]. Each drained operation is handed to the
//! [`RetryScheduler`], which calls the executor registered for its kind and
//! classifies failures as retryable or fatal. Successes are dropped,
//! retryable failures re-enter the queue for the next pass, and terminal
//! failures surface once through the [`StatusBroadcaster`] as part of the
//! pass summary.
//!
//! ## Key Invariants
//!
//! - At most one drain pass is active at a time
//! - A pass executes its snapshot strictly sequentially, priority first
//! - No operation terminates without a status notification
//! - Backoff delays are non-decreasing and capped

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod coordinator;
mod error;
mod executor;
mod retry;
mod status;

pub use config::{RetryConfig, SyncConfig};
pub use connectivity::{
    ConnectivityMonitor, ConnectivitySource, ConnectivitySubscription, ManualConnectivity,
};
pub use coordinator::{DrainOutcome, SyncCoordinator, SyncStats, SyncWorker};
pub use error::{DefaultClassifier, ErrorClassifier, FailureClass, SyncError, SyncResult};
pub use executor::{ExecutorRegistry, OperationExecutor};
pub use retry::{AttemptOutcome, RetryScheduler};
pub use status::{OperationFailure, PassSummary, StatusBroadcaster, StatusSubscription, StatusUpdate, SyncStatus};

pub use propsync_queue::{Priority, SyncOperation, SyncOperationQueue};
