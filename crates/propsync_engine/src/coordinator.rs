//! Drain coordination and the background worker.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivitySubscription};
use crate::error::{ErrorClassifier, SyncError, SyncResult};
use crate::executor::ExecutorRegistry;
use crate::retry::{AttemptOutcome, RetryScheduler};
use crate::status::{OperationFailure, PassSummary, StatusBroadcaster, StatusUpdate, SyncStatus};
use parking_lot::{Mutex, RwLock};
use propsync_queue::{Priority, QueueSnapshot, QueueStore, SyncOperation, SyncOperationQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

/// Running totals across drain passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Drain passes completed.
    pub passes_completed: u64,
    /// Operations that succeeded.
    pub operations_succeeded: u64,
    /// Operations that failed terminally.
    pub operations_failed: u64,
    /// Retryable failures that were requeued.
    pub retries: u64,
    /// Last terminal failure message, cleared by a clean pass.
    pub last_error: Option<String>,
    /// Completion time of the last pass.
    pub last_pass_time: Option<Instant>,
}

/// Result of a drain request.
#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    /// A pass ran; its summary.
    Completed(PassSummary),
    /// Refused: currently offline.
    SkippedOffline,
    /// No-op: another pass is already active.
    SkippedBusy,
    /// No-op: nothing is pending.
    SkippedEmpty,
    /// No-op: the coordinator has been cancelled.
    SkippedCancelled,
}

/// Orchestrates the queue, retry scheduler, connectivity gate and status
/// broadcasting.
///
/// One coordinator exists per running session; it is constructed explicitly
/// and shared by `Arc`, never through a global. The queue and the
/// connectivity flag are the only shared mutable state, and all queue
/// mutation funnels through this type.
///
/// # Invariants
///
/// - At most one drain pass is active at any time
/// - Operations within a pass execute strictly sequentially, in snapshot
///   order (priority descending, FIFO within a tier)
/// - An operation only leaves the system through a terminal status
///   notification; cancellation mid-pass requeues the unprocessed remainder
pub struct SyncCoordinator {
    config: SyncConfig,
    queue: Mutex<SyncOperationQueue>,
    registry: Arc<ExecutorRegistry>,
    monitor: Arc<ConnectivityMonitor>,
    broadcaster: StatusBroadcaster,
    scheduler: RetryScheduler,
    draining: AtomicBool,
    cancelled: AtomicBool,
    stats: RwLock<SyncStats>,
    wake_tx: Mutex<Option<mpsc::Sender<WorkerSignal>>>,
}

impl SyncCoordinator {
    /// Creates a coordinator with the default failure classifier.
    pub fn new(
        config: SyncConfig,
        registry: Arc<ExecutorRegistry>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        let scheduler = RetryScheduler::new(config.retry.clone());
        Self::with_scheduler(config, registry, monitor, scheduler)
    }

    /// Creates a coordinator with a custom failure classifier.
    pub fn with_classifier(
        config: SyncConfig,
        registry: Arc<ExecutorRegistry>,
        monitor: Arc<ConnectivityMonitor>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        let scheduler = RetryScheduler::with_classifier(config.retry.clone(), classifier);
        Self::with_scheduler(config, registry, monitor, scheduler)
    }

    fn with_scheduler(
        config: SyncConfig,
        registry: Arc<ExecutorRegistry>,
        monitor: Arc<ConnectivityMonitor>,
        scheduler: RetryScheduler,
    ) -> Self {
        Self {
            config,
            queue: Mutex::new(SyncOperationQueue::new()),
            registry,
            monitor,
            broadcaster: StatusBroadcaster::new(),
            scheduler,
            draining: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
            wake_tx: Mutex::new(None),
        }
    }

    /// The status broadcaster for this coordinator.
    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    /// The connectivity monitor gating drains.
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// The executor registry.
    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Running totals.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Number of pending operations.
    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true while a drain pass is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Prevents future drain passes from starting.
    ///
    /// An active pass is not aborted mid-operation; it requeues its
    /// unprocessed remainder and finishes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Enqueues a new operation with the configured default retry budget.
    ///
    /// While online this wakes the background worker for an immediate
    /// drain; while offline the operation is held and an `Offline` status
    /// is published so the host can show a queued-while-offline notice.
    pub fn enqueue(&self, kind: impl Into<String>, payload: Vec<u8>, priority: Priority) -> String {
        let operation = SyncOperation::new(kind, payload, priority)
            .with_max_retries(self.config.retry.max_attempts);
        self.enqueue_operation(operation)
    }

    /// Enqueues a pre-built operation, returning its id.
    pub fn enqueue_operation(&self, operation: SyncOperation) -> String {
        let id = self.queue.lock().enqueue(operation);
        if self.monitor.is_online() {
            self.wake();
        } else {
            self.broadcaster
                .publish(&StatusUpdate::status(SyncStatus::Offline));
        }
        id
    }

    /// Requests a drain pass.
    ///
    /// No-op while offline, cancelled, empty, or when a pass is already
    /// active; the periodic tick (or the end of the active pass) picks up
    /// anything newly enqueued.
    pub fn try_drain(&self) -> DrainOutcome {
        if !self.monitor.is_online() {
            return DrainOutcome::SkippedOffline;
        }
        if self.cancelled.load(Ordering::SeqCst) {
            return DrainOutcome::SkippedCancelled;
        }
        if self.queue.lock().is_empty() {
            return DrainOutcome::SkippedEmpty;
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return DrainOutcome::SkippedBusy;
        }

        let summary = self.run_pass();
        self.draining.store(false, Ordering::SeqCst);
        DrainOutcome::Completed(summary)
    }

    /// Runs a drain immediately, bypassing the periodic timer.
    ///
    /// Fails fast with [`SyncError::Offline`] when disconnected. While a
    /// pass is already active this is a no-op reported as
    /// [`DrainOutcome::SkippedBusy`].
    pub fn force_sync(&self) -> SyncResult<DrainOutcome> {
        if !self.monitor.is_online() {
            return Err(SyncError::Offline);
        }
        Ok(self.try_drain())
    }

    /// Executes one drain pass. Caller holds the single-flight flag.
    fn run_pass(&self) -> PassSummary {
        let batch = self.queue.lock().drain_snapshot();
        if batch.is_empty() {
            return PassSummary::default();
        }

        tracing::debug!(operations = batch.len(), "drain pass started");
        self.broadcaster
            .publish(&StatusUpdate::status(SyncStatus::Syncing));

        let mut summary = PassSummary::default();
        let mut batch = batch.into_iter();
        while let Some(mut operation) = batch.next() {
            if self.cancelled.load(Ordering::SeqCst) {
                // Never drop work: the unattempted remainder goes back to
                // the head of its tiers, ahead of mid-pass enqueues.
                let remainder: Vec<_> = std::iter::once(operation).chain(batch).collect();
                let mut queue = self.queue.lock();
                for rest in remainder.into_iter().rev() {
                    queue.requeue_front(rest);
                }
                break;
            }

            summary.processed += 1;

            let Some(executor) = self.registry.resolve(&operation.kind) else {
                let error = SyncError::UnregisteredKind {
                    kind: operation.kind.clone(),
                };
                operation.record_error(error.to_string());
                tracing::warn!(id = %operation.id, kind = %operation.kind, "no executor registered");
                record_failure(&mut summary, &operation, &error);
                continue;
            };

            match self.scheduler.execute(
                &mut operation,
                executor.as_ref(),
                self.config.executor_timeout,
            ) {
                AttemptOutcome::Success => summary.succeeded += 1,
                AttemptOutcome::Retry { .. } => {
                    summary.retried += 1;
                    self.queue.lock().requeue(operation);
                }
                AttemptOutcome::Fatal { error } => {
                    record_failure(&mut summary, &operation, &error);
                }
            }
        }

        let status = if summary.failed == 0 {
            SyncStatus::Success
        } else {
            SyncStatus::Error
        };
        self.broadcaster
            .publish(&StatusUpdate::pass_result(status, summary.clone()));

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.operations_succeeded += summary.succeeded as u64;
            stats.operations_failed += summary.failed as u64;
            stats.retries += summary.retried as u64;
            stats.last_pass_time = Some(Instant::now());
            stats.last_error = summary.errors.last().map(|f| f.error.clone());
        }

        tracing::debug!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            retried = summary.retried,
            "drain pass finished"
        );
        self.broadcaster
            .publish(&StatusUpdate::status(SyncStatus::Idle));
        summary
    }

    /// Persists the pending queue through the given store.
    pub fn save_queue(&self, store: &dyn QueueStore) -> SyncResult<()> {
        let snapshot = QueueSnapshot::new(self.queue.lock().snapshot());
        store.save(&snapshot)?;
        Ok(())
    }

    /// Restores pending operations from the given store, returning how many
    /// were loaded.
    ///
    /// Restored operations' kinds are not validated here; one whose kind
    /// never gets re-registered fails permanently when next drained.
    pub fn restore_queue(&self, store: &dyn QueueStore) -> SyncResult<usize> {
        let Some(snapshot) = store.load()? else {
            return Ok(0);
        };
        let count = snapshot.operations.len();
        let mut queue = self.queue.lock();
        for operation in snapshot.operations {
            queue.requeue(operation);
        }
        Ok(count)
    }

    /// Starts the background worker driving periodic and on-demand drains.
    ///
    /// The worker ticks every `drain_interval` as a catch-all, wakes
    /// immediately on enqueue, and wires the OFFLINE→ONLINE transition to a
    /// drain request. Shut it down with [`SyncWorker::shutdown`]; while it
    /// runs, the connectivity listener keeps this coordinator alive.
    pub fn start(self: &Arc<Self>) -> SyncWorker {
        let (tx, rx) = mpsc::channel();
        *self.wake_tx.lock() = Some(tx.clone());

        let coordinator = Arc::clone(self);
        let connectivity_sub = self.monitor.on_change(move |online| {
            if online {
                coordinator.wake();
            } else {
                coordinator
                    .broadcaster
                    .publish(&StatusUpdate::status(SyncStatus::Offline));
            }
        });

        let coordinator = Arc::clone(self);
        let interval = self.config.drain_interval;
        let handle = std::thread::spawn(move || loop {
            match rx.recv_timeout(interval) {
                Ok(WorkerSignal::Wake) | Err(mpsc::RecvTimeoutError::Timeout) => {
                    let _ = coordinator.try_drain();
                }
                Ok(WorkerSignal::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });

        SyncWorker {
            handle: Some(handle),
            control: tx,
            connectivity_sub: Some(connectivity_sub),
        }
    }

    /// Signals the worker, if one is running, to attempt a drain now.
    pub fn wake(&self) {
        if let Some(tx) = self.wake_tx.lock().as_ref() {
            let _ = tx.send(WorkerSignal::Wake);
        }
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("pending", &self.pending_len())
            .field("draining", &self.is_draining())
            .field("online", &self.monitor.is_online())
            .finish()
    }
}

fn record_failure(summary: &mut PassSummary, operation: &SyncOperation, error: &SyncError) {
    summary.failed += 1;
    summary.errors.push(OperationFailure {
        id: operation.id.clone(),
        kind: operation.kind.clone(),
        error: operation
            .last_error
            .clone()
            .unwrap_or_else(|| error.to_string()),
    });
}

enum WorkerSignal {
    Wake,
    Shutdown,
}

/// Handle to the background drain thread.
///
/// Dropping the worker (or calling [`shutdown`](Self::shutdown)) removes
/// the connectivity listener and stops the thread; the listener's
/// reference to the coordinator is released either way.
pub struct SyncWorker {
    handle: Option<std::thread::JoinHandle<()>>,
    control: mpsc::Sender<WorkerSignal>,
    connectivity_sub: Option<ConnectivitySubscription>,
}

impl SyncWorker {
    /// Requests an immediate drain attempt.
    pub fn wake(&self) {
        let _ = self.control.send(WorkerSignal::Wake);
    }

    /// Stops the worker thread and removes the connectivity listener.
    /// Equivalent to dropping the handle.
    pub fn shutdown(self) {}
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        if let Some(sub) = self.connectivity_sub.take() {
            sub.unsubscribe();
        }
        let _ = self.control.send(WorkerSignal::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
