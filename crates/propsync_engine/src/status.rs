//! Status broadcasting.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Broadcast-only projection of the queue and connectivity state.
///
/// Never authoritative; recomputed on every transition and pushed to
/// listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No drain pass is running.
    Idle,
    /// A drain pass is executing.
    Syncing,
    /// The last pass completed with zero failures.
    Success,
    /// The last pass recorded at least one terminal failure.
    Error,
    /// Work is queued (or a drain was refused) while disconnected.
    Offline,
}

/// A terminally failed operation within a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationFailure {
    /// Operation id.
    pub id: String,
    /// Operation kind.
    pub kind: String,
    /// The operation's last recorded error.
    pub error: String,
}

/// Aggregate result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    /// Operations attempted in this pass.
    pub processed: usize,
    /// Operations that succeeded.
    pub succeeded: usize,
    /// Operations that failed terminally.
    pub failed: usize,
    /// Operations requeued for the next pass.
    pub retried: usize,
    /// Details of every terminal failure.
    pub errors: Vec<OperationFailure>,
}

/// One published status notification.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Current status.
    pub status: SyncStatus,
    /// Pass summary, present on terminal pass statuses.
    pub pass: Option<PassSummary>,
}

impl StatusUpdate {
    /// A bare status notification.
    pub fn status(status: SyncStatus) -> Self {
        Self { status, pass: None }
    }

    /// A terminal pass notification carrying its summary.
    pub fn pass_result(status: SyncStatus, summary: PassSummary) -> Self {
        Self {
            status,
            pass: Some(summary),
        }
    }
}

type StatusListener = Arc<dyn Fn(&StatusUpdate) + Send + Sync>;
type ListenerSlot = (u64, StatusListener);

/// Publish/subscribe mechanism for sync status.
///
/// Listeners are invoked in subscription order. A panicking listener is
/// caught and logged; it never prevents delivery to the remaining
/// listeners and never reaches the publisher. Consecutive identical
/// statuses are not deduplicated.
#[derive(Default)]
pub struct StatusBroadcaster {
    listeners: Arc<RwLock<Vec<ListenerSlot>>>,
    next_listener_id: AtomicU64,
}

impl StatusBroadcaster {
    /// Creates a broadcaster with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener, returning its unsubscribe handle.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StatusUpdate) + Send + Sync + 'static,
    ) -> StatusSubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().push((id, Arc::new(listener)));
        StatusSubscription {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Publishes an update to all listeners in subscription order.
    pub fn publish(&self, update: &StatusUpdate) {
        let snapshot: Vec<ListenerSlot> = self.listeners.read().clone();
        for (id, listener) in &snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| listener(update)));
            if result.is_err() {
                tracing::warn!(listener = id, status = ?update.status, "status listener panicked");
            }
        }
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle controlling a status listener's lifetime.
///
/// The listener stays registered for exactly as long as the handle lives:
/// dropping it (or calling [`unsubscribe`](Self::unsubscribe)) removes the
/// listener and releases its captured state.
pub struct StatusSubscription {
    id: u64,
    listeners: Arc<RwLock<Vec<ListenerSlot>>>,
}

impl StatusSubscription {
    /// Removes the listener. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.listeners.write().retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn delivery_in_subscription_order() {
        let broadcaster = StatusBroadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = broadcaster.subscribe(move |u| first.lock().push(("first", u.status)));
        let second = Arc::clone(&order);
        let _b = broadcaster.subscribe(move |u| second.lock().push(("second", u.status)));

        broadcaster.publish(&StatusUpdate::status(SyncStatus::Syncing));
        assert_eq!(
            *order.lock(),
            vec![("first", SyncStatus::Syncing), ("second", SyncStatus::Syncing)]
        );
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let broadcaster = StatusBroadcaster::new();
        let _bad = broadcaster.subscribe(|_| panic!("listener bug"));

        let received = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&received);
        let _good = broadcaster.subscribe(move |u| seen.lock().push(u.status));

        broadcaster.publish(&StatusUpdate::status(SyncStatus::Syncing));
        broadcaster.publish(&StatusUpdate::status(SyncStatus::Success));

        assert_eq!(*received.lock(), vec![SyncStatus::Syncing, SyncStatus::Success]);
    }

    #[test]
    fn duplicate_statuses_notify_twice() {
        let broadcaster = StatusBroadcaster::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&received);
        let _sub = broadcaster.subscribe(move |u| seen.lock().push(u.status));

        broadcaster.publish(&StatusUpdate::status(SyncStatus::Idle));
        broadcaster.publish(&StatusUpdate::status(SyncStatus::Idle));
        assert_eq!(*received.lock(), vec![SyncStatus::Idle, SyncStatus::Idle]);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let broadcaster = StatusBroadcaster::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&received);
        let sub = broadcaster.subscribe(move |u| seen.lock().push(u.status));
        assert_eq!(broadcaster.listener_count(), 1);

        broadcaster.publish(&StatusUpdate::status(SyncStatus::Syncing));
        sub.unsubscribe();
        assert_eq!(broadcaster.listener_count(), 0);
        broadcaster.publish(&StatusUpdate::status(SyncStatus::Success));

        assert_eq!(*received.lock(), vec![SyncStatus::Syncing]);
    }

    #[test]
    fn dropped_handle_removes_listener() {
        let broadcaster = StatusBroadcaster::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&received);
        let sub = broadcaster.subscribe(move |u| seen.lock().push(u.status));
        assert_eq!(broadcaster.listener_count(), 1);

        drop(sub);
        assert_eq!(broadcaster.listener_count(), 0);
        broadcaster.publish(&StatusUpdate::status(SyncStatus::Syncing));
        assert!(received.lock().is_empty());

        // The captured Arc is released, not just silenced.
        assert_eq!(Arc::strong_count(&received), 1);
    }

    #[test]
    fn pass_result_carries_summary() {
        let summary = PassSummary {
            processed: 3,
            succeeded: 2,
            failed: 1,
            retried: 0,
            errors: vec![OperationFailure {
                id: "op-1".into(),
                kind: "entity_update".into(),
                error: "operation rejected: bad payload".into(),
            }],
        };

        let update = StatusUpdate::pass_result(SyncStatus::Error, summary.clone());
        assert_eq!(update.status, SyncStatus::Error);
        assert_eq!(update.pass, Some(summary));
    }
}
