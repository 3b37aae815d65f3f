//! Priority-ordered pending operation queue.

use crate::operation::{Priority, SyncOperation};
use std::collections::VecDeque;

/// A pending queue of sync operations.
///
/// Operations drain in priority-descending order; within one priority tier
/// insertion order is preserved (stable FIFO). The queue performs no
/// validation of an operation's `kind` — classification happens at
/// execution time, keeping this type dependency-free.
///
/// # Invariants
///
/// - [`drain_snapshot`](Self::drain_snapshot) removes the entire contents in
///   one step; operations enqueued afterwards belong to the next pass
/// - `requeue` never mutates the operation it re-inserts
///
/// The queue itself is not synchronized; the coordinator owns it behind a
/// lock and serializes all mutation.
#[derive(Debug, Default)]
pub struct SyncOperationQueue {
    tiers: [VecDeque<SyncOperation>; Priority::COUNT],
}

impl SyncOperationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an operation, returning its id.
    pub fn enqueue(&mut self, operation: SyncOperation) -> String {
        let id = operation.id.clone();
        self.tiers[operation.priority.tier()].push_back(operation);
        id
    }

    /// Re-inserts an operation at the tail of its priority tier.
    ///
    /// The operation is stored as given; retry bookkeeping is the caller's
    /// responsibility.
    pub fn requeue(&mut self, operation: SyncOperation) {
        self.tiers[operation.priority.tier()].push_back(operation);
    }

    /// Re-inserts an operation at the head of its priority tier.
    ///
    /// For handing back drained work that was never attempted, so it stays
    /// ahead of anything enqueued in the meantime. Callers re-inserting
    /// several operations must do so in reverse drain order.
    pub fn requeue_front(&mut self, operation: SyncOperation) {
        self.tiers[operation.priority.tier()].push_front(operation);
    }

    /// Removes and returns the entire queue contents in drain order.
    pub fn drain_snapshot(&mut self) -> Vec<SyncOperation> {
        let mut batch = Vec::with_capacity(self.len());
        for tier in &mut self.tiers {
            batch.extend(tier.drain(..));
        }
        batch
    }

    /// Clones the current contents in drain order without removing them.
    pub fn snapshot(&self) -> Vec<SyncOperation> {
        let mut batch = Vec::with_capacity(self.len());
        for tier in &self.tiers {
            batch.extend(tier.iter().cloned());
        }
        batch
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    /// Returns true if no operations are pending.
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn op(id: &str, priority: Priority) -> SyncOperation {
        let mut op = SyncOperation::new("entity_update", vec![], priority);
        op.id = id.into();
        op
    }

    #[test]
    fn drain_order_is_priority_then_fifo() {
        let mut queue = SyncOperationQueue::new();
        queue.enqueue(op("a", Priority::High));
        queue.enqueue(op("b", Priority::Low));
        queue.enqueue(op("c", Priority::High));

        let ids: Vec<_> = queue
            .drain_snapshot()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_snapshot_excludes_later_enqueues() {
        let mut queue = SyncOperationQueue::new();
        queue.enqueue(op("first", Priority::Medium));

        let batch = queue.drain_snapshot();
        assert_eq!(batch.len(), 1);

        queue.enqueue(op("second", Priority::Critical));
        assert_eq!(queue.len(), 1);
        let next: Vec<_> = queue.drain_snapshot().into_iter().map(|o| o.id).collect();
        assert_eq!(next, vec!["second"]);
    }

    #[test]
    fn requeue_preserves_tier_and_goes_to_tail() {
        let mut queue = SyncOperationQueue::new();
        queue.enqueue(op("x", Priority::High));
        let retried = op("retried", Priority::High);
        queue.requeue(retried);
        queue.enqueue(op("y", Priority::Critical));

        let ids: Vec<_> = queue.drain_snapshot().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["y", "x", "retried"]);
    }

    #[test]
    fn requeue_front_stays_ahead_of_later_enqueues() {
        let mut queue = SyncOperationQueue::new();
        queue.enqueue(op("new", Priority::High));

        // Hand back two unattempted operations in reverse drain order.
        queue.requeue_front(op("r2", Priority::High));
        queue.requeue_front(op("r1", Priority::High));

        let ids: Vec<_> = queue.drain_snapshot().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["r1", "r2", "new"]);
    }

    #[test]
    fn unrecognized_kind_is_accepted() {
        let mut queue = SyncOperationQueue::new();
        let id = queue.enqueue(op("q", Priority::Low));
        assert_eq!(id, "q");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn non_consuming_snapshot_keeps_contents() {
        let mut queue = SyncOperationQueue::new();
        queue.enqueue(op("a", Priority::Low));
        queue.enqueue(op("b", Priority::High));

        let view = queue.snapshot();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id, "b");
        assert_eq!(queue.len(), 2);
    }

    fn arb_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Medium),
            Just(Priority::High),
            Just(Priority::Critical),
        ]
    }

    proptest! {
        #[test]
        fn drain_is_sorted_and_stable(priorities in proptest::collection::vec(arb_priority(), 0..64)) {
            let mut queue = SyncOperationQueue::new();
            for (i, p) in priorities.iter().enumerate() {
                queue.enqueue(op(&format!("op-{i}"), *p));
            }

            let drained = queue.drain_snapshot();
            prop_assert_eq!(drained.len(), priorities.len());

            // Non-increasing priority.
            for pair in drained.windows(2) {
                prop_assert!(pair[0].priority >= pair[1].priority);
            }

            // Stable within each tier: ids keep their enqueue order.
            for tier in Priority::drain_order() {
                let drained_ids: Vec<_> = drained
                    .iter()
                    .filter(|o| o.priority == tier)
                    .map(|o| o.id.clone())
                    .collect();
                let enqueued_ids: Vec<_> = priorities
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| **p == tier)
                    .map(|(i, _)| format!("op-{i}"))
                    .collect();
                prop_assert_eq!(drained_ids, enqueued_ids);
            }
        }
    }
}
