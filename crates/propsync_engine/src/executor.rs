//! Executor collaborators and their registry.

use crate::error::SyncResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Executes one kind of operation against its transport.
///
/// The coordinator neither knows nor cares what transport an executor uses.
/// An executor must bound its own call by the supplied timeout and report
/// expiry as [`SyncError::Timeout`], which is retryable; a call that never
/// returns would stall the whole queue.
pub trait OperationExecutor: Send + Sync {
    /// Executes one operation's payload.
    fn execute(&self, payload: &[u8], timeout: Duration) -> SyncResult<()>;
}

impl<F> OperationExecutor for F
where
    F: Fn(&[u8], Duration) -> SyncResult<()> + Send + Sync,
{
    fn execute(&self, payload: &[u8], timeout: Duration) -> SyncResult<()> {
        self(payload, timeout)
    }
}

/// Registry mapping operation kinds to their executors.
///
/// Registrations are not serializable; after a queue snapshot is restored,
/// every pending `kind` must be re-registered before it can execute.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn OperationExecutor>>>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor for a kind, replacing any previous one.
    pub fn register(
        &self,
        kind: impl Into<String>,
        executor: impl OperationExecutor + 'static,
    ) {
        self.executors
            .write()
            .insert(kind.into(), Arc::new(executor));
    }

    /// Removes a registration.
    pub fn unregister(&self, kind: &str) {
        self.executors.write().remove(kind);
    }

    /// Resolves a kind to its executor.
    pub fn resolve(&self, kind: &str) -> Option<Arc<dyn OperationExecutor>> {
        self.executors.read().get(kind).cloned()
    }

    /// Returns true if a kind is registered.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.executors.read().contains_key(kind)
    }

    /// Registered kinds, unordered.
    pub fn kinds(&self) -> Vec<String> {
        self.executors.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    #[test]
    fn register_and_resolve() {
        let registry = ExecutorRegistry::new();
        assert!(!registry.is_registered("entity_update"));
        assert!(registry.resolve("entity_update").is_none());

        registry.register("entity_update", |_payload: &[u8], _t: Duration| Ok(()));
        assert!(registry.is_registered("entity_update"));

        let executor = registry.resolve("entity_update").unwrap();
        assert!(executor.execute(&[1, 2, 3], Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn replace_and_unregister() {
        let registry = ExecutorRegistry::new();
        registry.register("k", |_: &[u8], _: Duration| {
            Err(SyncError::client_rejection("old"))
        });
        registry.register("k", |_: &[u8], _: Duration| Ok(()));

        let executor = registry.resolve("k").unwrap();
        assert!(executor.execute(&[], Duration::ZERO).is_ok());

        registry.unregister("k");
        assert!(registry.resolve("k").is_none());
    }

    #[test]
    fn kinds_listing() {
        let registry = ExecutorRegistry::new();
        registry.register("a", |_: &[u8], _: Duration| Ok(()));
        registry.register("b", |_: &[u8], _: Duration| Ok(()));

        let mut kinds = registry.kinds();
        kinds.sort();
        assert_eq!(kinds, vec!["a", "b"]);
    }
}
