//! Connectivity state machine.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Host-supplied connectivity signal.
///
/// A browser host samples its online/offline events; a headless host might
/// back this with a periodic reachability probe. The monitor only samples
/// the source at construction; ongoing signals are fed in through
/// [`ConnectivityMonitor::set_online`].
pub trait ConnectivitySource: Send + Sync {
    /// Current connectivity, best effort.
    fn is_online(&self) -> bool;
}

/// A connectivity source driven by explicit calls, for tests and hosts with
/// push-style signals.
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
}

impl ManualConnectivity {
    /// Creates a source with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Updates the signal.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivitySource for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

type ChangeListener = Arc<dyn Fn(bool) + Send + Sync>;
type ListenerSlot = (u64, ChangeListener);

/// Tracks the process-wide online/offline state and notifies on genuine
/// transitions.
///
/// Repeated identical signals are deduplicated: a listener fires exactly
/// once per transition. The OFFLINE state gates drain passes; it never
/// aborts an in-flight executor call.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    listeners: Arc<RwLock<Vec<ListenerSlot>>>,
    next_listener_id: AtomicU64,
}

impl ConnectivityMonitor {
    /// Creates a monitor with an explicit initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Creates a monitor whose initial state is sampled from `source`.
    pub fn from_source(source: &dyn ConnectivitySource) -> Self {
        Self::new(source.is_online())
    }

    /// Current connectivity state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Applies a connectivity signal.
    ///
    /// Returns true when this was a genuine transition; listeners are then
    /// notified in subscription order with the new state. A repeated
    /// identical signal is a no-op.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        tracing::debug!(online, "connectivity transition");
        let snapshot: Vec<ListenerSlot> = self.listeners.read().clone();
        for (_, listener) in &snapshot {
            listener(online);
        }
        true
    }

    /// Registers a transition listener, returning its unsubscribe handle.
    pub fn on_change(
        &self,
        listener: impl Fn(bool) + Send + Sync + 'static,
    ) -> ConnectivitySubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().push((id, Arc::new(listener)));
        ConnectivitySubscription {
            id,
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

/// Handle controlling a connectivity listener's lifetime.
///
/// The listener stays registered until [`unsubscribe`](Self::unsubscribe)
/// is called; dropping the handle does not remove it.
pub struct ConnectivitySubscription {
    id: u64,
    listeners: Arc<RwLock<Vec<ListenerSlot>>>,
}

impl ConnectivitySubscription {
    /// Removes the listener.
    pub fn unsubscribe(self) {
        self.listeners.write().retain(|(id, _)| *id != self.id);
    }
}
