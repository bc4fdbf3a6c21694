//! Observer registry
//!
//! Listeners are stored behind a lock and copied out at delivery time, so
//! adding or removing a listener from inside a callback never invalidates an
//! in-flight iteration.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

/// Observer notified whenever the aggregated state changes
///
/// The notification carries no payload; read the current state through the
/// controller accessors so late observers never act on stale pushed data.
pub trait OnDataListener: Send + Sync {
    fn on_data_updated(&self);
}

impl<F> OnDataListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_data_updated(&self) {
        self()
    }
}

/// Outcome of [`ListenerRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    /// The registry was empty before this listener
    First,
    /// Other listeners were already registered
    Joined,
    /// This listener was already registered
    Duplicate,
}

/// Set of registered observers
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn OnDataListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn OnDataListener>) -> Added {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return Added::Duplicate;
        }
        let was_empty = listeners.is_empty();
        listeners.push(listener);
        if was_empty {
            Added::First
        } else {
            Added::Joined
        }
    }

    /// Remove a listener, returning whether it was registered
    pub fn remove(&self, listener: &Arc<dyn OnDataListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn contains(&self, listener: &Arc<dyn OnDataListener>) -> bool {
        self.listeners
            .read()
            .iter()
            .any(|l| same_listener(l, listener))
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Notify every listener registered right now
    ///
    /// Listeners added during delivery only see later notifications. Returns
    /// how many listeners were invoked.
    pub fn notify_all(&self) -> usize {
        let listeners: Vec<_> = self.listeners.read().clone();
        for listener in &listeners {
            invoke(listener);
        }
        listeners.len()
    }

    /// Notify one listener if it is still registered
    pub fn notify_one(&self, listener: &Arc<dyn OnDataListener>) -> bool {
        if !self.contains(listener) {
            return false;
        }
        invoke(listener);
        true
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}

/// Pointer identity, ignoring vtable differences between trait objects
fn same_listener(a: &Arc<dyn OnDataListener>, b: &Arc<dyn OnDataListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn invoke(listener: &Arc<dyn OnDataListener>) {
    if catch_unwind(AssertUnwindSafe(|| listener.on_data_updated())).is_err() {
        tracing::warn!("Listener panicked during on_data_updated");
    }
}
