use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::trace;

use crate::models::Task;

/// Callback invoked with the full task list after every change.
pub type Listener = Box<dyn Fn(&[Task]) + Send + Sync>;

type SharedListener = Arc<dyn Fn(&[Task]) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, SharedListener)>,
}

/// The set of listeners attached to a store.
#[derive(Default)]
pub struct Subscribers {
    registry: Arc<Mutex<Registry>>,
}

impl Subscribers {
    /// Registers `listener` and hands it the current `snapshot` straight away.
    pub fn add(&self, listener: Listener, snapshot: &[Task]) -> Subscription {
        let listener: SharedListener = Arc::from(listener);
        let id = {
            let mut reg = lock(&self.registry);
            reg.next_id += 1;
            let id = reg.next_id;
            reg.listeners.push((id, listener.clone()));
            id
        };
        trace!(subscription = id, "listener added");
        listener(snapshot);
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `snapshot` to every live listener.
    ///
    /// Listeners run outside the registry lock so they may unsubscribe or
    /// read the store again.
    pub fn emit(&self, snapshot: &[Task]) {
        let listeners: Vec<SharedListener> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

/// Handle returned by `subscribe`. Delivery stops when it is dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stops delivery. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|(id, _)| *id != self.id);
            trace!(subscription = self.id, "listener removed");
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
