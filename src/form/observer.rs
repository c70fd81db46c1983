use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use super::controller::{FormController, FormResult, FormSnapshot, read_lock, write_lock};

pub type FormListener = Arc<dyn Fn(&FormSnapshot) + Send + Sync>;

pub(super) struct Observers {
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<u64, FormListener>>,
}

impl Observers {
    pub(super) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(BTreeMap::new()),
        }
    }

    fn insert(&self, listener: FormListener) -> FormResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        write_lock(&self.listeners, "registering listener")?.insert(id, listener);
        Ok(id)
    }

    fn remove(&self, id: u64) {
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.remove(&id);
    }

    /// Listeners run outside the registry lock so they may subscribe or
    /// unsubscribe from inside the callback.
    pub(super) fn notify(&self, snapshot: &FormSnapshot) -> FormResult<()> {
        let listeners = read_lock(&self.listeners, "notifying listeners")?
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(snapshot);
        }
        Ok(())
    }

    pub(super) fn len(&self) -> usize {
        match self.listeners.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    observers: Weak<Observers>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl FormController {
    /// Registers `listener` to receive a snapshot after every state change.
    /// A batch such as `set_field_values` produces a single notification.
    pub fn subscribe(
        &self,
        listener: impl Fn(&FormSnapshot) + Send + Sync + 'static,
    ) -> FormResult<Subscription> {
        let id = self.observers.insert(Arc::new(listener))?;
        Ok(Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }
}
