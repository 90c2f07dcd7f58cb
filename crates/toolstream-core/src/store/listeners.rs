use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ListenerSet {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
}

/// Ordered set of change listeners attached to a store.
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    inner: Arc<ListenerSet>,
}

impl Listeners {
    pub(crate) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        Subscription {
            id,
            set: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    /// Calls every listener registered at the time of the call.
    pub(crate) fn emit(&self) {
        let snapshot: Vec<Listener> = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by `subscribe`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    set: Weak<ListenerSet>,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keeps the listener registered for as long as the store lives.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(set) = self.set.upgrade() {
            set.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_runs_in_registration_order() {
        let listeners = Listeners::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = log.clone();
            listeners.subscribe(move || log.lock().unwrap().push("first"))
        };
        let second = {
            let log = log.clone();
            listeners.subscribe(move || log.lock().unwrap().push("second"))
        };

        listeners.emit();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

        drop(first);
        drop(second);
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn test_unsubscribe_and_detach() {
        let listeners = Listeners::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = {
            let calls = calls.clone();
            listeners.subscribe(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        counted.unsubscribe();
        listeners.emit();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        {
            let calls = calls.clone();
            listeners
                .subscribe(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .detach();
        }
        listeners.emit();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
