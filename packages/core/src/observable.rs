//! Named-event subscriptions.
//!
//! Data stores fire `load`, `filter`, `sort` and `recordChange`; privileged
//! singletons fire their own events (`mapCreated`). Widgets subscribe from
//! their hooks and hand the returned subscription to
//! [`MutationScope::track`](crate::MutationScope::track) so it is released
//! with the component.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::component::Teardown;
use crate::value::Value;

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, String, Listener)>,
}

/// A cloneable event source. Clones share listeners.
#[derive(Clone, Default)]
pub struct Observable {
    inner: Arc<Mutex<Listeners>>,
}

impl Observable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .entries
            .push((id, event.to_string(), Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn un(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.entries.len();
        inner.entries.retain(|(listener, _, _)| *listener != id);
        inner.entries.len() != before
    }

    /// Call every listener of `event` in registration order. Returns how
    /// many were called.
    ///
    /// Listeners run outside the lock and may register or remove listeners,
    /// themselves included; such changes apply from the next `fire`.
    pub fn fire(&self, event: &str, payload: &Value) -> usize {
        let listeners: Vec<Listener> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .entries
                .iter()
                .filter(|(_, name, _)| name == event)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };
        trace!(event, listeners = listeners.len(), "fire");
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .filter(|(_, name, _)| name == event)
            .count()
    }

    /// A resource that removes the listener when torn down.
    pub fn subscription(&self, id: ListenerId) -> Box<dyn Teardown> {
        let observable = self.clone();
        Box::new(move || {
            observable.un(id);
        })
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Observable")
            .field("listeners", &inner.entries.len())
            .finish()
    }
}
