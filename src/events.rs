//! Render notifications.
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::common::Error;

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of listeners.
///
/// Delivery is synchronous on the emitting task and follows subscription
/// order. Listeners may subscribe or unsubscribe from inside a callback; the
/// change applies from the next emit.
pub struct Observers<T> {
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

/// Notification emitted by the render service.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// An element now shows rendered (or degraded) content.
    RenderCompleted {
        element_id: String,
        duration: Duration,
        backend: &'static str,
        from_cache: bool,
        degraded: bool,
    },
    /// Every attempt failed and no engine was available.
    RenderFailed {
        element_id: String,
        duration: Duration,
        error: Error,
    },
    BatchCompleted {
        processed: usize,
        total: usize,
        successes: usize,
    },
    ContainerCompleted {
        total: usize,
        successes: usize,
        duration: Duration,
    },
}

impl RenderEvent {
    /// Id of the element this event is about, if any.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            RenderEvent::RenderCompleted { element_id, .. } | RenderEvent::RenderFailed { element_id, .. } => {
                Some(element_id)
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_delivery() {
        let observers = Observers::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            observers.subscribe(move |value: &u32| seen.lock().push(format!("{tag}{value}")));
        }
        observers.emit(&1);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_unsubscribe() {
        let observers = Observers::<()>::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let id = observers.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        observers.emit(&());
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let observers = Arc::new(Observers::<()>::new());
        let slot = Arc::new(Mutex::new(None));
        let (inner, inner_slot) = (observers.clone(), slot.clone());
        let id = observers.subscribe(move |_| {
            if let Some(id) = *inner_slot.lock() {
                inner.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);
        observers.emit(&());
        assert!(observers.is_empty());
    }

    #[test]
    fn test_element_id() {
        let event = RenderEvent::RenderFailed {
            element_id: "mr-3".to_string(),
            duration: Duration::ZERO,
            error: Error::Disposed,
        };
        assert_eq!(event.element_id(), Some("mr-3"));
        let event = RenderEvent::BatchCompleted {
            processed: 1,
            total: 1,
            successes: 1,
        };
        assert_eq!(event.element_id(), None);
    }
}
