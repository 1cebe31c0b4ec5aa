//! Per-id render deduplication.
//!
//! At most one operation per id is in flight. Callers arriving while one is
//! pending join it and receive its outcome instead of starting another. The
//! entry is removed exactly once when the operation settles, by a guard that
//! lives inside the shared future, so a panicking or abandoned operation
//! cannot leave the id locked.
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::trace;

type Pending<T> = Shared<BoxFuture<'static, T>>;

struct Entry<T: Clone> {
    ticket: u64,
    pending: Pending<T>,
}

type Entries<T> = Mutex<HashMap<String, Entry<T>>>;

/// Removes its entry when the operation finishes or is dropped.
struct Release<T: Clone> {
    entries: Weak<Entries<T>>,
    id: String,
    ticket: u64,
}

impl<T: Clone> Drop for Release<T> {
    fn drop(&mut self) {
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        let removed = {
            let mut map = entries.lock();
            match map.get(&self.id) {
                Some(entry) if entry.ticket == self.ticket => map.remove(&self.id),
                _ => None,
            }
        };
        // The removed handle is dropped outside the lock.
        drop(removed);
        trace!(id = %self.id, "render lock released");
    }
}

/// Table of pending operations keyed by id.
pub struct LockTable<T: Clone> {
    entries: Arc<Entries<T>>,
    next_ticket: AtomicU64,
}

impl<T: Clone> Default for LockTable<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }
}

impl<T: Clone> std::fmt::Debug for LockTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("pending", &self.entries.lock().len())
            .finish()
    }
}

impl<T> LockTable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` under the lock for `id`, or join the one already
    /// pending.
    ///
    /// `operation` is only called when no operation for `id` is pending.
    pub async fn with_lock<F, Fut>(&self, id: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let pending = {
            let mut map = self.entries.lock();
            match map.get(id) {
                Some(entry) => {
                    trace!(id, "joining pending render");
                    entry.pending.clone()
                },
                None => {
                    let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                    let release = Release {
                        entries: Arc::downgrade(&self.entries),
                        id: id.to_string(),
                        ticket,
                    };
                    let work = operation();
                    let pending = async move {
                        let _release = release;
                        work.await
                    }
                    .boxed()
                    .shared();
                    map.insert(
                        id.to_string(),
                        Entry {
                            ticket,
                            pending: pending.clone(),
                        },
                    );
                    pending
                },
            }
        };
        pending.await
    }

    /// Whether an operation for `id` is pending.
    pub fn is_locked(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every pending operation.
    ///
    /// Callers already waiting still receive their outcome; new callers start
    /// fresh operations.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        drop(drained);
    }
}
