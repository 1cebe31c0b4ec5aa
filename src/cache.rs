//! Render cache keyed weakly by element.
//!
//! Entries never keep their element alive: each one holds a [`WeakElement`]
//! and is treated as gone once the element has no other owner. Dead entries
//! are purged on writes and on [`RenderCache::len`].
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::content::Fingerprint;
use crate::dom::{Element, WeakElement};

struct Entry {
    element: WeakElement,
    fingerprint: Fingerprint,
    markup: String,
}

impl Entry {
    #[inline]
    fn belongs_to(&self, element: &Element) -> bool {
        self.element.upgrade().is_some_and(|owner| owner.ptr_eq(element))
    }
}

/// Markup cache with exact fingerprint matching.
#[derive(Default)]
pub struct RenderCache {
    entries: Mutex<HashMap<usize, Entry>>,
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached markup for `element`, only if it was stored under exactly
    /// `fingerprint` and the element has not opted out.
    pub fn get(&self, element: &Element, fingerprint: &Fingerprint) -> Option<String> {
        if element.is_cache_opted_out() {
            return None;
        }
        let entries = self.entries.lock();
        let entry = entries.get(&element.key())?;
        (entry.belongs_to(element) && entry.fingerprint == *fingerprint).then(|| entry.markup.clone())
    }

    /// Store markup for `element`, replacing any earlier entry.
    ///
    /// Skipped for elements that opted out.
    pub fn put(&self, element: &Element, fingerprint: Fingerprint, markup: impl Into<String>) {
        if element.is_cache_opted_out() {
            return;
        }
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.element.is_alive());
        entries.insert(
            element.key(),
            Entry {
                element: element.downgrade(),
                fingerprint,
                markup: markup.into(),
            },
        );
    }

    /// Drop the entry of one element.
    pub fn remove(&self, element: &Element) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(&element.key()) {
            Some(entry) if entry.belongs_to(element) => entries.remove(&element.key()).is_some(),
            _ => false,
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries whose element is still alive.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.element.is_alive());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
