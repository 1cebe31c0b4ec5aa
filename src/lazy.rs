//! Deferred rendering of off-screen elements.
//!
//! The gate keeps a set of observed elements and, whenever the host reports a
//! new viewport, hands back those that entered the viewport extended by a
//! margin. Handed-back elements are no longer observed.
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::dom::{Element, LayoutBox, WeakElement};

/// Visible region of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    /// Whether `layout` overlaps this viewport grown by `margin` on both
    /// edges.
    pub fn intersects(&self, layout: LayoutBox, margin: f64) -> bool {
        let start = self.top - margin;
        let end = self.top + self.height + margin;
        layout.top <= end && layout.bottom() >= start
    }
}

struct Observed<T> {
    element: WeakElement,
    payload: T,
}

struct GateState<T> {
    observed: HashMap<usize, Observed<T>>,
    order: Vec<usize>,
    viewport: Option<Viewport>,
}

impl<T> Default for GateState<T> {
    fn default() -> Self {
        Self {
            observed: HashMap::new(),
            order: Vec::new(),
            viewport: None,
        }
    }
}

impl<T> GateState<T> {
    fn live(&self, element: &Element) -> bool {
        self.observed
            .get(&element.key())
            .is_some_and(|entry| entry.element.upgrade().is_some_and(|e| e.ptr_eq(element)))
    }
}

/// Registry of elements waiting to become visible.
///
/// Every observed element carries a payload, handed back with it when it
/// enters the viewport.
pub struct VisibilityGate<T = ()> {
    margin: f64,
    state: Mutex<GateState<T>>,
}

impl<T> std::fmt::Debug for VisibilityGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityGate")
            .field("margin", &self.margin)
            .field("observed", &self.state.lock().observed.len())
            .finish()
    }
}

impl<T: Clone> VisibilityGate<T> {
    pub fn new(margin: f64) -> Self {
        Self {
            margin,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Start observing `elements`, each with a copy of `payload`. Already
    /// observed ones are skipped and keep their payload.
    ///
    /// Returns how many were newly registered.
    pub fn observe<'a, I>(&self, elements: I, payload: T) -> usize
    where
        I: IntoIterator<Item = &'a Element>,
    {
        let mut state = self.state.lock();
        let mut added = 0;
        for element in elements {
            if state.live(element) {
                continue;
            }
            let key = element.key();
            let entry = Observed {
                element: element.downgrade(),
                payload: payload.clone(),
            };
            if state.observed.insert(key, entry).is_none() {
                state.order.push(key);
            }
            added += 1;
        }
        added
    }

    pub fn is_observed(&self, element: &Element) -> bool {
        self.state.lock().live(element)
    }

    /// Live observed elements.
    pub fn len(&self) -> usize {
        let mut state = self.state.lock();
        prune(&mut state);
        state.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last viewport reported to [`update`](Self::update).
    pub fn viewport(&self) -> Option<Viewport> {
        self.state.lock().viewport
    }

    /// Record a new viewport and take every observed element inside it, in
    /// the order they were observed.
    pub fn update(&self, viewport: Viewport) -> Vec<(Element, T)> {
        let mut state = self.state.lock();
        state.viewport = Some(viewport);
        prune(&mut state);

        let mut entering = Vec::new();
        let mut remaining = Vec::with_capacity(state.order.len());
        let order = std::mem::take(&mut state.order);
        for key in order {
            let element = state.observed.get(&key).and_then(|entry| entry.element.upgrade());
            match element {
                Some(element) if viewport.intersects(element.layout(), self.margin) => {
                    if let Some(entry) = state.observed.remove(&key) {
                        entering.push((element, entry.payload));
                    }
                },
                _ => remaining.push(key),
            }
        }
        state.order = remaining;
        entering
    }

    /// Take those of `elements` that are observed and visible in the last
    /// reported viewport. Elements observed by other callers stay put.
    pub fn take_visible(&self, elements: &[Element]) -> Vec<(Element, T)> {
        let mut state = self.state.lock();
        let Some(viewport) = state.viewport else {
            return Vec::new();
        };

        let mut taken = Vec::new();
        for element in elements {
            if !state.live(element) || !viewport.intersects(element.layout(), self.margin) {
                continue;
            }
            if let Some(entry) = state.observed.remove(&element.key()) {
                taken.push((element.clone(), entry.payload));
            }
        }
        let GateState { observed, order, .. } = &mut *state;
        order.retain(|key| observed.contains_key(key));
        taken
    }

    /// Stop observing everything.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        state.observed.clear();
        state.order.clear();
    }
}

fn prune<T>(state: &mut GateState<T>) {
    state.observed.retain(|_, entry| entry.element.is_alive());
    let GateState { observed, order, .. } = state;
    order.retain(|key| observed.contains_key(key));
}
