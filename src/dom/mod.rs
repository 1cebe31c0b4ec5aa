//! In-memory element tree the render core operates on.
//!
//! The tree stands in for the host document: elements carry classes,
//! attributes, rendered markup, children, a layout box for visibility checks
//! and an attachment flag. Render results are always produced on a detached
//! [`Element::scratch`] node and swapped into the live element in one step.

mod element;

pub use element::{
    DISPLAY_ATTR, Element, LayoutBox, MATH_SOURCE_ATTR, NO_CACHE_ATTR, NO_CACHE_CLASS, RENDERED_CLASS,
    WeakElement,
};
