//! Element handles and tree operations.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::common::{Error, Result, escape_html, strip_tags};
use crate::state::RenderState;

/// Attribute holding the content an element is waiting to have rendered.
pub const MATH_SOURCE_ATTR: &str = "data-math";
/// Class added once an element shows rendered (or degraded) content.
pub const RENDERED_CLASS: &str = "math-rendered";
/// Class opting an element out of the render cache.
pub const NO_CACHE_CLASS: &str = "no-cache";
/// Attribute opting an element out of the render cache.
pub const NO_CACHE_ATTR: &str = "data-no-cache";
/// Attribute asking for display (block) layout regardless of call options.
pub const DISPLAY_ATTR: &str = "data-display";

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Vertical layout box of an element, in document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutBox {
    pub top: f64,
    pub height: f64,
}

impl LayoutBox {
    #[inline]
    pub fn new(top: f64, height: f64) -> Self {
        Self {
            top,
            height: height.max(0.0),
        }
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

struct Node {
    tag: String,
    data: RwLock<NodeData>,
    attached: watch::Sender<bool>,
}

#[derive(Default)]
struct NodeData {
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    html: String,
    children: Vec<Element>,
    parent: Weak<Node>,
    layout: LayoutBox,
    render_state: RenderState,
}

/// Shared handle to a node of the element tree.
///
/// Cloning the handle never copies the node; two handles are the same element
/// when [`Element::ptr_eq`] says so. The tree owns its children, while the
/// parent link is non-owning.
#[derive(Clone)]
pub struct Element {
    node: Arc<Node>,
}

/// Non-owning reference to an element.
#[derive(Clone)]
pub struct WeakElement {
    node: Weak<Node>,
}

impl WeakElement {
    /// Get the element back if something still owns it.
    #[inline]
    pub fn upgrade(&self) -> Option<Element> {
        self.node.upgrade().map(|node| Element { node })
    }

    /// Whether the element is still owned somewhere.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

impl Element {
    /// Create a detached element with the given tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        let (attached, _) = watch::channel(false);
        Self {
            node: Arc::new(Node {
                tag: tag.into(),
                data: RwLock::new(NodeData::default()),
                attached,
            }),
        }
    }

    /// Builder: set the id.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.node.data.write().id = Some(id.into());
        self
    }

    /// Builder: add a class.
    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    /// Builder: set an attribute.
    pub fn with_attr(self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: set the pending math content.
    pub fn with_math(self, content: impl Into<String>) -> Self {
        self.set_attr(MATH_SOURCE_ATTR, content);
        self
    }

    /// Builder: set the text content.
    pub fn with_text(self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    /// Builder: set the layout box.
    pub fn with_layout(self, top: f64, height: f64) -> Self {
        self.set_layout(LayoutBox::new(top, height));
        self
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.node.tag
    }

    #[inline]
    pub fn id(&self) -> Option<String> {
        self.node.data.read().id.clone()
    }

    /// Return the element's id, generating one the first time.
    ///
    /// Once assigned the id never changes, so it can key per-element
    /// bookkeeping such as render locks.
    pub fn ensure_id(&self) -> String {
        let mut data = self.node.data.write();
        data.id
            .get_or_insert_with(|| {
                format!("mr-{}", NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
            })
            .clone()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.node.data.read().classes.iter().any(|c| c == class)
    }

    pub fn add_class(&self, class: &str) {
        let mut data = self.node.data.write();
        if !data.classes.iter().any(|c| c == class) {
            data.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&self, class: &str) {
        self.node.data.write().classes.retain(|c| c != class);
    }

    pub fn classes(&self) -> Vec<String> {
        self.node.data.read().classes.clone()
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.node.data.read().attributes.get(name).cloned()
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.node.data.read().attributes.contains_key(name)
    }

    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        self.node
            .data
            .write()
            .attributes
            .insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&self, name: &str) -> Option<String> {
        self.node.data.write().attributes.remove(name)
    }

    /// The element's own markup (children excluded).
    pub fn html(&self) -> String {
        self.node.data.read().html.clone()
    }

    /// Replace the element's content with markup; children are dropped.
    pub fn set_html(&self, markup: impl Into<String>) {
        let children = {
            let mut data = self.node.data.write();
            data.html = markup.into();
            std::mem::take(&mut data.children)
        };
        for child in children {
            child.orphan();
        }
    }

    /// Replace the element's content with escaped text; children are dropped.
    pub fn set_text(&self, text: &str) {
        self.set_html(escape_html(text));
    }

    /// Text of the element and its subtree, with tags stripped.
    pub fn text_content(&self) -> String {
        let (html, children) = {
            let data = self.node.data.read();
            (data.html.clone(), data.children.clone())
        };
        let mut text = strip_tags(&html);
        for child in children {
            text.push_str(&child.text_content());
        }
        text
    }

    pub fn children(&self) -> Vec<Element> {
        self.node.data.read().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.node.data.read().children.len()
    }

    pub fn parent(&self) -> Option<Element> {
        self.node.data.read().parent.upgrade().map(|node| Element { node })
    }

    /// Append a child; it takes over this element's attachment state.
    pub fn append_child(&self, child: Element) {
        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(&child);
        }
        child.node.data.write().parent = Arc::downgrade(&self.node);
        let attached = self.is_attached();
        self.node.data.write().children.push(child.clone());
        child.set_attached_subtree(attached);
    }

    /// Remove a child; the removed subtree is detached.
    pub fn remove_child(&self, child: &Element) -> bool {
        let removed = {
            let mut data = self.node.data.write();
            let before = data.children.len();
            data.children.retain(|c| !c.ptr_eq(child));
            before != data.children.len()
        };
        if removed {
            child.orphan();
        }
        removed
    }

    /// All descendants in document order (pre-order), excluding `self`.
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(element) = stack.pop() {
            stack.extend(element.children().into_iter().rev());
            out.push(element);
        }
        out
    }

    pub fn layout(&self) -> LayoutBox {
        self.node.data.read().layout
    }

    pub fn set_layout(&self, layout: LayoutBox) {
        self.node.data.write().layout = layout;
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        *self.node.attached.borrow()
    }

    /// Mark this element and its subtree as part of a live tree.
    pub fn attach(&self) {
        self.set_attached_subtree(true);
    }

    /// Mark this element and its subtree as detached.
    pub fn detach(&self) {
        self.set_attached_subtree(false);
    }

    /// Wait until the element is attached, failing after `timeout`.
    pub async fn wait_attached(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.node.attached.subscribe();
        let wait = async move {
            loop {
                let attached = *rx.borrow_and_update();
                if attached {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(Error::NotAttached {
                element: self.ensure_id(),
                timeout,
            }),
        }
    }

    pub fn render_state(&self) -> RenderState {
        self.node.data.read().render_state.clone()
    }

    pub(crate) fn update_render_state(&self, update: impl FnOnce(&mut RenderState)) {
        update(&mut self.node.data.write().render_state);
    }

    /// Whether the element opted out of the render cache.
    pub fn is_cache_opted_out(&self) -> bool {
        self.has_class(NO_CACHE_CLASS) || self.has_attr(NO_CACHE_ATTR)
    }

    /// Whether the element already carries the rendered marker.
    pub fn is_marked_rendered(&self) -> bool {
        self.has_class(RENDERED_CLASS)
    }

    /// Content this element wants rendered, if it is renderable at all.
    ///
    /// The `data-math` attribute wins; otherwise an element carrying one of
    /// `render_classes` contributes its text content.
    pub fn math_source(&self, render_classes: &[String]) -> Option<String> {
        if let Some(source) = self.attr(MATH_SOURCE_ATTR) {
            return Some(source);
        }
        let renderable = {
            let data = self.node.data.read();
            data.classes.iter().any(|c| render_classes.contains(c))
        };
        if !renderable {
            return None;
        }
        let text = self.text_content();
        (!text.trim().is_empty()).then_some(text)
    }

    /// Fresh detached node of the same tag, used as a render target before
    /// the result is swapped into the live element.
    pub fn scratch(&self) -> Element {
        Element::new(self.node.tag.clone())
    }

    /// Move the scratch node's content into this element in one step.
    pub fn swap_content_from(&self, scratch: &Element) {
        let (html, children) = {
            let mut data = scratch.node.data.write();
            (std::mem::take(&mut data.html), std::mem::take(&mut data.children))
        };
        let old_children = {
            let mut data = self.node.data.write();
            data.html = html;
            std::mem::replace(&mut data.children, children.clone())
        };
        for child in old_children {
            child.orphan();
        }
        let attached = self.is_attached();
        for child in children {
            child.node.data.write().parent = Arc::downgrade(&self.node);
            child.set_attached_subtree(attached);
        }
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    #[inline]
    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            node: Arc::downgrade(&self.node),
        }
    }

    /// Identity key; only meaningful while the element is alive.
    #[inline]
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.node) as usize
    }

    fn orphan(&self) {
        self.node.data.write().parent = Weak::new();
        self.set_attached_subtree(false);
    }

    fn set_attached_subtree(&self, attached: bool) {
        self.node.attached.send_replace(attached);
        for child in self.children() {
            child.set_attached_subtree(attached);
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.node.data.read();
        f.debug_struct("Element")
            .field("tag", &self.node.tag)
            .field("id", &data.id)
            .field("classes", &data.classes)
            .field("children", &data.children.len())
            .finish()
    }
}
