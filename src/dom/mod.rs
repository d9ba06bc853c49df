//! An in-memory document tree.
//!
//! [`Element`] is a cheap, reference-counted handle. Two handles are equal when they
//! point at the same node; use [`Element::is_equal_node`] for structural equality.
//! Events dispatched on an element run its listeners, then bubble to its ancestors
//! when the event asks for it.

mod event;
mod selector;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

pub use event::{Event, EventInit};
pub use selector::{Compound, Selector};

use crate::error::DomError;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique element identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Identifies a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A child of an element.
#[derive(Debug, Clone)]
pub enum Node {
    /// An element.
    Element(Element),
    /// A text node.
    Text(String),
}

impl Node {
    /// Returns the element if this node is one.
    #[must_use]
    pub const fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    fn text_content_into(&self, out: &mut String) {
        match self {
            Self::Element(element) => {
                for child in element.children() {
                    child.text_content_into(out);
                }
            }
            Self::Text(text) => out.push_str(text),
        }
    }

    fn is_equal_node(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a.is_equal_node(b),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }

    fn html_into(&self, out: &mut String) {
        match self {
            Self::Element(element) => element.html_into(out),
            Self::Text(text) => escape_into(text, out),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

type Callback = Rc<dyn Fn(&Event)>;

struct Listener {
    id: ListenerId,
    event_type: String,
    callback: Callback,
}

#[derive(Default)]
struct ElementState {
    id: String,
    class_name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
}

struct ElementInner {
    node_id: NodeId,
    tag_name: String,
    state: RefCell<ElementState>,
    parent: RefCell<Weak<ElementInner>>,
    listeners: RefCell<Vec<Listener>>,
    next_listener: Cell<u64>,
}

/// A handle to an element of the in-memory document.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    /// Creates a detached element. The tag name is stored in upper case.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                node_id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
                tag_name: tag.to_ascii_uppercase(),
                state: RefCell::new(ElementState::default()),
                parent: RefCell::new(Weak::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// The process-unique identifier of this element.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.inner.node_id
    }

    /// The upper-case tag name.
    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.inner.tag_name
    }

    /// The `id` attribute, empty when unset.
    #[must_use]
    pub fn id(&self) -> String {
        self.inner.state.borrow().id.clone()
    }

    /// Sets the `id` attribute.
    pub fn set_id(&self, id: &str) {
        id.clone_into(&mut self.inner.state.borrow_mut().id);
    }

    /// The space separated class list.
    #[must_use]
    pub fn class_name(&self) -> String {
        self.inner.state.borrow().class_name.clone()
    }

    /// Replaces the class list.
    pub fn set_class_name(&self, class_name: &str) {
        class_name.clone_into(&mut self.inner.state.borrow_mut().class_name);
    }

    /// Returns `true` if `class` is in the class list.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.inner
            .state
            .borrow()
            .class_name
            .split_whitespace()
            .any(|candidate| candidate == class)
    }

    /// Reads an attribute other than `id` and `class`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.state.borrow().attributes.get(name).cloned()
    }

    /// Sets an attribute other than `id` and `class`.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.inner
            .state
            .borrow_mut()
            .attributes
            .insert(name.to_owned(), value.to_owned());
    }

    /// Removes an attribute.
    pub fn remove_attribute(&self, name: &str) {
        self.inner.state.borrow_mut().attributes.remove(name);
    }

    /// Replaces every attribute other than `id` and `class`.
    pub fn replace_attributes(&self, attributes: BTreeMap<String, String>) {
        self.inner.state.borrow_mut().attributes = attributes;
    }

    /// The child nodes.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.inner.state.borrow().children.clone()
    }

    /// The child elements, skipping text.
    #[must_use]
    pub fn child_elements(&self) -> Vec<Element> {
        self.inner
            .state
            .borrow()
            .children
            .iter()
            .filter_map(Node::as_element)
            .cloned()
            .collect()
    }

    /// The first child element.
    #[must_use]
    pub fn first_element_child(&self) -> Option<Element> {
        self.inner
            .state
            .borrow()
            .children
            .iter()
            .find_map(Node::as_element)
            .cloned()
    }

    /// The parent element, if attached.
    #[must_use]
    pub fn parent_element(&self) -> Option<Element> {
        self.inner.parent.borrow().upgrade().map(|inner| Self { inner })
    }

    /// Appends a child, detaching it from its previous parent first.
    pub fn append_child(&self, child: Node) {
        if let Node::Element(element) = &child {
            element.detach_from_other(self);
            element.set_parent(self);
        }
        self.inner.state.borrow_mut().children.push(child);
    }

    /// Replaces the child list. Elements dropped from the list are detached.
    pub fn set_children(&self, children: Vec<Node>) {
        for child in children.iter().filter_map(Node::as_element) {
            child.detach_from_other(self);
            child.set_parent(self);
        }
        let previous = core::mem::replace(&mut self.inner.state.borrow_mut().children, children);
        for old in previous.iter().filter_map(Node::as_element) {
            if !self.has_child(old) {
                old.clear_parent();
            }
        }
    }

    /// Removes a child element. Returns `false` if it was not a child.
    pub fn remove_child(&self, child: &Self) -> bool {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let before = state.children.len();
            state
                .children
                .retain(|node| node.as_element().is_none_or(|element| element != child));
            state.children.len() != before
        };
        if removed {
            child.clear_parent();
        }
        removed
    }

    /// Removes every child.
    pub fn clear(&self) {
        self.set_children(Vec::new());
    }

    /// The concatenated text of every descendant text node.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        Node::Element(self.clone()).text_content_into(&mut out);
        out
    }

    /// Structural equality: same tag, attributes and equal children.
    #[must_use]
    pub fn is_equal_node(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        if self.tag_name() != other.tag_name() {
            return false;
        }
        let (a, b) = (self.inner.state.borrow(), other.inner.state.borrow());
        a.id == b.id
            && a.class_name == b.class_name
            && a.attributes == b.attributes
            && a.children.len() == b.children.len()
            && a.children
                .iter()
                .zip(b.children.iter())
                .all(|(x, y)| x.is_equal_node(y))
    }

    /// Returns `true` if `selector` matches this element.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::InvalidSelector`] if the selector does not parse.
    pub fn matches(&self, selector: &str) -> Result<bool, DomError> {
        Selector::parse(selector).map(|selector| selector.matches(self))
    }

    /// The first descendant matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::InvalidSelector`] if the selector does not parse.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Self>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_first(&selector))
    }

    /// Every descendant matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::InvalidSelector`] if the selector does not parse.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(&selector))
    }

    /// The first descendant matching a parsed selector.
    #[must_use]
    pub fn select_first(&self, selector: &Selector) -> Option<Self> {
        for child in self.child_elements() {
            if selector.matches(&child) {
                return Some(child);
            }
            if let Some(found) = child.select_first(selector) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant matching a parsed selector.
    #[must_use]
    pub fn select_all(&self, selector: &Selector) -> Vec<Self> {
        let mut found = Vec::new();
        self.collect_matches(selector, &mut found);
        found
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node == *self {
                return true;
            }
            cursor = node.parent_element();
        }
        false
    }

    /// Registers a listener for `event_type`.
    pub fn add_event_listener(&self, event_type: &str, callback: impl Fn(&Event) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push(Listener {
            id,
            event_type: event_type.to_owned(),
            callback: Rc::new(callback),
        });
        id
    }

    /// Unregisters a listener. Unknown ids are ignored.
    pub fn remove_event_listener(&self, id: ListenerId) {
        self.inner.listeners.borrow_mut().retain(|listener| listener.id != id);
    }

    /// The number of listeners registered for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.event_type == event_type)
            .count()
    }

    /// Dispatches `event` with this element as target, bubbling when requested.
    pub fn dispatch_event(&self, mut event: Event) {
        event.set_target(self.clone());
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            event.set_current_target(node.clone());
            node.invoke_listeners(&event);
            if !event.bubbles() || event.is_propagation_stopped() {
                break;
            }
            cursor = node.parent_element();
        }
    }

    /// Dispatches a bubbling `click` event.
    pub fn click(&self) {
        self.dispatch_event(Event::init_event("click", true, true));
    }

    /// Serializes the element and its subtree.
    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.html_into(&mut out);
        out
    }

    /// Serializes the subtree without the element itself.
    #[must_use]
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.html_into(&mut out);
        }
        out
    }

    fn invoke_listeners(&self, event: &Event) {
        let callbacks: Vec<Callback> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.event_type == event.event_type())
            .map(|listener| Rc::clone(&listener.callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    fn collect_matches(&self, selector: &Selector, found: &mut Vec<Self>) {
        for child in self.child_elements() {
            if selector.matches(&child) {
                found.push(child.clone());
            }
            child.collect_matches(selector, found);
        }
    }

    fn has_child(&self, child: &Self) -> bool {
        self.inner
            .state
            .borrow()
            .children
            .iter()
            .any(|node| node.as_element().is_some_and(|element| element == child))
    }

    fn set_parent(&self, parent: &Self) {
        *self.inner.parent.borrow_mut() = Rc::downgrade(&parent.inner);
    }

    fn clear_parent(&self) {
        *self.inner.parent.borrow_mut() = Weak::new();
    }

    fn detach_from_other(&self, new_parent: &Self) {
        if let Some(old) = self.parent_element() {
            if old != *new_parent {
                old.remove_child(self);
            }
        }
    }

    fn html_into(&self, out: &mut String) {
        let tag = self.tag_name().to_ascii_lowercase();
        let state = self.inner.state.borrow();
        let _ = write!(out, "<{tag}");
        if !state.id.is_empty() {
            let _ = write!(out, " id=\"");
            escape_into(&state.id, out);
            out.push('"');
        }
        if !state.class_name.is_empty() {
            let _ = write!(out, " class=\"");
            escape_into(&state.class_name, out);
            out.push('"');
        }
        for (name, value) in &state.attributes {
            let _ = write!(out, " {name}=\"");
            escape_into(value, out);
            out.push('"');
        }
        out.push('>');
        for child in &state.children {
            child.html_into(out);
        }
        let _ = write!(out, "</{tag}>");
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.node_id.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Element")
            .field("node_id", &self.inner.node_id.0)
            .field("tag_name", &self.inner.tag_name)
            .field("id", &state.id)
            .field("class_name", &state.class_name)
            .field("children", &state.children.len())
            .finish()
    }
}
