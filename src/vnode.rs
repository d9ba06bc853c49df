//! Virtual trees: the immutable descriptions a definition renders.
//!
//! Trees are built with the [`h`] helper, which takes a `tag#id.class` selector:
//!
//! ```
//! use rill::vnode::{h, VNode};
//!
//! let tree: VNode = h("div.toplevel")
//!     .child(h("my-element").key(1).prop("color", "#FF0000"))
//!     .into();
//! assert_eq!(tree.as_element().map(|e| e.child_nodes().len()), Some(1));
//! ```

use core::fmt;

use crate::value::{PropValue, Properties};

/// A node of a virtual tree.
#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    /// An element, native or custom.
    Element(VElement),
    /// A text node.
    Text(String),
}

impl VNode {
    /// Creates a text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns the element if this node is one.
    #[must_use]
    pub const fn as_element(&self) -> Option<&VElement> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A virtual element.
#[derive(Debug, Clone, PartialEq)]
pub struct VElement {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    key: Option<String>,
    properties: Properties,
    children: Vec<VNode>,
}

/// Starts a virtual element from a `tag#id.class1.class2` selector.
///
/// A selector without a tag, such as `.item`, yields a `div`. Tags are
/// case-insensitive and stored in lower case.
#[must_use]
pub fn h(selector: &str) -> VElement {
    let mut tag = String::new();
    let mut id = None;
    let mut classes = Vec::new();

    let mut rest = selector;
    let tag_end = rest.find(['#', '.']).unwrap_or(rest.len());
    tag.push_str(&rest[..tag_end]);
    rest = &rest[tag_end..];

    while let Some(marker) = rest.chars().next() {
        let body = &rest[1..];
        let end = body.find(['#', '.']).unwrap_or(body.len());
        let name = &body[..end];
        if !name.is_empty() {
            if marker == '#' {
                id = Some(name.to_owned());
            } else {
                classes.push(name.to_owned());
            }
        }
        rest = &body[end..];
    }

    if tag.is_empty() {
        tag.push_str("div");
    }

    VElement {
        tag: tag.to_ascii_lowercase(),
        id,
        classes,
        key: None,
        properties: Properties::new(),
        children: Vec::new(),
    }
}

impl VElement {
    /// Sets the reconciliation key.
    #[must_use]
    pub fn key(mut self, key: impl fmt::Display) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Sets a property.
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// Merges a whole property record.
    #[must_use]
    pub fn props(mut self, properties: Properties) -> Self {
        for (name, value) in properties.iter() {
            self.properties.insert(name.clone(), value.clone());
        }
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Appends a text child.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(VNode::Text(text.into()))
    }

    /// The lower-case tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The id given in the selector.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The classes given in the selector.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// The reconciliation key.
    #[must_use]
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The property record.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The child nodes.
    #[must_use]
    pub fn child_nodes(&self) -> &[VNode] {
        &self.children
    }

    /// The rendered id: the selector id, else the `id` property.
    #[must_use]
    pub fn resolved_id(&self) -> Option<String> {
        self.id.clone().or_else(|| {
            self.properties
                .get("id")
                .and_then(PropValue::as_str)
                .map(str::to_owned)
        })
    }

    /// The rendered classes: selector classes followed by the `className` property.
    #[must_use]
    pub fn resolved_classes(&self) -> Vec<String> {
        let mut classes = self.classes.clone();
        if let Some(extra) = self.properties.get("className").and_then(PropValue::as_str) {
            classes.extend(extra.split_whitespace().map(str::to_owned));
        }
        classes
    }

    /// Returns `true` if both elements describe the same reconciliation slot.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.tag == other.tag && self.key == other.key
    }
}
