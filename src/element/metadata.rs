//! Per-container lifecycle metadata, keyed by the container's node id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use rill_core::Observable;

use crate::dom::{Element, NodeId};
use crate::error::ElementError;

use super::events::RootWatcher;
use super::props::PropertyChannels;
use super::sinks::EventStreams;

/// What `update` and `destroy` need to reach a mounted instance's state.
pub struct ElementMetadata {
    tag: String,
    props: PropertyChannels,
    root: Observable<Element>,
    events: EventStreams,
    watcher: RootWatcher,
}

impl ElementMetadata {
    pub(crate) const fn new(
        tag: String,
        props: PropertyChannels,
        root: Observable<Element>,
        events: EventStreams,
        watcher: RootWatcher,
    ) -> Self {
        Self {
            tag,
            props,
            root,
            events,
            watcher,
        }
    }

    /// The tag of the element owning the container.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The instance's property channels.
    #[must_use]
    pub const fn props(&self) -> &PropertyChannels {
        &self.props
    }

    /// The instance's rendered root stream.
    #[must_use]
    pub const fn root(&self) -> &Observable<Element> {
        &self.root
    }

    /// The instance's custom event streams.
    #[must_use]
    pub const fn events(&self) -> &EventStreams {
        &self.events
    }

    /// The event bridge binding of the instance.
    #[must_use]
    pub const fn watcher(&self) -> &RootWatcher {
        &self.watcher
    }
}

impl fmt::Debug for ElementMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementMetadata")
            .field("tag", &self.tag)
            .field("props", &self.props)
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

/// The side table shared by a driver and every driver nested in it.
#[derive(Clone, Default)]
pub struct MetadataTable {
    entries: Rc<RefCell<HashMap<NodeId, Rc<ElementMetadata>>>>,
}

impl MetadataTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, container: NodeId, metadata: ElementMetadata) {
        self.entries.borrow_mut().insert(container, Rc::new(metadata));
    }

    pub(crate) fn remove(&self, container: NodeId) -> Option<Rc<ElementMetadata>> {
        self.entries.borrow_mut().remove(&container)
    }

    /// Returns the entry of a container.
    #[must_use]
    pub fn get(&self, container: NodeId) -> Option<Rc<ElementMetadata>> {
        self.entries.borrow().get(&container).cloned()
    }

    /// Returns the entry of a container, checking it belongs to `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Metadata`] when there is no entry, or when the entry
    /// was recorded by an element of another tag.
    pub fn lookup(&self, container: NodeId, tag: &str, hook: &str) -> Result<Rc<ElementMetadata>, ElementError> {
        let metadata = self.get(container).ok_or_else(|| ElementError::missing_metadata(hook))?;
        if metadata.tag() != tag {
            return Err(ElementError::Metadata(format!(
                "Custom element metadata on DOM element belongs to <{}>, not <{tag}>, when calling {hook}().",
                metadata.tag()
            )));
        }
        Ok(metadata)
    }

    /// The number of mounted instances tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for MetadataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataTable").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(tag: &str) -> ElementMetadata {
        ElementMetadata::new(
            tag.to_owned(),
            PropertyChannels::new(),
            Observable::never(),
            EventStreams::new(),
            RootWatcher::new(EventStreams::new()),
        )
    }

    #[test]
    fn lookup_checks_presence_and_tag() {
        let table = MetadataTable::new();
        let container = Element::new("div");
        assert!(matches!(
            table.lookup(container.node_id(), "my-element", "update"),
            Err(ElementError::Metadata(message)) if message.contains("Missing custom element metadata")
        ));

        table.insert(container.node_id(), metadata("my-element"));
        assert!(table.lookup(container.node_id(), "my-element", "update").is_ok());
        assert!(matches!(
            table.lookup(container.node_id(), "other-element", "destroy"),
            Err(ElementError::Metadata(message)) if message.contains("belongs to <my-element>")
        ));
    }

    #[test]
    fn clones_share_entries() {
        let table = MetadataTable::new();
        let shared = table.clone();
        let container = Element::new("div");
        table.insert(container.node_id(), metadata("x-a"));
        assert_eq!(shared.len(), 1);
        assert!(shared.remove(container.node_id()).is_some());
        assert!(table.is_empty());
    }
}
