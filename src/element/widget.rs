//! The lifecycle of one custom element instance: `init`, `update`, `destroy`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rill_core::{Disposable, DisposableSet, Observable, ReplaySubject, StreamError, Subscription};

use crate::dom::Element;
use crate::driver::{DomDriver, DriverContext};
use crate::error::ElementError;
use crate::value::{PropValue, Properties};
use crate::vnode::{VElement, VNode};

use super::events::RootWatcher;
use super::metadata::ElementMetadata;
use super::props::PropertyChannels;
use super::registry::WidgetClass;
use super::sinks;
use super::sources::Sources;

/// Property key under which an element receives its nested children.
pub const CHILDREN_PROP: &str = "children";

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed for a virtual node, not mounted yet.
    Constructed,
    /// Mounted, either by `init` or by taking over a previous instance.
    Mounted,
    /// Torn down; nothing it owns is alive.
    Destroyed,
}

/// One placement of a custom element in a rendered tree.
///
/// A new instance is constructed on every render. The first one for a slot is
/// mounted with [`init`](Self::init); later ones take over the previous instance's
/// resources through [`update`](Self::update).
pub struct CustomElementWidget {
    class: WidgetClass,
    node: VElement,
    properties: Properties,
    explicit_children: bool,
    context: DriverContext,
    disposables: DisposableSet,
    first_root: ReplaySubject<Element>,
    lifecycle: Lifecycle,
}

impl CustomElementWidget {
    pub(crate) fn new(class: WidgetClass, node: &VElement, context: DriverContext) -> Self {
        let mut properties = node.properties().clone();
        let explicit_children = properties.contains_key(CHILDREN_PROP);
        if !explicit_children {
            properties.insert(CHILDREN_PROP, PropValue::Nodes(node.child_nodes().to_vec()));
        }
        if let Some(id) = node.id() {
            if !properties.contains_key("id") {
                properties.insert("id", id);
            }
        }
        if !node.classes().is_empty() && !properties.contains_key("className") {
            properties.insert("className", node.classes().join(" "));
        }
        Self {
            class,
            node: node.clone(),
            properties,
            explicit_children,
            context,
            disposables: DisposableSet::new(),
            first_root: ReplaySubject::latest_only(),
            lifecycle: Lifecycle::Constructed,
        }
    }

    /// The lower-case tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        self.class.tag()
    }

    /// The reconciliation key.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.node.key_str()
    }

    /// The properties pushed on mount and update, `children` included.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The set owning every resource of the mounted instance.
    #[must_use]
    pub const fn disposables(&self) -> &DisposableSet {
        &self.disposables
    }

    /// Resolves with the first root element the instance rendered.
    #[must_use]
    pub fn first_root(&self) -> Observable<Element> {
        self.first_root.as_observable()
    }

    /// Returns `true` if `other` renders the same slot: same tag and key.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.node.same_identity(&other.node)
    }

    /// Mounts the instance and returns its container element.
    ///
    /// Runs the definition against a private driver rendering into the container,
    /// then pushes the initial properties.
    ///
    /// # Errors
    ///
    /// Fails with an [`ElementError`] when the node carries an explicit `children`
    /// property, when the definition fails or breaks its output contract, or when
    /// the first render fails. Everything acquired so far is released first.
    pub fn init(&mut self) -> Result<Element, StreamError> {
        if self.lifecycle != Lifecycle::Constructed {
            return Err(ElementError::Metadata(format!(
                "Custom element <{}> was already mounted.",
                self.tag()
            ))
            .into());
        }
        self.check_children()?;
        self.warn_missing_key();

        let container = self.create_container();
        tracing::debug!(tag = self.tag(), key = ?self.key(), "mounting custom element");
        if let Err(error) = self.mount(&container) {
            self.disposables.dispose();
            self.context.metadata.remove(container.node_id());
            self.lifecycle = Lifecycle::Destroyed;
            return Err(error);
        }
        self.lifecycle = Lifecycle::Mounted;
        Ok(container)
    }

    /// Pushes this instance's properties into the mounted container.
    ///
    /// With `previous`, this instance takes over the previous one's disposables and
    /// first-root slot before pushing.
    ///
    /// # Errors
    ///
    /// Fails with [`ElementError::ContractViolation`] for an explicit `children`
    /// property and with [`ElementError::Metadata`] when `container` has no
    /// metadata for this tag.
    pub fn update(&mut self, previous: Option<&Self>, container: &Element) -> Result<(), StreamError> {
        if let Some(previous) = previous {
            self.first_root.complete();
            self.disposables = previous.disposables.clone();
            self.first_root = previous.first_root.clone();
            self.lifecycle = previous.lifecycle;
        }
        self.check_children()?;
        self.push_properties(container, "update")?;
        Ok(())
    }

    /// Releases everything the instance owns, nested instances included.
    ///
    /// Calling it again has no effect.
    ///
    /// # Errors
    ///
    /// Fails with [`ElementError::Metadata`] when `container` has no metadata for
    /// this tag. The owned resources are released regardless.
    pub fn destroy(&mut self, container: &Element) -> Result<(), ElementError> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Ok(());
        }
        tracing::debug!(tag = self.tag(), key = ?self.key(), "destroying custom element");
        let lookup = self
            .context
            .metadata
            .lookup(container.node_id(), self.tag(), "destroy");
        if let Ok(metadata) = &lookup {
            for channel in metadata.props().channels() {
                self.disposables.add(channel);
            }
            self.disposables.add(metadata.props().clone());
            if let Some(bridge) = metadata.watcher().current_subscription() {
                self.disposables.add(bridge);
            }
        }
        self.disposables.dispose();
        self.first_root.complete();
        self.lifecycle = Lifecycle::Destroyed;
        lookup.map(|_| ())
    }

    fn mount(&self, container: &Element) -> Result<(), StreamError> {
        let config = self.context.registry.config();
        let driver_name = config.dom_driver_name();

        let proxy = ReplaySubject::<VNode>::latest_only();
        let dom = DomDriver::nested(
            container.clone(),
            self.context.registry.clone(),
            self.context.metadata.clone(),
        )
        .run(&proxy.as_observable());
        self.disposables.add(dom.clone());
        self.disposables.add(proxy.clone());

        let props = PropertyChannels::new();
        let sources = Sources::new(dom.clone(), props.clone(), driver_name);
        let raw = (self.class.definition())(&sources)?;
        let output = sinks::validate(raw, driver_name)?;

        let forward = {
            let (next, error, complete) = (proxy.clone(), proxy.clone(), proxy);
            output.tree.subscribe_all(
                move |tree| next.next(tree),
                move |e| error.error(e),
                move || complete.complete(),
            )
        };
        self.disposables.add(forward);

        let root = dom.root();
        let watcher = RootWatcher::new(output.events.clone());
        watcher.bind(container);
        self.context.metadata.insert(
            container.node_id(),
            ElementMetadata::new(
                self.tag().to_owned(),
                props,
                root.clone(),
                output.events,
                watcher.clone(),
            ),
        );
        self.disposables.add(Subscription::from_fn({
            let table = self.context.metadata.clone();
            let id = container.node_id();
            move || {
                table.remove(id);
            }
        }));

        let first_root = self.first_root.clone();
        self.disposables.add(root.first().subscribe(move |element| {
            first_root.next(element);
            first_root.complete();
        }));

        self.disposables.add(
            root.distinct_until_changed_by(Element::is_equal_node)
                .subscribe(move |element| watcher.bind(&element)),
        );

        let initializing = Rc::new(Cell::new(true));
        let pending: Rc<RefCell<Option<StreamError>>> = Rc::new(RefCell::new(None));
        self.disposables.add(root.subscribe_error({
            let initializing = Rc::clone(&initializing);
            let pending = Rc::clone(&pending);
            let fail = Rc::clone(&self.context.fail);
            move |error| {
                if initializing.get() {
                    pending.borrow_mut().get_or_insert(error);
                } else {
                    fail(error);
                }
            }
        }));

        self.push_properties(container, "init")?;
        initializing.set(false);
        let failure = pending.borrow_mut().take();
        failure.map_or(Ok(()), Err)
    }

    fn push_properties(&self, container: &Element, hook: &str) -> Result<(), ElementError> {
        let metadata = self
            .context
            .metadata
            .lookup(container.node_id(), self.tag(), hook)?;
        tracing::trace!(tag = self.tag(), properties = self.properties.len(), "pushing properties");
        metadata.props().push(&self.properties);
        Ok(())
    }

    fn check_children(&self) -> Result<(), ElementError> {
        if self.explicit_children {
            return Err(ElementError::children_property());
        }
        Ok(())
    }

    fn warn_missing_key(&self) {
        if self.key().is_none() && self.context.registry.config().warns_on_missing_key() {
            tracing::warn!(
                "Missing `key` property for custom element {}",
                self.tag().to_ascii_uppercase()
            );
        }
    }

    fn create_container(&self) -> Element {
        let container = Element::new("div");
        if let Some(id) = self.node.resolved_id() {
            container.set_id(&id);
        }
        let mut classes = self.node.resolved_classes();
        classes.push(format!(
            "{}{}",
            self.context.registry.config().class_prefix(),
            self.tag().to_ascii_uppercase()
        ));
        container.set_class_name(&classes.join(" "));
        container
    }
}

impl fmt::Debug for CustomElementWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomElementWidget")
            .field("tag", &self.tag())
            .field("key", &self.key())
            .field("lifecycle", &self.lifecycle)
            .field("disposables", &self.disposables)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rill_core::Subject;

    use super::*;
    use crate::driver::DriverContext;
    use crate::element::{MetadataTable, Registry, Sinks};
    use crate::vnode::h;

    fn context(registry: &Registry) -> DriverContext {
        DriverContext::detached(registry.clone(), MetadataTable::new())
    }

    fn registry_with(tag: &str, tree: Observable<VNode>) -> Registry {
        Registry::builder()
            .define(tag, move |_| Ok(Sinks::dom(tree.clone())))
            .build()
            .expect("valid registry")
    }

    #[test]
    fn init_renders_into_a_prefixed_container() {
        let registry = registry_with("my-element", Observable::of(h("h3.myelementclass").into()));
        let class = registry.get("my-element").cloned().expect("registered");
        let mut widget = class.construct(&h("my-element#me.extra").key(1), &context(&registry));

        let container = widget.init().expect("mounts");
        assert_eq!(container.id(), "me");
        assert_eq!(container.class_name(), "extra customElement-MY-ELEMENT");
        assert_eq!(container.inner_html(), "<h3 class=\"myelementclass\"></h3>");
        assert_eq!(widget.lifecycle(), Lifecycle::Mounted);
    }

    #[test]
    fn children_become_a_property() {
        let widget = CustomElementWidget::new(
            WidgetClass::new("x-list", |_| Ok(Sinks::dom(Observable::never()))).expect("valid tag"),
            &h("x-list").child(h("li")),
            context(&Registry::empty()),
        );
        let children = widget.properties().get(CHILDREN_PROP).and_then(PropValue::as_nodes);
        assert_eq!(children.map(<[_]>::len), Some(1));
    }

    #[test]
    fn explicit_children_fail_init() {
        let registry = registry_with("x-list", Observable::never());
        let class = registry.get("x-list").cloned().expect("registered");
        let mut widget = class.construct(
            &h("x-list").key(1).prop(CHILDREN_PROP, "nope"),
            &context(&registry),
        );
        let error = widget.init().expect_err("children are reserved");
        assert!(matches!(
            error.downcast_ref::<ElementError>(),
            Some(ElementError::ContractViolation(_))
        ));
    }

    #[test]
    fn failed_definition_releases_everything() {
        let registry = Registry::builder()
            .define("x-bad", |sources: &Sources| {
                sources.props().get(None)?;
                Ok(Sinks::dom(Observable::never()))
            })
            .build()
            .expect("valid registry");
        let ctx = context(&registry);
        let class = registry.get("x-bad").cloned().expect("registered");
        let mut widget = class.construct(&h("x-bad").key(1), &ctx);

        let error = widget.init().expect_err("definition fails");
        assert!(matches!(
            error.downcast_ref::<ElementError>(),
            Some(ElementError::Argument(_))
        ));
        assert!(widget.disposables().is_disposed());
        assert!(ctx.metadata.is_empty());
        assert_eq!(widget.lifecycle(), Lifecycle::Destroyed);
    }

    #[test]
    fn update_takes_over_and_destroy_releases() {
        let trees = Subject::new();
        let registry = registry_with("x-live", trees.as_observable());
        let ctx = context(&registry);
        let class = registry.get("x-live").cloned().expect("registered");

        let mut first = class.construct(&h("x-live").key(1).prop("n", 1), &ctx);
        let container = first.init().expect("mounts");
        trees.next(h("p").text("a").into());
        assert_eq!(trees.observer_count(), 1);

        let mut second = class.construct(&h("x-live").key(1).prop("n", 2), &ctx);
        second.update(Some(&first), &container).expect("updates");
        assert!(second.disposables().same_set(first.disposables()));
        assert_eq!(second.lifecycle(), Lifecycle::Mounted);

        second.destroy(&container).expect("metadata present");
        assert_eq!(trees.observer_count(), 0);
        assert!(ctx.metadata.is_empty());
        assert_eq!(second.lifecycle(), Lifecycle::Destroyed);
        assert!(second.destroy(&container).is_ok());
    }

    #[test]
    fn update_without_metadata_fails() {
        let registry = registry_with("x-live", Observable::never());
        let class = registry.get("x-live").cloned().expect("registered");
        let mut widget = class.construct(&h("x-live").key(1), &context(&registry));
        let error = widget.update(None, &Element::new("div")).expect_err("not mounted");
        assert!(matches!(
            error.downcast_ref::<ElementError>(),
            Some(ElementError::Metadata(_))
        ));
    }
}
