//! Renders a stream of virtual trees into a container element.
//!
//! Every tree is patched against the previously mounted one. Elements keep their
//! identity when tag and key match; custom elements found in the registry are
//! constructed, initialized, updated and destroyed through their widget lifecycle.
//! Rendering failures end the driver: its `:root` stream errors and later trees are
//! ignored.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use rill_core::{Disposable, Observable, ReplaySubject, StreamError, Subscriber, Subscription};

use crate::dom::{Element, Event, Node, Selector};
use crate::element::{CustomElementWidget, MetadataTable, Registry, WidgetClass};
use crate::vnode::{VElement, VNode};

pub(crate) type FailureSink = Rc<dyn Fn(StreamError)>;

/// What widgets need from the driver mounting them.
#[derive(Clone)]
pub(crate) struct DriverContext {
    pub(crate) registry: Registry,
    pub(crate) metadata: MetadataTable,
    pub(crate) fail: FailureSink,
}

impl DriverContext {
    #[cfg(test)]
    pub(crate) fn detached(registry: Registry, metadata: MetadataTable) -> Self {
        Self {
            registry,
            metadata,
            fail: Rc::new(|error| tracing::error!(%error, "custom element failed")),
        }
    }
}

/// A driver bound to a container, ready to run.
#[derive(Debug)]
pub struct DomDriver {
    container: Element,
    registry: Registry,
    metadata: MetadataTable,
}

impl DomDriver {
    /// Creates a driver rendering into `container`, resolving custom elements
    /// through `registry`.
    #[must_use]
    pub fn new(container: Element, registry: Registry) -> Self {
        Self {
            container,
            registry,
            metadata: MetadataTable::new(),
        }
    }

    /// A driver sharing the metadata table of the driver it is nested in.
    pub(crate) const fn nested(container: Element, registry: Registry, metadata: MetadataTable) -> Self {
        Self {
            container,
            registry,
            metadata,
        }
    }

    /// Starts rendering `trees` and returns the source observing the result.
    #[must_use]
    pub fn run(self, trees: &Observable<VNode>) -> DomSource {
        let engine = Engine::new(self);
        let input = {
            let (next, error) = (Rc::clone(&engine), Rc::clone(&engine));
            trees.subscribe_all(
                move |tree| next.schedule(tree),
                move |e| error.fail(e),
                || {},
            )
        };
        engine.input.add(input);
        DomSource { engine }
    }
}

enum Mounted {
    Text(String),
    Element {
        element: Element,
        tag: String,
        key: Option<String>,
        children: Vec<Mounted>,
    },
    Widget {
        container: Element,
        widget: CustomElementWidget,
    },
}

impl Mounted {
    fn node(&self) -> Node {
        match self {
            Self::Text(text) => Node::Text(text.clone()),
            Self::Element { element, .. } => Node::Element(element.clone()),
            Self::Widget { container, .. } => Node::Element(container.clone()),
        }
    }

    fn element(&self) -> Option<&Element> {
        match self {
            Self::Text(_) => None,
            Self::Element { element, .. } => Some(element),
            Self::Widget { container, .. } => Some(container),
        }
    }

    fn identity(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::Text(_) => None,
            Self::Element { tag, key, .. } => Some((tag.as_str(), key.as_deref())),
            Self::Widget { widget, .. } => Some((widget.tag(), widget.key())),
        }
    }

    fn accepts(&self, vnode: &VNode) -> bool {
        match (self, vnode) {
            (Self::Text(_), VNode::Text(_)) => true,
            (_, VNode::Element(element)) => self
                .identity()
                .is_some_and(|(tag, key)| tag == element.tag() && key == element.key_str()),
            _ => false,
        }
    }
}

fn destroy(mounted: Mounted) {
    match mounted {
        Mounted::Text(_) => {}
        Mounted::Element { children, .. } => children.into_iter().for_each(destroy),
        Mounted::Widget {
            container,
            mut widget,
        } => {
            if let Err(error) = widget.destroy(&container) {
                tracing::error!(%error, tag = widget.tag(), "custom element destroyed without metadata");
            }
        }
    }
}

fn apply_attributes(element: &Element, node: &VElement) {
    element.set_id(&node.resolved_id().unwrap_or_default());
    element.set_class_name(&node.resolved_classes().join(" "));
    let attributes: BTreeMap<String, String> = node
        .properties()
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), "id" | "className"))
        .filter_map(|(name, value)| value.to_attribute().map(|value| (name.clone(), value)))
        .collect();
    element.replace_attributes(attributes);
}

struct Engine {
    container: Element,
    context: DriverContext,
    mounted: RefCell<Option<Mounted>>,
    pending: RefCell<Option<VNode>>,
    rendering: Cell<bool>,
    failed: Cell<bool>,
    disposed: Cell<bool>,
    root: ReplaySubject<Element>,
    input: Subscription,
}

impl Engine {
    fn new(driver: DomDriver) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let this = this.clone();
            let fail: FailureSink = Rc::new(move |error| {
                if let Some(engine) = this.upgrade() {
                    engine.fail(error);
                }
            });
            Self {
                container: driver.container,
                context: DriverContext {
                    registry: driver.registry,
                    metadata: driver.metadata,
                    fail,
                },
                mounted: RefCell::new(None),
                pending: RefCell::new(None),
                rendering: Cell::new(false),
                failed: Cell::new(false),
                disposed: Cell::new(false),
                root: ReplaySubject::latest_only(),
                input: Subscription::new(),
            }
        })
    }

    fn is_stopped(&self) -> bool {
        self.failed.get() || self.disposed.get()
    }

    /// Renders `tree`, or queues it when a render is already running on this stack.
    fn schedule(&self, tree: VNode) {
        if self.is_stopped() {
            return;
        }
        *self.pending.borrow_mut() = Some(tree);
        if self.rendering.replace(true) {
            return;
        }
        loop {
            let next = self.pending.borrow_mut().take();
            let Some(tree) = next else {
                break;
            };
            if self.is_stopped() {
                break;
            }
            let previous = self.mounted.borrow_mut().take();
            match self.patch(previous, &tree) {
                Ok(mounted) => self.commit(mounted),
                Err(error) => {
                    self.fail(error);
                    break;
                }
            }
        }
        self.rendering.set(false);
    }

    fn commit(&self, mounted: Mounted) {
        if self.disposed.get() {
            destroy(mounted);
            return;
        }
        self.container.set_children(vec![mounted.node()]);
        let root = mounted
            .element()
            .cloned()
            .unwrap_or_else(|| self.container.clone());
        *self.mounted.borrow_mut() = Some(mounted);
        if !self.failed.get() {
            tracing::trace!(root = root.tag_name(), "rendered");
            self.root.next(root);
        }
    }

    fn fail(&self, error: StreamError) {
        if self.failed.replace(true) {
            return;
        }
        tracing::debug!(%error, "DOM driver failed");
        self.input.unsubscribe();
        self.root.error(error);
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.input.unsubscribe();
        let mounted = self.mounted.borrow_mut().take();
        if let Some(mounted) = mounted {
            destroy(mounted);
        }
        self.root.dispose();
    }

    fn patch(&self, previous: Option<Mounted>, vnode: &VNode) -> Result<Mounted, StreamError> {
        match vnode {
            VNode::Text(text) => {
                if let Some(previous) = previous {
                    destroy(previous);
                }
                Ok(Mounted::Text(text.clone()))
            }
            VNode::Element(node) => match self.context.registry.get(node.tag()) {
                Some(class) => self.patch_widget(previous, class, node),
                None => self.patch_element(previous, node),
            },
        }
    }

    fn patch_widget(
        &self,
        previous: Option<Mounted>,
        class: &WidgetClass,
        node: &VElement,
    ) -> Result<Mounted, StreamError> {
        let mut widget = class.construct(node, &self.context);
        match previous {
            Some(Mounted::Widget {
                container,
                widget: old,
            }) if old.same_identity(&widget) => {
                if let Err(error) = widget.update(Some(&old), &container) {
                    if let Err(destroy_error) = widget.destroy(&container) {
                        tracing::error!(%destroy_error, "custom element destroyed without metadata");
                    }
                    return Err(error);
                }
                Ok(Mounted::Widget { container, widget })
            }
            other => {
                if let Some(other) = other {
                    destroy(other);
                }
                let container = widget.init()?;
                Ok(Mounted::Widget { container, widget })
            }
        }
    }

    fn patch_element(&self, previous: Option<Mounted>, node: &VElement) -> Result<Mounted, StreamError> {
        let (element, old_children) = match previous {
            Some(Mounted::Element {
                element,
                tag,
                key,
                children,
            }) if tag == node.tag() && key.as_deref() == node.key_str() => (element, children),
            other => {
                if let Some(other) = other {
                    destroy(other);
                }
                (Element::new(node.tag()), Vec::new())
            }
        };
        apply_attributes(&element, node);
        let children = self.reconcile(old_children, node.child_nodes())?;
        element.set_children(children.iter().map(Mounted::node).collect());
        Ok(Mounted::Element {
            element,
            tag: node.tag().to_owned(),
            key: node.key_str().map(str::to_owned),
            children,
        })
    }

    /// Matches keyed children by tag and key anywhere in the old list, unkeyed
    /// children by position.
    fn reconcile(&self, old: Vec<Mounted>, nodes: &[VNode]) -> Result<Vec<Mounted>, StreamError> {
        let mut old: Vec<Option<Mounted>> = old.into_iter().map(Some).collect();
        let mut built = Vec::with_capacity(nodes.len());
        for (index, vnode) in nodes.iter().enumerate() {
            let keyed = vnode.as_element().and_then(VElement::key_str).is_some();
            let slot = if keyed {
                old.iter()
                    .position(|candidate| candidate.as_ref().is_some_and(|m| m.accepts(vnode)))
            } else {
                old.get(index)
                    .and_then(Option::as_ref)
                    .filter(|m| m.accepts(vnode))
                    .map(|_| index)
            };
            let previous = slot.and_then(|slot| old[slot].take());
            match self.patch(previous, vnode) {
                Ok(mounted) => built.push(mounted),
                Err(error) => {
                    built
                        .into_iter()
                        .chain(old.into_iter().flatten())
                        .for_each(destroy);
                    return Err(error);
                }
            }
        }
        old.into_iter().flatten().for_each(destroy);
        Ok(built)
    }
}

/// Observes what a [`DomDriver`] renders.
#[derive(Clone)]
pub struct DomSource {
    engine: Rc<Engine>,
}

impl DomSource {
    /// The container the driver renders into.
    #[must_use]
    pub fn container(&self) -> &Element {
        &self.engine.container
    }

    /// The top element of every render, replaying the latest one.
    ///
    /// Errors with the failure that ended the driver.
    #[must_use]
    pub fn root(&self) -> Observable<Element> {
        self.engine.root.as_observable()
    }

    /// The first element matching `selector` after every render, the top element
    /// included. `:root` is the same as [`DomSource::root`].
    #[must_use]
    pub fn get(&self, selector: &str) -> Observable<Element> {
        match Selector::parse(selector) {
            Ok(Selector::Root) => self.root(),
            Ok(selector) => self.root().filter_map(move |root| {
                if selector.matches(&root) {
                    Some(root)
                } else {
                    root.select_first(&selector)
                }
            }),
            Err(error) => Observable::throw(error.into()),
        }
    }

    /// Every element matching `selector` after every render, the top element
    /// included.
    #[must_use]
    pub fn get_all(&self, selector: &str) -> Observable<Vec<Element>> {
        match Selector::parse(selector) {
            Ok(Selector::Root) => self.root().map(|root| vec![root]),
            Ok(selector) => self.root().map(move |root| {
                let mut found = Vec::new();
                if selector.matches(&root) {
                    found.push(root.clone());
                }
                found.extend(root.select_all(&selector));
                found
            }),
            Err(error) => Observable::throw(error.into()),
        }
    }

    /// Events of `event_type` raised inside the container on an element matching
    /// `selector`, or on a descendant of one.
    ///
    /// Listening is delegated to the container, so it survives re-renders.
    #[must_use]
    pub fn events(&self, selector: &str, event_type: &str) -> Observable<Event> {
        let selector = match Selector::parse(selector) {
            Ok(selector) => Rc::new(selector),
            Err(error) => return Observable::throw(error.into()),
        };
        let container = self.engine.container.clone();
        let event_type = event_type.to_owned();
        Observable::new(move |subscriber: Subscriber<Event>| {
            let listener = {
                let scope = container.clone();
                let selector = Rc::clone(&selector);
                let subscriber = subscriber.clone();
                container.add_event_listener(&event_type, move |event| {
                    if delegates_to(&scope, &selector, event) {
                        subscriber.next(event.clone());
                    }
                })
            };
            let owner = container.clone();
            subscriber.add_teardown(move || owner.remove_event_listener(listener));
        })
    }
}

fn delegates_to(scope: &Element, selector: &Selector, event: &Event) -> bool {
    let mut cursor = event.target().cloned();
    while let Some(node) = cursor {
        if node == *scope {
            return false;
        }
        let matched = match selector {
            Selector::Root => node.parent_element().as_ref() == Some(scope),
            path @ Selector::Path(_) => path.matches(&node),
        };
        if matched {
            return true;
        }
        cursor = node.parent_element();
    }
    false
}

impl Disposable for DomSource {
    fn dispose(&self) {
        self.engine.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.engine.disposed.get()
    }
}

impl fmt::Debug for DomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomSource")
            .field("container", &self.engine.container)
            .field("failed", &self.engine.failed.get())
            .field("disposed", &self.engine.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rill_core::Subject;

    use super::*;
    use crate::vnode::h;

    fn collect<T: Clone + 'static>(source: &Observable<T>) -> Rc<RefCell<Vec<T>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = source.subscribe({
            let seen = Rc::clone(&seen);
            move |value| seen.borrow_mut().push(value)
        });
        seen
    }

    fn run(trees: &Subject<VNode>) -> (Element, DomSource) {
        let container = Element::new("div");
        let source = DomDriver::new(container.clone(), Registry::empty()).run(&trees.as_observable());
        (container, source)
    }

    #[test]
    fn renders_trees_into_the_container() {
        let trees = Subject::new();
        let (container, source) = run(&trees);
        let roots = collect(&source.root());

        trees.next(h("div.toplevel").child(h("h3#t").prop("title", "x").text("Hello")).into());
        assert_eq!(
            container.inner_html(),
            "<div class=\"toplevel\"><h3 id=\"t\" title=\"x\">Hello</h3></div>"
        );
        assert_eq!(roots.borrow().len(), 1);
        assert_eq!(roots.borrow()[0].class_name(), "toplevel");
    }

    #[test]
    fn matching_elements_keep_identity() {
        let trees = Subject::new();
        let (_, source) = run(&trees);
        let roots = collect(&source.root());

        trees.next(h("ul").child(h("li").key("a").text("1")).child(h("li").key("b")).into());
        let first_b = source_element(&roots, "li", 1);
        trees.next(h("ul").child(h("li").key("b")).child(h("li").key("a").text("2")).into());
        let moved_b = source_element(&roots, "li", 0);

        assert_eq!(first_b, moved_b);
        let root = roots.borrow()[1].clone();
        assert_eq!(roots.borrow()[0], root);
        assert_eq!(root.text_content(), "2");
    }

    fn source_element(roots: &Rc<RefCell<Vec<Element>>>, selector: &str, index: usize) -> Element {
        let root = roots.borrow().last().cloned().expect("rendered");
        root.query_selector_all(selector).expect("valid selector")[index].clone()
    }

    #[test]
    fn changed_tag_replaces_element() {
        let trees = Subject::new();
        let (_, source) = run(&trees);
        let roots = collect(&source.root());
        trees.next(h("h3").into());
        trees.next(h("button").into());
        let roots = roots.borrow();
        assert_ne!(roots[0], roots[1]);
        assert_eq!(roots[1].tag_name(), "BUTTON");
        assert_eq!(roots[0].parent_element(), None);
    }

    #[test]
    fn get_matches_the_top_element_and_descendants() {
        let trees = Subject::new();
        let (_, source) = run(&trees);
        let top = collect(&source.get(".toplevel"));
        let items = collect(&source.get_all("li"));
        trees.next(h("ul.toplevel").child(h("li")).child(h("li")).into());
        assert_eq!(top.borrow().len(), 1);
        assert_eq!(items.borrow()[0].len(), 2);
    }

    #[test]
    fn invalid_selector_errors_the_stream() {
        let trees = Subject::new();
        let (_, source) = run(&trees);
        let failed = Rc::new(Cell::new(false));
        let _ = source.get("a>b").subscribe_error({
            let failed = Rc::clone(&failed);
            move |_| failed.set(true)
        });
        assert!(failed.get());
    }

    #[test]
    fn events_are_delegated_by_selector() {
        let trees = Subject::new();
        let (_, source) = run(&trees);
        let roots = collect(&source.root());
        let clicks = collect(&source.events(".btn", "click"));
        trees.next(h("div").child(h("button.btn").text("go")).child(h("span")).into());

        let root = roots.borrow()[0].clone();
        let button = root.query_selector(".btn").ok().flatten().expect("rendered");
        let span = root.query_selector("span").ok().flatten().expect("rendered");
        button.click();
        span.click();
        assert_eq!(clicks.borrow().len(), 1);
    }

    #[test]
    fn dispose_stops_rendering() {
        let trees = Subject::new();
        let (container, source) = run(&trees);
        trees.next(h("p").into());
        source.dispose();
        trees.next(h("h1").into());
        assert_eq!(container.inner_html(), "<p></p>");
        assert_eq!(trees.observer_count(), 0);
        assert!(source.is_disposed());
    }

    #[test]
    fn tree_errors_end_the_driver() {
        let trees = Subject::new();
        let (_, source) = run(&trees);
        let failed = Rc::new(Cell::new(false));
        let _ = source.root().subscribe_error({
            let failed = Rc::clone(&failed);
            move |_| failed.set(true)
        });
        trees.error(StreamError::msg("broken"));
        assert!(failed.get());
    }

    #[test]
    fn text_root_reports_the_container() {
        let trees = Subject::new();
        let (container, source) = run(&trees);
        let roots = collect(&source.root());
        trees.next(VNode::text("plain"));
        assert_eq!(roots.borrow()[0], container);
        assert_eq!(container.text_content(), "plain");
    }
}
