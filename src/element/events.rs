//! Re-dispatches a definition's custom events on its rendered root element.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rill_core::{Disposable, DisposableSet};

use crate::dom::{Element, Event, EventInit};
use crate::value::PropValue;

use super::sinks::EventStreams;

/// Builds the callback dispatching `event_name` on `element`.
///
/// The event bubbles and carries the emitted value as its detail. When the native
/// constructor rejects the event type the legacy `init_event` path is used.
pub fn make_dispatch(element: &Element, event_name: &str) -> impl Fn(PropValue) + 'static {
    let element = element.clone();
    let event_name = event_name.to_owned();
    move |payload| {
        let event = Event::new(&event_name, EventInit::BUBBLING).unwrap_or_else(|error| {
            tracing::debug!(%error, "falling back to init_event");
            Event::init_event(&event_name, true, true)
        });
        element.dispatch_event(event.with_detail(payload));
    }
}

/// Subscribes every event stream to a dispatcher bound to `element`.
#[must_use]
pub fn subscribe_dispatchers(element: &Element, events: &EventStreams) -> DisposableSet {
    let set = DisposableSet::new();
    for (name, stream) in events {
        set.add(stream.subscribe(make_dispatch(element, name)));
    }
    set
}

/// Where a [`RootWatcher`] currently dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootBinding {
    /// Not dispatching anywhere.
    Unbound,
    /// Dispatching on this element.
    BoundTo(Element),
}

struct WatcherState {
    binding: RootBinding,
    events: EventStreams,
    current: Option<DisposableSet>,
}

/// Keeps a definition's event streams dispatching on the current root element.
///
/// Rebinding releases the previous dispatcher subscriptions before subscribing the
/// new ones, so exactly one binding is live at a time.
#[derive(Clone)]
pub struct RootWatcher {
    state: Rc<RefCell<WatcherState>>,
}

impl RootWatcher {
    /// Creates an unbound watcher for `events`.
    #[must_use]
    pub fn new(events: EventStreams) -> Self {
        Self {
            state: Rc::new(RefCell::new(WatcherState {
                binding: RootBinding::Unbound,
                events,
                current: None,
            })),
        }
    }

    /// Moves every dispatcher to `root`.
    ///
    /// Event streams are subscribed anew on every bind, so a cold stream restarts
    /// from its first value each time the root changes.
    pub fn bind(&self, root: &Element) {
        self.unbind();
        let events = self.state.borrow().events.clone();
        if events.is_empty() {
            self.state.borrow_mut().binding = RootBinding::BoundTo(root.clone());
            return;
        }
        tracing::trace!(tag = root.tag_name(), "binding custom events");
        let subscriptions = subscribe_dispatchers(root, &events);
        let replaced = {
            let mut state = self.state.borrow_mut();
            state.binding = RootBinding::BoundTo(root.clone());
            state.current.replace(subscriptions)
        };
        if let Some(stale) = replaced {
            stale.dispose();
        }
    }

    /// Releases the current dispatchers.
    pub fn unbind(&self) {
        let current = {
            let mut state = self.state.borrow_mut();
            state.binding = RootBinding::Unbound;
            state.current.take()
        };
        if let Some(current) = current {
            current.dispose();
        }
    }

    /// The current binding.
    #[must_use]
    pub fn binding(&self) -> RootBinding {
        self.state.borrow().binding.clone()
    }

    /// The live dispatcher subscriptions, if any.
    #[must_use]
    pub fn current_subscription(&self) -> Option<DisposableSet> {
        self.state.borrow().current.clone()
    }
}

impl fmt::Debug for RootWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RootWatcher")
            .field("binding", &state.binding)
            .field("events", &state.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rill_core::{Observable, Subject};

    use super::*;

    fn count_events(element: &Element, name: &str) -> Rc<RefCell<Vec<PropValue>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        element.add_event_listener(name, {
            let seen = Rc::clone(&seen);
            move |event| seen.borrow_mut().push(event.detail().clone())
        });
        seen
    }

    #[test]
    fn dispatch_carries_payload_and_bubbles() {
        let parent = Element::new("div");
        let child = Element::new("h3");
        parent.append_child(child.clone().into());
        let seen = count_events(&parent, "myevent");

        make_dispatch(&child, "myevent")(PropValue::from(123));
        assert_eq!(&*seen.borrow(), &[PropValue::from(123)]);
    }

    #[test]
    fn invalid_names_use_the_legacy_path() {
        let element = Element::new("div");
        let seen = count_events(&element, "two words");
        make_dispatch(&element, "two words")(PropValue::Bool(true));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn rebinding_moves_dispatch_to_new_root() {
        let source = Subject::new();
        let events = EventStreams::from([("ping".to_owned(), source.as_observable())]);
        let watcher = RootWatcher::new(events);
        let first = Element::new("h3");
        let second = Element::new("button");
        let on_first = count_events(&first, "ping");
        let on_second = count_events(&second, "ping");

        watcher.bind(&first);
        source.next(PropValue::from(1));
        watcher.bind(&second);
        source.next(PropValue::from(2));

        assert_eq!(&*on_first.borrow(), &[PropValue::from(1)]);
        assert_eq!(&*on_second.borrow(), &[PropValue::from(2)]);
        assert_eq!(watcher.binding(), RootBinding::BoundTo(second));
        assert_eq!(source.observer_count(), 1);
    }

    #[test]
    fn unbind_releases_subscriptions() {
        let source = Subject::new();
        let events = EventStreams::from([("ping".to_owned(), source.as_observable())]);
        let watcher = RootWatcher::new(events);
        watcher.bind(&Element::new("div"));
        let current = watcher.current_subscription().expect("bound");

        watcher.unbind();
        assert!(current.is_disposed());
        assert_eq!(source.observer_count(), 0);
        assert_eq!(watcher.binding(), RootBinding::Unbound);
    }

    #[test]
    fn synchronous_streams_dispatch_on_bind() {
        let fired = Rc::new(Cell::new(0));
        let events = EventStreams::from([("ready".to_owned(), Observable::of(PropValue::Null))]);
        let root = Element::new("div");
        root.add_event_listener("ready", {
            let fired = Rc::clone(&fired);
            move |_| fired.set(fired.get() + 1)
        });
        RootWatcher::new(events).bind(&root);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn cold_streams_restart_on_rebind() {
        let events = EventStreams::from([("ready".to_owned(), Observable::of(PropValue::from(7)))]);
        let watcher = RootWatcher::new(events);
        let first = Element::new("h3");
        let second = Element::new("button");
        let on_first = count_events(&first, "ready");
        let on_second = count_events(&second, "ready");

        watcher.bind(&first);
        watcher.bind(&second);
        watcher.bind(&first);

        assert_eq!(&*on_first.borrow(), &[PropValue::from(7), PropValue::from(7)]);
        assert_eq!(&*on_second.borrow(), &[PropValue::from(7)]);
    }
}
