//! Subscriptions and disposable ownership sets.
//!
//! Both are thin handles over rxrust's [`MultiSubscription`], which releases its
//! children in registration order. Releasing is explicit: dropping a
//! [`Subscription`] handle does not unsubscribe, because a subscription is usually
//! shared between the producer that registers teardown logic and the consumer that
//! decides when to stop. Every release operation in this module is idempotent.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use rxrust::subscription::{BoxSubscription, MultiSubscription};

use crate::delivery;

/// Anything that owns resources which must be released exactly once.
pub trait Disposable {
    /// Releases the resource. Calling it again has no effect.
    fn dispose(&self);

    /// Returns `true` once [`Disposable::dispose`] has run.
    fn is_disposed(&self) -> bool;
}

/// A handle to an active subscription.
///
/// Cloning yields another handle to the same subscription. The handle is closed as
/// soon as [`Subscription::unsubscribe`] returns; the upstream pipeline is torn
/// down once no delivery is running on the current stack.
#[derive(Clone)]
pub struct Subscription {
    closed: Rc<Cell<bool>>,
    teardown: MultiSubscription<'static>,
}

struct Teardown(Box<dyn FnOnce()>);

impl rxrust::subscription::Subscription for Teardown {
    fn unsubscribe(self) {
        (self.0)();
    }

    fn is_closed(&self) -> bool {
        false
    }
}

impl Subscription {
    /// Creates an open subscription with no teardown logic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            closed: Rc::new(Cell::new(false)),
            teardown: MultiSubscription::default(),
        }
    }

    /// Creates a subscription that runs `teardown` when unsubscribed.
    #[must_use]
    pub fn from_fn(teardown: impl FnOnce() + 'static) -> Self {
        let subscription = Self::new();
        subscription.add_teardown(teardown);
        subscription
    }

    /// Creates a subscription that is already closed.
    #[must_use]
    pub fn closed() -> Self {
        let subscription = Self::new();
        subscription.unsubscribe();
        subscription
    }

    /// Returns `true` once the subscription has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Registers teardown logic. Runs it right away if already closed.
    pub fn add_teardown(&self, teardown: impl FnOnce() + 'static) {
        self.attach(Teardown(Box::new(teardown)));
    }

    /// Ties a child subscription to this one.
    pub fn add(&self, child: Self) {
        if Rc::ptr_eq(&self.closed, &child.closed) {
            return;
        }
        self.attach(child);
    }

    /// Ties any rxrust subscription to this one.
    pub(crate) fn attach(&self, child: impl rxrust::subscription::Subscription + 'static) {
        if self.is_closed() {
            delivery::release_rx(child);
            return;
        }
        self.teardown.clone().append(BoxSubscription::new(child));
    }

    /// Releases the subscription and runs its teardown logic in registration order.
    pub fn unsubscribe(&self) {
        if self.closed.replace(true) {
            return;
        }
        delivery::release_rx(self.teardown.clone());
    }
}

impl rxrust::subscription::Subscription for Subscription {
    fn unsubscribe(self) {
        Self::unsubscribe(&self);
    }

    fn is_closed(&self) -> bool {
        Self::is_closed(self)
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .field("teardowns", &self.teardown.teardown_size())
            .finish()
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        self.unsubscribe();
    }

    fn is_disposed(&self) -> bool {
        self.is_closed()
    }
}

struct Disposal<D>(D);

impl<D: Disposable> rxrust::subscription::Subscription for Disposal<D> {
    fn unsubscribe(self) {
        self.0.dispose();
    }

    fn is_closed(&self) -> bool {
        self.0.is_disposed()
    }
}

/// An ownership set of disposables released together.
///
/// Adding to a set that was already disposed disposes the new item on the spot, so a
/// late registration can never outlive its owner.
#[derive(Clone)]
pub struct DisposableSet {
    disposed: Rc<Cell<bool>>,
    items: MultiSubscription<'static>,
}

impl DisposableSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            disposed: Rc::new(Cell::new(false)),
            items: MultiSubscription::default(),
        }
    }

    /// Adds an item to the set.
    pub fn add(&self, item: impl Disposable + 'static) {
        if self.disposed.get() {
            item.dispose();
            return;
        }
        self.items.clone().append(BoxSubscription::new(Disposal(item)));
    }

    /// Returns the number of items currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.teardown_size()
    }

    /// Returns `true` if the set holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when both handles refer to the same set.
    #[must_use]
    pub fn same_set(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.disposed, &other.disposed)
    }
}

impl Default for DisposableSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for DisposableSet {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        rxrust::subscription::Subscription::unsubscribe(self.items.clone());
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl fmt::Debug for DisposableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableSet")
            .field("disposed", &self.disposed.get())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_runs_teardown_once() {
        let count = Rc::new(Cell::new(0));
        let subscription = Subscription::from_fn({
            let count = Rc::clone(&count);
            move || count.set(count.get() + 1)
        });

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert_eq!(count.get(), 1);
        assert!(subscription.is_closed());
    }

    #[test]
    fn teardown_added_after_close_runs_immediately() {
        let ran = Rc::new(Cell::new(false));
        let subscription = Subscription::closed();
        subscription.add_teardown({
            let ran = Rc::clone(&ran);
            move || ran.set(true)
        });
        assert!(ran.get());
    }

    #[test]
    fn teardowns_run_in_registration_order() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let subscription = Subscription::new();
        for step in 1..=3 {
            let order = Rc::clone(&order);
            subscription.add_teardown(move || order.borrow_mut().push(step));
        }
        subscription.unsubscribe();
        assert_eq!(&*order.borrow(), &[1, 2, 3]);
    }

    #[test]
    fn child_is_released_with_parent() {
        let parent = Subscription::new();
        let child = Subscription::new();
        parent.add(child.clone());
        parent.unsubscribe();
        assert!(child.is_closed());
    }

    #[test]
    fn set_disposes_everything_and_late_additions() {
        let set = DisposableSet::new();
        let first = Subscription::new();
        set.add(first.clone());
        assert_eq!(set.len(), 1);

        set.dispose();
        assert!(first.is_closed());
        assert!(set.is_disposed());
        assert!(set.is_empty());

        let late = Subscription::new();
        set.add(late.clone());
        assert!(late.is_closed());
        assert!(set.is_empty());
    }

    #[test]
    fn nested_sets_release_recursively() {
        let outer = DisposableSet::new();
        let inner = DisposableSet::new();
        let leaf = Subscription::new();
        inner.add(leaf.clone());
        outer.add(inner.clone());

        outer.dispose();
        assert!(inner.is_disposed());
        assert!(leaf.is_closed());
    }
}
