//! Synchronous delivery on top of rxrust.
//!
//! rxrust keeps subscribers and subject observer lists in `RefCell`s. A pipeline
//! must therefore never be torn down while one of its observers is running, and a
//! source must never re-enter itself. Every entry point runs through [`deliver`];
//! teardown requested while a delivery is on the stack goes through [`release`]
//! and runs once the outermost delivery returns.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::StreamError;

/// A notification waiting for its source to finish the current one.
pub(crate) enum Notification<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

/// How a multicast source ended.
#[derive(Clone)]
pub(crate) enum Terminal {
    Completed,
    Failed(StreamError),
}

#[derive(Default)]
struct Delivery {
    depth: Cell<usize>,
    releases: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

thread_local! {
    static DELIVERY: Delivery = Delivery::default();
}

struct Exit;

impl Drop for Exit {
    fn drop(&mut self) {
        DELIVERY.with(|delivery| delivery.depth.set(delivery.depth.get().saturating_sub(1)));
    }
}

/// Runs `f` as a delivery; the outermost one drains the pending releases.
pub(crate) fn deliver<R>(f: impl FnOnce() -> R) -> R {
    let outermost = DELIVERY.with(|delivery| {
        let depth = delivery.depth.get();
        delivery.depth.set(depth + 1);
        depth == 0
    });
    let _exit = Exit;
    let result = f();
    if outermost {
        loop {
            let next = DELIVERY.with(|delivery| delivery.releases.borrow_mut().pop_front());
            let Some(release) = next else {
                break;
            };
            release();
        }
    }
    result
}

/// Runs `teardown` now, or after the outermost delivery if one is running.
pub(crate) fn release(teardown: impl FnOnce() + 'static) {
    let delivering = DELIVERY.with(|delivery| delivery.depth.get() > 0);
    if delivering {
        DELIVERY.with(|delivery| delivery.releases.borrow_mut().push_back(Box::new(teardown)));
    } else {
        deliver(teardown);
    }
}

/// Releases an rxrust subscription through [`release`].
pub(crate) fn release_rx(subscription: impl rxrust::subscription::Subscription + 'static) {
    release(move || rxrust::subscription::Subscription::unsubscribe(subscription));
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[test]
    fn release_outside_delivery_runs_at_once() {
        let ran = Rc::new(Cell::new(false));
        release({
            let ran = Rc::clone(&ran);
            move || ran.set(true)
        });
        assert!(ran.get());
    }

    #[test]
    fn release_inside_delivery_waits_for_the_outermost() {
        let order = Rc::new(RefCell::new(Vec::new()));
        deliver(|| {
            deliver(|| {
                release({
                    let order = Rc::clone(&order);
                    move || order.borrow_mut().push("released")
                });
                order.borrow_mut().push("inner");
            });
            order.borrow_mut().push("outer");
        });
        assert_eq!(&*order.borrow(), &["inner", "outer", "released"]);
    }
}
