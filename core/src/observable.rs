//! Cold, push-based observables.
//!
//! An [`Observable`] wraps a boxed rxrust pipeline carrying [`StreamError`] on its
//! error channel. Producers written with [`Observable::new`] push values into a
//! [`Subscriber`], which enforces the stream grammar `next* (error | complete)?`:
//! after a terminal notification, or after the consumer unsubscribed, everything
//! pushed is dropped.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use rxrust::observable::Observable as RxObservable;
use rxrust::observer::{BoxObserver, Observer as RxObserver};
use rxrust::ops::box_it::{BoxIt, CloneableBoxOp};

use crate::delivery::{self, Notification};
use crate::{StreamError, Subscription, impl_debug};

/// The boxed rxrust pipeline behind an [`Observable`].
pub(crate) type Op<T> = CloneableBoxOp<'static, T, StreamError>;

type Downstream<T> = BoxObserver<'static, T, StreamError>;

struct SubscriberInner<T> {
    observer: RefCell<Option<Downstream<T>>>,
    stopped: Cell<bool>,
    emitting: Cell<bool>,
    queue: RefCell<VecDeque<Notification<T>>>,
    subscription: Subscription,
}

/// The producer-facing side of a subscription.
///
/// Notifications pushed while a previous one is still being delivered are queued
/// and delivered in order once it returns.
pub struct Subscriber<T> {
    inner: Rc<SubscriberInner<T>>,
}

impl_debug!(Subscriber);

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Subscriber<T> {
    fn new(observer: Downstream<T>) -> Self {
        Self {
            inner: Rc::new(SubscriberInner {
                observer: RefCell::new(Some(observer)),
                stopped: Cell::new(false),
                emitting: Cell::new(false),
                queue: RefCell::new(VecDeque::new()),
                subscription: Subscription::new(),
            }),
        }
    }

    /// Pushes a value unless the subscriber is closed.
    pub fn next(&self, value: T) {
        self.notify(Notification::Next(value));
    }

    /// Fails the stream and releases the subscription.
    pub fn error(&self, error: StreamError) {
        self.notify(Notification::Error(error));
    }

    /// Ends the stream and releases the subscription.
    pub fn complete(&self) {
        self.notify(Notification::Complete);
    }

    /// Returns `true` when nothing more will be delivered.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.stopped.get()
            || self.inner.subscription.is_closed()
            || self
                .inner
                .observer
                .try_borrow()
                .is_ok_and(|observer| observer.as_ref().is_none_or(|observer| observer.is_finished()))
    }

    /// Ties an upstream subscription to this subscriber's lifetime.
    pub fn add(&self, upstream: Subscription) {
        self.inner.subscription.add(upstream);
    }

    /// Registers teardown logic run when this subscriber is released.
    pub fn add_teardown(&self, teardown: impl FnOnce() + 'static) {
        self.inner.subscription.add_teardown(teardown);
    }

    fn notify(&self, notification: Notification<T>) {
        if self.is_closed() {
            return;
        }
        if self.inner.emitting.replace(true) {
            self.inner.queue.borrow_mut().push_back(notification);
            return;
        }
        let mut pending = Some(notification);
        while let Some(notification) = pending {
            delivery::deliver(|| self.dispatch(notification));
            pending = self.inner.queue.borrow_mut().pop_front();
        }
        self.inner.emitting.set(false);
    }

    fn dispatch(&self, notification: Notification<T>) {
        if self.is_closed() {
            return;
        }
        match notification {
            Notification::Next(value) => {
                if let Some(observer) = self.inner.observer.borrow_mut().as_mut() {
                    observer.next(value);
                }
            }
            Notification::Error(error) => {
                self.inner.stopped.set(true);
                let observer = self.inner.observer.borrow_mut().take();
                if let Some(observer) = observer {
                    observer.error(error);
                }
                self.inner.subscription.unsubscribe();
            }
            Notification::Complete => {
                self.inner.stopped.set(true);
                let observer = self.inner.observer.borrow_mut().take();
                if let Some(observer) = observer {
                    observer.complete();
                }
                self.inner.subscription.unsubscribe();
            }
        }
    }
}

/// A producer function adapted to rxrust's observable protocol.
struct Producer<T> {
    produce: Rc<dyn Fn(Subscriber<T>)>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            produce: Rc::clone(&self.produce),
        }
    }
}

impl<T: 'static, O> RxObservable<T, StreamError, O> for Producer<T>
where
    O: RxObserver<T, StreamError> + 'static,
{
    type Unsub = Subscription;

    fn actual_subscribe(self, observer: O) -> Subscription {
        let subscriber = Subscriber::new(BoxObserver::new(observer));
        (self.produce)(subscriber.clone());
        subscriber.inner.subscription.clone()
    }
}

/// The consumer end of a pipeline: user handlers gated by the subscription.
struct Handlers<T> {
    next: Box<dyn Fn(T)>,
    error: Option<Box<dyn Fn(StreamError)>>,
    complete: Option<Box<dyn Fn()>>,
    subscription: Subscription,
}

impl<T> RxObserver<T, StreamError> for Handlers<T> {
    fn next(&mut self, value: T) {
        if !self.subscription.is_closed() {
            (self.next)(value);
        }
    }

    fn error(self, error: StreamError) {
        if self.subscription.is_closed() {
            return;
        }
        match &self.error {
            Some(handler) => handler(error),
            None => tracing::error!(%error, "unhandled stream error"),
        }
        self.subscription.unsubscribe();
    }

    fn complete(self) {
        if self.subscription.is_closed() {
            return;
        }
        if let Some(handler) = &self.complete {
            handler();
        }
        self.subscription.unsubscribe();
    }

    fn is_finished(&self) -> bool {
        self.subscription.is_closed()
    }
}

/// A cold stream of values of type `T`.
///
/// Cloning is cheap and yields the same pipeline.
pub struct Observable<T> {
    source: Op<T>,
}

impl_debug!(Observable);

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub(crate) const fn from_op(source: Op<T>) -> Self {
        Self { source }
    }

    pub(crate) fn op(&self) -> Op<T> {
        self.source.clone()
    }

    /// Creates an observable from a producer run once per subscription.
    ///
    /// The producer registers its cleanup through [`Subscriber::add_teardown`].
    pub fn new(producer: impl Fn(Subscriber<T>) + 'static) -> Self {
        Self::from_op(
            Producer {
                produce: Rc::new(producer),
            }
            .box_it(),
        )
    }

    /// Subscribes a value handler. Errors are logged.
    pub fn subscribe(&self, next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe_handlers(Box::new(next), None, None)
    }

    /// Subscribes handlers for every notification kind.
    pub fn subscribe_all(
        &self,
        next: impl Fn(T) + 'static,
        error: impl Fn(StreamError) + 'static,
        complete: impl Fn() + 'static,
    ) -> Subscription {
        self.subscribe_handlers(Box::new(next), Some(Box::new(error)), Some(Box::new(complete)))
    }

    /// Subscribes an error handler only, ignoring values.
    pub fn subscribe_error(&self, error: impl Fn(StreamError) + 'static) -> Subscription {
        self.subscribe_handlers(Box::new(|_| {}), Some(Box::new(error)), None)
    }

    fn subscribe_handlers(
        &self,
        next: Box<dyn Fn(T)>,
        error: Option<Box<dyn Fn(StreamError)>>,
        complete: Option<Box<dyn Fn()>>,
    ) -> Subscription {
        let subscription = Subscription::new();
        let handlers = Handlers {
            next,
            error,
            complete,
            subscription: subscription.clone(),
        };
        let source = self.op();
        let upstream = delivery::deliver(move || source.actual_subscribe(handlers));
        subscription.attach(upstream);
        subscription
    }

    /// A stream that completes immediately.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|subscriber| subscriber.complete())
    }

    /// A stream that never emits nor terminates.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_| {})
    }

    /// A stream that fails immediately.
    #[must_use]
    pub fn throw(error: StreamError) -> Self {
        Self::new(move |subscriber| subscriber.error(error.clone()))
    }

    /// A stream that emits `value` and completes.
    #[must_use]
    pub fn of(value: T) -> Self {
        Self::new(move |subscriber| {
            subscriber.next(value.clone());
            subscriber.complete();
        })
    }

    /// A stream that emits every item of `items` in order and completes.
    pub fn from_iter(items: impl IntoIterator<Item = T>) -> Self {
        let items: Rc<[T]> = items.into_iter().collect();
        Self::new(move |subscriber| {
            for item in items.iter() {
                if subscriber.is_closed() {
                    return;
                }
                subscriber.next(item.clone());
            }
            subscriber.complete();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<T: Clone + 'static>(source: &Observable<T>) -> Rc<RefCell<Vec<T>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = source.subscribe({
            let seen = Rc::clone(&seen);
            move |value| seen.borrow_mut().push(value)
        });
        seen
    }

    #[test]
    fn of_emits_once_then_completes() {
        let completed = Rc::new(Cell::new(false));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let subscription = Observable::of(7).subscribe_all(
            {
                let seen = Rc::clone(&seen);
                move |v| seen.borrow_mut().push(v)
            },
            |_| panic!("no error expected"),
            {
                let completed = Rc::clone(&completed);
                move || completed.set(true)
            },
        );
        assert_eq!(&*seen.borrow(), &[7]);
        assert!(completed.get());
        assert!(subscription.is_closed());
    }

    #[test]
    fn from_iter_replays_for_each_subscriber() {
        let source = Observable::from_iter([1, 2, 3]);
        assert_eq!(&*collect(&source).borrow(), &[1, 2, 3]);
        assert_eq!(&*collect(&source).borrow(), &[1, 2, 3]);
    }

    #[test]
    fn nothing_is_delivered_after_error() {
        let source = Observable::new(|subscriber: Subscriber<i32>| {
            subscriber.next(1);
            subscriber.error(StreamError::msg("stop"));
            subscriber.next(2);
            subscriber.complete();
        });
        let errors = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = source.subscribe_all(
            {
                let seen = Rc::clone(&seen);
                move |v| seen.borrow_mut().push(v)
            },
            {
                let errors = Rc::clone(&errors);
                move |_| errors.set(errors.get() + 1)
            },
            || panic!("completion after error"),
        );
        assert_eq!(&*seen.borrow(), &[1]);
        assert_eq!(errors.get(), 1);
    }

    #[test]
    fn unsubscribe_runs_producer_teardown() {
        let released = Rc::new(Cell::new(false));
        let source = Observable::<i32>::new({
            let released = Rc::clone(&released);
            move |subscriber| {
                let released = Rc::clone(&released);
                subscriber.add_teardown(move || released.set(true));
            }
        });
        let subscription = source.subscribe(|_| {});
        assert!(!released.get());
        subscription.unsubscribe();
        assert!(released.get());
    }

    #[test]
    fn values_pushed_from_a_handler_arrive_after_the_current_one() {
        let slot: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::new(RefCell::new(None));
        let source = Observable::new({
            let slot = Rc::clone(&slot);
            move |subscriber| *slot.borrow_mut() = Some(subscriber)
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = source.subscribe({
            let (seen, slot) = (Rc::clone(&seen), Rc::clone(&slot));
            move |value| {
                seen.borrow_mut().push(value);
                if value == 1 {
                    let subscriber = slot.borrow().clone();
                    if let Some(subscriber) = subscriber {
                        subscriber.next(2);
                        seen.borrow_mut().push(-1);
                    }
                }
            }
        });
        let subscriber = slot.borrow().clone().expect("subscribed");
        subscriber.next(1);
        assert_eq!(&*seen.borrow(), &[1, -1, 2]);
    }

    #[test]
    fn unsubscribing_inside_a_handler_stops_delivery() {
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let source = crate::Subject::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let subscription = source.as_observable().subscribe({
            let (seen, slot) = (Rc::clone(&seen), Rc::clone(&slot));
            move |value| {
                seen.borrow_mut().push(value);
                if let Some(subscription) = slot.borrow().as_ref() {
                    subscription.unsubscribe();
                }
            }
        });
        *slot.borrow_mut() = Some(subscription);
        source.next(1);
        source.next(2);
        assert_eq!(&*seen.borrow(), &[1]);
        assert_eq!(source.observer_count(), 0);
    }
}
