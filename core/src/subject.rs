//! Hot, multicast channels.
//!
//! A [`Subject`] pushes every value to the subscribers registered at that moment. A
//! [`ReplaySubject`] additionally keeps the most recent values and replays them to
//! late subscribers, so nobody misses the latest state. Both multicast through an
//! rxrust subject and remember how they ended, so late subscribers still see the
//! terminal notification.
//!
//! Disposing either kind clears its subscribers and buffer for good: later writes
//! are silently dropped and later subscribers receive nothing.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use rxrust::observable::{ObservableExt, defer};
use rxrust::observer::Observer as RxObserver;
use rxrust::ops::box_it::BoxIt;
use rxrust::subject::Subject as RxSubject;

use crate::delivery::{self, Notification, Terminal};
use crate::observable::Op;
use crate::{Disposable, Observable, StreamError, impl_debug};

struct Channel<T> {
    subject: RxSubject<'static, T, StreamError>,
    emitting: Cell<bool>,
    queue: RefCell<VecDeque<Notification<T>>>,
    terminal: RefCell<Option<Terminal>>,
    disposed: Cell<bool>,
    live: Cell<usize>,
    buffer: RefCell<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone + 'static> Channel<T> {
    fn new(capacity: usize) -> Rc<Self> {
        Rc::new(Self {
            subject: RxSubject::default(),
            emitting: Cell::new(false),
            queue: RefCell::new(VecDeque::new()),
            terminal: RefCell::new(None),
            disposed: Cell::new(false),
            live: Cell::new(0),
            buffer: RefCell::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    fn is_stopped(&self) -> bool {
        self.disposed.get() || self.terminal.borrow().is_some()
    }

    /// Delivers `notification`, or queues it behind the one being delivered.
    fn notify(&self, notification: Notification<T>) {
        if self.is_stopped() {
            return;
        }
        if self.emitting.replace(true) {
            self.queue.borrow_mut().push_back(notification);
            return;
        }
        let mut pending = Some(notification);
        while let Some(notification) = pending {
            delivery::deliver(|| self.dispatch(notification));
            pending = self.queue.borrow_mut().pop_front();
        }
        if !self.disposed.get() {
            let mut subject = self.subject.clone();
            delivery::release(move || subject.retain());
        }
        self.emitting.set(false);
    }

    fn dispatch(&self, notification: Notification<T>) {
        if self.is_stopped() {
            return;
        }
        match notification {
            Notification::Next(value) => {
                if self.capacity > 0 {
                    let mut buffer = self.buffer.borrow_mut();
                    if buffer.len() == self.capacity {
                        buffer.pop_front();
                    }
                    buffer.push_back(value.clone());
                }
                self.subject.clone().next(value);
            }
            Notification::Error(error) => {
                *self.terminal.borrow_mut() = Some(Terminal::Failed(error.clone()));
                self.subject.clone().error(error);
            }
            Notification::Complete => {
                *self.terminal.borrow_mut() = Some(Terminal::Completed);
                self.subject.clone().complete();
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.queue.borrow_mut().clear();
        self.buffer.borrow_mut().clear();
        self.live.set(0);
        delivery::release_rx(self.subject.clone());
    }

    fn observer_count(&self) -> usize {
        if self.disposed.get() {
            0
        } else {
            self.live.get()
        }
    }

    /// What a new subscriber is attached to: replay, then the live subject or the
    /// recorded terminal notification.
    fn source(this: &Rc<Self>) -> Op<T> {
        if this.disposed.get() {
            return Observable::never().op();
        }
        let replay: Vec<T> = this.buffer.borrow().iter().cloned().collect();
        let terminal = this.terminal.borrow().clone();
        if let Some(terminal) = terminal {
            return Observable::new(move |subscriber| {
                for value in &replay {
                    subscriber.next(value.clone());
                }
                match &terminal {
                    Terminal::Completed => subscriber.complete(),
                    Terminal::Failed(error) => subscriber.error(error.clone()),
                }
            })
            .op();
        }
        this.live.set(this.live.get() + 1);
        let channel = Rc::downgrade(this);
        this.subject
            .clone()
            .finalize(move || {
                if let Some(channel) = channel.upgrade() {
                    channel.live.set(channel.live.get().saturating_sub(1));
                }
            })
            .start_with(replay)
            .box_it()
    }

    fn observable(this: &Rc<Self>) -> Observable<T> {
        let channel: Weak<Self> = Rc::downgrade(this);
        let source = defer(move || match channel.upgrade() {
            Some(channel) => Self::source(&channel),
            None => Observable::never().op(),
        });
        Observable::from_op(source.box_it())
    }
}

/// A multicast channel without memory.
pub struct Subject<T> {
    channel: Rc<Channel<T>>,
}

impl_debug!(Subject);

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            channel: Rc::clone(&self.channel),
        }
    }
}

impl<T: Clone + 'static> Subject<T> {
    /// Creates an empty subject.
    #[must_use]
    pub fn new() -> Self {
        Self { channel: Channel::new(0) }
    }

    /// Pushes a value to every current subscriber.
    pub fn next(&self, value: T) {
        self.channel.notify(Notification::Next(value));
    }

    /// Fails every current and future subscriber.
    pub fn error(&self, error: StreamError) {
        self.channel.notify(Notification::Error(error));
    }

    /// Completes every current and future subscriber.
    pub fn complete(&self) {
        self.channel.notify(Notification::Complete);
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.channel.observer_count()
    }

    /// Returns a stream view of this subject.
    #[must_use]
    pub fn as_observable(&self) -> Observable<T> {
        Channel::observable(&self.channel)
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Disposable for Subject<T> {
    fn dispose(&self) {
        self.channel.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.channel.disposed.get()
    }
}

/// A multicast channel replaying its most recent values to late subscribers.
pub struct ReplaySubject<T> {
    channel: Rc<Channel<T>>,
}

impl_debug!(ReplaySubject);

impl<T> Clone for ReplaySubject<T> {
    fn clone(&self) -> Self {
        Self {
            channel: Rc::clone(&self.channel),
        }
    }
}

impl<T: Clone + 'static> ReplaySubject<T> {
    /// Creates a subject replaying up to `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; use [`Subject`] for a channel without memory.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay capacity must be at least one");
        Self {
            channel: Channel::new(capacity),
        }
    }

    /// Creates a subject replaying only the latest value.
    #[must_use]
    pub fn latest_only() -> Self {
        Self::new(1)
    }

    /// Records a value and pushes it to every current subscriber.
    pub fn next(&self, value: T) {
        self.channel.notify(Notification::Next(value));
    }

    /// Fails every current and future subscriber, after replay.
    pub fn error(&self, error: StreamError) {
        self.channel.notify(Notification::Error(error));
    }

    /// Completes every current and future subscriber, after replay.
    pub fn complete(&self) {
        self.channel.notify(Notification::Complete);
    }

    /// Returns the most recent recorded value.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.channel.buffer.borrow().back().cloned()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.channel.observer_count()
    }

    /// Returns a stream view of this subject.
    #[must_use]
    pub fn as_observable(&self) -> Observable<T> {
        Channel::observable(&self.channel)
    }

    /// Returns `true` when both handles refer to the same channel.
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.channel, &other.channel)
    }
}

impl<T: Clone + 'static> Disposable for ReplaySubject<T> {
    fn dispose(&self) {
        self.channel.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.channel.disposed.get()
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
    fn subject_only_reaches_current_subscribers() {
        let subject = Subject::new();
        subject.next(1);
        let seen = collect(&subject.as_observable());
        subject.next(2);
        assert_eq!(&*seen.borrow(), &[2]);
    }

    #[test]
    fn replay_of_one_hands_latest_to_late_subscriber() {
        let subject = ReplaySubject::latest_only();
        subject.next("a");
        subject.next("b");
        let seen = collect(&subject.as_observable());
        assert_eq!(&*seen.borrow(), &["b"]);
        subject.next("c");
        assert_eq!(&*seen.borrow(), &["b", "c"]);
        assert_eq!(subject.latest(), Some("c"));
    }

    #[test]
    fn replay_buffer_keeps_capacity_values() {
        let subject = ReplaySubject::new(2);
        for value in 1..=4 {
            subject.next(value);
        }
        assert_eq!(&*collect(&subject.as_observable()).borrow(), &[3, 4]);
    }

    #[test]
    fn disposed_subject_drops_writes_silently() {
        let subject = ReplaySubject::latest_only();
        let seen = collect(&subject.as_observable());
        subject.next(1);
        subject.dispose();
        subject.next(2);
        assert_eq!(&*seen.borrow(), &[1]);
        assert_eq!(subject.observer_count(), 0);
        assert!(collect(&subject.as_observable()).borrow().is_empty());
        assert!(subject.is_disposed());
    }

    #[test]
    fn unsubscribing_removes_observer() {
        let subject = Subject::<i32>::new();
        let subscription = subject.as_observable().subscribe(|_| {});
        assert_eq!(subject.observer_count(), 1);
        subscription.unsubscribe();
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn late_subscriber_sees_replay_then_completion() {
        let subject = ReplaySubject::latest_only();
        subject.next(5);
        subject.complete();
        let completed = Rc::new(Cell::new(false));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = subject.as_observable().subscribe_all(
            {
                let seen = Rc::clone(&seen);
                move |v| seen.borrow_mut().push(v)
            },
            |_| {},
            {
                let completed = Rc::clone(&completed);
                move || completed.set(true)
            },
        );
        assert_eq!(&*seen.borrow(), &[5]);
        assert!(completed.get());
    }

    #[test]
    fn error_reaches_subscribers_registered_later() {
        let subject = Subject::<i32>::new();
        subject.error(StreamError::msg("gone"));
        let failed = Rc::new(Cell::new(false));
        let _ = subject.as_observable().subscribe_error({
            let failed = Rc::clone(&failed);
            move |_| failed.set(true)
        });
        assert!(failed.get());
    }

    #[test]
    fn pushes_from_a_subscriber_are_delivered_in_order() {
        let subject = Subject::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = subject.as_observable().subscribe({
            let (seen, subject) = (Rc::clone(&seen), subject.clone());
            move |value: i32| {
                seen.borrow_mut().push(value);
                if value < 3 {
                    subject.next(value + 1);
                }
            }
        });
        let _ = subject.as_observable().subscribe({
            let seen = Rc::clone(&seen);
            move |value| seen.borrow_mut().push(value * 10)
        });
        subject.next(1);
        assert_eq!(&*seen.borrow(), &[1, 10, 2, 20, 3, 30]);
    }

    #[test]
    fn disposing_from_a_subscriber_is_safe() {
        let subject = ReplaySubject::latest_only();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = subject.as_observable().subscribe({
            let (seen, subject) = (Rc::clone(&seen), subject.clone());
            move |value: i32| {
                seen.borrow_mut().push(value);
                subject.dispose();
            }
        });
        subject.next(1);
        subject.next(2);
        assert_eq!(&*seen.borrow(), &[1]);
        assert!(subject.is_disposed());
    }
}
