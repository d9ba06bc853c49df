//! Stream operators.
//!
//! Every operator is a thin wrapper over the matching rxrust operator. User
//! closures are shared behind `Rc` so the boxed pipeline stays cloneable.

use std::cell::RefCell;
use std::rc::Rc;

use rxrust::observable::{ObservableExt, defer};
use rxrust::ops::box_it::BoxIt;

use crate::Observable;

impl<T: Clone + 'static> Observable<T> {
    /// Transforms every value.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(T) -> U + 'static) -> Observable<U> {
        let f = Rc::new(f);
        Observable::from_op(self.op().map(move |value| f(value)).box_it())
    }

    /// Keeps the values matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        let predicate = Rc::new(predicate);
        Self::from_op(self.op().filter(move |value: &T| predicate(value)).box_it())
    }

    /// Transforms values, dropping those mapped to `None`.
    pub fn filter_map<U: Clone + 'static>(&self, f: impl Fn(T) -> Option<U> + 'static) -> Observable<U> {
        let f = Rc::new(f);
        Observable::from_op(self.op().filter_map(move |value| f(value)).box_it())
    }

    /// Runs a side effect for every value and passes it through.
    pub fn inspect(&self, f: impl Fn(&T) + 'static) -> Self {
        let f = Rc::new(f);
        Self::from_op(self.op().tap(move |value: &T| f(value)).box_it())
    }

    /// Emits the first `count` values, then completes.
    #[must_use]
    pub fn take(&self, count: usize) -> Self {
        if count == 0 {
            return Self::empty();
        }
        Self::from_op(self.op().take(count).box_it())
    }

    /// Emits the first value, then completes.
    #[must_use]
    pub fn first(&self) -> Self {
        self.take(1)
    }

    /// Drops the first `count` values.
    #[must_use]
    pub fn skip(&self, count: usize) -> Self {
        Self::from_op(self.op().skip(count).box_it())
    }

    /// Emits values from both streams as they arrive; completes when both complete.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self::from_op(self.op().merge(other.op()).box_it())
    }

    /// Interleaves every stream of `sources`; completes when all of them complete.
    pub fn merge_all(sources: impl IntoIterator<Item = Self>) -> Self {
        sources
            .into_iter()
            .reduce(|merged, source| merged.merge(&source))
            .unwrap_or_else(Self::empty)
    }

    /// Suppresses values considered equal to the previous one by `comparer`.
    ///
    /// The first value always passes. Every subscription tracks its own previous
    /// value.
    pub fn distinct_until_changed_by(&self, comparer: impl Fn(&T, &T) -> bool + 'static) -> Self {
        let comparer = Rc::new(comparer);
        let source = self.op();
        let distinct = defer(move || {
            let last: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
            source.filter(move |value: &T| {
                let unchanged = last
                    .borrow()
                    .as_ref()
                    .is_some_and(|previous| comparer(previous, value));
                if !unchanged {
                    *last.borrow_mut() = Some(value.clone());
                }
                !unchanged
            })
        });
        Self::from_op(distinct.box_it())
    }

    /// Emits `value` before the values of this stream.
    #[must_use]
    pub fn start_with(&self, value: T) -> Self {
        Self::from_op(self.op().start_with(vec![value]).box_it())
    }

    /// Folds values into an accumulator, emitting every intermediate state.
    pub fn scan<A: Clone + 'static>(&self, seed: A, f: impl Fn(A, T) -> A + 'static) -> Observable<A> {
        let f = Rc::new(f);
        Observable::from_op(self.op().scan_initial(seed, move |acc, value| f(acc, value)).box_it())
    }

    /// Combines the latest values of both streams once each has emitted.
    pub fn combine_latest<U, R>(
        &self,
        other: &Observable<U>,
        combine: impl Fn(&T, &U) -> R + 'static,
    ) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
    {
        let combine = Rc::new(combine);
        Observable::from_op(
            self.op()
                .combine_latest(other.op(), move |a: T, b: U| combine(&a, &b))
                .box_it(),
        )
    }

    /// Pairs every value with the latest value of `other`.
    ///
    /// Values arriving before `other` emitted are dropped. Completion follows this
    /// stream only; errors of either stream are forwarded.
    pub fn with_latest_from<U, R>(
        &self,
        other: &Observable<U>,
        combine: impl Fn(T, &U) -> R + 'static,
    ) -> Observable<R>
    where
        U: Clone + 'static,
        R: Clone + 'static,
    {
        let combine = Rc::new(combine);
        Observable::from_op(
            self.op()
                .with_latest_from(other.op())
                .map(move |(value, latest): (T, U)| combine(value, &latest))
                .box_it(),
        )
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Suppresses consecutive duplicates by value equality.
    #[must_use]
    pub fn distinct_until_changed(&self) -> Self {
        Self::from_op(self.op().distinct_until_changed().box_it())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{StreamError, Subject};

    fn collect<T: Clone + 'static>(source: &Observable<T>) -> Rc<RefCell<Vec<T>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = source.subscribe({
            let seen = Rc::clone(&seen);
            move |value| seen.borrow_mut().push(value)
        });
        seen
    }

    #[test]
    fn map_and_filter_compose() {
        let source = Observable::from_iter(1..=6).filter(|v| v % 2 == 0).map(|v| v * 10);
        assert_eq!(&*collect(&source).borrow(), &[20, 40, 60]);
    }

    #[test]
    fn filter_map_drops_none() {
        let source = Observable::from_iter(["1", "x", "3"]).filter_map(|s| s.parse::<i32>().ok());
        assert_eq!(&*collect(&source).borrow(), &[1, 3]);
    }

    #[test]
    fn take_completes_and_releases_upstream() {
        let subject = Subject::new();
        let seen = collect(&subject.as_observable().take(2));
        subject.next(1);
        subject.next(2);
        subject.next(3);
        assert_eq!(&*seen.borrow(), &[1, 2]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn skip_drops_prefix() {
        let source = Observable::from_iter([1, 2, 3]).skip(2);
        assert_eq!(&*collect(&source).borrow(), &[3]);
    }

    #[test]
    fn distinct_uses_equality_by_default() {
        let source = Observable::from_iter([1, 1, 2, 2, 1]).distinct_until_changed();
        assert_eq!(&*collect(&source).borrow(), &[1, 2, 1]);
    }

    #[test]
    fn distinct_with_never_equal_comparer_passes_everything() {
        let source = Observable::from_iter([1, 1, 1]).distinct_until_changed_by(|_, _| false);
        assert_eq!(&*collect(&source).borrow(), &[1, 1, 1]);
    }

    #[test]
    fn merge_interleaves_and_completes_after_both() {
        let a = Subject::new();
        let b = Subject::new();
        let completed = Rc::new(Cell::new(false));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _ = a.as_observable().merge(&b.as_observable()).subscribe_all(
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
        a.next(1);
        b.next(2);
        a.complete();
        assert!(!completed.get());
        b.next(3);
        b.complete();
        assert!(completed.get());
        assert_eq!(&*seen.borrow(), &[1, 2, 3]);
    }

    #[test]
    fn merge_forwards_errors() {
        let failed = Rc::new(Cell::new(false));
        let _ = Observable::<i32>::never()
            .merge(&Observable::throw(StreamError::msg("x")))
            .subscribe_error({
                let failed = Rc::clone(&failed);
                move |_| failed.set(true)
            });
        assert!(failed.get());
    }

    #[test]
    fn combine_latest_waits_for_both() {
        let colors = Subject::new();
        let numbers = Subject::new();
        let seen = collect(
            &colors
                .as_observable()
                .combine_latest(&numbers.as_observable(), |c: &&str, n: &i32| format!("{c}{n}")),
        );
        colors.next("red");
        assert!(seen.borrow().is_empty());
        numbers.next(1);
        numbers.next(2);
        colors.next("green");
        assert_eq!(&*seen.borrow(), &["red1", "red2", "green2"]);
    }

    #[test]
    fn with_latest_from_samples_the_other_stream() {
        let clicks = Subject::new();
        let ids = Subject::new();
        let seen = collect(&clicks.as_observable().with_latest_from(&ids.as_observable(), |_: (), id: &i32| *id));
        clicks.next(());
        ids.next(23);
        ids.next(45);
        clicks.next(());
        clicks.next(());
        assert_eq!(&*seen.borrow(), &[45, 45]);
    }

    #[test]
    fn scan_and_start_with() {
        let source = Observable::from_iter([1, 2, 3]).scan(0, |acc, v| acc + v).start_with(-1);
        assert_eq!(&*collect(&source).borrow(), &[-1, 1, 3, 6]);
    }
}
