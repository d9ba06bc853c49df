//! Per-property replay channels feeding a custom element definition.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rill_core::{Disposable, Observable, ReplaySubject};

use crate::error::ElementError;
use crate::value::{PropValue, Properties};

/// Property key whose channel carries the whole property record.
pub const ALL_PROPS: &str = "*";

/// Decides whether two consecutive property values count as unchanged.
#[derive(Clone)]
pub struct Comparer(Rc<dyn Fn(&PropValue, &PropValue) -> bool>);

impl Comparer {
    /// Wraps a custom "unchanged" predicate.
    pub fn new(unchanged: impl Fn(&PropValue, &PropValue) -> bool + 'static) -> Self {
        Self(Rc::new(unchanged))
    }

    /// Values are unchanged when structurally equal. This is the default.
    #[must_use]
    pub fn equality() -> Self {
        Self::new(|a, b| a == b)
    }

    /// Every update counts as a change, so every push is emitted.
    #[must_use]
    pub fn always_changed() -> Self {
        Self::new(|_, _| false)
    }

    /// Returns `true` if `current` should be suppressed after `previous`.
    #[must_use]
    pub fn unchanged(&self, previous: &PropValue, current: &PropValue) -> bool {
        (self.0)(previous, current)
    }
}

impl Default for Comparer {
    fn default() -> Self {
        Self::equality()
    }
}

impl fmt::Debug for Comparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Comparer")
    }
}

struct ChannelsInner {
    channels: RefCell<BTreeMap<String, ReplaySubject<PropValue>>>,
    latest: RefCell<Option<Properties>>,
    disposed: Cell<bool>,
}

/// Lazily created replay channels, one per property key.
///
/// A channel replays the latest value of its key to late subscribers, and the
/// stream handed out by [`PropertyChannels::get`] drops values equal to the
/// previous one. Channels requested after an update start from the current value.
#[derive(Clone)]
pub struct PropertyChannels {
    inner: Rc<ChannelsInner>,
}

impl PropertyChannels {
    /// Creates an empty channel set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ChannelsInner {
                channels: RefCell::new(BTreeMap::new()),
                latest: RefCell::new(None),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Returns the stream of one property, or of the whole record for [`ALL_PROPS`].
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Argument`] when no key is given.
    pub fn get(&self, key: Option<&str>) -> Result<Observable<PropValue>, ElementError> {
        let key = key.ok_or_else(|| {
            ElementError::Argument(
                "Custom element driver `props.get()` expects an argument in the getter.".to_owned(),
            )
        })?;
        Ok(self.get_by(key, Comparer::equality()))
    }

    /// Returns the stream of one property using a custom comparer.
    pub fn get_by(&self, key: &str, comparer: Comparer) -> Observable<PropValue> {
        self.channel(key)
            .as_observable()
            .distinct_until_changed_by(move |previous, current| comparer.unchanged(previous, current))
    }

    /// Returns the stream of whole property records.
    #[must_use]
    pub fn get_all(&self) -> Observable<Properties> {
        self.get_by(ALL_PROPS, Comparer::equality())
            .filter_map(|value| match value {
                PropValue::Record(record) => Some(record),
                _ => None,
            })
    }

    /// Keys for which a channel exists, in key order.
    #[must_use]
    pub fn open_keys(&self) -> Vec<String> {
        self.inner.channels.borrow().keys().cloned().collect()
    }

    /// Every open channel.
    pub(crate) fn channels(&self) -> Vec<ReplaySubject<PropValue>> {
        self.inner.channels.borrow().values().cloned().collect()
    }

    /// Pushes a new property record into every open channel.
    ///
    /// The `*` channel receives the record itself; other channels receive their
    /// key's value. A key absent from the record leaves its channel untouched, so
    /// subscribers keep the last value they saw.
    pub(crate) fn push(&self, properties: &Properties) {
        if self.inner.disposed.get() {
            return;
        }
        *self.inner.latest.borrow_mut() = Some(properties.clone());
        let channels: Vec<(String, ReplaySubject<PropValue>)> = self
            .inner
            .channels
            .borrow()
            .iter()
            .map(|(key, channel)| (key.clone(), channel.clone()))
            .collect();
        for (key, channel) in channels {
            if let Some(value) = value_for(properties, &key) {
                channel.next(value);
            }
        }
    }

    fn channel(&self, key: &str) -> ReplaySubject<PropValue> {
        if self.inner.disposed.get() {
            let inert = ReplaySubject::latest_only();
            inert.dispose();
            return inert;
        }
        if let Some(channel) = self.inner.channels.borrow().get(key) {
            return channel.clone();
        }
        let channel = ReplaySubject::latest_only();
        let seed = self
            .inner
            .latest
            .borrow()
            .as_ref()
            .and_then(|properties| value_for(properties, key));
        if let Some(seed) = seed {
            channel.next(seed);
        }
        self.inner
            .channels
            .borrow_mut()
            .insert(key.to_owned(), channel.clone());
        channel
    }
}

fn value_for(properties: &Properties, key: &str) -> Option<PropValue> {
    if key == ALL_PROPS {
        Some(PropValue::Record(properties.clone()))
    } else {
        properties.get(key).cloned()
    }
}

impl Default for PropertyChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for PropertyChannels {
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.latest.borrow_mut().take();
        let channels = core::mem::take(&mut *self.inner.channels.borrow_mut());
        for channel in channels.into_values() {
            channel.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for PropertyChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyChannels")
            .field("keys", &self.open_keys())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
