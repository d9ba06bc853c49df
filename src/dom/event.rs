use std::cell::Cell;
use std::rc::Rc;

use crate::error::DomError;
use crate::value::PropValue;

use super::Element;

/// Options for the native event constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventInit {
    /// Whether the event travels up the ancestor chain.
    pub bubbles: bool,
    /// Whether the event can be cancelled.
    pub cancelable: bool,
}

impl EventInit {
    /// Options for an event that bubbles and can be cancelled.
    pub const BUBBLING: Self = Self {
        bubbles: true,
        cancelable: true,
    };
}

/// An event dispatched through the in-memory document.
#[derive(Debug, Clone)]
pub struct Event {
    event_type: Rc<str>,
    detail: PropValue,
    bubbles: bool,
    cancelable: bool,
    target: Option<Element>,
    current_target: Option<Element>,
    stopped: Rc<Cell<bool>>,
}

impl Event {
    /// The native event constructor.
    ///
    /// # Errors
    ///
    /// Rejects empty event types and types containing whitespace with
    /// [`DomError::InvalidEventType`].
    pub fn new(event_type: &str, init: EventInit) -> Result<Self, DomError> {
        if event_type.is_empty() || event_type.chars().any(char::is_whitespace) {
            return Err(DomError::InvalidEventType(event_type.to_owned()));
        }
        Ok(Self::init_event(event_type, init.bubbles, init.cancelable))
    }

    /// The native custom event constructor, carrying a `detail` payload.
    ///
    /// # Errors
    ///
    /// Same as [`Event::new`].
    pub fn custom(event_type: &str, detail: PropValue, init: EventInit) -> Result<Self, DomError> {
        Self::new(event_type, init).map(|event| event.with_detail(detail))
    }

    /// The legacy construction path: creates and initializes an event without any
    /// validation.
    #[must_use]
    pub fn init_event(event_type: &str, bubbles: bool, cancelable: bool) -> Self {
        Self {
            event_type: Rc::from(event_type),
            detail: PropValue::Null,
            bubbles,
            cancelable,
            target: None,
            current_target: None,
            stopped: Rc::new(Cell::new(false)),
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_detail(mut self, detail: PropValue) -> Self {
        self.detail = detail;
        self
    }

    /// The event type, such as `click`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The payload attached at construction.
    #[must_use]
    pub const fn detail(&self) -> &PropValue {
        &self.detail
    }

    /// Whether the event bubbles.
    #[must_use]
    pub const fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Whether the event can be cancelled.
    #[must_use]
    pub const fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// The element the event was dispatched on.
    #[must_use]
    pub const fn target(&self) -> Option<&Element> {
        self.target.as_ref()
    }

    /// The element whose listeners are currently running.
    #[must_use]
    pub const fn current_target(&self) -> Option<&Element> {
        self.current_target.as_ref()
    }

    /// Stops the event from reaching further ancestors.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    /// Returns `true` once propagation was stopped.
    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub(super) fn set_target(&mut self, target: Element) {
        self.target = Some(target);
    }

    pub(super) fn set_current_target(&mut self, current: Element) {
        self.current_target = Some(current);
    }
}
