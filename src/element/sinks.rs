//! What a definition returns, and the contract it must satisfy.

use std::collections::BTreeMap;

use rill_core::Observable;

use crate::config::DEFAULT_DOM_DRIVER_NAME;
use crate::error::ElementError;
use crate::value::PropValue;
use crate::vnode::VNode;

/// Output key holding the custom events of an element.
pub const EVENTS_SINK_NAME: &str = "events";

/// Custom event streams by event name.
pub type EventStreams = BTreeMap<String, Observable<PropValue>>;

/// One named output of a definition.
#[derive(Debug, Clone)]
pub enum Sink {
    /// A stream of virtual trees.
    Tree(Observable<VNode>),
    /// A map of custom event streams.
    Events(EventStreams),
}

/// The raw, unvalidated output record of a definition.
#[derive(Debug, Clone, Default)]
pub struct Sinks(BTreeMap<String, Sink>);

impl Sinks {
    /// Creates an empty output record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An output record holding only a tree stream under the default driver name.
    #[must_use]
    pub fn dom(tree: Observable<VNode>) -> Self {
        Self::new().with(DEFAULT_DOM_DRIVER_NAME, Sink::Tree(tree))
    }

    /// Adds a named output.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, sink: Sink) -> Self {
        self.insert(name, sink);
        self
    }

    /// Adds one custom event stream under the `events` output.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>, stream: Observable<PropValue>) -> Self {
        let entry = self
            .0
            .entry(EVENTS_SINK_NAME.to_owned())
            .or_insert_with(|| Sink::Events(EventStreams::new()));
        if let Sink::Events(events) = entry {
            events.insert(name.into(), stream);
        } else {
            *entry = Sink::Events(EventStreams::from([(name.into(), stream)]));
        }
        self
    }

    /// Sets a named output, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, sink: Sink) {
        self.0.insert(name.into(), sink);
    }

    /// Looks an output up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Sink> {
        self.0.get(name)
    }
}

/// A validated definition output.
#[derive(Debug, Clone)]
pub struct DefinitionOutput {
    /// The rendered tree stream.
    pub tree: Observable<VNode>,
    /// Custom event streams, possibly empty.
    pub events: EventStreams,
}

/// Checks a definition output against the custom element contract.
///
/// The record must hold a tree stream under `dom_driver_name`, may hold an event map
/// under [`EVENTS_SINK_NAME`], and nothing else.
///
/// # Errors
///
/// Returns [`ElementError::ContractViolation`] when the tree stream is missing or
/// has the wrong shape, when `events` is not an event map, or when an unknown
/// output is present.
pub fn validate(sinks: Sinks, dom_driver_name: &str) -> Result<DefinitionOutput, ElementError> {
    let mut tree = None;
    let mut events = EventStreams::new();
    for (name, sink) in sinks.0 {
        match sink {
            Sink::Tree(stream) if name == dom_driver_name => tree = Some(stream),
            Sink::Events(_) if name == dom_driver_name => {
                return Err(ElementError::ContractViolation(format!(
                    "Custom element definition function should output an object containing an \
                     Observable of VTree, named '{dom_driver_name}'."
                )));
            }
            Sink::Events(streams) if name == EVENTS_SINK_NAME => events = streams,
            Sink::Tree(_) if name == EVENTS_SINK_NAME => {
                return Err(ElementError::ContractViolation(
                    "Custom element definition function should output its custom events as a \
                     map of event streams, named 'events'."
                        .to_owned(),
                ));
            }
            _ => {
                return Err(ElementError::ContractViolation(format!(
                    "Unknown '{name}' found on custom element definition function's output."
                )));
            }
        }
    }
    let tree = tree.ok_or_else(|| {
        ElementError::ContractViolation(format!(
            "Custom element definition function should output an object containing '{dom_driver_name}'."
        ))
    })?;
    Ok(DefinitionOutput { tree, events })
}
