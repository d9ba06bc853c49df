use thiserror::Error;

/// Errors raised while defining, mounting or driving custom elements.
///
/// Errors that surface asynchronously travel through stream error channels wrapped
/// in a [`rill_core::StreamError`]; recover the variant with
/// [`StreamError::downcast_ref`](rill_core::StreamError::downcast_ref).
#[derive(Debug, Error)]
pub enum ElementError {
    /// A registration or a widget could not be constructed.
    #[error("{0}")]
    Construction(String),
    /// A definition's inputs or outputs break the custom element contract.
    #[error("{0}")]
    ContractViolation(String),
    /// An accessor was called with a missing or unknown argument.
    #[error("{0}")]
    Argument(String),
    /// Lifecycle metadata is missing or belongs to another element.
    #[error("{0}")]
    Metadata(String),
    /// A configuration document could not be read.
    #[error("Invalid custom element configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ElementError {
    pub(crate) fn children_property() -> Self {
        Self::ContractViolation(
            "Custom element should not have property `children`. It is reserved for children \
             elements nested into this custom element."
                .to_owned(),
        )
    }

    pub(crate) fn missing_metadata(hook: &str) -> Self {
        Self::Metadata(format!(
            "Missing custom element metadata on DOM element when calling {hook}() on custom element Widget."
        ))
    }
}

/// Errors raised by the in-memory document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// A selector could not be parsed.
    #[error("Failed to parse selector `{0}`")]
    InvalidSelector(String),
    /// The native event constructor rejected the event type.
    #[error("Invalid event type `{0}`")]
    InvalidEventType(String),
}
