use serde::{Deserialize, Serialize};

use crate::error::ElementError;

/// Driver name under which definitions receive and return their DOM channel.
pub const DEFAULT_DOM_DRIVER_NAME: &str = "DOM";

/// Class prefix applied to the container element of every custom element.
pub const DEFAULT_CLASS_PREFIX: &str = "customElement-";

/// Settings shared by every custom element of a registry.
///
/// Missing fields take their defaults when read from JSON:
///
/// ```
/// use rill::ElementsConfig;
///
/// let config = ElementsConfig::from_json(r#"{ "warn_on_missing_key": false }"#).unwrap();
/// assert_eq!(config.dom_driver_name(), "DOM");
/// assert!(!config.warns_on_missing_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementsConfig {
    dom_driver_name: String,
    class_prefix: String,
    warn_on_missing_key: bool,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementsConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dom_driver_name: DEFAULT_DOM_DRIVER_NAME.to_owned(),
            class_prefix: DEFAULT_CLASS_PREFIX.to_owned(),
            warn_on_missing_key: true,
        }
    }

    /// Reads a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Config`] if the document is not valid JSON or has
    /// fields of the wrong type.
    pub fn from_json(json: &str) -> Result<Self, ElementError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the driver name used for the DOM channel.
    #[must_use]
    pub fn with_dom_driver_name(mut self, name: impl Into<String>) -> Self {
        self.dom_driver_name = name.into();
        self
    }

    /// Sets the container class prefix.
    #[must_use]
    pub fn with_class_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.class_prefix = prefix.into();
        self
    }

    /// Controls the missing-key warning.
    #[must_use]
    pub const fn warn_on_missing_key(mut self, warn: bool) -> Self {
        self.warn_on_missing_key = warn;
        self
    }

    /// The driver name used for the DOM channel.
    #[must_use]
    pub fn dom_driver_name(&self) -> &str {
        &self.dom_driver_name
    }

    /// The container class prefix.
    #[must_use]
    pub fn class_prefix(&self) -> &str {
        &self.class_prefix
    }

    /// Whether custom elements without a key are reported.
    #[must_use]
    pub const fn warns_on_missing_key(&self) -> bool {
        self.warn_on_missing_key
    }
}
