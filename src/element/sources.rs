//! Inputs handed to a custom element definition.

use std::rc::Rc;

use crate::driver::DomSource;
use crate::error::ElementError;

use super::props::PropertyChannels;

/// Driver name under which definitions receive their property channels.
pub const PROPS_DRIVER_NAME: &str = "props";

/// The inputs handed to a definition.
#[derive(Debug, Clone)]
pub struct Sources {
    dom: DomSource,
    props: PropertyChannels,
    dom_driver_name: Rc<str>,
}

/// A single input looked up by driver name.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// The private DOM source of the instance.
    Dom(&'a DomSource),
    /// The property channels of the instance.
    Props(&'a PropertyChannels),
}

impl Sources {
    pub(crate) fn new(dom: DomSource, props: PropertyChannels, dom_driver_name: &str) -> Self {
        Self {
            dom,
            props,
            dom_driver_name: Rc::from(dom_driver_name),
        }
    }

    /// The instance's private DOM source.
    #[must_use]
    pub const fn dom(&self) -> &DomSource {
        &self.dom
    }

    /// The instance's property channels.
    #[must_use]
    pub const fn props(&self) -> &PropertyChannels {
        &self.props
    }

    /// Looks an input up by driver name.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Argument`] for names other than the DOM driver name
    /// and [`PROPS_DRIVER_NAME`].
    pub fn get(&self, driver_name: &str) -> Result<Source<'_>, ElementError> {
        if driver_name == &*self.dom_driver_name {
            Ok(Source::Dom(&self.dom))
        } else if driver_name == PROPS_DRIVER_NAME {
            Ok(Source::Props(&self.props))
        } else {
            Err(ElementError::Argument(format!(
                "No such internal driver named '{driver_name}' for custom elements. \
                 Available drivers: '{}', '{PROPS_DRIVER_NAME}'.",
                self.dom_driver_name
            )))
        }
    }
}
