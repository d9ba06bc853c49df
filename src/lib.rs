#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::module_name_repetitions)]

mod config;
pub mod dom;
pub mod driver;
pub mod element;
/// Errors raised by the document and by custom elements.
pub mod error;
pub mod logging;
pub mod value;
pub mod vnode;


pub use config::{DEFAULT_CLASS_PREFIX, DEFAULT_DOM_DRIVER_NAME, ElementsConfig};
#[doc(inline)]
pub use driver::{DomDriver, DomSource};
#[doc(inline)]
pub use element::{Registry, Sinks, Sources};
#[doc(inline)]
pub use error::{DomError, ElementError};
#[doc(inline)]
pub use rill_core as stream;

pub mod prelude {
    //! Commonly used types, importable at once.
    //!
    //! ```
    //! use rill::prelude::*;
    //!
    //! let tree: VNode = h("h3.title").text("Hello").into();
    //! assert!(matches!(tree, VNode::Element(_)));
    //! ```
    pub use crate::dom::{Element, Event};
    pub use crate::element::{ALL_PROPS, Comparer, Sink};
    pub use crate::value::{PropValue, Properties};
    pub use crate::vnode::{VElement, VNode, h};
    pub use crate::{DomDriver, DomSource, ElementError, ElementsConfig, Registry, Sinks, Sources, run};
    pub use rill_core::{Disposable, Observable, ReplaySubject, StreamError, Subject};
}

use dom::Element;
use rill_core::Observable;
use vnode::VNode;

/// Renders `app` into `container`, resolving custom elements through `registry`.
///
/// Shorthand for `DomDriver::new(container, registry).run(app)`.
#[must_use]
pub fn run(container: &Element, registry: Registry, app: &Observable<VNode>) -> DomSource {
    DomDriver::new(container.clone(), registry).run(app)
}
