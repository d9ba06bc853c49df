//! Custom elements: tags whose rendering is delegated to a reactive definition.
//!
//! A definition receives [`Sources`] (a private DOM source and per-property
//! channels) and returns [`Sinks`] (a tree stream and optional custom events). The
//! driver mounting a registered tag runs the definition once per placement and keeps
//! feeding it properties until the placement disappears, at which point everything
//! the instance acquired, nested custom elements included, is released.

mod events;
mod metadata;
mod props;
mod registry;
mod sinks;
mod sources;
mod widget;

pub use events::{RootBinding, RootWatcher, make_dispatch, subscribe_dispatchers};
pub use metadata::{ElementMetadata, MetadataTable};
pub use props::{ALL_PROPS, Comparer, PropertyChannels};
pub use registry::{DefinitionFn, Registry, RegistryBuilder, WidgetClass};
pub use sinks::{DefinitionOutput, EVENTS_SINK_NAME, EventStreams, Sink, Sinks, validate};
pub use sources::{PROPS_DRIVER_NAME, Source, Sources};
pub use widget::{CHILDREN_PROP, CustomElementWidget, Lifecycle};
