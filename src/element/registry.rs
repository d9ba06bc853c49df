//! Registration of custom element tags and their definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::config::ElementsConfig;
use crate::driver::DriverContext;
use crate::error::ElementError;
use crate::vnode::VElement;

use super::sinks::Sinks;
use super::sources::Sources;
use super::widget::CustomElementWidget;

/// A user-supplied definition: maps an instance's inputs to its outputs.
pub type DefinitionFn = Rc<dyn Fn(&Sources) -> Result<Sinks, ElementError>>;

/// A registered tag together with its definition.
#[derive(Clone)]
pub struct WidgetClass {
    tag: Rc<str>,
    definition: DefinitionFn,
}

impl WidgetClass {
    /// Binds a definition to a tag. Tags are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::Construction`] when the tag is not a valid element
    /// name: it must start with an ASCII letter and contain only ASCII letters,
    /// digits, `-` and `_`.
    pub fn new(
        tag: &str,
        definition: impl Fn(&Sources) -> Result<Sinks, ElementError> + 'static,
    ) -> Result<Self, ElementError> {
        let tag = normalize_tag(tag)?;
        Ok(Self {
            tag: Rc::from(tag),
            definition: Rc::new(definition),
        })
    }

    /// The lower-case tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The definition run once per mounted instance.
    #[must_use]
    pub fn definition(&self) -> &DefinitionFn {
        &self.definition
    }

    /// Creates a fresh, unmounted instance for a virtual node.
    pub(crate) fn construct(&self, node: &VElement, context: &DriverContext) -> CustomElementWidget {
        CustomElementWidget::new(self.clone(), node, context.clone())
    }
}

impl fmt::Debug for WidgetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetClass").field("tag", &self.tag).finish_non_exhaustive()
    }
}

fn normalize_tag(tag: &str) -> Result<String, ElementError> {
    let valid = tag.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(tag.to_ascii_lowercase())
    } else {
        Err(ElementError::Construction(format!(
            "Invalid custom element tag name `{tag}`: expected an ASCII letter followed by \
             letters, digits, '-' or '_'."
        )))
    }
}

struct RegistryInner {
    classes: BTreeMap<String, WidgetClass>,
    config: ElementsConfig,
}

/// Tag names mapped to their definitions, plus the settings they share.
///
/// A registry is immutable once built and cheap to clone.
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

impl Registry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry without custom elements.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                classes: BTreeMap::new(),
                config: ElementsConfig::default(),
            }),
        }
    }

    /// Looks a tag up, case-insensitively.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&WidgetClass> {
        self.inner.classes.get(tag).or_else(|| {
            let lower = tag.to_ascii_lowercase();
            self.inner.classes.get(&lower)
        })
    }

    /// Returns `true` if the tag is registered.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    /// The registered tags, in order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.inner.classes.keys().map(String::as_str)
    }

    /// The number of registered tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.classes.len()
    }

    /// Returns `true` if no tag is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.classes.is_empty()
    }

    /// The shared settings.
    #[must_use]
    pub fn config(&self) -> &ElementsConfig {
        &self.inner.config
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.tags().collect::<Vec<_>>())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`Registry`].
///
/// The first registration error is kept and reported by [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    classes: BTreeMap<String, WidgetClass>,
    config: ElementsConfig,
    error: Option<ElementError>,
}

impl RegistryBuilder {
    /// Creates an empty builder with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition under `tag`.
    #[must_use]
    pub fn define(
        self,
        tag: &str,
        definition: impl Fn(&Sources) -> Result<Sinks, ElementError> + 'static,
    ) -> Self {
        match WidgetClass::new(tag, definition) {
            Ok(class) => self.class(class),
            Err(error) => self.fail(error),
        }
    }

    /// Registers an already built class.
    #[must_use]
    pub fn class(mut self, class: WidgetClass) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.classes.contains_key(class.tag()) {
            let error = ElementError::Construction(format!(
                "Custom element `{}` is already defined.",
                class.tag()
            ));
            return self.fail(error);
        }
        self.classes.insert(class.tag().to_owned(), class);
        self
    }

    /// Replaces the shared settings.
    #[must_use]
    pub fn config(mut self, config: ElementsConfig) -> Self {
        self.config = config;
        self
    }

    /// Finishes the registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ElementError::Construction`] raised by an invalid tag or
    /// a duplicate registration.
    pub fn build(self) -> Result<Registry, ElementError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        tracing::debug!(tags = self.classes.len(), "custom element registry built");
        Ok(Registry {
            inner: Rc::new(RegistryInner {
                classes: self.classes,
                config: self.config,
            }),
        })
    }

    fn fail(mut self, error: ElementError) -> Self {
        self.error.get_or_insert(error);
        self
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("tags", &self.classes.keys().collect::<Vec<_>>())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rill_core::Observable;

    use super::*;
    use crate::config::DEFAULT_DOM_DRIVER_NAME;
    use crate::dom::Element;
    use crate::driver::DomDriver;
    use crate::element::{PropertyChannels, Sink};
    use crate::vnode::h;

    fn title(_: &Sources) -> Result<Sinks, ElementError> {
        Ok(Sinks::dom(Observable::of(h("h3").text("title").into())))
    }

    #[test]
    fn looked_up_definition_produces_the_registered_output() {
        let registry = Registry::builder().define("my-element", title).build().expect("valid registry");
        let class = registry.get("My-Element").expect("registered tag");
        let dom = DomDriver::new(Element::new("div"), Registry::empty()).run(&Observable::never());
        let sources = Sources::new(dom, PropertyChannels::new(), DEFAULT_DOM_DRIVER_NAME);

        let sinks = (class.definition())(&sources).expect("definition succeeds");
        assert!(matches!(sinks.get(DEFAULT_DOM_DRIVER_NAME), Some(Sink::Tree(_))));
        assert!(sinks.get("events").is_none());
    }

    #[test]
    fn tags_are_case_insensitive() {
        let registry = Registry::builder().define("My-Element", title).build().expect("valid registry");
        assert!(registry.contains("my-element"));
        assert!(registry.contains("MY-ELEMENT"));
        assert_eq!(registry.tags().collect::<Vec<_>>(), ["my-element"]);
    }

    #[test]
    fn invalid_tags_are_construction_errors() {
        for tag in ["", "1abc", "has space", "x>y"] {
            assert!(matches!(
                WidgetClass::new(tag, title),
                Err(ElementError::Construction(_))
            ));
        }
    }

    #[test]
    fn duplicates_are_rejected_at_build() {
        let result = Registry::builder()
            .define("my-element", title)
            .define("MY-ELEMENT", title)
            .build();
        assert!(matches!(
            result,
            Err(ElementError::Construction(message)) if message.contains("already defined")
        ));
    }

    #[test]
    fn first_error_wins() {
        let result = Registry::builder().define("1bad", title).define("2bad", title).build();
        assert!(matches!(
            result,
            Err(ElementError::Construction(message)) if message.contains("1bad")
        ));
    }

    #[test]
    fn config_travels_with_the_registry() {
        let registry = Registry::builder()
            .config(ElementsConfig::new().with_class_prefix("ce-"))
            .build()
            .expect("valid registry");
        assert!(registry.is_empty());
        assert_eq!(registry.config().class_prefix(), "ce-");
    }
}
