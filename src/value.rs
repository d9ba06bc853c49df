//! Dynamic property values passed from a parent tree to a custom element.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde_json::Value as Json;

use crate::vnode::VNode;

/// A single property value.
///
/// Values compare structurally, which is what the default property comparer relies
/// on to suppress redundant emissions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    /// Absent or explicitly empty value.
    #[default]
    Null,
    /// A boolean flag.
    Bool(bool),
    /// Any number.
    Number(f64),
    /// A string.
    Text(String),
    /// An ordered collection.
    List(Vec<PropValue>),
    /// A nested record, also used for the whole property set.
    Record(Properties),
    /// Virtual child trees, as found under the reserved `children` key.
    Nodes(Vec<VNode>),
}

impl PropValue {
    /// Returns the string slice if this is a [`PropValue::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the number if this is a [`PropValue::Number`].
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the flag if this is a [`PropValue::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the items if this is a [`PropValue::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the record if this is a [`PropValue::Record`].
    #[must_use]
    pub const fn as_record(&self) -> Option<&Properties> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the child trees if this is a [`PropValue::Nodes`].
    #[must_use]
    pub fn as_nodes(&self) -> Option<&[VNode]> {
        match self {
            Self::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Renders the value as a DOM attribute value.
    ///
    /// `Null` and `false` mean "no attribute". Composite values have no attribute
    /// form and also yield `None`.
    #[must_use]
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Self::Null | Self::Bool(false) => None,
            Self::Bool(true) => Some(String::new()),
            Self::Number(number) => Some(format_number(*number)),
            Self::Text(text) => Some(text.clone()),
            Self::List(_) | Self::Record(_) | Self::Nodes(_) => None,
        }
    }

    /// Renders scalar values as display text, composite values as an empty string.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(flag) => flag.to_string(),
            other => other.to_attribute().unwrap_or_default(),
        }
    }

    /// Converts a JSON document into a property value.
    #[must_use]
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(flag) => Self::Bool(flag),
            Json::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            Json::String(text) => Self::Text(text),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Record(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<Self>> for PropValue {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

impl From<Properties> for PropValue {
    fn from(value: Properties) -> Self {
        Self::Record(value)
    }
}

impl From<Vec<VNode>> for PropValue {
    fn from(value: Vec<VNode>) -> Self {
        Self::Nodes(value)
    }
}

impl From<Json> for PropValue {
    fn from(value: Json) -> Self {
        Self::from_json(value)
    }
}

/// An ordered property record, keyed by property name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties(BTreeMap<String, PropValue>);

impl Properties {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds a property, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a property.
    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.0.remove(key)
    }

    /// Looks a property up.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    /// Returns `true` if the property is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over properties in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, PropValue> {
        self.0.iter()
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PropValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a PropValue);
    type IntoIter = btree_map::Iter<'a, String, PropValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
