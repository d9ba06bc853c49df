//! A small CSS selector subset: `tag`, `#id`, `.class`, compounds of those,
//! descendant combinators separated by whitespace, `*` and `:root`.

use crate::error::DomError;

use super::Element;

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `:root`, the top node of a rendered tree.
    Root,
    /// Compounds joined by descendant combinators, outermost first.
    Path(Vec<Compound>),
}

/// A compound selector such as `button#ok.primary`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// The selector string denoting the root of a rendered tree.
    pub const ROOT: &'static str = ":root";

    /// Parses a selector.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::InvalidSelector`] for empty input or syntax outside the
    /// supported subset.
    pub fn parse(selector: &str) -> Result<Self, DomError> {
        let trimmed = selector.trim();
        if trimmed == Self::ROOT {
            return Ok(Self::Root);
        }
        let invalid = || DomError::InvalidSelector(selector.to_owned());
        let compounds = trimmed
            .split_whitespace()
            .map(|part| Compound::parse(part).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;
        if compounds.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Path(compounds))
    }

    /// Returns `true` if `element` matches.
    ///
    /// `:root` matches detached elements, i.e. elements without a parent.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Self::Root => element.parent_element().is_none(),
            Self::Path(compounds) => {
                let Some((last, ancestors)) = compounds.split_last() else {
                    return false;
                };
                if !last.matches(element) {
                    return false;
                }
                let mut cursor = element.parent_element();
                for compound in ancestors.iter().rev() {
                    loop {
                        let Some(candidate) = cursor else {
                            return false;
                        };
                        cursor = candidate.parent_element();
                        if compound.matches(&candidate) {
                            break;
                        }
                    }
                }
                true
            }
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl Compound {
    fn parse(part: &str) -> Option<Self> {
        let mut compound = Self::default();
        let tag_end = part.find(['#', '.']).unwrap_or(part.len());
        let tag = &part[..tag_end];
        if tag == "*" {
            // universal
        } else if !tag.is_empty() {
            if !tag.chars().all(is_name_char) {
                return None;
            }
            compound.tag = Some(tag.to_ascii_uppercase());
        }

        let mut rest = &part[tag_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            if marker == '#' {
                compound.id = Some(name.to_owned());
            } else {
                compound.classes.push(name.to_owned());
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn matches(&self, element: &Element) -> bool {
        if self.tag.as_deref().is_some_and(|tag| tag != element.tag_name()) {
            return false;
        }
        if self.id.as_ref().is_some_and(|id| *id != element.id()) {
            return false;
        }
        self.classes.iter().all(|class| element.has_class(class))
    }
}
