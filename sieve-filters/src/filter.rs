//! Filter declarations.
//!
//! A [`Filter`] describes one query parameter: the value field parsing it, the
//! expression it produces, the group it is combined in and any child
//! parameters nested under its name. Declarations are plain data; they are
//! checked and laid out once by [`FilterSetBuilder::build`](crate::FilterSetBuilder::build).
//!
//! ```rust
//! use sieve_filters::Filter;
//! use sieve_filters::field::{CharField, DateField};
//!
//! // ?username=kate
//! let username = Filter::of(CharField::new());
//!
//! // ?created.gte=2024-01-01&created.lte=2024-12-31
//! let created = Filter::of(DateField::new())
//!     .namespace()
//!     .children([Filter::new().lookup("gte"), Filter::new().lookup("lte")]);
//! ```

use indexmap::IndexMap;
use sieve_query::{Computed, Expr, FilterValue};

use crate::error::ConstructionError;
use crate::field::ValueField;
use crate::settings::Blank;

/// Group that applies its filters one by one instead of combining them.
pub const CHAIN: &str = "chain";

/// What a filter compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A column path (`__` separates relation hops).
    Name(String),
    /// A computed column, registered under a generated alias.
    Computed(Computed),
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Computed> for Target {
    fn from(computed: Computed) -> Self {
        Self::Computed(computed)
    }
}

/// Declaration of one query parameter.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub(crate) field: Option<Box<dyn ValueField>>,
    pub(crate) target: Option<Target>,
    pub(crate) lookup: String,
    pub(crate) template: Option<Expr>,
    pub(crate) group: Option<String>,
    pub(crate) negate: bool,
    pub(crate) method: Option<String>,
    pub(crate) aliases: Option<IndexMap<String, Computed>>,
    pub(crate) param: Option<String>,
    pub(crate) children: Vec<Filter>,
    pub(crate) namespace: bool,
    pub(crate) blank: Option<Blank>,
    pub(crate) noop: bool,
    pub(crate) required: Option<bool>,
}

impl Filter {
    /// A filter without a value field; it inherits its parent's or relies on
    /// [`Hooks::value_field`](crate::Hooks::value_field).
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter parsed by `field`.
    pub fn of(field: impl ValueField + 'static) -> Self {
        Self::new().field(field)
    }

    /// Set the value field.
    pub fn field(mut self, field: impl ValueField + 'static) -> Self {
        self.field = Some(Box::new(field));
        self
    }

    /// Column or computed expression to filter against. Inherited by children.
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Lookup suffix, such as `icontains` or `date__gte`.
    pub fn lookup(mut self, lookup: impl Into<String>) -> Self {
        self.lookup = lookup.into();
        self
    }

    /// Fixed expression built from placeholders, filled with the value.
    pub fn template(mut self, template: Expr) -> Self {
        self.template = Some(template);
        self
    }

    /// Group to combine in. Inherited by children.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Negate the resolved expression.
    pub fn negate(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Delegate to a method registered on the filter set.
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.method = Some(name.into());
        self
    }

    /// Computed column registered before this filter's expression.
    pub fn alias(mut self, name: impl Into<String>, computed: Computed) -> Self {
        self.aliases
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), computed);
        self
    }

    /// Parameter name. Defaults to the declared name for root filters and to
    /// the lookup for children.
    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// Add one child filter.
    pub fn child(mut self, child: Filter) -> Self {
        self.children.push(child);
        self
    }

    /// Add child filters.
    pub fn children(mut self, children: impl IntoIterator<Item = Filter>) -> Self {
        self.children.extend(children);
        self
    }

    /// Only expose the children; this parameter itself is disabled.
    pub fn namespace(mut self) -> Self {
        self.namespace = true;
        self
    }

    /// Blank policy for this filter.
    pub fn blank(mut self, blank: Blank) -> Self {
        self.blank = Some(blank);
        self
    }

    /// Validate the value but contribute no expression.
    pub fn noop(mut self) -> Self {
        self.noop = true;
        self
    }

    /// Require the parameter. Inherited by children.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Check the declaration's own invariants. `param` is its dotted name.
    pub(crate) fn validate(&self, param: &str) -> Result<(), ConstructionError> {
        if let Some(group) = &self.group {
            validate_group(group)?;
        }
        if self.template.is_some() && !self.lookup.is_empty() {
            return Err(ConstructionError::TemplateWithLookup {
                param: param.to_string(),
            });
        }
        if self.template.is_some() && self.target.is_some() {
            return Err(ConstructionError::TemplateWithTarget {
                param: param.to_string(),
            });
        }
        if self.negate && self.method.is_some() {
            return Err(ConstructionError::NegateWithMethod {
                param: param.to_string(),
            });
        }
        if let Some(template) = &self.template {
            // A trial fill fails on the first leaf carrying a value.
            if let Err(source) = template.fill(&FilterValue::Null) {
                return Err(ConstructionError::TemplateWithValues {
                    param: param.to_string(),
                    source,
                });
            }
        }
        if self.namespace && self.children.is_empty() {
            return Err(ConstructionError::EmptyNamespace {
                param: param.to_string(),
            });
        }
        Ok(())
    }

    /// Name of a child filter: its param, else its lookup.
    pub(crate) fn child_name(&self) -> Option<&str> {
        self.param
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| Some(self.lookup.as_str()).filter(|l| !l.is_empty()))
    }
}

/// Check that a group is a dotted identifier not nested under [`CHAIN`].
pub(crate) fn validate_group(group: &str) -> Result<(), ConstructionError> {
    if !group.split('.').all(is_identifier) {
        return Err(ConstructionError::InvalidGroup {
            group: group.to_string(),
        });
    }
    if group.starts_with("chain.") {
        return Err(ConstructionError::ReservedGroup {
            group: group.to_string(),
        });
    }
    Ok(())
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}
