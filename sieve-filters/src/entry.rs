//! The resolved outcome of one parameter, or of a merged group.

use indexmap::IndexMap;
use sieve_query::{Collection, Computed, Expr, FilterValue};

/// Value carried by an [`Entry`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    /// The parsed value of a single parameter.
    Single(FilterValue),
    /// Values of a merged group, keyed by member name.
    Group(IndexMap<String, EntryValue>),
}

impl EntryValue {
    /// The single value, if this is not a group.
    pub fn as_single(&self) -> Option<&FilterValue> {
        match self {
            Self::Single(value) => Some(value),
            Self::Group(_) => None,
        }
    }

    /// The member values, if this is a group.
    pub fn as_group(&self) -> Option<&IndexMap<String, EntryValue>> {
        match self {
            Self::Single(_) => None,
            Self::Group(members) => Some(members),
        }
    }
}

impl From<FilterValue> for EntryValue {
    fn from(value: FilterValue) -> Self {
        Self::Single(value)
    }
}

/// What a parameter contributes to the collection.
///
/// `expression: None` means "no contribution": the entry never touches the
/// collection but its value is still visible to constraints. This is distinct
/// from `Some(Expr::Empty)`, an explicit expression that filters nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Group the entry is combined in.
    pub group: String,
    /// Computed columns to register before the expression is applied.
    pub aliases: Option<IndexMap<String, Computed>>,
    /// Parsed value.
    pub value: EntryValue,
    /// Expression, or `None` for no contribution.
    pub expression: Option<Expr>,
}

impl Entry {
    /// Entry with an expression.
    pub fn new(group: impl Into<String>, value: impl Into<EntryValue>, expression: Expr) -> Self {
        Self {
            group: group.into(),
            aliases: None,
            value: value.into(),
            expression: Some(expression),
        }
    }

    /// Entry that contributes no expression.
    pub fn noop(group: impl Into<String>, value: impl Into<EntryValue>) -> Self {
        Self {
            group: group.into(),
            aliases: None,
            value: value.into(),
            expression: None,
        }
    }

    /// Attach aliases.
    pub fn with_aliases(mut self, aliases: IndexMap<String, Computed>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Check whether this entry contributes no expression.
    pub fn is_noop(&self) -> bool {
        self.expression.is_none()
    }

    /// Register the aliases, then apply the expression.
    pub fn apply<C: Collection>(&self, collection: C) -> C {
        let Some(expression) = &self.expression else {
            return collection;
        };
        let collection = match &self.aliases {
            Some(aliases) if !aliases.is_empty() => collection.alias(aliases.clone()),
            _ => collection,
        };
        collection.filter(expression.clone())
    }
}

/// Entries keyed by dotted parameter name.
pub type Entries = IndexMap<String, Entry>;

/// Entries partitioned by group name.
pub type Groups = IndexMap<String, Entries>;

/// Value of a parameter as seen by constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// The parameter parsed successfully.
    Valid(EntryValue),
    /// The parameter was supplied but failed validation.
    Invalid,
}

impl ParamValue {
    /// The parsed single value, if any.
    pub fn as_value(&self) -> Option<&FilterValue> {
        match self {
            Self::Valid(value) => value.as_single(),
            Self::Invalid => None,
        }
    }

    /// Check whether the parameter failed validation.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }
}

/// Every provided parameter, keyed by dotted name.
pub type Values = IndexMap<String, ParamValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_query::QuerySet;

    #[test]
    fn test_noop_entry_leaves_collection_untouched() {
        let entry = Entry::noop("chain", FilterValue::from(1));
        let qs = entry.apply(QuerySet::new("users"));
        assert!(qs.is_unfiltered());
    }

    #[test]
    fn test_aliases_registered_before_filter() {
        let mut aliases = IndexMap::new();
        aliases.insert("name_len".to_string(), Computed::length("name"));
        let entry = Entry::new("chain", FilterValue::from(3), Expr::lookup("name_len", "gt", 3))
            .with_aliases(aliases);

        let qs = entry.apply(QuerySet::new("users"));
        assert!(qs.aliases().contains_key("name_len"));
        assert_eq!(qs.to_sql().0, "SELECT * FROM users WHERE (LENGTH(name) > $1)");
    }

    #[test]
    fn test_empty_expression_is_still_applied() {
        let entry = Entry::new("chain", FilterValue::from(1), Expr::Empty);
        let qs = entry.apply(QuerySet::new("users"));
        assert_eq!(qs.filters(), &[Expr::Empty]);
    }
}
