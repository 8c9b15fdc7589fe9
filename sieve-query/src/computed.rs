//! Computed column expressions used as filter targets and aliases.

use crate::value::FilterValue;

/// An expression evaluated per row, registered on a collection under an alias.
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    /// Reference to a column (`__` separates relation hops).
    Field(String),
    /// Literal value.
    Value(FilterValue),
    /// `LENGTH(expr)`
    Length(Box<Computed>),
    /// `LOWER(expr)`
    Lower(Box<Computed>),
    /// `UPPER(expr)`
    Upper(Box<Computed>),
    /// `CONCAT(a, b, ...)`
    Concat(Vec<Computed>),
}

impl Computed {
    /// Reference a column.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Wrap a literal.
    pub fn value(value: impl Into<FilterValue>) -> Self {
        Self::Value(value.into())
    }

    /// Length of a column.
    pub fn length(name: impl Into<String>) -> Self {
        Self::Length(Box::new(Self::field(name)))
    }

    /// Lowercased column.
    pub fn lower(name: impl Into<String>) -> Self {
        Self::Lower(Box::new(Self::field(name)))
    }

    /// Uppercased column.
    pub fn upper(name: impl Into<String>) -> Self {
        Self::Upper(Box::new(Self::field(name)))
    }

    /// Concatenate expressions.
    pub fn concat(parts: impl IntoIterator<Item = Computed>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    /// Render as SQL, binding literals into `params`.
    pub fn to_sql(&self, params: &mut Vec<FilterValue>) -> String {
        match self {
            Self::Field(name) => column_name(name),
            Self::Value(value) => {
                params.push(value.clone());
                format!("${}", params.len())
            }
            Self::Length(inner) => format!("LENGTH({})", inner.to_sql(params)),
            Self::Lower(inner) => format!("LOWER({})", inner.to_sql(params)),
            Self::Upper(inner) => format!("UPPER({})", inner.to_sql(params)),
            Self::Concat(parts) => {
                let parts: Vec<_> = parts.iter().map(|p| p.to_sql(params)).collect();
                format!("CONCAT({})", parts.join(", "))
            }
        }
    }
}

/// Render a `__`-separated path as a dotted column reference.
pub(crate) fn column_name(path: &str) -> String {
    path.split("__").collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_to_sql() {
        let mut params = Vec::new();
        let expr = Computed::concat([Computed::value("user"), Computed::field("username")]);
        assert_eq!(expr.to_sql(&mut params), "CONCAT($1, username)");
        assert_eq!(params, vec![FilterValue::from("user")]);
    }

    #[test]
    fn test_relation_column_name() {
        let mut params = Vec::new();
        assert_eq!(
            Computed::length("company__name").to_sql(&mut params),
            "LENGTH(company.name)"
        );
    }
}
