//! Composable query conditions.
//!
//! An [`Expr`] is a boolean condition over a collection. Leaves compare a
//! Django-style path (`created__date__gte`) against a value; branches join
//! children with AND / OR or negate them. Templates are expressions built
//! from [`Expr::Placeholder`] leaves that are filled with a value later.
//!
//! ```rust
//! use sieve_query::{Expr, FilterValue};
//!
//! let template = Expr::placeholder("username").or_else(Expr::placeholder("email"));
//! let filled = template.fill(&FilterValue::from("kate")).unwrap();
//!
//! assert_eq!(
//!     filled,
//!     Expr::Or(vec![
//!         Expr::condition("username", "kate"),
//!         Expr::condition("email", "kate"),
//!     ])
//! );
//! ```

use indexmap::IndexMap;
use thiserror::Error;

use crate::computed::{Computed, column_name};
use crate::lookup::{LookupPath, Operator};
use crate::value::FilterValue;

/// Error raised while filling a template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// A template leaf already carried a value.
    #[error(
        "templates should not specify values, got {path}={value}, expected a placeholder for `{path}`. \
         If you would like to do more complex queries, use a method filter."
    )]
    ValueInTemplate {
        /// Path of the offending leaf.
        path: String,
        /// The value it carried.
        value: FilterValue,
    },
}

/// A boolean condition over a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expr {
    /// Matches everything.
    #[default]
    Empty,
    /// Template leaf naming a path but no value.
    Placeholder(String),
    /// Leaf comparing a path against a value.
    Condition {
        /// `field__transform__operator` path.
        path: String,
        /// Right-hand side.
        value: FilterValue,
    },
    /// Logical AND of the children.
    And(Vec<Expr>),
    /// Logical OR of the children.
    Or(Vec<Expr>),
    /// Logical NOT.
    Not(Box<Expr>),
}

/// Join a field and a lookup suffix into a single path.
pub fn join_lookup(field: &str, lookup: &str) -> String {
    if lookup.is_empty() {
        field.to_string()
    } else {
        format!("{}__{}", field, lookup)
    }
}

impl Expr {
    /// Leaf condition on a full path.
    pub fn condition(path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Condition {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Leaf condition built from a field and a lookup suffix.
    pub fn lookup(field: &str, lookup: &str, value: impl Into<FilterValue>) -> Self {
        Self::condition(join_lookup(field, lookup), value)
    }

    /// Template leaf.
    pub fn placeholder(path: impl Into<String>) -> Self {
        Self::Placeholder(path.into())
    }

    /// Check if this expression matches everything.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Create an AND expression.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let mut exprs: Vec<_> = exprs.into_iter().filter(|e| !e.is_empty()).collect();
        match exprs.len() {
            0 => Self::Empty,
            1 => exprs.remove(0),
            _ => Self::And(exprs),
        }
    }

    /// Create an OR expression.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let mut exprs: Vec<_> = exprs.into_iter().filter(|e| !e.is_empty()).collect();
        match exprs.len() {
            0 => Self::Empty,
            1 => exprs.remove(0),
            _ => Self::Or(exprs),
        }
    }

    /// Negate an expression.
    pub fn negate(expr: Expr) -> Self {
        if expr.is_empty() {
            return Self::Empty;
        }
        Self::Not(Box::new(expr))
    }

    /// Combine with another expression using AND.
    pub fn and_then(self, other: Expr) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        match self {
            Self::And(mut exprs) => {
                exprs.push(other);
                Self::And(exprs)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Combine with another expression using OR.
    pub fn or_else(self, other: Expr) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        match self {
            Self::Or(mut exprs) => {
                exprs.push(other);
                Self::Or(exprs)
            }
            _ => Self::Or(vec![self, other]),
        }
    }

    /// Check whether any leaf carries a value.
    pub fn has_values(&self) -> bool {
        match self {
            Self::Empty | Self::Placeholder(_) => false,
            Self::Condition { .. } => true,
            Self::And(children) | Self::Or(children) => children.iter().any(Expr::has_values),
            Self::Not(inner) => inner.has_values(),
        }
    }

    /// Substitute `value` into every placeholder, keeping connectors and negation.
    pub fn fill(&self, value: &FilterValue) -> Result<Expr, TemplateError> {
        match self {
            Self::Empty => Ok(Self::Empty),
            Self::Placeholder(path) => Ok(Self::condition(path.clone(), value.clone())),
            Self::Condition { path, value } => Err(TemplateError::ValueInTemplate {
                path: path.clone(),
                value: value.clone(),
            }),
            Self::And(children) => Ok(Self::And(
                children.iter().map(|c| c.fill(value)).collect::<Result<_, _>>()?,
            )),
            Self::Or(children) => Ok(Self::Or(
                children.iter().map(|c| c.fill(value)).collect::<Result<_, _>>()?,
            )),
            Self::Not(inner) => Ok(Self::Not(Box::new(inner.fill(value)?))),
        }
    }

    /// Generate SQL for this expression, inlining any referenced aliases.
    /// Returns (sql, params) where params are the values to bind.
    pub fn to_sql(&self, aliases: &IndexMap<String, Computed>) -> (String, Vec<FilterValue>) {
        let mut params = Vec::new();
        let sql = self.to_sql_with_params(aliases, &mut params);
        (sql, params)
    }

    pub(crate) fn to_sql_with_params(
        &self,
        aliases: &IndexMap<String, Computed>,
        params: &mut Vec<FilterValue>,
    ) -> String {
        match self {
            Self::Empty => "TRUE".to_string(),
            Self::Placeholder(path) => format!("{} = ?", column_name(path)),
            Self::Condition { path, value } => condition_sql(path, value, aliases, params),
            Self::And(exprs) => {
                if exprs.is_empty() {
                    return "TRUE".to_string();
                }
                let parts: Vec<_> = exprs
                    .iter()
                    .map(|e| e.to_sql_with_params(aliases, params))
                    .collect();
                format!("({})", parts.join(" AND "))
            }
            Self::Or(exprs) => {
                if exprs.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<_> = exprs
                    .iter()
                    .map(|e| e.to_sql_with_params(aliases, params))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            Self::Not(inner) => format!("NOT ({})", inner.to_sql_with_params(aliases, params)),
        }
    }
}

fn bind(params: &mut Vec<FilterValue>, value: FilterValue) -> String {
    params.push(value);
    format!("${}", params.len())
}

fn like(value: &FilterValue, prefix: &str, suffix: &str) -> FilterValue {
    match value {
        FilterValue::String(s) => FilterValue::String(format!("{}{}{}", prefix, s, suffix)),
        other => other.clone(),
    }
}

fn condition_sql(
    path: &str,
    value: &FilterValue,
    aliases: &IndexMap<String, Computed>,
    params: &mut Vec<FilterValue>,
) -> String {
    let lookup = LookupPath::parse(path, "");
    let mut column = match lookup.path.as_slice() {
        [head] if aliases.contains_key(head) => aliases[head].to_sql(params),
        _ => lookup.path.join("."),
    };
    for transform in &lookup.transforms {
        column = transform.apply(&column);
    }

    match lookup.operator {
        Operator::Exact if value.is_null() => format!("{} IS NULL", column),
        Operator::Exact => format!("{} = {}", column, bind(params, value.clone())),
        Operator::IExact => format!("LOWER({}) = LOWER({})", column, bind(params, value.clone())),
        Operator::Contains => format!("{} LIKE {}", column, bind(params, like(value, "%", "%"))),
        Operator::IContains => format!("{} ILIKE {}", column, bind(params, like(value, "%", "%"))),
        Operator::StartsWith => format!("{} LIKE {}", column, bind(params, like(value, "", "%"))),
        Operator::IStartsWith => {
            format!("{} ILIKE {}", column, bind(params, like(value, "", "%")))
        }
        Operator::EndsWith => format!("{} LIKE {}", column, bind(params, like(value, "%", ""))),
        Operator::IEndsWith => format!("{} ILIKE {}", column, bind(params, like(value, "%", ""))),
        Operator::Gt => format!("{} > {}", column, bind(params, value.clone())),
        Operator::Gte => format!("{} >= {}", column, bind(params, value.clone())),
        Operator::Lt => format!("{} < {}", column, bind(params, value.clone())),
        Operator::Lte => format!("{} <= {}", column, bind(params, value.clone())),
        Operator::IsNull => match value {
            FilterValue::Bool(false) => format!("{} IS NOT NULL", column),
            _ => format!("{} IS NULL", column),
        },
        Operator::In => match value {
            FilterValue::List(values) if values.is_empty() => "FALSE".to_string(),
            FilterValue::List(values) => {
                let placeholders: Vec<_> =
                    values.iter().map(|v| bind(params, v.clone())).collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            other => format!("{} IN ({})", column, bind(params, other.clone())),
        },
        Operator::Range => match value {
            FilterValue::List(bounds) if bounds.len() == 2 => {
                let low = bind(params, bounds[0].clone());
                let high = bind(params, bounds[1].clone());
                format!("{} BETWEEN {} AND {}", column, low, high)
            }
            _ => "FALSE".to_string(),
        },
    }
}
