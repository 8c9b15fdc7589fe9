//! Cross-parameter rules checked after every parameter is resolved.
//!
//! Presence means "the key is in the values map": a parameter that was
//! supplied but failed validation is present (as [`ParamValue::Invalid`]),
//! one that was never supplied is not.
//!
//! [`ParamValue::Invalid`]: crate::entry::ParamValue::Invalid
//!
//! ```rust
//! use sieve_filters::{Filter, FilterSet, QueryParams, RequestContext};
//! use sieve_filters::constraints::MutuallyExclusive;
//! use sieve_filters::field::CharField;
//! use sieve_query::QuerySet;
//!
//! let filterset = FilterSet::builder("Users")
//!     .filter("username", Filter::of(CharField::new()))
//!     .filter("email", Filter::of(CharField::new()))
//!     .constraint(MutuallyExclusive::new(["username", "email"]).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let params = QueryParams::parse("username=a&email=b");
//! let err = filterset
//!     .filter_queryset(&params, RequestContext::new(), QuerySet::new("users"))
//!     .unwrap_err();
//! assert!(err.report().unwrap().get("non_field_errors").is_some());
//! ```

use std::fmt;

use indexmap::IndexMap;

use crate::entry::Values;
use crate::error::{ConstructionError, ErrorDetail, ErrorMap, ValidationError};
use crate::hooks::{DefaultHooks, Hooks};
use crate::scope::Scope;

/// A rule over the values of all provided parameters.
///
/// The scope is only borrowed for the duration of [`check`](Constraint::check).
pub trait Constraint<H: Hooks = DefaultHooks>: fmt::Debug + Send + Sync {
    /// Name used in the default failure message.
    fn name(&self) -> &'static str;

    /// Fail with a message, a list of messages or keyed messages.
    fn check(&self, scope: &Scope<'_, H>, values: &Values) -> Result<(), ValidationError>;

    /// Constraint methods that must be registered on the filter set.
    fn required_methods(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Message used when a constraint carries a custom message.
fn custom_failure(message: &str) -> ValidationError {
    ValidationError::invalid(message)
}

/// Generic failure message for a constraint.
pub fn default_message(name: &str) -> String {
    format!("Request failed to meet constraint: {}", name)
}

fn quoted<'a>(fields: impl IntoIterator<Item = &'a String>) -> String {
    fields
        .into_iter()
        .map(|field| format!("\"{}\"", field))
        .collect::<Vec<_>>()
        .join(", ")
}

fn at_least_two(
    constraint: &'static str,
    fields: Vec<String>,
) -> Result<Vec<String>, ConstructionError> {
    if fields.len() < 2 {
        return Err(ConstructionError::InvalidConstraint {
            constraint,
            message: "provide 2 or more fields for this constraint".to_string(),
        });
    }
    Ok(fields)
}

fn collect<I, S>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(Into::into).collect()
}

/// At most one of the fields may be provided.
#[derive(Debug, Clone)]
pub struct MutuallyExclusive {
    fields: Vec<String>,
    message: Option<String>,
}

impl MutuallyExclusive {
    /// Create the constraint; needs at least two fields.
    pub fn new<I, S>(fields: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            fields: at_least_two("MutuallyExclusive", collect(fields))?,
            message: None,
        })
    }

    /// Replace the failure message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<H: Hooks> Constraint<H> for MutuallyExclusive {
    fn name(&self) -> &'static str {
        "MutuallyExclusive"
    }

    fn check(&self, _scope: &Scope<'_, H>, values: &Values) -> Result<(), ValidationError> {
        let present: Vec<&String> = self.fields.iter().filter(|f| values.contains_key(*f)).collect();
        if present.len() <= 1 {
            return Ok(());
        }
        Err(match &self.message {
            Some(message) => custom_failure(message),
            None => ValidationError::invalid(format!(
                "The following fields are mutually exclusive, you may only provide one of them: {}",
                quoted(present)
            )),
        })
    }
}

/// Either all of the fields are provided or none.
#[derive(Debug, Clone)]
pub struct MutuallyInclusive {
    fields: Vec<String>,
    message: Option<String>,
}

impl MutuallyInclusive {
    /// Create the constraint; needs at least two fields.
    pub fn new<I, S>(fields: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            fields: at_least_two("MutuallyInclusive", collect(fields))?,
            message: None,
        })
    }

    /// Replace the failure message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<H: Hooks> Constraint<H> for MutuallyInclusive {
    fn name(&self) -> &'static str {
        "MutuallyInclusive"
    }

    fn check(&self, _scope: &Scope<'_, H>, values: &Values) -> Result<(), ValidationError> {
        let present = self.fields.iter().filter(|f| values.contains_key(*f)).count();
        if present == 0 || present == self.fields.len() {
            return Ok(());
        }
        Err(match &self.message {
            Some(message) => custom_failure(message),
            None => ValidationError::invalid(format!(
                "The following fields are mutually inclusive, you must provide them all at once \
                 or none of them: {}",
                quoted(&self.fields)
            )),
        })
    }
}

/// Delegates to a constraint method registered on the filter set.
#[derive(Debug, Clone)]
pub struct MethodConstraint {
    method: String,
}

impl MethodConstraint {
    /// Use the constraint method registered as `method`.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }
}

impl<H: Hooks> Constraint<H> for MethodConstraint {
    fn name(&self) -> &'static str {
        "MethodConstraint"
    }

    fn check(&self, scope: &Scope<'_, H>, values: &Values) -> Result<(), ValidationError> {
        scope.call_constraint_method(&self.method, values)
    }

    fn required_methods(&self) -> Vec<&str> {
        vec![self.method.as_str()]
    }
}

/// Each provided field requires all of `depends_on`.
#[derive(Debug, Clone)]
pub struct Dependency {
    fields: Vec<String>,
    depends_on: Vec<String>,
    message: Option<String>,
}

impl Dependency {
    /// `fields` each require every name in `depends_on`.
    pub fn new<I, S, J, T>(fields: I, depends_on: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            fields: collect(fields),
            depends_on: collect(depends_on),
            message: None,
        }
    }

    /// Replace the failure message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<H: Hooks> Constraint<H> for Dependency {
    fn name(&self) -> &'static str {
        "Dependency"
    }

    fn check(&self, _scope: &Scope<'_, H>, values: &Values) -> Result<(), ValidationError> {
        let mut missing: IndexMap<&String, Vec<&String>> = IndexMap::new();
        for field in self.fields.iter().filter(|f| values.contains_key(*f)) {
            for dependency in &self.depends_on {
                if !values.contains_key(dependency) {
                    missing.entry(field).or_default().push(dependency);
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        if let Some(message) = &self.message {
            return Err(custom_failure(message));
        }

        let mut errors = ErrorMap::new();
        for (field, dependencies) in missing {
            let noun = if dependencies.len() == 1 {
                "parameter"
            } else {
                "parameters"
            };
            errors.insert(
                field.clone(),
                vec![ErrorDetail::invalid(format!(
                    "This query parameter also requires the following {} to be present: {}",
                    noun,
                    quoted(dependencies)
                ))],
            );
        }
        Err(ValidationError::fields(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryValue, ParamValue};
    use crate::filterset::FilterSet;
    use crate::params::{QueryParams, RequestContext};
    use crate::settings::Settings;
    use pretty_assertions::assert_eq;
    use sieve_query::FilterValue;

    fn values(keys: &[&str]) -> Values {
        keys.iter()
            .map(|k| {
                (
                    k.to_string(),
                    ParamValue::Valid(EntryValue::Single(FilterValue::Int(1))),
                )
            })
            .collect()
    }

    fn check(constraint: &dyn Constraint, values: &Values) -> Result<(), ValidationError> {
        let set = FilterSet::builder("Test")
            .settings(Settings::default())
            .build()
            .unwrap();
        let params = QueryParams::new();
        let scope = set.scope(&params, RequestContext::new());
        constraint.check(&scope, values)
    }

    fn messages(err: ValidationError) -> ErrorMap {
        err.into_map("non_field_errors")
    }

    #[test]
    fn test_mutually_exclusive() {
        let c = MutuallyExclusive::new(["a", "b"]).unwrap();
        assert!(check(&c, &values(&["a"])).is_ok());
        assert!(check(&c, &values(&[])).is_ok());

        let errors = messages(check(&c, &values(&["a", "b"])).unwrap_err());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors["non_field_errors"][0].message,
            "The following fields are mutually exclusive, you may only provide one of them: \"a\", \"b\""
        );
    }

    #[test]
    fn test_mutually_exclusive_lists_only_present_fields() {
        let c = MutuallyExclusive::new(["a", "b", "c"]).unwrap();
        let errors = messages(check(&c, &values(&["a", "c"])).unwrap_err());
        assert!(errors["non_field_errors"][0].message.ends_with("\"a\", \"c\""));
    }

    #[test]
    fn test_invalid_value_counts_as_present() {
        let c = MutuallyExclusive::new(["a", "b"]).unwrap();
        let mut vals = values(&["a"]);
        vals.insert("b".into(), ParamValue::Invalid);
        assert!(check(&c, &vals).is_err());
    }

    #[test]
    fn test_needs_two_fields() {
        assert!(MutuallyExclusive::new(["a"]).is_err());
        assert!(MutuallyInclusive::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_mutually_inclusive() {
        let c = MutuallyInclusive::new(["a", "b"]).unwrap();
        assert!(check(&c, &values(&[])).is_ok());
        assert!(check(&c, &values(&["a", "b"])).is_ok());
        let errors = messages(check(&c, &values(&["b"])).unwrap_err());
        assert_eq!(
            errors["non_field_errors"][0].message,
            "The following fields are mutually inclusive, you must provide them all at once or \
             none of them: \"a\", \"b\""
        );
    }

    #[test]
    fn test_dependency() {
        let c = Dependency::new(["x"], ["y"]);
        assert!(check(&c, &values(&[])).is_ok());
        assert!(check(&c, &values(&["x", "y"])).is_ok());

        let errors = messages(check(&c, &values(&["x"])).unwrap_err());
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(
            errors["x"][0].message,
            "This query parameter also requires the following parameter to be present: \"y\""
        );
    }

    #[test]
    fn test_dependency_plural() {
        let c = Dependency::new(["x", "w"], ["y", "z"]);
        let errors = messages(check(&c, &values(&["x", "w", "z"])).unwrap_err());
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["x", "w"]);

        let errors = messages(check(&c, &values(&["x"])).unwrap_err());
        assert_eq!(
            errors["x"][0].message,
            "This query parameter also requires the following parameters to be present: \"y\", \"z\""
        );
    }

    #[test]
    fn test_custom_message() {
        let c = Dependency::new(["x"], ["y"]).message("Need y.");
        let errors = messages(check(&c, &values(&["x"])).unwrap_err());
        assert_eq!(errors["non_field_errors"][0].message, "Need y.");
    }
}
