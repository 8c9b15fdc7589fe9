//! Error types for declaring and resolving filter sets.
//!
//! Three families of failure exist, and they never mix:
//!
//! - [`ConstructionError`]: a filter set was declared incorrectly. Raised once,
//!   by [`FilterSetBuilder::build`](crate::FilterSetBuilder::build).
//! - [`ValidationError`]: user input was rejected by a value field or a
//!   constraint. Collected per parameter into an [`ErrorReport`].
//! - [`ResolutionError`]: a declared parameter has no value field at all. This
//!   is a declaration defect and stops the request immediately.
//!
//! ```rust
//! use sieve_filters::{ErrorCode, ErrorDetail, ErrorMap, merge_errors};
//!
//! let mut errors = ErrorMap::new();
//! errors.insert("age".into(), vec![ErrorDetail::new("A valid integer is required.", ErrorCode::Invalid)]);
//!
//! let mut more = ErrorMap::new();
//! more.insert("age".into(), vec![ErrorDetail::new("Too old.", ErrorCode::Invalid)]);
//! merge_errors(&mut errors, more);
//!
//! assert_eq!(errors["age"].len(), 2);
//! ```

use std::fmt;

use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Serialize;
use sieve_query::TemplateError;
use thiserror::Error;

/// Result type for request resolution.
pub type FilterResult<T> = Result<T, FilterError>;

/// Machine-readable short codes attached to every error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A required parameter was not supplied.
    Required,
    /// The value could not be parsed, or a rule rejected it.
    Invalid,
    /// An empty string was supplied where one is not allowed.
    Blank,
    /// The raw value contained a NUL character.
    NullCharactersNotAllowed,
    /// String or list is too long.
    MaxLength,
    /// String or list is too short.
    MinLength,
    /// Number is too large.
    MaxValue,
    /// Number is too small.
    MinValue,
    /// Value is not one of the declared choices.
    InvalidChoice,
    /// A list was empty where one is not allowed.
    Empty,
}

impl ErrorCode {
    /// Short code string (e.g. `"required"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Invalid => "invalid",
            Self::Blank => "blank",
            Self::NullCharactersNotAllowed => "null_characters_not_allowed",
            Self::MaxLength => "max_length",
            Self::MinLength => "min_length",
            Self::MaxValue => "max_value",
            Self::MinValue => "min_value",
            Self::InvalidChoice => "invalid_choice",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single human-readable message with its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Message shown to the client.
    pub message: String,
    /// Short code.
    pub code: ErrorCode,
}

impl ErrorDetail {
    /// Create a detail.
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Create a detail with the `invalid` code.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::Invalid)
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered mapping of parameter name (or the non-field key) to its errors.
pub type ErrorMap = IndexMap<String, Vec<ErrorDetail>>;

/// Merge `errors` into `target`.
///
/// Lists under the same key are concatenated in encounter order; new keys are
/// appended after existing ones.
pub fn merge_errors(target: &mut ErrorMap, errors: ErrorMap) {
    for (key, details) in errors {
        target.entry(key).or_default().extend(details);
    }
}

/// Rejection raised by a value field or a constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Messages not tied to a particular key.
    #[error("{}", join_details(.0))]
    Messages(Vec<ErrorDetail>),
    /// Messages keyed by field.
    #[error("{}", join_map(.0))]
    Fields(ErrorMap),
}

fn join_details(details: &[ErrorDetail]) -> String {
    details
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_map(map: &ErrorMap) -> String {
    map.iter()
        .map(|(key, details)| format!("{}: {}", key, join_details(details)))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Single message with a code.
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Messages(vec![ErrorDetail::new(message, code)])
    }

    /// Single message with the `invalid` code.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::Invalid)
    }

    /// Several messages.
    pub fn messages(messages: impl IntoIterator<Item = ErrorDetail>) -> Self {
        Self::Messages(messages.into_iter().collect())
    }

    /// Messages keyed by field.
    pub fn fields(map: ErrorMap) -> Self {
        Self::Fields(map)
    }

    /// Normalise into a keyed map, filing plain messages under `key`.
    pub fn into_map(self, key: &str) -> ErrorMap {
        match self {
            Self::Messages(details) => {
                let mut map = ErrorMap::new();
                map.insert(key.to_string(), details);
                map
            }
            Self::Fields(map) => map,
        }
    }

    /// Normalise errors raised for `param`, prefixing nested keys with it.
    pub fn into_param_map(self, param: &str) -> ErrorMap {
        match self {
            Self::Messages(_) => self.into_map(param),
            Self::Fields(map) => map
                .into_iter()
                .map(|(key, details)| (format!("{}.{}", param, key), details))
                .collect(),
        }
    }
}

/// Defect in a filter set declaration.
#[derive(Error, Debug, Diagnostic)]
pub enum ConstructionError {
    /// Group name is not a dotted identifier.
    #[error("group names must be valid identifiers, got `{group}`")]
    #[diagnostic(code(sieve::filter::invalid_group))]
    InvalidGroup {
        /// The rejected group.
        group: String,
    },

    /// The reserved group was used as a namespace.
    #[error("reserved group `chain` cannot be used as namespace, got `{group}`")]
    #[diagnostic(code(sieve::filter::reserved_group))]
    ReservedGroup {
        /// The rejected group.
        group: String,
    },

    /// Both `template` and `lookup` were set.
    #[error("`template` and `lookup` cannot be used together on `{param}`")]
    #[diagnostic(
        code(sieve::filter::template_with_lookup),
        help("add the lookup to the template instead, for example Expr::placeholder(\"username__icontains\")")
    )]
    TemplateWithLookup {
        /// Offending parameter.
        param: String,
    },

    /// Both `template` and a target field were set.
    #[error("`template` and `target` cannot be used together on `{param}`")]
    #[diagnostic(code(sieve::filter::template_with_target))]
    TemplateWithTarget {
        /// Offending parameter.
        param: String,
    },

    /// Both `negate` and `method` were set.
    #[error("`method` and `negate` cannot be used together on `{param}`")]
    #[diagnostic(
        code(sieve::filter::negate_with_method),
        help("negate the expression in your method instead")
    )]
    NegateWithMethod {
        /// Offending parameter.
        param: String,
    },

    /// A template leaf carried a value.
    #[error("invalid template on `{param}`")]
    #[diagnostic(code(sieve::filter::template_with_values))]
    TemplateWithValues {
        /// Offending parameter.
        param: String,
        /// The underlying template error.
        #[source]
        source: TemplateError,
    },

    /// A namespace filter was declared without children.
    #[error("namespace filter `{param}` is required to have child filters")]
    #[diagnostic(code(sieve::filter::empty_namespace))]
    EmptyNamespace {
        /// Offending parameter.
        param: String,
    },

    /// A child filter had neither `param` nor `lookup`.
    #[error("either `param` or `lookup` needs to be specified for child filters of `{parent}`")]
    #[diagnostic(code(sieve::filter::missing_param))]
    MissingParam {
        /// Dotted name of the parent.
        parent: String,
    },

    /// Two filters share a declared name or a dotted parameter name.
    #[error("filter `{name}` is declared more than once")]
    #[diagnostic(code(sieve::filterset::duplicate))]
    DuplicateFilter {
        /// The repeated name.
        name: String,
    },

    /// The `fields` allow-list names parameters that do not exist.
    #[error("the following fields are not valid: {fields}, available fields: {available}")]
    #[diagnostic(code(sieve::filterset::unknown_fields))]
    UnknownFields {
        /// Quoted, comma separated unknown names.
        fields: String,
        /// Quoted, comma separated available names.
        available: String,
    },

    /// A filter or constraint refers to a method that was never registered.
    #[error("method `{method}` used by `{used_by}` is not registered")]
    #[diagnostic(code(sieve::filterset::unknown_method))]
    UnknownMethod {
        /// Method key.
        method: String,
        /// Parameter or constraint using it.
        used_by: String,
    },

    /// A constraint was configured incorrectly.
    #[error("invalid constraint `{constraint}`: {message}")]
    #[diagnostic(code(sieve::constraint::invalid))]
    InvalidConstraint {
        /// Constraint type name.
        constraint: &'static str,
        /// What is wrong.
        message: String,
    },
}

/// A parameter whose value field cannot be determined.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// Neither the declaration chain nor the dynamic hook supplied a field.
    #[error("value field could not be resolved for `{param}`")]
    UnresolvedField {
        /// Dotted parameter name.
        param: String,
    },

    /// A filter or request-time constraint refers to a method that is not registered.
    #[error("method `{method}` used by `{param}` is not registered")]
    UnknownMethod {
        /// Method key.
        method: String,
        /// Dotted parameter name, or the constraint name.
        param: String,
    },

    /// Template filling failed at request time.
    #[error("template for `{param}` could not be filled")]
    Template {
        /// Dotted parameter name.
        param: String,
        /// The underlying template error.
        #[source]
        source: TemplateError,
    },
}

/// Failure to resolve a single parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryError {
    /// The value was rejected; collected with the other errors.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The declaration is broken; stops the request.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Aggregated validation failures for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ErrorReport(ErrorMap);

impl ErrorReport {
    /// Wrap an error map.
    pub fn new(errors: ErrorMap) -> Self {
        Self(errors)
    }

    /// Errors recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&[ErrorDetail]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Keys in encounter order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of keys with errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no error was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn errors(&self) -> &ErrorMap {
        &self.0
    }

    /// Take the underlying map.
    pub fn into_inner(self) -> ErrorMap {
        self.0
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", join_map(&self.0))
    }
}

/// Outcome of a failed request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// One or more parameters, constraints or unknown keys were rejected.
    #[error("query parameters failed validation: {0}")]
    Validation(ErrorReport),

    /// A declaration defect surfaced while resolving.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl FilterError {
    /// The validation report, if this is a validation failure.
    pub fn report(&self) -> Option<&ErrorReport> {
        match self {
            Self::Validation(report) => Some(report),
            Self::Resolution(_) => None,
        }
    }

    /// Check if this is a declaration defect rather than bad input.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(messages: &[&str]) -> Vec<ErrorDetail> {
        messages.iter().map(|m| ErrorDetail::invalid(*m)).collect()
    }

    #[test]
    fn test_merge_concatenates_lists() {
        let mut source = ErrorMap::new();
        source.insert("non_field_errors".into(), details(&["some error"]));
        let mut other = ErrorMap::new();
        other.insert("non_field_errors".into(), details(&["some other error"]));
        other.insert("field2".into(), details(&["another"]));

        merge_errors(&mut source, other);

        assert_eq!(source["non_field_errors"], details(&["some error", "some other error"]));
        assert_eq!(source.keys().collect::<Vec<_>>(), vec!["non_field_errors", "field2"]);
    }

    #[test]
    fn test_into_map_normalizes_messages() {
        let map = ValidationError::invalid("something went wrong").into_map("non_field_errors");
        assert_eq!(map["non_field_errors"], details(&["something went wrong"]));

        let mut keyed = ErrorMap::new();
        keyed.insert("custom".into(), details(&["something went wrong"]));
        let map = ValidationError::fields(keyed.clone()).into_map("non_field_errors");
        assert_eq!(map, keyed);
    }

    #[test]
    fn test_param_map_prefixes_nested_keys() {
        let mut keyed = ErrorMap::new();
        keyed.insert("start".into(), details(&["bad"]));
        let map = ValidationError::fields(keyed).into_param_map("range");
        assert!(map.contains_key("range.start"));
    }

    #[test]
    fn test_error_code_serializes_as_snake_case() {
        let detail = ErrorDetail::new("x", ErrorCode::NullCharactersNotAllowed);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["code"], "null_characters_not_allowed");
        assert_eq!(ErrorCode::NullCharactersNotAllowed.as_str(), "null_characters_not_allowed");
    }

    #[test]
    fn test_construction_error_message() {
        let err = ConstructionError::InvalidGroup {
            group: "not-valid".into(),
        };
        assert!(err.to_string().contains("valid identifiers"));
    }
}
