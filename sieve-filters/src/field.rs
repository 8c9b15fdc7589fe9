//! Value fields: parse a raw query string value into a typed [`FilterValue`].
//!
//! Every field implements [`ValueField`]. The provided implementation of
//! [`ValueField::run_validation`] handles a missing parameter uniformly:
//!
//! | raw value | required | default | outcome |
//! |-----------|----------|---------|---------|
//! | missing   | yes      | -       | `required` error |
//! | missing   | no       | set     | the default |
//! | missing   | no       | unset   | [`Validated::Absent`] |
//! | present   | -        | -       | [`ValueField::to_value`] |
//!
//! ```rust
//! use sieve_filters::field::{IntegerField, Validated, ValueField};
//! use sieve_query::FilterValue;
//!
//! let field = IntegerField::new().min_value(1);
//! assert_eq!(field.run_validation(Some("3")).unwrap(), Validated::Value(FilterValue::Int(3)));
//! assert_eq!(field.run_validation(None).unwrap(), Validated::Absent);
//! assert!(field.run_validation(Some("0")).is_err());
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use sieve_query::FilterValue;

use crate::error::{ErrorCode, ErrorDetail, ErrorMap, ValidationError};
use crate::params::FieldContext;

/// Outcome of validating a raw value that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    /// A parsed value.
    Value(FilterValue),
    /// The parameter is intentionally absent and contributes nothing.
    Absent,
}

impl Validated {
    /// The parsed value, if any.
    pub fn into_value(self) -> Option<FilterValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Absent => None,
        }
    }
}

/// Options shared by every field.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    /// Fail when the parameter is missing.
    pub required: bool,
    /// Value used when the parameter is missing.
    pub default: Option<FilterValue>,
    /// Description for generated documentation.
    pub help_text: Option<String>,
    /// Request context, only ever set on per-request copies.
    pub context: Option<FieldContext>,
}

/// Parses a raw string into a typed value, or fails with field errors.
pub trait ValueField: fmt::Debug + Send + Sync {
    /// Parse a present raw value.
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError>;

    /// Shared options.
    fn options(&self) -> &FieldOptions;

    /// Shared options, mutably.
    fn options_mut(&mut self) -> &mut FieldOptions;

    /// Copy into a new box.
    fn clone_box(&self) -> Box<dyn ValueField>;

    /// OpenAPI schema fragment for this field.
    fn schema(&self) -> serde_json::Value;

    /// Validate a raw value that may be missing.
    fn run_validation(&self, raw: Option<&str>) -> Result<Validated, ValidationError> {
        match raw {
            Some(raw) => self.to_value(raw).map(Validated::Value),
            None => {
                let options = self.options();
                if options.required {
                    Err(ValidationError::new("This field is required.", ErrorCode::Required))
                } else if let Some(default) = &options.default {
                    Ok(Validated::Value(default.clone()))
                } else {
                    Ok(Validated::Absent)
                }
            }
        }
    }
}

impl Clone for Box<dyn ValueField> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Implements the option accessors and builder setters shared by all fields.
macro_rules! field_options {
    ($ty:ty) => {
        impl $ty {
            /// Fail when the parameter is missing.
            pub fn required(mut self) -> Self {
                self.options.required = true;
                self
            }

            /// Value used when the parameter is missing.
            pub fn default_value(mut self, value: impl Into<FilterValue>) -> Self {
                self.options.default = Some(value.into());
                self
            }

            /// Description for generated documentation.
            pub fn help_text(mut self, text: impl Into<String>) -> Self {
                self.options.help_text = Some(text.into());
                self
            }
        }
    };
}

macro_rules! impl_field_boilerplate {
    () => {
        fn options(&self) -> &FieldOptions {
            &self.options
        }

        fn options_mut(&mut self) -> &mut FieldOptions {
            &mut self.options
        }

        fn clone_box(&self) -> Box<dyn ValueField> {
            Box::new(self.clone())
        }
    };
}

fn with_help(mut schema: serde_json::Value, options: &FieldOptions) -> serde_json::Value {
    if let (Some(text), Some(map)) = (&options.help_text, schema.as_object_mut()) {
        map.insert("description".into(), json!(text));
    }
    if let (Some(default), Some(map)) = (&options.default, schema.as_object_mut()) {
        if let Ok(value) = serde_json::to_value(default) {
            map.insert("default".into(), value);
        }
    }
    schema
}

/// Free text.
#[derive(Debug, Clone)]
pub struct CharField {
    options: FieldOptions,
    allow_blank: bool,
    trim_whitespace: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl Default for CharField {
    fn default() -> Self {
        Self {
            options: FieldOptions::default(),
            allow_blank: false,
            trim_whitespace: true,
            min_length: None,
            max_length: None,
        }
    }
}

field_options!(CharField);

impl CharField {
    /// Create a field rejecting blank strings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the empty string.
    pub fn allow_blank(mut self) -> Self {
        self.allow_blank = true;
        self
    }

    /// Keep leading and trailing whitespace.
    pub fn keep_whitespace(mut self) -> Self {
        self.trim_whitespace = false;
        self
    }

    /// Minimum number of characters.
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Maximum number of characters.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub(crate) fn clean(&self, raw: &str) -> Result<String, ValidationError> {
        if raw.contains('\0') {
            return Err(ValidationError::new(
                "Null characters are not allowed.",
                ErrorCode::NullCharactersNotAllowed,
            ));
        }
        let value = if self.trim_whitespace { raw.trim() } else { raw };
        if value.is_empty() {
            if self.allow_blank {
                return Ok(String::new());
            }
            return Err(ValidationError::new("This field may not be blank.", ErrorCode::Blank));
        }
        let len = value.chars().count();
        if let Some(max) = self.max_length.filter(|max| len > *max) {
            return Err(ValidationError::new(
                format!("Ensure this field has no more than {} characters.", max),
                ErrorCode::MaxLength,
            ));
        }
        if let Some(min) = self.min_length.filter(|min| len < *min) {
            return Err(ValidationError::new(
                format!("Ensure this field has at least {} characters.", min),
                ErrorCode::MinLength,
            ));
        }
        Ok(value.to_string())
    }
}

impl ValueField for CharField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        self.clean(raw).map(FilterValue::String)
    }

    fn schema(&self) -> serde_json::Value {
        let mut schema = json!({ "type": "string" });
        if let Some(min) = self.min_length {
            schema["minLength"] = json!(min);
        }
        if let Some(max) = self.max_length {
            schema["maxLength"] = json!(max);
        }
        with_help(schema, &self.options)
    }

    impl_field_boilerplate!();
}

/// Whole numbers.
#[derive(Debug, Clone, Default)]
pub struct IntegerField {
    options: FieldOptions,
    min_value: Option<i64>,
    max_value: Option<i64>,
}

field_options!(IntegerField);

impl IntegerField {
    /// Create an unbounded field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound.
    pub fn min_value(mut self, value: i64) -> Self {
        self.min_value = Some(value);
        self
    }

    /// Inclusive upper bound.
    pub fn max_value(mut self, value: i64) -> Self {
        self.max_value = Some(value);
        self
    }
}

impl ValueField for IntegerField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        // "10.0" and "10." are accepted as whole numbers
        let trimmed = raw.trim();
        let digits = match trimmed.split_once('.') {
            Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
            _ => trimmed,
        };
        let value: i64 = digits
            .parse()
            .map_err(|_| ValidationError::invalid("A valid integer is required."))?;

        if let Some(max) = self.max_value.filter(|max| value > *max) {
            return Err(ValidationError::new(
                format!("Ensure this value is less than or equal to {}.", max),
                ErrorCode::MaxValue,
            ));
        }
        if let Some(min) = self.min_value.filter(|min| value < *min) {
            return Err(ValidationError::new(
                format!("Ensure this value is greater than or equal to {}.", min),
                ErrorCode::MinValue,
            ));
        }
        Ok(FilterValue::Int(value))
    }

    fn schema(&self) -> serde_json::Value {
        let mut schema = json!({ "type": "integer" });
        if let Some(min) = self.min_value {
            schema["minimum"] = json!(min);
        }
        if let Some(max) = self.max_value {
            schema["maximum"] = json!(max);
        }
        with_help(schema, &self.options)
    }

    impl_field_boilerplate!();
}

/// Floating point numbers.
#[derive(Debug, Clone, Default)]
pub struct FloatField {
    options: FieldOptions,
}

field_options!(FloatField);

impl FloatField {
    /// Create a field.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueField for FloatField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(FilterValue::Float)
            .ok_or_else(|| ValidationError::invalid("A valid number is required."))
    }

    fn schema(&self) -> serde_json::Value {
        with_help(json!({ "type": "number" }), &self.options)
    }

    impl_field_boilerplate!();
}

const TRUE_VALUES: &[&str] = &[
    "t", "T", "y", "Y", "yes", "Yes", "YES", "true", "True", "TRUE", "on", "On", "ON", "1",
];
const FALSE_VALUES: &[&str] = &[
    "f", "F", "n", "N", "no", "No", "NO", "false", "False", "FALSE", "off", "Off", "OFF", "0",
];

/// `true` / `false` and their usual spellings.
#[derive(Debug, Clone, Default)]
pub struct BooleanField {
    options: FieldOptions,
}

field_options!(BooleanField);

impl BooleanField {
    /// Create a field.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueField for BooleanField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        if TRUE_VALUES.contains(&raw) {
            Ok(FilterValue::Bool(true))
        } else if FALSE_VALUES.contains(&raw) {
            Ok(FilterValue::Bool(false))
        } else {
            Err(ValidationError::invalid(format!("\"{}\" is not a valid boolean.", raw)))
        }
    }

    fn schema(&self) -> serde_json::Value {
        with_help(json!({ "type": "boolean" }), &self.options)
    }

    impl_field_boilerplate!();
}

/// One of a fixed set of strings.
#[derive(Debug, Clone, Default)]
pub struct ChoiceField {
    options: FieldOptions,
    choices: Vec<String>,
}

field_options!(ChoiceField);

impl ChoiceField {
    /// Create a field accepting `choices`.
    pub fn new<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: FieldOptions::default(),
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepted values.
    pub fn choices(&self) -> &[String] {
        &self.choices
    }
}

impl ValueField for ChoiceField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        if self.choices.iter().any(|c| c == raw) {
            Ok(FilterValue::String(raw.to_string()))
        } else {
            Err(ValidationError::new(
                format!("\"{}\" is not a valid choice.", raw),
                ErrorCode::InvalidChoice,
            ))
        }
    }

    fn schema(&self) -> serde_json::Value {
        with_help(json!({ "type": "string", "enum": self.choices }), &self.options)
    }

    impl_field_boilerplate!();
}

/// Calendar date in `YYYY-MM-DD` form.
#[derive(Debug, Clone, Default)]
pub struct DateField {
    options: FieldOptions,
}

field_options!(DateField);

impl DateField {
    /// Create a field.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueField for DateField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(FilterValue::Date)
            .map_err(|_| {
                ValidationError::invalid(
                    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                )
            })
    }

    fn schema(&self) -> serde_json::Value {
        with_help(json!({ "type": "string", "format": "date" }), &self.options)
    }

    impl_field_boilerplate!();
}

/// RFC 3339 timestamp, normalised to UTC.
#[derive(Debug, Clone, Default)]
pub struct DateTimeField {
    options: FieldOptions,
}

field_options!(DateTimeField);

impl DateTimeField {
    /// Create a field.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueField for DateTimeField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| FilterValue::DateTime(dt.with_timezone(&Utc)))
            .map_err(|_| {
                ValidationError::invalid(
                    "Datetime has wrong format. Use one of these formats instead: \
                     YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].",
                )
            })
    }

    fn schema(&self) -> serde_json::Value {
        with_help(json!({ "type": "string", "format": "date-time" }), &self.options)
    }

    impl_field_boilerplate!();
}

/// Comma separated list, each item parsed by a child field.
///
/// Items follow CSV quoting, so `"a,b",c` yields two items. Pair with a
/// [`ChoiceField`] child for a multiple-choice parameter.
#[derive(Debug, Clone)]
pub struct CsvField {
    options: FieldOptions,
    child: Box<dyn ValueField>,
    allow_empty: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

field_options!(CsvField);

impl CsvField {
    /// Create a list of `child` values.
    pub fn new(child: impl ValueField + 'static) -> Self {
        Self {
            options: FieldOptions::default(),
            child: Box::new(child),
            allow_empty: true,
            min_length: None,
            max_length: None,
        }
    }

    /// Reject empty lists.
    pub fn deny_empty(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    /// Minimum number of items.
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Maximum number of items.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    fn split(raw: &str) -> Result<Vec<String>, ValidationError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_bytes());
        match reader.records().next() {
            None => Ok(Vec::new()),
            Some(Ok(record)) => Ok(record.iter().map(String::from).collect()),
            Some(Err(_)) => Err(ValidationError::invalid("Could not parse the list.")),
        }
    }
}

impl ValueField for CsvField {
    fn to_value(&self, raw: &str) -> Result<FilterValue, ValidationError> {
        let items = Self::split(raw)?;

        if items.is_empty() && !self.allow_empty {
            return Err(ValidationError::new("This list may not be empty.", ErrorCode::Empty));
        }
        if let Some(max) = self.max_length.filter(|max| items.len() > *max) {
            return Err(ValidationError::new(
                format!("Ensure this field has no more than {} elements.", max),
                ErrorCode::MaxLength,
            ));
        }
        if let Some(min) = self.min_length.filter(|min| items.len() < *min) {
            return Err(ValidationError::new(
                format!("Ensure this field has at least {} elements.", min),
                ErrorCode::MinLength,
            ));
        }

        let mut values = Vec::with_capacity(items.len());
        let mut errors = ErrorMap::new();
        for (index, item) in items.iter().enumerate() {
            match self.child.run_validation(Some(item)) {
                Ok(Validated::Value(value)) => values.push(value),
                Ok(Validated::Absent) => {}
                Err(err) => {
                    let details: Vec<ErrorDetail> =
                        err.into_map("").into_values().flatten().collect();
                    errors.insert(index.to_string(), details);
                }
            }
        }

        if errors.is_empty() {
            Ok(FilterValue::List(values))
        } else {
            Err(ValidationError::fields(errors))
        }
    }

    fn schema(&self) -> serde_json::Value {
        let mut schema = json!({ "type": "array", "items": self.child.schema() });
        if let Some(min) = self.min_length {
            schema["minItems"] = json!(min);
        }
        if let Some(max) = self.max_length {
            schema["maxItems"] = json!(max);
        }
        with_help(schema, &self.options)
    }

    impl_field_boilerplate!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(err: ValidationError) -> String {
        match err {
            ValidationError::Messages(details) => details[0].message.clone(),
            ValidationError::Fields(map) => map.values().next().unwrap()[0].message.clone(),
        }
    }

    #[test]
    fn test_missing_value_outcomes() {
        let field = CharField::new();
        assert_eq!(field.run_validation(None).unwrap(), Validated::Absent);

        let field = CharField::new().default_value("guest");
        assert_eq!(
            field.run_validation(None).unwrap(),
            Validated::Value(FilterValue::from("guest"))
        );

        let err = CharField::new().required().run_validation(None).unwrap_err();
        assert_eq!(err, ValidationError::new("This field is required.", ErrorCode::Required));
    }

    #[test]
    fn test_char_field_rules() {
        let field = CharField::new().max_length(3);
        assert_eq!(field.to_value(" abc ").unwrap(), FilterValue::from("abc"));
        assert_eq!(
            message(field.to_value("abcd").unwrap_err()),
            "Ensure this field has no more than 3 characters."
        );
        assert_eq!(message(field.to_value("").unwrap_err()), "This field may not be blank.");
        assert_eq!(CharField::new().allow_blank().to_value("").unwrap(), FilterValue::from(""));
        assert_eq!(
            message(field.to_value("a\0").unwrap_err()),
            "Null characters are not allowed."
        );
    }

    #[test]
    fn test_integer_field() {
        let field = IntegerField::new().max_value(10);
        assert_eq!(field.to_value("7").unwrap(), FilterValue::Int(7));
        assert_eq!(field.to_value("7.0").unwrap(), FilterValue::Int(7));
        assert_eq!(message(field.to_value("7.5").unwrap_err()), "A valid integer is required.");
        assert_eq!(
            message(field.to_value("11").unwrap_err()),
            "Ensure this value is less than or equal to 10."
        );
    }

    #[test]
    fn test_boolean_field() {
        let field = BooleanField::new();
        assert_eq!(field.to_value("yes").unwrap(), FilterValue::Bool(true));
        assert_eq!(field.to_value("0").unwrap(), FilterValue::Bool(false));
        assert_eq!(message(field.to_value("maybe").unwrap_err()), "\"maybe\" is not a valid boolean.");
    }

    #[test]
    fn test_choice_field() {
        let field = ChoiceField::new(["draft", "published"]);
        assert_eq!(field.to_value("draft").unwrap(), FilterValue::from("draft"));
        let err = field.to_value("deleted").unwrap_err();
        assert_eq!(
            err,
            ValidationError::new("\"deleted\" is not a valid choice.", ErrorCode::InvalidChoice)
        );
    }

    #[test]
    fn test_date_fields() {
        let date = DateField::new().to_value("2024-02-29").unwrap();
        assert_eq!(date, FilterValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(DateField::new().to_value("29/02/2024").is_err());

        let dt = DateTimeField::new().to_value("2024-01-01T10:00:00+02:00").unwrap();
        match dt {
            FilterValue::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "2024-01-01T08:00:00+00:00"),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_csv_field_quoting() {
        let field = CsvField::new(CharField::new());
        assert_eq!(
            field.to_value("\"a,b\",c").unwrap(),
            FilterValue::List(vec![FilterValue::from("a,b"), FilterValue::from("c")])
        );
    }

    #[test]
    fn test_csv_field_child_errors_keyed_by_index() {
        let field = CsvField::new(IntegerField::new());
        let err = field.to_value("1,x,3").unwrap_err();
        match err {
            ValidationError::Fields(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1"]);
                assert_eq!(map["1"][0].message, "A valid integer is required.");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_csv_field_length() {
        let field = CsvField::new(IntegerField::new()).max_length(2);
        assert_eq!(
            message(field.to_value("1,2,3").unwrap_err()),
            "Ensure this field has no more than 2 elements."
        );
        let field = CsvField::new(IntegerField::new()).deny_empty();
        assert_eq!(message(field.to_value("").unwrap_err()), "This list may not be empty.");
    }

    #[test]
    fn test_schema_fragments() {
        let schema = IntegerField::new().min_value(1).help_text("Page size").schema();
        assert_eq!(schema, json!({ "type": "integer", "minimum": 1, "description": "Page size" }));

        let schema = CsvField::new(ChoiceField::new(["a", "b"])).schema();
        assert_eq!(schema["items"]["enum"], json!(["a", "b"]));
    }
}
