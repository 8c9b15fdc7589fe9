//! Per-filter-set customisation points.
//!
//! Every method has a default, so `impl Hooks for MyHooks {}` is a valid
//! implementation. Override the ones you need:
//!
//! ```rust
//! use sieve_filters::{ErrorMap, FilterError, Hooks, Scope};
//! use sieve_filters::error::{ErrorDetail, ErrorReport};
//!
//! /// Wraps every error under a single `filters` key.
//! struct Wrapped;
//!
//! impl Hooks for Wrapped {
//!     fn handle_errors(&self, _scope: &Scope<'_, Self>, errors: ErrorMap) -> FilterError {
//!         let mut wrapped = ErrorMap::new();
//!         let details = errors.into_iter().flat_map(|(key, details)| {
//!             details.into_iter().map(move |d| ErrorDetail::new(format!("{}: {}", key, d.message), d.code))
//!         });
//!         wrapped.insert("filters".into(), details.collect());
//!         FilterError::Validation(ErrorReport::new(wrapped))
//!     }
//! }
//! ```

use std::sync::Arc;

use sieve_query::{Collection, FilterValue};

use crate::constraints::Constraint;
use crate::entry::{Entries, Values};
use crate::error::{ErrorMap, ErrorReport, FilterError, ValidationError};
use crate::field::{Validated, ValueField};
use crate::filterset::Combinator;
use crate::params::FieldContext;
use crate::scope::Scope;
use crate::unknown;

/// Result of [`Hooks::value_field`].
#[derive(Debug)]
pub enum FieldLookup {
    /// Use the declared field (an error if there is none).
    Declared,
    /// Use this field instead.
    Replaced(Box<dyn ValueField>),
    /// No field can be used.
    Unresolved,
}

/// Overridable behaviour of a filter set.
pub trait Hooks: Send + Sync + Sized + 'static {
    /// Parameters never reported as unknown.
    fn known_parameters(&self, scope: &Scope<'_, Self>) -> Vec<String> {
        scope.options().known_parameters.clone()
    }

    /// Supply or replace the value field for `param`. `declared` is the field
    /// found on the filter or its ancestors.
    fn value_field(
        &self,
        scope: &Scope<'_, Self>,
        param: &str,
        declared: Option<&dyn ValueField>,
    ) -> FieldLookup {
        let _ = (scope, param, declared);
        FieldLookup::Declared
    }

    /// Default used when `param` is missing.
    fn default_value(
        &self,
        scope: &Scope<'_, Self>,
        param: &str,
        default: Option<FilterValue>,
    ) -> Option<FilterValue> {
        let _ = (scope, param);
        default
    }

    /// Context injected into the per-request field copy.
    fn field_context(&self, scope: &Scope<'_, Self>, param: &str) -> FieldContext {
        FieldContext {
            filterset: scope.filterset().name().to_string(),
            param: param.to_string(),
            request: scope.context().clone(),
        }
    }

    /// Validate the raw value of `param` with its resolved field.
    fn run_validation(
        &self,
        scope: &Scope<'_, Self>,
        param: &str,
        field: &dyn ValueField,
        raw: Option<&str>,
    ) -> Result<Validated, ValidationError> {
        let _ = (scope, param);
        field.run_validation(raw)
    }

    /// Constraints checked after resolution.
    fn constraints(&self, scope: &Scope<'_, Self>) -> Vec<Arc<dyn Constraint<Self>>> {
        scope.filterset().constraints().to_vec()
    }

    /// Operator combining the expressions of `group`.
    fn combinator(&self, scope: &Scope<'_, Self>, group: &str, entries: &Entries) -> Combinator {
        let _ = entries;
        scope
            .options()
            .combinators
            .get(group)
            .cloned()
            .unwrap_or_default()
    }

    /// Errors for parameters nobody declared.
    fn unknown_parameters(
        &self,
        scope: &Scope<'_, Self>,
        unknown: &[String],
        known: &[String],
    ) -> ErrorMap {
        let _ = scope;
        unknown::unknown_parameter_errors(unknown, known)
    }

    /// Turn the aggregated errors into the request's failure.
    fn handle_errors(&self, scope: &Scope<'_, Self>, errors: ErrorMap) -> FilterError {
        let _ = scope;
        FilterError::Validation(ErrorReport::new(errors))
    }

    /// Last chance to adjust the filtered collection, e.g. ordering.
    fn finalize<C: Collection>(&self, scope: &Scope<'_, Self>, collection: C, values: &Values) -> C {
        let _ = (scope, values);
        collection
    }
}

/// Hooks that keep every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}
