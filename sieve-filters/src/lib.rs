//! # sieve-filters
//!
//! Declarative filtering of collections from URL query parameters.
//!
//! This crate provides:
//! - [`Filter`]: a declaration mapping one parameter to a condition, with
//!   nested children exposed as dotted parameters (`username.icontains`)
//! - [`FilterSet`]: a compiled, immutable tree of filters shared by requests
//! - [`Scope`]: per-request resolution into entries, grouping and combination
//! - [`constraints`]: cross-parameter rules such as mutual exclusion
//! - Unknown parameter detection with "did you mean" suggestions
//! - [`Settings`]: library-wide defaults from code, TOML or the environment
//!
//! ## Example
//!
//! ```rust
//! use sieve_filters::prelude::*;
//! use sieve_filters::field::{CharField, IntegerField};
//!
//! let filterset = FilterSet::builder("UserFilterSet")
//!     .filter(
//!         "username",
//!         Filter::of(CharField::new()).child(Filter::new().lookup("icontains")),
//!     )
//!     .filter("age", Filter::of(IntegerField::new()).child(Filter::new().lookup("gte")))
//!     .build()
//!     .unwrap();
//!
//! let params = QueryParams::parse("username.icontains=kat&age.gte=30");
//! let qs = filterset
//!     .filter_queryset(&params, RequestContext::new(), QuerySet::new("users"))
//!     .unwrap();
//! let (sql, _) = qs.to_sql();
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM users WHERE (username ILIKE $1) AND (age >= $2)"
//! );
//!
//! // Misspelled parameters are reported with suggestions
//! let params = QueryParams::parse("usrname=kate");
//! let err = filterset
//!     .filter_queryset(&params, RequestContext::new(), QuerySet::new("users"))
//!     .unwrap_err();
//! assert_eq!(
//!     err.report().unwrap().get("usrname").unwrap()[0].message,
//!     "This query parameter does not exist. Did you mean \"username\"?"
//! );
//! ```

pub mod constraints;
pub mod entry;
pub mod error;
pub mod field;
pub mod filter;
pub mod filterset;
pub mod hooks;
pub mod params;
pub mod schema;
pub mod scope;
pub mod settings;
pub mod unknown;

pub use constraints::{Constraint, Dependency, MethodConstraint, MutuallyExclusive, MutuallyInclusive};
pub use entry::{Entries, Entry, EntryValue, Groups, ParamValue, Values};
pub use error::{
    ConstructionError, ErrorCode, ErrorDetail, ErrorMap, ErrorReport, FilterError, FilterResult,
    ResolutionError, ValidationError, merge_errors,
};
pub use filter::{CHAIN, Filter, Target};
pub use filterset::{Combinator, FilterSet, FilterSetBuilder, MethodOutput, Node, NodeId, Options};
pub use hooks::{DefaultHooks, FieldLookup, Hooks};
pub use params::{FieldContext, QueryParams, RequestContext};
pub use scope::Scope;
pub use settings::{Blank, Settings, SettingsError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::constraints::{Dependency, MethodConstraint, MutuallyExclusive, MutuallyInclusive};
    pub use crate::error::{FilterError, ValidationError};
    pub use crate::filter::Filter;
    pub use crate::filterset::{Combinator, FilterSet, MethodOutput};
    pub use crate::hooks::{DefaultHooks, Hooks};
    pub use crate::params::{QueryParams, RequestContext};
    pub use crate::settings::Blank;
    pub use sieve_query::prelude::*;
}
