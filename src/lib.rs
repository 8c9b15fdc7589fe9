//! # Sieve
//!
//! Declarative, nested filtering of collections from URL query parameters.
//!
//! Sieve provides:
//! - Filter declarations that expand into dotted parameters
//!   (`username`, `username.icontains`, `username.len.gt`)
//! - Per-parameter validation with every error reported at once
//! - Grouping of conditions, combined with AND, OR or any operator
//! - Cross-parameter constraints
//! - "Did you mean" suggestions for unknown parameters
//!
//! ## Quick Start
//!
//! ```rust
//! use sieve::prelude::*;
//! use sieve::field::{CharField, IntegerField};
//!
//! let filterset = FilterSet::builder("UserFilterSet")
//!     .filter(
//!         "username",
//!         Filter::of(CharField::new()).children([
//!             Filter::new().lookup("icontains"),
//!             Filter::new()
//!                 .param("len")
//!                 .target(Computed::length("username"))
//!                 .field(IntegerField::new())
//!                 .child(Filter::new().lookup("gt")),
//!         ]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let params = QueryParams::parse("username.len.gt=5");
//! let qs = filterset
//!     .filter_queryset(&params, RequestContext::new(), QuerySet::new("users"))
//!     .unwrap();
//!
//! let (sql, _) = qs.to_sql();
//! assert_eq!(sql, "SELECT * FROM users WHERE (LENGTH(username) > $1)");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Query expressions and collections.
pub mod query {
    pub use sieve_query::*;
}

/// Axum integration.
#[cfg(feature = "axum")]
#[cfg_attr(docsrs, doc(cfg(feature = "axum")))]
pub mod axum {
    pub use sieve_axum::*;
}

pub use sieve_filters::{
    constraints, entry, error, field, filter, filterset, hooks, params, schema, scope, settings,
    unknown,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sieve_filters::prelude::*;
}

// Re-export key types at the crate root
pub use sieve_filters::{
    Blank, Combinator, ConstructionError, Filter, FilterError, FilterSet, FilterSetBuilder,
    QueryParams, RequestContext, Settings,
};
