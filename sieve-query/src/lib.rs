//! # sieve-query
//!
//! The query expression layer that sieve filter sets compose into.
//!
//! This crate provides:
//! - [`FilterValue`]: values parsed from query parameters
//! - [`Expr`]: conditions combined with AND / OR / NOT, and templates filled later
//! - [`Computed`]: computed columns that can be registered as aliases
//! - [`Collection`]: the interface filters are applied through, with
//!   [`QuerySet`] as a recording implementation that renders SQL
//!
//! ## Conditions
//!
//! ```rust
//! use sieve_query::{Expr, FilterValue};
//!
//! // Leaf conditions take a Django-style path
//! let adult = Expr::lookup("age", "gte", 18);
//! let named = Expr::lookup("name", "icontains", "john");
//!
//! // Combine left to right
//! let both = adult.clone().and_then(named.clone());
//! assert_eq!(both, Expr::And(vec![adult, named]));
//!
//! // Negation
//! let not_deleted = Expr::negate(Expr::condition("deleted", true));
//! assert!(matches!(not_deleted, Expr::Not(_)));
//! ```
//!
//! ## Collections
//!
//! ```rust
//! use sieve_query::{Collection, Expr, QuerySet};
//!
//! let qs = QuerySet::new("users")
//!     .filter(Expr::condition("username", "kate"))
//!     .filter(Expr::lookup("age", "gt", 30));
//!
//! let (sql, params) = qs.to_sql();
//! assert_eq!(sql, "SELECT * FROM users WHERE (username = $1) AND (age > $2)");
//! assert_eq!(params.len(), 2);
//! ```

pub mod computed;
pub mod expr;
pub mod logging;
pub mod lookup;
pub mod queryset;
pub mod value;

pub use computed::Computed;
pub use expr::{Expr, TemplateError, join_lookup};
pub use lookup::{LookupPath, Operator, Transform};
pub use queryset::{Collection, QuerySet};
pub use value::FilterValue;

// Re-export logging utilities
pub use logging::{LogFormat, LogSettings, init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::computed::Computed;
    pub use crate::expr::Expr;
    pub use crate::queryset::{Collection, QuerySet};
    pub use crate::value::FilterValue;
}
