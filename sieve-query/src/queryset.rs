//! Lazily built collections that filters are applied to.

use indexmap::IndexMap;
use tracing::trace;

use crate::computed::Computed;
use crate::expr::Expr;
use crate::value::FilterValue;

/// A filterable collection.
///
/// Both operations consume the collection and return the refined one; nothing
/// is executed until the caller evaluates the result.
pub trait Collection: Sized {
    /// Register computed columns that later conditions may reference by name.
    fn alias(self, aliases: IndexMap<String, Computed>) -> Self;

    /// Narrow the collection by a condition.
    fn filter(self, expr: Expr) -> Self;
}

/// Reference collection that records every call and renders SQL.
///
/// Each `filter` call is kept as a separate condition, so chained filters
/// and a single combined filter stay distinguishable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySet {
    table: String,
    aliases: IndexMap<String, Computed>,
    filters: Vec<Expr>,
}

impl QuerySet {
    /// Start a query over a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            aliases: IndexMap::new(),
            filters: Vec::new(),
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Registered aliases, in registration order.
    pub fn aliases(&self) -> &IndexMap<String, Computed> {
        &self.aliases
    }

    /// Applied conditions, one per `filter` call.
    pub fn filters(&self) -> &[Expr] {
        &self.filters
    }

    /// Check whether no condition was applied.
    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty()
    }

    /// Render `SELECT * FROM table WHERE ...` with positional parameters.
    pub fn to_sql(&self) -> (String, Vec<FilterValue>) {
        let mut sql = format!("SELECT * FROM {}", self.table);
        let mut params = Vec::new();
        if !self.filters.is_empty() {
            let parts: Vec<_> = self
                .filters
                .iter()
                .map(|f| format!("({})", f.to_sql_with_params(&self.aliases, &mut params)))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&parts.join(" AND "));
        }
        (sql, params)
    }
}

impl Collection for QuerySet {
    fn alias(mut self, aliases: IndexMap<String, Computed>) -> Self {
        trace!(table = %self.table, count = aliases.len(), "Registering aliases");
        self.aliases.extend(aliases);
        self
    }

    fn filter(mut self, expr: Expr) -> Self {
        trace!(table = %self.table, filter = ?expr, "Applying filter");
        self.filters.push(expr);
        self
    }
}
