//! Integration tests for the query expression layer.
//!
//! These tests verify how expressions built by filter sets render against
//! the reference collection.

use pretty_assertions::assert_eq;

use sieve::query::{Collection, Computed, Expr, FilterValue, QuerySet, TemplateError};

/// Test lookup suffixes map to operators
#[test]
fn test_lookup_rendering() {
    let qs = QuerySet::new("users")
        .filter(Expr::lookup("username", "iexact", "Kate"))
        .filter(Expr::lookup("email", "endswith", "@example.com"))
        .filter(Expr::lookup("deleted_at", "isnull", true))
        .filter(Expr::lookup("age", "range", vec![18, 30]));

    let (sql, params) = qs.to_sql();
    assert_eq!(
        sql,
        "SELECT * FROM users WHERE (LOWER(username) = LOWER($1)) AND (email LIKE $2) \
         AND (deleted_at IS NULL) AND (age BETWEEN $3 AND $4)"
    );
    assert_eq!(params[1], FilterValue::String("%@example.com".into()));
    assert_eq!(params.len(), 4);
}

/// Test an empty list never matches
#[test]
fn test_empty_in_list() {
    let qs = QuerySet::new("users").filter(Expr::lookup("id", "in", Vec::<i64>::new()));
    assert_eq!(qs.to_sql().0, "SELECT * FROM users WHERE (FALSE)");
}

/// Test related paths and aliases
#[test]
fn test_related_paths_and_aliases() {
    let mut aliases = indexmap::IndexMap::new();
    aliases.insert("name_len".to_string(), Computed::length("name"));

    let qs = QuerySet::new("books")
        .alias(aliases)
        .filter(Expr::lookup("author__name", "icontains", "le guin"))
        .filter(Expr::lookup("name_len", "lte", 20));

    let (sql, _) = qs.to_sql();
    assert_eq!(
        sql,
        "SELECT * FROM books WHERE (author.name ILIKE $1) AND (LENGTH(name) <= $2)"
    );
}

/// Test negation and nesting
#[test]
fn test_nested_expressions() {
    let expr = Expr::negate(Expr::or([
        Expr::condition("a", 1),
        Expr::and([Expr::condition("b", 2), Expr::condition("c", 3)]),
    ]));
    let qs = QuerySet::new("t").filter(expr);
    assert_eq!(
        qs.to_sql().0,
        "SELECT * FROM t WHERE (NOT ((a = $1 OR (b = $2 AND c = $3))))"
    );
}

/// Test templates reject leaves with values
#[test]
fn test_template_values_rejected() {
    let template = Expr::and([Expr::placeholder("a"), Expr::condition("b", 1)]);
    assert!(matches!(
        template.fill(&FilterValue::Int(3)),
        Err(TemplateError::ValueInTemplate { .. })
    ));
}
