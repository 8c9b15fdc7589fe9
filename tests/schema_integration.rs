//! Integration tests for OpenAPI parameter generation.
//!
//! These tests verify that compiled filter sets describe their parameters
//! the way clients see them.

use sieve::field::{BooleanField, CharField, ChoiceField, CsvField, DateTimeField, IntegerField};
use sieve::prelude::*;
use sieve::schema::openapi_parameters;
use serde_json::json;
use sieve::Settings;

fn filterset() -> FilterSet {
    FilterSet::builder("Articles")
        .settings(Settings::default())
        .filter(
            "title",
            Filter::of(CharField::new().max_length(200).help_text("Article title"))
                .child(Filter::new().lookup("icontains")),
        )
        .filter(
            "status",
            Filter::of(ChoiceField::new(["draft", "published"])).required(true),
        )
        .filter(
            "published",
            Filter::of(DateTimeField::new())
                .namespace()
                .children([Filter::new().lookup("gte"), Filter::new().lookup("lt")]),
        )
        .filter(
            "tags",
            Filter::of(CsvField::new(IntegerField::new().min_value(1)).max_length(5))
                .lookup("in"),
        )
        .filter("featured", Filter::of(BooleanField::new()))
        .fields(["title", "title.icontains", "status", "published.gte", "tags", "featured"])
        .build()
        .unwrap()
}

/// Test namespaces and pruned filters are left out, in declaration order
#[test]
fn test_parameter_names() {
    let params = openapi_parameters(&filterset());
    let names: Vec<_> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["title", "title.icontains", "status", "published.gte", "tags", "featured"]
    );
}

/// Test the parameter objects
#[test]
fn test_parameter_objects() {
    let params = openapi_parameters(&filterset());

    assert_eq!(
        params[1],
        json!({
            "name": "title.icontains",
            "in": "query",
            "required": false,
            "explode": false,
            "description": "Article title",
            "schema": { "type": "string", "maxLength": 200, "description": "Article title" },
        })
    );
    assert_eq!(params[2]["required"], true);
    assert_eq!(params[2]["schema"]["enum"], json!(["draft", "published"]));
    assert_eq!(params[3]["schema"], json!({ "type": "string", "format": "date-time" }));
    assert_eq!(
        params[4]["schema"],
        json!({
            "type": "array",
            "items": { "type": "integer", "minimum": 1 },
            "maxItems": 5,
        })
    );
}

/// Test the full document shape
#[test]
fn test_parameters_snapshot() {
    let params = openapi_parameters(&filterset());
    let names_and_types: Vec<_> = params
        .iter()
        .map(|p| format!("{} {}", p["name"].as_str().unwrap(), p["schema"]["type"].as_str().unwrap()))
        .collect();
    insta::assert_snapshot!(names_and_types.join("\n"), @r"
    title string
    title.icontains string
    status string
    published.gte string
    tags array
    featured boolean
    ");
}
