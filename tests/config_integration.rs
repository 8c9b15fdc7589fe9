//! Integration tests for settings and per-filter-set options.
//!
//! These tests verify that library-wide settings and filter set options
//! combine the way requests observe them.

use sieve::field::CharField;
use sieve::prelude::*;
use sieve::settings::SettingsError;
use sieve::{Settings, filterset::Options};

fn run(filterset: &FilterSet, query: &str) -> Result<QuerySet, FilterError> {
    filterset.filter_queryset(
        &QueryParams::parse(query),
        RequestContext::new(),
        QuerySet::new("users"),
    )
}

/// Test settings read from a `[filters]` table
#[test]
fn test_settings_from_toml() {
    let settings = Settings::from_toml(
        r#"
        [filters]
        blank = "keep"
        known_parameters = ["limit", "offset"]
        non_field_errors_key = "__all__"
    "#,
    )
    .expect("Failed to parse settings");

    assert_eq!(settings.blank, Blank::Keep);
    assert_eq!(settings.known_parameters, vec!["limit", "offset"]);
    assert_eq!(settings.non_field_errors_key, "__all__");
    assert!(settings.handle_unknown_parameters);
}

/// Test that other tables in the same file are ignored
#[test]
fn test_settings_ignore_other_tables() {
    let settings = Settings::from_toml(
        r#"
        [server]
        port = 8080

        [filters]
        default_group = "all"
    "#,
    )
    .expect("Failed to parse settings");
    assert_eq!(settings.default_group, "all");
}

/// Test invalid values are reported with the file error
#[test]
fn test_settings_invalid_blank() {
    let err = Settings::from_toml("[filters]\nblank = \"drop\"\n").unwrap_err();
    assert!(matches!(err, SettingsError::Toml { .. }));
}

/// Test the known parameters from settings flow into requests
#[test]
fn test_settings_known_parameters() {
    let settings = Settings::from_toml("[filters]\nknown_parameters = [\"limit\"]\n").unwrap();
    let filterset = FilterSet::builder("Users")
        .settings(settings)
        .filter("username", Filter::of(CharField::new()))
        .build()
        .unwrap();

    assert!(run(&filterset, "limit=10").is_ok());
    // `page` is only known through the defaults, which were replaced
    assert!(run(&filterset, "page=2").is_err());
}

/// Test options override settings
#[test]
fn test_options_override_settings() {
    let settings = Settings {
        blank: Blank::Keep,
        ..Settings::default()
    };
    let filterset = FilterSet::builder("Users")
        .settings(settings)
        .options(Options {
            blank: Some(Blank::Omit),
            known_parameters: Some(vec!["q".into()]),
            extend_known_parameters: vec!["lang".into()],
            ..Options::default()
        })
        .filter("username", Filter::of(CharField::new()))
        .build()
        .unwrap();

    assert!(run(&filterset, "username=").unwrap().is_unfiltered());
    assert!(run(&filterset, "q=1&lang=en").is_ok());
    assert!(run(&filterset, "page=1").is_err());
}

/// Test the non-field key comes from settings
#[test]
fn test_non_field_errors_key() {
    let filterset = FilterSet::builder("Users")
        .settings(Settings::default())
        .non_field_errors_key("__all__")
        .filter("a", Filter::of(CharField::new()))
        .filter("b", Filter::of(CharField::new()))
        .constraint(MutuallyInclusive::new(["a", "b"]).unwrap())
        .build()
        .unwrap();

    let err = run(&filterset, "a=1").unwrap_err();
    assert!(err.report().unwrap().get("__all__").is_some());
}

/// Test environment variables layered over the defaults
#[test]
fn test_settings_from_lookup() {
    let settings = Settings::from_lookup(|name| match name {
        "SIEVE_DEFAULT_GROUP" => Some("all".into()),
        "SIEVE_NON_FIELD_ERRORS_KEY" => Some("errors".into()),
        _ => None,
    })
    .unwrap();

    assert_eq!(settings.default_group, "all");
    assert_eq!(settings.non_field_errors_key, "errors");
    assert_eq!(settings.blank, Blank::Omit);
}
