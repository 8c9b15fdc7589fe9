//! Fuzz target for request resolution.
//!
//! Arbitrary query strings are resolved against a filter set covering every
//! field type, nesting, groups and constraints. Resolution must either filter
//! the collection or report errors, never panic.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_query_params
//! ```

#![no_main]

use std::sync::OnceLock;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sieve_filters::constraints::{Dependency, MutuallyExclusive};
use sieve_filters::field::{
    BooleanField, CharField, ChoiceField, CsvField, DateField, DateTimeField, FloatField,
    IntegerField,
};
use sieve_filters::{Blank, Combinator, Filter, FilterSet, QueryParams, RequestContext, Settings};
use sieve_query::{Computed, QuerySet};

fn filterset() -> &'static FilterSet {
    static FILTERSET: OnceLock<FilterSet> = OnceLock::new();
    FILTERSET.get_or_init(|| {
        FilterSet::builder("Fuzz")
            .settings(Settings::default())
            .filter(
                "name",
                Filter::of(CharField::new().max_length(20))
                    .child(Filter::new().lookup("icontains"))
                    .child(
                        Filter::new()
                            .param("len")
                            .target(Computed::length("name"))
                            .field(IntegerField::new())
                            .child(Filter::new().lookup("gt")),
                    ),
            )
            .filter("score", Filter::of(FloatField::new()).group("g"))
            .filter("active", Filter::of(BooleanField::new()).group("g").blank(Blank::Keep))
            .filter("kind", Filter::of(ChoiceField::new(["a", "b"])))
            .filter(
                "ids",
                Filter::of(CsvField::new(IntegerField::new())).lookup("in"),
            )
            .filter(
                "day",
                Filter::of(DateField::new())
                    .namespace()
                    .group("when.day")
                    .child(Filter::new().lookup("gte")),
            )
            .filter(
                "at",
                Filter::of(DateTimeField::new())
                    .namespace()
                    .group("when.at")
                    .child(Filter::new().lookup("lt")),
            )
            .combinator("g", Combinator::Or)
            .constraint(MutuallyExclusive::new(["kind", "ids"]).unwrap())
            .constraint(Dependency::new(["score"], ["active"]))
            .build()
            .unwrap()
    })
}

#[derive(Debug, Arbitrary)]
struct FuzzRequest {
    pairs: Vec<(String, String)>,
    raw: String,
}

fuzz_target!(|request: FuzzRequest| {
    let filterset = filterset();

    let params: QueryParams = request.pairs.into_iter().collect();
    let _ = filterset.filter_queryset(&params, RequestContext::new(), QuerySet::new("t"));

    let params = QueryParams::parse(&request.raw);
    if let Ok(qs) = filterset.filter_queryset(&params, RequestContext::new(), QuerySet::new("t")) {
        let _ = qs.to_sql();
    }
});
