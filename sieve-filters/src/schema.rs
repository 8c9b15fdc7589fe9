//! OpenAPI parameter descriptions for a filter set.

use serde_json::{Value, json};
use tracing::warn;

use crate::filterset::FilterSet;
use crate::hooks::Hooks;

/// One `in: query` parameter object per exposed filter, in pre-order.
///
/// Namespaces are skipped, as are filters whose field is only supplied at
/// request time.
///
/// ```rust
/// use sieve_filters::{Filter, FilterSet};
/// use sieve_filters::field::IntegerField;
/// use sieve_filters::schema::openapi_parameters;
///
/// let filterset = FilterSet::builder("Books")
///     .filter("pages", Filter::of(IntegerField::new()).child(Filter::new().lookup("gte")))
///     .build()
///     .unwrap();
///
/// let params = openapi_parameters(&filterset);
/// assert_eq!(params[1]["name"], "pages.gte");
/// assert_eq!(params[1]["schema"]["type"], "integer");
/// ```
pub fn openapi_parameters<H: Hooks>(filterset: &FilterSet<H>) -> Vec<Value> {
    let mut parameters = Vec::new();
    for node in filterset.nodes() {
        if node.is_namespace() {
            continue;
        }
        let Some(field) = filterset.declared_field(node.id()) else {
            warn!(
                filterset = %filterset.name(),
                param = %node.dotted_name(),
                "No declared field, leaving parameter out of the schema"
            );
            continue;
        };

        let mut parameter = json!({
            "name": node.dotted_name(),
            "in": "query",
            "required": node.is_required(),
            "schema": field.schema(),
            "explode": false,
        });
        if let (Some(text), Some(map)) = (&field.options().help_text, parameter.as_object_mut()) {
            map.insert("description".into(), json!(text));
        }
        parameters.push(parameter);
    }
    parameters
}
