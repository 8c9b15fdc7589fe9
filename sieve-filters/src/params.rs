//! Raw query parameters and the request context passed through to fields.

use indexmap::IndexMap;
use serde::Serialize;

/// Ordered query string multimap. Only the first value of a key is used for
/// filtering; later ones are kept for callers that want them.
///
/// ```rust
/// use sieve_filters::QueryParams;
///
/// let params = QueryParams::parse("username=kate&tags=a&tags=b&q=hello%20world");
/// assert_eq!(params.get("username"), Some("kate"));
/// assert_eq!(params.get("tags"), Some("a"));
/// assert_eq!(params.get_all("tags").len(), 2);
/// assert_eq!(params.get("q"), Some("hello world"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: IndexMap<String, Vec<String>>,
}

impl QueryParams {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    pub fn parse(query: &str) -> Self {
        url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect()
    }

    /// Append a value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Every value of `key`.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Check if `key` was supplied.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in the order they first appeared.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no parameter was supplied.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for QueryParams {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Whatever the caller knows about the request being filtered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestContext {
    /// HTTP method.
    pub method: Option<String>,
    /// Request path.
    pub path: Option<String>,
    /// Name of the handling view or route.
    pub view: Option<String>,
    /// Arbitrary extra values.
    pub extra: IndexMap<String, serde_json::Value>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the view name.
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Add an extra value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.extra.insert(key.into(), value.into());
    }
}

/// Context injected into the per-request copy of a value field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldContext {
    /// Name of the filter set.
    pub filterset: String,
    /// Dotted parameter name.
    pub param: String,
    /// The request.
    pub request: RequestContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_wins() {
        let params = QueryParams::from([("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_parse_leading_question_mark_and_plus() {
        let params = QueryParams::parse("?name=john+doe&empty=");
        assert_eq!(params.get("name"), Some("john doe"));
        assert_eq!(params.get("empty"), Some(""));
        assert!(params.contains("empty"));
        assert!(!params.contains("missing"));
    }
}
