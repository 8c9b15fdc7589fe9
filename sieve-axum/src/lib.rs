//! Axum framework integration for sieve filter sets.
//!
//! This crate connects [`FilterSet`]s to the
//! [Axum](https://github.com/tokio-rs/axum) web framework.
//!
//! # Features
//!
//! - **Extractor**: [`FilterQuery`] collects the query parameters and request
//!   context of a request
//! - **State**: [`FilterBackend`] shares a compiled filter set between handlers
//! - **Rejections**: [`FilterRejection`] renders validation failures as a JSON
//!   error object with status 400
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::{Router, extract::State, routing::get};
//! use sieve_axum::{FilterBackend, FilterQuery, FilterRejection};
//! use sieve_filters::field::CharField;
//! use sieve_filters::{Filter, FilterSet};
//! use sieve_query::QuerySet;
//!
//! async fn list_users(
//!     State(backend): State<FilterBackend>,
//!     query: FilterQuery,
//! ) -> Result<String, FilterRejection> {
//!     let qs = backend.filter_queryset(query, QuerySet::new("users"))?;
//!     Ok(qs.to_sql().0)
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let filterset = FilterSet::builder("UserFilterSet")
//!         .filter("username", Filter::of(CharField::new()))
//!         .build()
//!         .unwrap();
//!
//!     let app = Router::new()
//!         .route("/users", get(list_users))
//!         .with_state(FilterBackend::new(filterset));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, MatchedPath},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use sieve_filters::{
    DefaultHooks, ErrorReport, FilterError, FilterSet, Hooks, QueryParams, RequestContext,
    ResolutionError,
};
use sieve_query::Collection;

// Re-export key types
pub use sieve_filters::prelude::*;

/// Why filtering a request failed.
#[derive(Error, Debug)]
pub enum FilterRejection {
    /// The client sent invalid or unknown parameters.
    #[error("invalid query parameters: {0}")]
    Invalid(ErrorReport),

    /// The filter set is declared incorrectly.
    #[error(transparent)]
    Misconfigured(#[from] ResolutionError),
}

impl From<FilterError> for FilterRejection {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Validation(report) => Self::Invalid(report),
            FilterError::Resolution(err) => Self::Misconfigured(err),
        }
    }
}

impl IntoResponse for FilterRejection {
    fn into_response(self) -> Response {
        match self {
            FilterRejection::Invalid(report) => {
                (StatusCode::BAD_REQUEST, Json(report)).into_response()
            }
            FilterRejection::Misconfigured(err) => {
                error!(error = %err, "Filter set could not resolve request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "A server error occurred." })),
                )
                    .into_response()
            }
        }
    }
}

/// Result type for filtering in handlers.
pub type Result<T> = std::result::Result<T, FilterRejection>;

/// Query parameters and context of the current request.
///
/// The context carries the HTTP method, the path and, when the request was
/// routed, the matched route as the view name.
#[derive(Debug, Clone, Default)]
pub struct FilterQuery {
    /// Decoded query string.
    pub params: QueryParams,
    /// Request metadata visible to hooks and fields.
    pub context: RequestContext,
}

impl FilterQuery {
    /// Build from request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        let params = QueryParams::parse(parts.uri.query().unwrap_or_default());
        let mut context = RequestContext::new()
            .with_method(parts.method.as_str())
            .with_path(parts.uri.path());
        if let Some(matched) = parts.extensions.get::<MatchedPath>() {
            context = context.with_view(matched.as_str());
        }
        Self { params, context }
    }
}

impl<S> FromRequestParts<S> for FilterQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// A compiled filter set shared as router state.
///
/// Cloning is cheap; every clone refers to the same filter set.
pub struct FilterBackend<H: Hooks = DefaultHooks> {
    filterset: Arc<FilterSet<H>>,
}

impl<H: Hooks> Clone for FilterBackend<H> {
    fn clone(&self) -> Self {
        Self {
            filterset: Arc::clone(&self.filterset),
        }
    }
}

impl<H: Hooks> std::fmt::Debug for FilterBackend<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterBackend")
            .field("filterset", &self.filterset.name())
            .finish()
    }
}

impl<H: Hooks> FilterBackend<H> {
    /// Share `filterset`.
    pub fn new(filterset: FilterSet<H>) -> Self {
        Self {
            filterset: Arc::new(filterset),
        }
    }

    /// The shared filter set.
    pub fn filterset(&self) -> &FilterSet<H> {
        &self.filterset
    }

    /// Filter `collection` with the request's parameters.
    pub fn filter_queryset<C: Collection>(&self, query: FilterQuery, collection: C) -> Result<C> {
        let result = self
            .filterset
            .filter_queryset(&query.params, query.context, collection);
        if let Err(FilterError::Validation(report)) = &result {
            debug!(
                filterset = %self.filterset.name(),
                keys = report.len(),
                "Rejected query parameters"
            );
        }
        Ok(result?)
    }
}

impl<H: Hooks> From<FilterSet<H>> for FilterBackend<H> {
    fn from(filterset: FilterSet<H>) -> Self {
        Self::new(filterset)
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{FilterBackend, FilterQuery, FilterRejection, Result};
    pub use sieve_filters::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::State,
        http::Request,
        routing::get,
    };
    use sieve_filters::Settings;
    use sieve_filters::field::{CharField, IntegerField};
    use sieve_query::QuerySet;
    use tower::ServiceExt;

    fn backend() -> FilterBackend {
        FilterSet::builder("UserFilterSet")
            .settings(Settings::default())
            .filter(
                "username",
                Filter::of(CharField::new()).child(Filter::new().lookup("icontains")),
            )
            .filter("age", Filter::of(IntegerField::new()))
            .build()
            .unwrap()
            .into()
    }

    async fn list_users(
        State(backend): State<FilterBackend>,
        query: FilterQuery,
    ) -> Result<String> {
        let qs = backend.filter_queryset(query, QuerySet::new("users"))?;
        Ok(qs.to_sql().0)
    }

    async fn view_name(query: FilterQuery) -> String {
        query.context.view.unwrap_or_default()
    }

    fn app() -> Router {
        Router::new()
            .route("/users", get(list_users))
            .route("/views/{id}", get(view_name))
            .with_state(backend())
    }

    async fn call(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_filters_request() {
        let (status, body) = call("/users?username.icontains=kat&age=30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "SELECT * FROM users WHERE (username ILIKE $1) AND (age = $2)"
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_parameters() {
        let (status, body) = call("/users?age=old&usrname=kate").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["age"][0]["message"], "A valid integer is required.");
        assert_eq!(json["age"][0]["code"], "invalid");
        assert_eq!(
            json["usrname"][0]["message"],
            "This query parameter does not exist. Did you mean \"username\"?"
        );
    }

    #[tokio::test]
    async fn test_matched_path_is_view() {
        let (status, body) = call("/views/7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "/views/{id}");
    }

    #[test]
    fn test_resolution_error_is_server_error() {
        let rejection = FilterRejection::from(FilterError::Resolution(
            ResolutionError::UnresolvedField {
                param: "x".into(),
            },
        ));
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_parts() {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri("/users?page=2&page=3")
            .body(())
            .unwrap()
            .into_parts();
        let query = FilterQuery::from_parts(&parts);
        assert_eq!(query.params.get("page"), Some("2"));
        assert_eq!(query.context.method.as_deref(), Some("POST"));
        assert_eq!(query.context.path.as_deref(), Some("/users"));
    }
}
