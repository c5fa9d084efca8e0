//! Items handlers: one route family per pipeline.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use features_client::{Capabilities, FetchResult, Headers};
use features_protocol::ErrorResult;

use super::error_response;
use crate::params::{WrapperParams, LIMIT};
use crate::state::AppState;

/// GET /catalyst/features/{collection}/items
pub async fn items_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    run_items(&state, Capabilities::NONE, Some(collection), raw, &headers).await
}

/// GET /catalyst/features/{collection}/items/{variant}
///
/// Variants that include `col` live under `multi-collection` instead.
pub async fn items_variant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((collection, variant)): Path<(String, String)>,
    Query(raw): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    match Capabilities::from_variant(&variant).filter(|caps| !caps.collections) {
        Some(caps) => run_items(&state, caps, Some(collection), raw, &headers).await,
        None => unknown_variant(&variant),
    }
}

/// GET /catalyst/features/multi-collection/items/{variant}
pub async fn multi_collection_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(variant): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    match Capabilities::from_variant(&variant).filter(|caps| caps.collections) {
        Some(caps) => run_items(&state, caps, None, raw, &headers).await,
        None => unknown_variant(&variant),
    }
}

async fn run_items(
    state: &AppState,
    caps: Capabilities,
    collection: Option<String>,
    raw: Vec<(String, String)>,
    headers: &HeaderMap,
) -> Response {
    let route = caps.route_name();
    let span = info_span!("items", request_id = %Uuid::new_v4(), route = %route);
    let start = Instant::now();
    counter!("features_requests_total", "route" => route.clone()).increment(1);

    let outcome = fetch_items(state, caps, collection, raw, headers)
        .instrument(span.clone())
        .await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!("features_request_duration_ms", "route" => route.clone()).record(elapsed_ms);

    match outcome {
        Ok(response) => {
            span.in_scope(|| info!(elapsed_ms = elapsed_ms, "Items request complete"));
            Json(response).into_response()
        }
        Err(error) => {
            counter!(
                "features_request_errors_total",
                "route" => route,
                "status" => error.code.to_string()
            )
            .increment(1);
            span.in_scope(|| {
                info!(code = error.code, source = %error.error_source, "Items request failed")
            });
            error_response(error.with_supported_attributes(&supported_attributes(caps)))
        }
    }
}

async fn fetch_items(
    state: &AppState,
    caps: Capabilities,
    collection: Option<String>,
    raw: Vec<(String, String)>,
    headers: &HeaderMap,
) -> FetchResult {
    let (params, query) = WrapperParams::extract(raw, caps)?;
    let mut request = params.into_request(collection, query);
    request.headers = forwarded_headers(headers);

    let pipeline = state
        .pipeline(caps)
        .ok_or_else(|| ErrorResult::wrapper(404, format!("Unknown route '{}'", caps)))?;
    pipeline.fetch(request).await
}

/// Wrapper parameter names listed in "not supported query parameter" errors.
/// `limit` is omitted as it is also an API parameter.
fn supported_attributes(caps: Capabilities) -> Vec<&'static str> {
    caps.wrapper_parameters()
        .into_iter()
        .filter(|name| *name != LIMIT)
        .collect()
}

fn forwarded_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect()
}

fn unknown_variant(variant: &str) -> Response {
    error_response(ErrorResult::wrapper(
        404,
        format!("'{}' is not a supported items route", variant),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_supported_attributes_omit_limit() {
        let attrs = supported_attributes(Capabilities::NONE.with_pagination());
        assert!(attrs.contains(&"request-limit"));
        assert!(!attrs.contains(&"limit"));
    }

    #[test]
    fn test_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("key", HeaderValue::from_static("abc"));
        headers.insert("accept", HeaderValue::from_static("application/geo+json"));
        let forwarded = forwarded_headers(&headers);
        assert_eq!(forwarded.get("key"), Some("abc"));
        assert!(forwarded.contains("accept"));
    }
}
