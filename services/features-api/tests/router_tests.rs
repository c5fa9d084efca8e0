//! Tests for the features API router.
//!
//! Requests go through the full router with `oneshot`; the pipelines behind
//! it talk to an in-process mock of the NGD Features API.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::ServiceExt;

use features_api::router;
use features_api::state::AppState;
use features_client::{ClientConfig, MemorySink, PipelineBuilder, RetryPolicy};
use test_utils::fixtures::collections;
use test_utils::{features, MockFeatureApi};

struct TestApp {
    router: Router,
    sink: Arc<MemorySink>,
    // Keeps the mock server alive for the duration of the test.
    _api: MockFeatureApi,
}

async fn app(api: MockFeatureApi) -> TestApp {
    let config = ClientConfig::default()
        .with_base_url(api.base_url())
        .with_token_url(api.token_url())
        .with_credentials("client-id", "client-secret")
        .with_retry(RetryPolicy::immediate(1));
    let sink = Arc::new(MemorySink::new());
    let builder = PipelineBuilder::new(config).unwrap().telemetry(sink.clone());
    let state = AppState::from_builder(builder);
    TestApp {
        router: router(Arc::new(state)),
        sink,
        _api: api,
    }
}

async fn default_app() -> TestApp {
    let api = MockFeatureApi::builder()
        .collection(collections::BUILDING_PART_1, features("bp", 250))
        .collection(collections::ROAD_LINK_4, features("rl", 7))
        .start()
        .await
        .unwrap();
    app(api).await
}

async fn send(app: &TestApp, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = assert_ok!(app.router.clone().oneshot(request).await);
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri).await
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = default_app().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

// ============================================================================
// Items
// ============================================================================

#[tokio::test]
async fn test_base_items_passes_limit_through() {
    let app = default_app().await;
    let (status, body) = get(
        &app,
        "/catalyst/features/bld-fts-buildingpart-1/items?limit=5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["numberReturned"], 5);
    assert_eq!(body["numberOfRequests"], 1);
    assert_eq!(body["features"][0]["properties"]["collection"], collections::BUILDING_PART_1);
    assert_eq!(app.sink.records().len(), 1);
}

#[tokio::test]
async fn test_limit_variant_paginates() {
    let app = default_app().await;
    let (status, body) = get(
        &app,
        "/catalyst/features/bld-fts-buildingpart-1/items/limit?limit=150",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["numberReturned"], 150);
    assert_eq!(body["numberOfRequests"], 2);
}

#[tokio::test]
async fn test_invalid_wrapper_parameter_is_400() {
    let app = default_app().await;
    let (status, body) = get(
        &app,
        "/catalyst/features/bld-fts-buildingpart-1/items/limit?limit=lots",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["errorSource"], "Catalyst Wrapper");
}

#[tokio::test]
async fn test_latest_collection_on_items_route() {
    let app = default_app().await;
    let (status, body) = get(
        &app,
        "/catalyst/features/trn-ntwk-roadlink/items?use-latest-collection=true",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collection"], collections::ROAD_LINK_4);
    assert_eq!(body["numberReturned"], 7);
}

#[tokio::test]
async fn test_multi_collection_items() {
    let app = default_app().await;
    let (status, body) = get(
        &app,
        "/catalyst/features/multi-collection/items/limit-col?collection=bld-fts-buildingpart-1,trn-ntwk-roadlink-4&limit=3",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["numberReturned"], 6);
    assert_eq!(body["numberOfRequests"], 2);
    assert_eq!(
        body["numberReturnedByCollection"],
        json!({"bld-fts-buildingpart-1": 3, "trn-ntwk-roadlink-4": 3})
    );
}

#[tokio::test]
async fn test_collection_variant_rejected_on_single_collection_route() {
    let app = default_app().await;
    let (status, body) = get(&app, "/catalyst/features/bld-fts-buildingpart-1/items/limit-col").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorSource"], "Catalyst Wrapper");

    let (status, _) = get(&app, "/catalyst/features/multi-collection/items/limit").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_get_is_405() {
    let app = default_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/catalyst/features/bld-fts-buildingpart-1/items",
    )
    .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], 405);
    assert_eq!(body["errorSource"], "Catalyst Wrapper");
}

#[tokio::test]
async fn test_unsupported_parameter_lists_wrapper_parameters() {
    let api = MockFeatureApi::builder()
        .error(
            collections::BUILDING_PART_1,
            400,
            json!({
                "code": 400,
                "description": "Not supported query parameter: colour. Supported parameters are: bbox, crs, filter"
            }),
        )
        .start()
        .await
        .unwrap();
    let app = app(api).await;

    let (status, body) = get(
        &app,
        "/catalyst/features/bld-fts-buildingpart-1/items/limit?colour=red",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorSource"], "OS NGD API");
    let description = body["description"].as_str().unwrap();
    assert!(description.contains("Supported NGD parameters are"));
    assert!(description.contains("request-limit"));
    assert!(!description.contains("{attr}"));
}

#[tokio::test]
async fn test_upstream_status_becomes_http_status() {
    let api = MockFeatureApi::builder()
        .empty_body(collections::BUILDING_PART_1)
        .start()
        .await
        .unwrap();
    let app = app(api).await;

    let (status, body) = get(&app, "/catalyst/features/bld-fts-buildingpart-1/items").await;
    assert_eq!(status, StatusCode::URI_TOO_LONG);
    assert_eq!(body["code"], 414);
}

// ============================================================================
// Latest collections
// ============================================================================

#[tokio::test]
async fn test_latest_collections() {
    let app = default_app().await;
    let (status, body) = get(&app, "/catalyst/features/latest-collections").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trn-ntwk-roadlink"], collections::ROAD_LINK_4);
    assert_eq!(body["bld-fts-buildingpart"], collections::BUILDING_PART_2);
    assert_eq!(app.sink.records().len(), 1);
}

#[tokio::test]
async fn test_latest_collections_recent_updates() {
    let app = default_app().await;
    let (status, body) = get(
        &app,
        "/catalyst/features/latest-collections?recent-update-days=36500&log-request-details=false",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recent-update-threshold-days"], 36500);
    assert_eq!(body["collection-lookup"]["wtr-ntwk-waterlink"], collections::WATER_LINK_1);
    let recent = body["recent-collection-updates"].as_array().unwrap();
    assert_eq!(recent.len(), 3);
    assert!(app.sink.records().is_empty());
}

#[tokio::test]
async fn test_latest_single_collection() {
    let app = default_app().await;
    let (status, body) = get(&app, "/catalyst/features/latest-collections/trn-ntwk-roadlink").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"trn-ntwk-roadlink": collections::ROAD_LINK_4}));

    let (status, body) = get(&app, "/catalyst/features/latest-collections/trn-ntwk-unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["help"].as_str().is_some());

    let (status, _) = get(
        &app,
        "/catalyst/features/latest-collections/trn-ntwk-roadlink?recent-update-days=3",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
