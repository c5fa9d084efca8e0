//! An in-process stand-in for the NGD Features API and its token endpoint.
//!
//! The server listens on an ephemeral localhost port and serves:
//!
//! - `GET /collections/` the catalog document
//! - `GET /collections/{id}/items/` offset/limit pages of a collection
//! - `POST /oauth2/token/v1` client-credentials tokens
//!
//! Every items request is recorded so tests can assert on what the pipeline
//! actually sent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::fixtures;
use crate::generators::page;

/// Page size the upstream API applies when no `limit` is given.
pub const DEFAULT_PAGE_LIMIT: usize = 10;
/// Largest page the upstream API serves.
pub const MAX_PAGE_LIMIT: usize = 100;

/// One items request as the mock server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub collection: String,
    pub query: BTreeMap<String, String>,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct MockState {
    catalog: Value,
    collections: HashMap<String, Vec<Value>>,
    errors: HashMap<String, (u16, Value)>,
    empty_bodies: HashSet<String>,
    require_auth: bool,
    valid_token: Option<String>,
    tokens_issued: usize,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Configures a [`MockFeatureApi`] before it starts.
pub struct MockApiBuilder {
    state: MockState,
}

impl Default for MockApiBuilder {
    fn default() -> Self {
        Self {
            state: MockState {
                catalog: fixtures::catalog(),
                ..MockState::default()
            },
        }
    }
}

impl MockApiBuilder {
    /// Serve `features` from the items endpoint of `collection`.
    pub fn collection(mut self, collection: &str, features: Vec<Value>) -> Self {
        self.state.collections.insert(collection.to_string(), features);
        self
    }

    /// Replace the catalog document.
    pub fn catalog(mut self, catalog: Value) -> Self {
        self.state.catalog = catalog;
        self
    }

    /// Answer every items request for `collection` with this status and body.
    pub fn error(mut self, collection: &str, status: u16, body: Value) -> Self {
        self.state
            .errors
            .insert(collection.to_string(), (status, body));
        self
    }

    /// Answer items requests for `collection` with 200 and no body.
    pub fn empty_body(mut self, collection: &str) -> Self {
        self.state.empty_bodies.insert(collection.to_string());
        self
    }

    /// Require a bearer token issued by the token endpoint, or a `key`.
    pub fn require_auth(mut self) -> Self {
        self.state.require_auth = true;
        self
    }

    pub async fn start(self) -> std::io::Result<MockFeatureApi> {
        let state: Shared = Arc::new(Mutex::new(self.state));
        let router = Router::new()
            .route("/collections", get(catalog))
            .route("/collections/", get(catalog))
            .route("/collections/:collection/items/", get(items))
            .route("/oauth2/token/v1", post(token))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(MockFeatureApi {
            addr,
            state,
            handle,
        })
    }
}

/// A running mock API. The server stops when this is dropped.
pub struct MockFeatureApi {
    addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockFeatureApi {
    pub fn builder() -> MockApiBuilder {
        MockApiBuilder::default()
    }

    /// Feature API root, e.g. `http://127.0.0.1:40123`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token/v1", self.base_url())
    }

    /// Items requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Number of tokens the token endpoint has issued.
    pub fn tokens_issued(&self) -> usize {
        lock(&self.state).tokens_issued
    }
}

impl Drop for MockFeatureApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn catalog(State(state): State<Shared>) -> Response {
    Json(lock(&state).catalog.clone()).into_response()
}

async fn items(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut state = lock(&state);
    state.requests.push(RecordedRequest {
        collection: collection.clone(),
        query: query.clone().into_iter().collect(),
        authorization: authorization.clone(),
    });

    if state.empty_bodies.contains(&collection) {
        return (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], "").into_response();
    }
    if let Some((status, body)) = state.errors.get(&collection) {
        return json_response(*status, body.clone());
    }

    if state.require_auth {
        let has_key = query.contains_key("key") || headers.contains_key("key");
        let bearer_ok = match (&state.valid_token, &authorization) {
            (Some(token), Some(auth)) => *auth == format!("Bearer {}", token),
            _ => false,
        };
        if !has_key && !bearer_ok {
            return json_response(401, fixtures::api_error(401, "Missing or unsupported API key provided."));
        }
    }

    let Some(features) = state.collections.get(&collection) else {
        return json_response(
            404,
            fixtures::api_error(
                404,
                &format!("Collection '{}' is not a supported Collection.", collection),
            ),
        );
    };

    let offset = parse_usize(&query, "offset").unwrap_or(0);
    let limit = parse_usize(&query, "limit")
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .min(MAX_PAGE_LIMIT);
    let end = (offset + limit).min(features.len());
    let start = offset.min(end);
    let next = (end < features.len()).then(|| {
        format!(
            "http://localhost/collections/{}/items?offset={}&limit={}",
            collection, end, limit
        )
    });

    json_response(200, page(features[start..end].to_vec(), next.as_deref()))
}

async fn token(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !basic {
        return json_response(401, json!({"error": "invalid_client"}));
    }

    let mut state = lock(&state);
    state.tokens_issued += 1;
    let token = format!("token-{}", state.tokens_issued);
    state.valid_token = Some(token.clone());

    json_response(
        200,
        json!({
            "access_token": token,
            "expires_in": "299",
            "issued_at": "1700000000000",
            "token_type": "BearerToken"
        }),
    )
}

fn parse_usize(query: &HashMap<String, String>, name: &str) -> Option<usize> {
    query.get(name).and_then(|v| v.parse().ok())
}

fn json_response(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}
