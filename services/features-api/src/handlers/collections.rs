//! Latest-collections handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, OriginalUri, Path, Query},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use tracing::debug;

use features_protocol::{ErrorResult, TelemetryRecord};

use super::error_response;
use crate::params::CollectionsParams;
use crate::state::AppState;

/// GET /catalyst/features/latest-collections
///
/// Maps every collection basename to its latest versioned id. With
/// `recent-update-days`, also lists the latest versions that started within
/// that many days.
pub async fn latest_collections_handler(
    Extension(state): Extension<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(raw): Query<Vec<(String, String)>>,
) -> Response {
    counter!("features_requests_total", "route" => "latest-collections").increment(1);
    let params = match CollectionsParams::extract(raw, false) {
        Ok(params) => params,
        Err(e) => return error_response(e.into()),
    };

    match state.resolver.latest_collections(params.recent_update_days).await {
        Ok(latest) => {
            record_request(&state, &uri.to_string(), &params);
            Json(latest).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /catalyst/features/latest-collections/{collection}
pub async fn latest_collection_handler(
    Extension(state): Extension<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Path(collection): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Response {
    counter!("features_requests_total", "route" => "latest-collections/collection").increment(1);
    let params = match CollectionsParams::extract(raw, true) {
        Ok(params) => params,
        Err(e) => return error_response(e.into()),
    };

    match resolve_one(&state, collection).await {
        Ok(latest) => {
            record_request(&state, &uri.to_string(), &params);
            Json(latest).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn resolve_one(
    state: &AppState,
    collection: String,
) -> Result<BTreeMap<String, String>, ErrorResult> {
    let resolved = state
        .resolver
        .resolve(std::slice::from_ref(&collection))
        .await?;
    debug!(basename = %collection, resolved = ?resolved, "Resolved latest collection");
    Ok(collection_map(collection, resolved))
}

fn collection_map(basename: String, resolved: Vec<String>) -> BTreeMap<String, String> {
    resolved
        .into_iter()
        .next()
        .map(|latest| BTreeMap::from([(basename, latest)]))
        .unwrap_or_default()
}

fn record_request(state: &AppState, path: &str, params: &CollectionsParams) {
    if !params.log_request_details.unwrap_or(state.log_request_details) {
        return;
    }
    let mut record = TelemetryRecord::default();
    record.insert("method", "GET");
    record.insert("url.path", path);
    if let Some(days) = params.recent_update_days {
        record.insert("url.query_params.recent-update-days", days);
    }
    state.telemetry.record(record);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_map() {
        let map = collection_map("trn-ntwk-road".into(), vec!["trn-ntwk-road-3".into()]);
        assert_eq!(map["trn-ntwk-road"], "trn-ntwk-road-3");
        assert!(collection_map("x".into(), Vec::new()).is_empty());
    }
}
