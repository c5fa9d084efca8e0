//! The base requester: one GET, one collection, one page, one geometry.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use features_protocol::collections::has_version;
use features_protocol::{
    prepare_parameters, ErrorResult, FeatureResponse, SearchResult, TelemetryRecord, WrapperError,
};

use crate::config::ClientConfig;
use crate::fetch::{Fetch, FetchResult};
use crate::http::{get_json, header_map};
use crate::request::FeatureRequest;
use crate::resolver::{CatalogResolver, CollectionResolver};
use crate::telemetry::{TelemetrySink, TracingSink};

/// Issues `GET {base}/collections/{collection}/items/` for a single request.
pub struct BaseRequester {
    client: Client,
    config: Arc<ClientConfig>,
    resolver: Arc<dyn CollectionResolver>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl BaseRequester {
    /// Create a requester using the catalog at the configured base URL.
    pub fn new(client: Client, config: Arc<ClientConfig>) -> Self {
        let resolver = Arc::new(CatalogResolver::new(client.clone(), &config));
        Self {
            client,
            config,
            resolver,
            telemetry: Arc::new(TracingSink),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CollectionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn items_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/items/", self.config.base_url, collection)
    }

    async fn target_collection(&self, request: &FeatureRequest) -> Result<String, ErrorResult> {
        let collection = request
            .collection
            .clone()
            .or_else(|| match request.collections.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            })
            .ok_or(WrapperError::MissingCollection)?;

        if request.use_latest_collection && !has_version(&collection) {
            let resolved = self.resolver.resolve(std::slice::from_ref(&collection)).await?;
            if let Some(latest) = resolved.into_iter().next() {
                debug!(basename = %collection, collection = %latest, "Resolved latest collection");
                return Ok(latest);
            }
        }
        Ok(collection)
    }

    #[instrument(skip(self, request), fields(collection = %collection))]
    async fn request_items(
        &self,
        collection: &str,
        request: &FeatureRequest,
    ) -> Result<SearchResult, ErrorResult> {
        let params = prepare_parameters(
            &request.query,
            request.filter_params.as_ref(),
            request.wkt.as_ref(),
        );
        let url = self.items_url(collection);

        let response = get_json(
            &self.client,
            &url,
            &params.to_pairs(),
            header_map(&request.headers),
            self.config.request_timeout,
            &self.config.retry,
        )
        .await?;

        if response.is_error() {
            debug!(status = response.status, "Feature API returned an error");
            return Err(response.into_error());
        }

        let mut result: SearchResult = serde_json::from_value(response.body).map_err(|e| {
            ErrorResult::api(
                500,
                format!("Unexpected response from the feature API: {}", e),
            )
        })?;

        for feature in result.features.iter_mut() {
            feature.set_collection(collection);
        }
        result.collection = Some(collection.to_string());
        result.number_of_requests = 1;
        result.number_returned = result.features.len();

        debug!(returned = result.number_returned, "Fetched page");

        if request
            .log_request_details
            .unwrap_or(self.config.log_request_details)
        {
            self.telemetry.record(TelemetryRecord::for_items(
                &url,
                collection,
                &result,
                &params,
                self.config.telemetry_filter_limit,
            ));
        }

        Ok(result)
    }
}

#[async_trait]
impl Fetch for BaseRequester {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        let collection = self.target_collection(&request).await?;
        self.request_items(&collection, &request)
            .await
            .map(FeatureResponse::Features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    fn requester() -> BaseRequester {
        let config = Arc::new(ClientConfig::default().with_base_url("http://127.0.0.1:9/ngd/"));
        BaseRequester::new(Client::new(), config)
            .with_resolver(Arc::new(StaticResolver::from_ids(["trn-ntwk-road-1", "trn-ntwk-road-3"])))
    }

    #[test]
    fn test_items_url() {
        assert_eq!(
            requester().items_url("trn-ntwk-road-1"),
            "http://127.0.0.1:9/ngd/collections/trn-ntwk-road-1/items/"
        );
    }

    #[tokio::test]
    async fn test_target_collection_resolves_latest() {
        let request = FeatureRequest::for_collection("trn-ntwk-road").use_latest(true);
        assert_eq!(
            requester().target_collection(&request).await.unwrap(),
            "trn-ntwk-road-3"
        );

        let versioned = FeatureRequest::for_collection("trn-ntwk-road-1").use_latest(true);
        assert_eq!(
            requester().target_collection(&versioned).await.unwrap(),
            "trn-ntwk-road-1"
        );
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let err = requester()
            .fetch(FeatureRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, 400);
        assert!(err.is_from_wrapper());
    }

    #[tokio::test]
    async fn test_unknown_basename_is_404() {
        let request = FeatureRequest::for_collection("wtr-fts-water").use_latest(true);
        let err = requester().fetch(request).await.unwrap_err();
        assert!(err.is_unsupported_collection());
    }
}
