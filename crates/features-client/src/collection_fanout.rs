//! Searching several collections with one request.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use features_protocol::{CollectionResults, ErrorResult, FeatureResponse, WrapperError};

use crate::fetch::{Fetch, FetchResult};
use crate::merge::concat_results;
use crate::request::FeatureRequest;
use crate::resolver::CollectionResolver;

/// Issues one inner call per collection, in order, and joins the results
/// with per-collection request and feature counts. Features are not
/// deduplicated across collections.
///
/// Limits handled by inner layers apply to each collection separately.
pub struct CollectionFanoutMiddleware<F> {
    inner: F,
    resolver: Arc<dyn CollectionResolver>,
}

impl<F: Fetch> CollectionFanoutMiddleware<F> {
    pub fn new(inner: F, resolver: Arc<dyn CollectionResolver>) -> Self {
        Self { inner, resolver }
    }

    async fn target_collections(&self, request: &FeatureRequest) -> Result<Vec<String>, ErrorResult> {
        let collections = if request.collections.is_empty() {
            request.collection.iter().cloned().collect::<Vec<_>>()
        } else {
            request.collections.clone()
        };
        if collections.is_empty() {
            return Err(WrapperError::MissingCollection.into());
        }

        if request.use_latest_collection {
            let resolved = self.resolver.apply_latest(&collections).await?;
            debug!(requested = ?collections, resolved = ?resolved, "Applied latest collections");
            return Ok(resolved);
        }
        Ok(collections)
    }
}

#[async_trait]
impl<F: Fetch> Fetch for CollectionFanoutMiddleware<F> {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        let collections = self.target_collections(&request).await?;
        info!(collections = collections.len(), "Fanning out over collections");

        let mut results = Vec::with_capacity(collections.len());
        for collection in &collections {
            let response = self.inner.fetch(request.narrowed_to(collection)).await;
            match response {
                Ok(response) => results.push((collection.clone(), response)),
                Err(e) => {
                    debug!(collection = %collection, code = e.code, "Collection request failed");
                    return Err(e);
                }
            }
        }

        if request.hierarchical_output {
            let mut by_collection = CollectionResults::new();
            for (collection, response) in results {
                by_collection.push(collection, response);
            }
            return Ok(FeatureResponse::ByCollection(by_collection));
        }

        let parts = results
            .into_iter()
            .map(|(collection, response)| {
                let result = response.into_search_result().map_err(ErrorResult::from)?;
                Ok((collection, result))
            })
            .collect::<Result<Vec<_>, ErrorResult>>()?;

        Ok(FeatureResponse::Features(concat_results(parts)))
    }
}
