//! Offset pagination beyond the API's 100-feature page cap.

use async_trait::async_trait;
use tracing::debug;

use features_protocol::api::{LIMIT_PARAM, OFFSET_PARAM, PAGE_SIZE};
use features_protocol::{ErrorResult, Feature, FeatureResponse, SearchResult, WrapperError};

use crate::fetch::{Fetch, FetchResult};
use crate::request::FeatureRequest;

/// Loops over pages until a limit is reached or the server reports no next page.
///
/// `limit` bounds the number of features, `request_limit` the number of calls;
/// at least one must be set. The first error aborts the loop and partial
/// results are discarded.
pub struct PaginationMiddleware<F> {
    inner: F,
}

impl<F: Fetch> PaginationMiddleware<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<F: Fetch> Fetch for PaginationMiddleware<F> {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        if request.query.contains_key(OFFSET_PARAM) {
            return Err(WrapperError::OffsetNotAllowed.into());
        }

        let request_limit = request.request_limit.filter(|&n| n > 0);
        let limit = request.limit.filter(|&n| n > 0);
        if request_limit.is_none() && limit.is_none() {
            return Err(WrapperError::UnboundedPagination.into());
        }

        // Index of the page that is cut short to land exactly on `limit`.
        let (final_batch, final_batch_size) = match limit {
            Some(limit) => (Some(limit / PAGE_SIZE), limit % PAGE_SIZE),
            None => (None, 0),
        };

        let mut features: Vec<Feature> = Vec::new();
        let mut collection = None;
        let mut requests: u32 = 0;
        let mut offset: u32 = 0;

        loop {
            if request_limit == Some(requests) || limit.is_some_and(|limit| offset >= limit) {
                break;
            }

            let page_size = if final_batch == Some(requests) {
                final_batch_size
            } else {
                PAGE_SIZE
            };
            let page_request = request
                .clone()
                .with_param(OFFSET_PARAM, offset)
                .with_param(LIMIT_PARAM, page_size);

            let page = self
                .inner
                .fetch(page_request)
                .await?
                .into_search_result()
                .map_err(ErrorResult::from)?;
            requests += 1;

            let has_next = page.has_next_page();
            if collection.is_none() {
                collection = page.collection;
            }
            features.extend(page.features);

            debug!(
                offset = offset,
                requests = requests,
                total = features.len(),
                "Fetched page"
            );

            if !has_next {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(FeatureResponse::Features(
            SearchResult::new(features, requests).with_collection(collection),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use features_protocol::Link;
    use serde_json::Value;

    /// Serves `total` features in pages, recording each (offset, limit) requested.
    struct Source {
        total: Option<u32>,
        calls: Mutex<Vec<(u32, u32)>>,
    }

    impl Source {
        fn new(total: Option<u32>) -> Self {
            Self {
                total,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(u32, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn param(request: &FeatureRequest, key: &str) -> u32 {
        request
            .query
            .get(key)
            .and_then(|v| v.to_string().parse().ok())
            .unwrap_or(0)
    }

    #[async_trait]
    impl Fetch for Source {
        async fn fetch(&self, request: FeatureRequest) -> FetchResult {
            let offset = param(&request, OFFSET_PARAM);
            let limit = param(&request, LIMIT_PARAM);
            self.calls.lock().unwrap().push((offset, limit));

            let end = match self.total {
                Some(total) => total.min(offset + limit),
                None => offset + limit,
            };
            let features = (offset..end)
                .map(|i| Feature::new(format!("f{}", i), Value::Null))
                .collect();
            let mut page = SearchResult::new(features, 1)
                .with_collection(request.collection.clone());
            if self.total.map_or(true, |total| end < total) {
                page.links.push(Link::new("http://localhost/items?offset=next", "next"));
            }
            Ok(FeatureResponse::Features(page))
        }
    }

    async fn run(source: &Arc<Source>, limit: Option<u32>, request_limit: Option<u32>) -> SearchResult {
        let pagination = PaginationMiddleware::new(source.clone());
        let request = FeatureRequest::for_collection("bld-fts-building-4")
            .with_limit(limit)
            .with_request_limit(request_limit);
        pagination
            .fetch(request)
            .await
            .unwrap()
            .into_search_result()
            .unwrap()
    }

    #[tokio::test]
    async fn test_limit_150_of_250() {
        let source = Arc::new(Source::new(Some(250)));
        let result = run(&source, Some(150), None).await;
        assert_eq!(source.calls(), vec![(0, 100), (100, 50)]);
        assert_eq!(result.number_returned, 150);
        assert_eq!(result.number_of_requests, 2);
        assert_eq!(result.collection.as_deref(), Some("bld-fts-building-4"));
    }

    #[tokio::test]
    async fn test_request_limit_on_infinite_source() {
        let source = Arc::new(Source::new(None));
        let result = run(&source, None, Some(3)).await;
        assert_eq!(source.calls().len(), 3);
        assert_eq!(result.number_returned, 300);
    }

    #[tokio::test]
    async fn test_stops_without_next_link() {
        let source = Arc::new(Source::new(Some(120)));
        let result = run(&source, None, Some(50)).await;
        assert_eq!(source.calls(), vec![(0, 100), (100, 100)]);
        assert_eq!(result.number_returned, 120);
    }

    #[tokio::test]
    async fn test_exact_multiple_of_page_size() {
        let source = Arc::new(Source::new(None));
        let result = run(&source, Some(200), Some(50)).await;
        assert_eq!(source.calls(), vec![(0, 100), (100, 100)]);
        assert_eq!(result.number_returned, 200);
    }

    #[tokio::test]
    async fn test_small_limit_single_short_page() {
        let source = Arc::new(Source::new(None));
        let result = run(&source, Some(30), None).await;
        assert_eq!(source.calls(), vec![(0, 30)]);
        assert_eq!(result.number_returned, 30);
    }

    #[tokio::test]
    async fn test_offset_rejected() {
        let source = Arc::new(Source::new(None));
        let request = FeatureRequest::for_collection("c-d-e-1").with_param("offset", 100u32);
        let err = PaginationMiddleware::new(source.clone()).fetch(request).await.unwrap_err();
        assert_eq!(err.code, 400);
        assert!(err.description.contains("'offset'"));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_rejected() {
        let source = Arc::new(Source::new(None));
        let request = FeatureRequest::for_collection("c-d-e-1")
            .with_limit(Some(0))
            .with_request_limit(None);
        let err = PaginationMiddleware::new(source.clone()).fetch(request).await.unwrap_err();
        assert_eq!(err.code, 400);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_error_discards_partial_results() {
        struct FailsSecond(Mutex<u32>);

        #[async_trait]
        impl Fetch for FailsSecond {
            async fn fetch(&self, _request: FeatureRequest) -> FetchResult {
                let mut n = self.0.lock().unwrap();
                *n += 1;
                if *n == 2 {
                    return Err(ErrorResult::api(503, "Service Unavailable"));
                }
                let mut page = SearchResult::new(vec![Feature::new("a", Value::Null)], 1);
                page.links.push(Link::new("http://localhost/next", "next"));
                Ok(FeatureResponse::Features(page))
            }
        }

        let pagination = PaginationMiddleware::new(FailsSecond(Mutex::new(0)));
        let err = pagination
            .fetch(FeatureRequest::for_collection("c-d-e-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, 503);
        assert_eq!(*pagination.inner.0.lock().unwrap(), 2);
    }
}
