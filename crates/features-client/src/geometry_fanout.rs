//! Searching compound geometries one atomic part at a time.

use async_trait::async_trait;
use tracing::{debug, info};

use features_protocol::{
    explode, AtomicGeometry, ErrorResult, FeatureResponse, GeometryInput, SearchAreas,
    SearchResult, WrapperError,
};

use crate::fetch::{Fetch, FetchResult};
use crate::merge::merge_results;
use crate::request::FeatureRequest;

/// Explodes the request geometry into Point / LineString / Polygon search
/// areas and issues one inner call per area, in order.
///
/// Limits handled by an inner pagination layer apply to each search area
/// separately, not to the merged total.
pub struct GeometryFanoutMiddleware<F> {
    inner: F,
}

impl<F: Fetch> GeometryFanoutMiddleware<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    async fn search_areas(
        &self,
        request: &FeatureRequest,
        areas: Vec<AtomicGeometry>,
    ) -> Result<Vec<SearchResult>, ErrorResult> {
        let mut results = Vec::with_capacity(areas.len());
        for (number, area) in areas.into_iter().enumerate() {
            debug!(search_area = number, geometry = area.type_name(), "Searching area");
            let mut result = self
                .inner
                .fetch(request.clone().with_wkt(area))
                .await?
                .into_search_result()
                .map_err(ErrorResult::from)?;
            result.search_area_number = Some(number);
            results.push(result);
        }
        Ok(results)
    }
}

#[async_trait]
impl<F: Fetch> Fetch for GeometryFanoutMiddleware<F> {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        let geometry = match request.wkt.as_ref().map(GeometryInput::parse) {
            // Stacked under collection fan-out, requests without a search area
            // still reach the API as plain collection searches.
            None => return self.inner.fetch(request).await,
            Some(parsed) => parsed.map_err(|e| {
                debug!(error = %e, "Rejecting search geometry");
                ErrorResult::from(WrapperError::InvalidGeometry(e))
            })?,
        };
        let areas = explode(geometry);
        info!(search_areas = areas.len(), "Fanning out over search areas");

        let results = self.search_areas(&request, areas).await?;

        if request.hierarchical_output {
            return Ok(FeatureResponse::SearchAreas(SearchAreas {
                search_areas: results,
            }));
        }

        let collection = results.iter().find_map(|r| r.collection.clone());
        let merged = merge_results(results.into_iter().enumerate());
        Ok(FeatureResponse::Features(merged.with_collection(collection)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use features_protocol::{Feature, OneOrMany};
    use serde_json::Value;

    /// Returns features "shared" and "area-N" for the N-th call, recording the WKT seen.
    #[derive(Default)]
    struct Areas {
        seen: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Fetch for Areas {
        async fn fetch(&self, request: FeatureRequest) -> FetchResult {
            let n = {
                let mut seen = self.seen.lock().unwrap();
                let wkt = request
                    .wkt
                    .as_ref()
                    .map(GeometryInput::to_wkt_string)
                    .unwrap_or_default();
                seen.push(wkt);
                seen.len() - 1
            };
            if self.fail_on == Some(n) {
                return Err(ErrorResult::api(500, "Internal Server Error"));
            }
            let features = vec![
                Feature::new("shared", Value::Null),
                Feature::new(format!("area-{}", n), Value::Null),
            ];
            Ok(FeatureResponse::Features(
                SearchResult::new(features, 1).with_collection(Some("lnd-fts-land-3".into())),
            ))
        }
    }

    const TWO_SQUARES: &str =
        "MULTIPOLYGON(((0 0, 1 0, 1 1, 0 0)), ((10 10, 11 10, 11 11, 10 10)))";

    #[tokio::test]
    async fn test_merge_dedups_across_areas() {
        let fanout = GeometryFanoutMiddleware::new(Areas::default());
        let request = FeatureRequest::for_collection("lnd-fts-land-3").with_wkt(TWO_SQUARES);

        let result = fanout.fetch(request).await.unwrap().into_search_result().unwrap();

        assert_eq!(result.number_of_requests, 2);
        assert_eq!(result.number_returned, 3);
        assert_eq!(result.features[0].id, "shared");
        assert_eq!(
            result.features[0].search_area_number,
            Some(OneOrMany::Many(vec![0, 1]))
        );
        assert_eq!(result.collection.as_deref(), Some("lnd-fts-land-3"));

        let seen = fanout.inner.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("POLYGON"));
        assert!(seen[1].starts_with("POLYGON"));
        assert_ne!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn test_hierarchical_output() {
        let fanout = GeometryFanoutMiddleware::new(Areas::default());
        let request = FeatureRequest::for_collection("lnd-fts-land-3")
            .with_wkt(TWO_SQUARES)
            .hierarchical(true);

        match fanout.fetch(request).await.unwrap() {
            FeatureResponse::SearchAreas(areas) => {
                assert_eq!(areas.search_areas.len(), 2);
                assert_eq!(areas.search_areas[1].search_area_number, Some(1));
                assert_eq!(areas.search_areas[1].features.len(), 2);
            }
            other => panic!("Expected search areas, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_geometry() {
        let fanout = GeometryFanoutMiddleware::new(Areas::default());
        let request = FeatureRequest::for_collection("lnd-fts-land-3").with_wkt("POLYGON((0 0, 1");
        let err = fanout.fetch(request).await.unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.description, "invalid geometry");
        assert!(err.is_from_wrapper());
        assert!(fanout.inner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_short_circuits() {
        let fanout = GeometryFanoutMiddleware::new(Areas {
            fail_on: Some(1),
            ..Areas::default()
        });
        let request = FeatureRequest::for_collection("lnd-fts-land-3").with_wkt(
            "GEOMETRYCOLLECTION(POINT(1 1), POINT(2 2), POINT(3 3))",
        );
        let err = fanout.fetch(request).await.unwrap_err();
        assert_eq!(err.code, 500);
        assert_eq!(fanout.inner.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_without_geometry_passes_through() {
        let fanout = GeometryFanoutMiddleware::new(Areas::default());
        let result = fanout
            .fetch(FeatureRequest::for_collection("lnd-fts-land-3"))
            .await
            .unwrap()
            .into_search_result()
            .unwrap();
        assert_eq!(result.number_returned, 2);
        assert!(result.features[0].search_area_number.is_none());
    }
}
