//! Request telemetry records.
//!
//! A record is a flat key → value map describing one successful API call.
//! Delivery is the client's concern; this module only builds the record.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::features::{Feature, SearchResult};
use crate::filters::FILTER_PARAM;
use crate::types::QueryParameters;

/// Replacement for `filter` values longer than the configured limit.
pub const REDACTED_FILTER: &str = "REDACTED due to length";

pub const DEFAULT_FILTER_LENGTH_LIMIT: usize = 200;

/// Flat telemetry record for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetryRecord(BTreeMap<String, Value>);

impl TelemetryRecord {
    /// Build the record for a successful items request.
    pub fn for_items(
        path: &str,
        collection: &str,
        result: &SearchResult,
        query_params: &QueryParameters,
        filter_length_limit: usize,
    ) -> Self {
        let mut record = Self::default();
        record.insert("method", "GET");
        record.insert("url.path", path);
        record.insert("url.path_params.collection", collection);
        let bbox = match features_bbox(&result.features) {
            Some(bbox) => Value::from(bbox.to_vec()),
            None => Value::from(""),
        };
        record.insert("response.bbox", bbox);
        record.insert("response.numberReturned", result.number_returned);

        for (key, value) in query_params.iter() {
            let rendered = value.to_string();
            let value = if key == FILTER_PARAM && rendered.chars().count() > filter_length_limit {
                Value::from(REDACTED_FILTER)
            } else {
                serde_json::to_value(value).unwrap_or(Value::String(rendered))
            };
            record.insert(format!("url.query_params.{}", key), value);
        }
        record
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Flatten nested GeoJSON coordinate arrays into `[x, y]` pairs.
pub fn flatten_coordinates(coordinates: &Value) -> Vec<(f64, f64)> {
    let mut pairs = Vec::new();
    collect_pairs(coordinates, &mut pairs);
    pairs
}

fn collect_pairs(value: &Value, pairs: &mut Vec<(f64, f64)>) {
    let Value::Array(items) = value else {
        return;
    };
    match items.first() {
        Some(Value::Array(_)) => items.iter().for_each(|item| collect_pairs(item, pairs)),
        Some(_) => {
            if let (Some(x), Some(y)) = (
                items.first().and_then(Value::as_f64),
                items.get(1).and_then(Value::as_f64),
            ) {
                pairs.push((x, y));
            }
        }
        None => {}
    }
}

/// `[minx, miny, maxx, maxy]` over every coordinate of every feature.
pub fn features_bbox(features: &[Feature]) -> Option<[f64; 4]> {
    features
        .iter()
        .filter_map(|f| f.geometry.get("coordinates"))
        .flat_map(flatten_coordinates)
        .fold(None, |bbox, (x, y)| match bbox {
            None => Some([x, y, x, y]),
            Some([minx, miny, maxx, maxy]) => {
                Some([minx.min(x), miny.min(y), maxx.max(x), maxy.max(y)])
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn polygon_feature(id: &str, offset: f64) -> Feature {
        Feature::new(
            id,
            json!({
                "type": "Polygon",
                "coordinates": [[[offset, offset], [offset + 10.0, offset], [offset + 10.0, offset + 5.0], [offset, offset]]]
            }),
        )
    }

    #[test]
    fn test_flatten_coordinates_nested() {
        let coords = json!([[[[1.0, 2.0], [3.0, 4.0]]], [[[5.0, 6.0]]]]);
        assert_eq!(
            flatten_coordinates(&coords),
            vec![(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]
        );
        assert_eq!(flatten_coordinates(&json!([7, 8])), vec![(7.0, 8.0)]);
    }

    #[test]
    fn test_bbox_over_features() {
        let features = vec![polygon_feature("a", 0.0), polygon_feature("b", 100.0)];
        assert_eq!(features_bbox(&features), Some([0.0, 0.0, 110.0, 105.0]));
        assert_eq!(features_bbox(&[]), None);
    }

    #[test]
    fn test_record_fields() {
        let result = SearchResult::new(vec![polygon_feature("a", 0.0)], 1);
        let params = QueryParameters::new()
            .with("filter", "(a='x')")
            .with("crs", "http://www.opengis.net/def/crs/EPSG/0/27700");
        let record = TelemetryRecord::for_items(
            "/catalyst/features/bld-fts-building-4/items",
            "bld-fts-building-4",
            &result,
            &params,
            DEFAULT_FILTER_LENGTH_LIMIT,
        );
        assert_eq!(record.get("method"), Some(&json!("GET")));
        assert_eq!(record.get("response.bbox"), Some(&json!([0.0, 0.0, 10.0, 5.0])));
        assert_eq!(record.get("response.numberReturned"), Some(&json!(1)));
        assert_eq!(record.get("url.query_params.filter"), Some(&json!("(a='x')")));
    }

    #[test]
    fn test_long_filter_redacted() {
        let params = QueryParameters::new().with("filter", "x".repeat(201));
        let record = TelemetryRecord::for_items("/p", "c", &SearchResult::empty(), &params, 200);
        assert_eq!(record.get("url.query_params.filter"), Some(&json!(REDACTED_FILTER)));
        assert_eq!(record.get("response.bbox"), Some(&json!("")));
    }
}
