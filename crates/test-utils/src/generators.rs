//! Feature and page generators.
//!
//! Features are GeoJSON points laid out on a grid so that every generated
//! feature has a distinct id and position.

use serde_json::{json, Value};

/// A GeoJSON point feature.
pub fn point_feature(id: &str, x: f64, y: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": {"type": "Point", "coordinates": [x, y]},
        "properties": {"osid": id, "description": "Building"}
    })
}

/// `count` point features with ids `{prefix}-0`, `{prefix}-1`, ...
pub fn features(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let x = 292000.0 + (i % 100) as f64 * 10.0;
            let y = 92000.0 + (i / 100) as f64 * 10.0;
            point_feature(&format!("{}-{}", prefix, i), x, y)
        })
        .collect()
}

/// A FeatureCollection page as the items endpoint returns it.
///
/// A `next` link is included when `next_href` is given.
pub fn page(features: Vec<Value>, next_href: Option<&str>) -> Value {
    let mut links = vec![json!({
        "href": "http://localhost/items",
        "rel": "self",
        "type": "application/geo+json"
    })];
    if let Some(href) = next_href {
        links.push(json!({"href": href, "rel": "next", "type": "application/geo+json"}));
    }
    json!({
        "type": "FeatureCollection",
        "numberReturned": features.len(),
        "timeStamp": "2024-10-01T12:00:00.000Z",
        "links": links,
        "features": features
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_have_distinct_ids() {
        let generated = features("f", 150);
        assert_eq!(generated.len(), 150);
        assert_eq!(generated[0]["id"], "f-0");
        assert_eq!(generated[149]["id"], "f-149");
        assert_eq!(generated[120]["geometry"]["coordinates"][1], 92010.0);
    }

    #[test]
    fn test_page_next_link() {
        let with_next = page(features("f", 2), Some("http://localhost/items?offset=2"));
        assert_eq!(with_next["links"].as_array().unwrap().len(), 2);
        assert_eq!(with_next["numberReturned"], 2);

        let last = page(Vec::new(), None);
        assert_eq!(last["links"].as_array().unwrap().len(), 1);
    }
}
