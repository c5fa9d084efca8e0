//! CQL filter construction and query parameter preparation.
//!
//! Only equality attribute filters and the INTERSECTS spatial predicate are
//! built here; that is what the API's Simple CQL conformance level offers. Any
//! other comparison has to be written into `filter` directly by the caller.

use crate::geometry::GeometryInput;
use crate::types::{FilterParams, ParamValue, QueryParameters};

/// Name of the query parameter carrying the CQL expression.
pub const FILTER_PARAM: &str = "filter";

/// URI prefix for EPSG coordinate reference systems.
pub const EPSG_URI_PREFIX: &str = "http://www.opengis.net/def/crs/EPSG/0/";

/// URI for OGC CRS84 (WGS84 lon/lat).
pub const CRS84_URI: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

/// Render attribute equality filters as `(k1='v1')and(k2=v2)`.
///
/// String values are single-quoted, everything else is rendered as is.
pub fn build_filter(params: &FilterParams) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            ParamValue::Text(text) => format!("({}='{}')", key, text),
            other => format!("({}={})", key, other),
        })
        .collect::<Vec<_>>()
        .join("and")
}

/// Render an INTERSECTS spatial filter for a WKT geometry.
pub fn build_spatial_filter(wkt: &str) -> String {
    format!("(INTERSECTS(geometry,{}))", wkt)
}

/// AND an addition onto an existing filter expression.
pub fn combine_filters(existing: Option<&str>, addition: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("({})and{}", existing, addition),
        _ => addition.to_string(),
    }
}

/// Expand bare EPSG codes and `CRS84` into full CRS URIs.
pub fn normalize_crs(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        format!("{}{}", EPSG_URI_PREFIX, value)
    } else if value == "CRS84" {
        CRS84_URI.to_string()
    } else {
        value.to_string()
    }
}

/// Build the final query parameters for one API call.
///
/// Attribute filters are AND-ed onto any caller-supplied `filter`, then the spatial
/// filter is AND-ed after them. Finally every crs-like parameter is normalised.
/// The caller's map is not modified.
pub fn prepare_parameters(
    query_params: &QueryParameters,
    filter_params: Option<&FilterParams>,
    wkt: Option<&GeometryInput>,
) -> QueryParameters {
    let mut params = query_params.clone();

    if let Some(filter_params) = filter_params.filter(|f| !f.is_empty()) {
        let attribute_filter = build_filter(filter_params);
        let existing = params.get(FILTER_PARAM).map(ToString::to_string);
        params.insert(
            FILTER_PARAM,
            combine_filters(existing.as_deref(), &attribute_filter),
        );
    }

    if let Some(wkt) = wkt {
        let spatial_filter = build_spatial_filter(&wkt.to_wkt_string());
        let existing = params.get(FILTER_PARAM).map(ToString::to_string);
        params.insert(
            FILTER_PARAM,
            combine_filters(existing.as_deref(), &spatial_filter),
        );
    }

    for (key, value) in params.iter_mut() {
        if key.contains("crs") {
            *value = ParamValue::Text(normalize_crs(&value.to_string()));
        }
    }

    params
}
