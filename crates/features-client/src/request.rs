//! The structured request passed down the pipeline.
//!
//! Each layer reads the fields it owns and forwards the rest unchanged;
//! everything the API understands travels in the open `query` bag.

use std::collections::BTreeMap;

use features_protocol::api::KEY_PARAM;
use features_protocol::{FilterParams, GeometryInput, ParamValue, QueryParameters};

/// Default cap on calls made by the pagination layer.
pub const DEFAULT_REQUEST_LIMIT: u32 = 50;

/// Headers never forwarded to the API.
const DROPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

/// Caller headers, keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    /// Headers that may be sent upstream.
    pub fn forwardable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(name, _)| !DROPPED_HEADERS.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// A normalised items request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequest {
    /// Target collection of a single-collection call.
    pub collection: Option<String>,

    /// Collections searched by collection fan-out, in order.
    pub collections: Vec<String>,

    /// Pass-through API parameters.
    pub query: QueryParameters,

    pub filter_params: Option<FilterParams>,

    /// Search area, WKT text or a parsed geometry.
    pub wkt: Option<GeometryInput>,

    pub headers: Headers,

    /// Maximum features returned by the pagination layer.
    pub limit: Option<u32>,

    /// Maximum calls made by the pagination layer. `Some(0)` and `None` mean unbounded.
    pub request_limit: Option<u32>,

    pub hierarchical_output: bool,

    pub use_latest_collection: bool,

    /// Overrides the configured telemetry default.
    pub log_request_details: Option<bool>,
}

impl Default for FeatureRequest {
    fn default() -> Self {
        Self {
            collection: None,
            collections: Vec::new(),
            query: QueryParameters::new(),
            filter_params: None,
            wkt: None,
            headers: Headers::new(),
            limit: None,
            request_limit: Some(DEFAULT_REQUEST_LIMIT),
            hierarchical_output: false,
            use_latest_collection: false,
            log_request_details: None,
        }
    }
}

impl FeatureRequest {
    /// A request against one collection.
    pub fn for_collection(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Self::default()
        }
    }

    /// A request fanned out over several collections.
    pub fn for_collections<I, S>(collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collections: collections.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: QueryParameters) -> Self {
        self.query = query;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query.insert(key, value);
        self
    }

    pub fn with_filter_params(mut self, filter_params: FilterParams) -> Self {
        self.filter_params = Some(filter_params);
        self
    }

    pub fn with_wkt(mut self, wkt: impl Into<GeometryInput>) -> Self {
        self.wkt = Some(wkt.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_request_limit(mut self, request_limit: Option<u32>) -> Self {
        self.request_limit = request_limit;
        self
    }

    pub fn hierarchical(mut self, hierarchical_output: bool) -> Self {
        self.hierarchical_output = hierarchical_output;
        self
    }

    pub fn use_latest(mut self, use_latest_collection: bool) -> Self {
        self.use_latest_collection = use_latest_collection;
        self
    }

    pub fn with_log_request_details(mut self, enabled: bool) -> Self {
        self.log_request_details = Some(enabled);
        self
    }

    /// Whether the caller supplied an API key, in a header or the query.
    pub fn has_api_key(&self) -> bool {
        self.headers.contains(KEY_PARAM) || self.query.contains_key(KEY_PARAM)
    }

    /// Attach a bearer token, replacing any existing authorization header.
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers
            .insert("authorization", format!("Bearer {}", token));
        self
    }

    /// Copy of this request narrowed to one collection.
    pub(crate) fn narrowed_to(&self, collection: &str) -> Self {
        Self {
            collection: Some(collection.to_string()),
            collections: Vec::new(),
            use_latest_collection: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_limit() {
        let request = FeatureRequest::for_collection("bld-fts-building-4");
        assert_eq!(request.request_limit, Some(50));
        assert_eq!(request.limit, None);
        assert!(!request.hierarchical_output);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let headers: Headers = [("Host", "localhost"), ("X-Trace", "abc")].into_iter().collect();
        assert_eq!(headers.get("host"), Some("localhost"));
        assert!(headers.contains("x-trace"));
        let forwarded: Vec<_> = headers.forwardable().collect();
        assert_eq!(forwarded, vec![("x-trace", "abc")]);
    }

    #[test]
    fn test_api_key_detection() {
        assert!(FeatureRequest::default().with_param("key", "abc").has_api_key());
        assert!(FeatureRequest::default().with_header("Key", "abc").has_api_key());
        assert!(!FeatureRequest::default().has_api_key());
    }

    #[test]
    fn test_narrowed_clears_fanout_fields() {
        let request = FeatureRequest::for_collections(["a-b-c", "d-e-f"])
            .use_latest(true)
            .hierarchical(true);
        let narrowed = request.narrowed_to("a-b-c-1");
        assert_eq!(narrowed.collection.as_deref(), Some("a-b-c-1"));
        assert!(narrowed.collections.is_empty());
        assert!(!narrowed.use_latest_collection);
        assert!(narrowed.hierarchical_output);
    }
}
