//! Query parameter normalisation.
//!
//! Wrapper-owned parameters are pulled out of the query string and
//! type-checked; everything else is passed through to the Features API
//! untouched.

use features_client::{parse_bool, Capabilities, FeatureRequest};
use features_protocol::{QueryParameters, WrapperError};

pub const WKT: &str = "wkt";
pub const USE_LATEST_COLLECTION: &str = "use-latest-collection";
pub const HIERARCHICAL_OUTPUT: &str = "hierarchical-output";
pub const LOG_REQUEST_DETAILS: &str = "log-request-details";
pub const LIMIT: &str = "limit";
pub const REQUEST_LIMIT: &str = "request-limit";
pub const COLLECTION: &str = "collection";
pub const RECENT_UPDATE_DAYS: &str = "recent-update-days";

/// Wrapper parameters extracted from one items request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrapperParams {
    pub wkt: Option<String>,
    pub use_latest_collection: bool,
    pub hierarchical_output: bool,
    pub log_request_details: Option<bool>,
    pub limit: Option<u32>,
    pub request_limit: Option<u32>,
    pub collections: Vec<String>,
}

impl WrapperParams {
    /// Split a raw query into wrapper parameters and pass-through parameters.
    ///
    /// Parameters only understood by disabled layers are passed through, so
    /// `limit` reaches the API as a page size on routes without pagination.
    pub fn extract(
        raw: Vec<(String, String)>,
        caps: Capabilities,
    ) -> Result<(Self, QueryParameters), WrapperError> {
        let hierarchical = caps.geometry || caps.collections;
        let mut params = WrapperParams::default();
        let mut query = QueryParameters::new();

        for (key, value) in raw {
            match key.as_str() {
                WKT => params.wkt = Some(value),
                USE_LATEST_COLLECTION => params.use_latest_collection = boolean(&key, &value)?,
                LOG_REQUEST_DETAILS => params.log_request_details = Some(boolean(&key, &value)?),
                HIERARCHICAL_OUTPUT if hierarchical => {
                    params.hierarchical_output = boolean(&key, &value)?
                }
                LIMIT if caps.pagination => params.limit = Some(integer(&key, &value)?),
                REQUEST_LIMIT if caps.pagination => {
                    params.request_limit = Some(integer(&key, &value)?)
                }
                COLLECTION if caps.collections => {
                    params.collections.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|c| !c.is_empty())
                            .map(str::to_string),
                    );
                }
                _ => query.insert(key, value),
            }
        }

        if caps.collections && params.collections.is_empty() {
            return Err(WrapperError::InvalidParameter {
                param: COLLECTION.to_string(),
                message: "a comma-separated list of collections is required".to_string(),
            });
        }

        Ok((params, query))
    }

    /// Build the pipeline request. `collection` is the path collection on
    /// single-collection routes.
    pub fn into_request(self, collection: Option<String>, query: QueryParameters) -> FeatureRequest {
        let mut request = match collection {
            Some(collection) => FeatureRequest::for_collection(collection),
            None => FeatureRequest::for_collections(self.collections),
        }
        .with_query(query)
        .use_latest(self.use_latest_collection)
        .hierarchical(self.hierarchical_output);

        if let Some(wkt) = self.wkt {
            request = request.with_wkt(wkt);
        }
        if let Some(enabled) = self.log_request_details {
            request = request.with_log_request_details(enabled);
        }
        if self.limit.is_some() {
            request = request.with_limit(self.limit);
        }
        if self.request_limit.is_some() {
            request = request.with_request_limit(self.request_limit);
        }
        request
    }
}

/// Parameters of the latest-collections endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionsParams {
    pub recent_update_days: Option<u32>,
    pub log_request_details: Option<bool>,
}

impl CollectionsParams {
    /// Parse the query of `latest-collections`, or of `latest-collections/{collection}`
    /// when `single` is set. Unknown parameters are rejected.
    pub fn extract(raw: Vec<(String, String)>, single: bool) -> Result<Self, WrapperError> {
        let mut params = CollectionsParams::default();
        for (key, value) in raw {
            match key.as_str() {
                LOG_REQUEST_DETAILS => params.log_request_details = Some(boolean(&key, &value)?),
                RECENT_UPDATE_DAYS if !single => {
                    params.recent_update_days = Some(integer(&key, &value)?)
                }
                _ if single => {
                    return Err(WrapperError::InvalidParameter {
                        param: key,
                        message: "the only supported query parameter for this endpoint is 'log-request-details'".to_string(),
                    })
                }
                _ => {
                    return Err(WrapperError::InvalidParameter {
                        param: key,
                        message: "the only supported query parameters for this endpoint are: 'recent-update-days', 'log-request-details'".to_string(),
                    })
                }
            }
        }
        Ok(params)
    }
}

fn boolean(key: &str, value: &str) -> Result<bool, WrapperError> {
    parse_bool(value).ok_or_else(|| WrapperError::InvalidParameter {
        param: key.to_string(),
        message: format!("'{}' is not a valid boolean", value),
    })
}

fn integer(key: &str, value: &str) -> Result<u32, WrapperError> {
    value.parse().map_err(|_| WrapperError::InvalidParameter {
        param: key.to_string(),
        message: format!("'{}' is not a valid non-negative integer", value),
    })
}
