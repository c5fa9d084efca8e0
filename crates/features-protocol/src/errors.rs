//! Error types returned through the request pipeline.
//!
//! Every layer reports failure as an [`ErrorResult`], the JSON error shape
//! `{code, description, errorSource, help?}` shared with API consumers. The
//! `errorSource` field tells the consumer whether the wrapper rejected the request
//! or the upstream API did.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::geometry::GeometryError;

/// `errorSource` for errors raised by the wrapper itself.
pub const WRAPPER_ERROR_SOURCE: &str = "Catalyst Wrapper";

/// `errorSource` for errors reported by the upstream feature API.
pub const API_ERROR_SOURCE: &str = "OS NGD API";

/// Placeholder substituted with the wrapper's own parameter names by the front service.
pub const SUPPORTED_ATTRIBUTES_PLACEHOLDER: &str = "{attr}";

const WKT_HELP_URL: &str = "http://libgeos.org/specifications/wkt/";

/// Catalog listing referenced when a collection basename is not recognised.
pub const CATALOG_HELP_URL: &str = "https://api.os.uk/features/ngd/ofa/v1/collections";

/// The error record returned instead of a search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[error("{code} ({error_source}): {description}")]
pub struct ErrorResult {
    pub code: u16,

    pub description: String,

    #[serde(rename = "errorSource")]
    pub error_source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// Extra fields reported by the upstream API, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorResult {
    pub fn new(code: u16, description: impl Into<String>, error_source: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            error_source: error_source.into(),
            help: None,
            extra: Map::new(),
        }
    }

    /// An error raised by the wrapper (caller input, credentials, internal).
    pub fn wrapper(code: u16, description: impl Into<String>) -> Self {
        Self::new(code, description, WRAPPER_ERROR_SOURCE)
    }

    /// An error reported by, or while talking to, the upstream API.
    pub fn api(code: u16, description: impl Into<String>) -> Self {
        Self::new(code, description, API_ERROR_SOURCE)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == 401
    }

    pub fn is_from_wrapper(&self) -> bool {
        self.error_source == WRAPPER_ERROR_SOURCE
    }

    /// Whether this is the "unsupported collection base name" lookup failure.
    pub fn is_unsupported_collection(&self) -> bool {
        self.code == 404 && self.description.contains("is not a supported Collection")
    }

    /// Fill the `{attr}` placeholder with the names of the wrapper parameters
    /// accepted by the endpoint that produced this error.
    pub fn with_supported_attributes(mut self, attributes: &[&str]) -> Self {
        if self.description.contains(SUPPORTED_ATTRIBUTES_PLACEHOLDER) {
            self.description = self
                .description
                .replace(SUPPORTED_ATTRIBUTES_PLACEHOLDER, &attributes.join(", "));
        }
        self
    }
}

/// Errors raised by the wrapper before or instead of calling the API.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// The pagination layer owns `offset`.
    #[error("'offset' is not a valid attribute for functions using this Catalyst wrapper.")]
    OffsetNotAllowed,

    /// Neither `limit` nor `request_limit` bounds the number of requests.
    #[error("At least one of limit or request_limit must be provided to prevent indefinitely numerous requests and high costs.")]
    UnboundedPagination,

    #[error("invalid geometry")]
    InvalidGeometry(#[from] GeometryError),

    #[error("Missing or invalid credentials")]
    MissingCredentials,

    #[error("Collection '{0}' is not a supported Collection base name. The name must not include a version suffix. Please refer to the documentation for a list of supported Collections.")]
    UnsupportedCollection(String),

    #[error("A collection must be supplied for this request.")]
    MissingCollection,

    #[error("Invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("The HTTP method requested is not supported. This endpoint only supports 'GET' requests.")]
    MethodNotAllowed,

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl WrapperError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            WrapperError::OffsetNotAllowed
            | WrapperError::UnboundedPagination
            | WrapperError::InvalidGeometry(_)
            | WrapperError::MissingCollection
            | WrapperError::InvalidParameter { .. } => 400,
            WrapperError::MissingCredentials => 401,
            WrapperError::UnsupportedCollection(_) => 404,
            WrapperError::MethodNotAllowed => 405,
            WrapperError::UnexpectedResponse(_) => 500,
        }
    }

    /// Convert to the wire error record.
    pub fn to_error_result(&self) -> ErrorResult {
        let result = ErrorResult::wrapper(self.status_code(), self.to_string());
        match self {
            WrapperError::InvalidGeometry(_) => result.with_help(WKT_HELP_URL),
            WrapperError::UnsupportedCollection(_) => result.with_help(CATALOG_HELP_URL),
            _ => result,
        }
    }
}

impl From<WrapperError> for ErrorResult {
    fn from(err: WrapperError) -> Self {
        err.to_error_result()
    }
}
