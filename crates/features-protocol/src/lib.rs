//! OGC API - Features protocol types
//!
//! This crate provides the data model shared by the feature request pipeline
//! and the HTTP front service: GeoJSON search results, the wire error record,
//! CQL filter construction, search geometry decomposition, and versioned
//! collection id handling.
//!
//! Everything here is pure; no I/O happens in this crate.
//!
//! # Example
//!
//! ```rust
//! use features_protocol::{prepare_parameters, FilterParams, GeometryInput, QueryParameters};
//!
//! let query = QueryParameters::new().with("crs", "27700");
//! let filters = FilterParams::new().with("description", "Building");
//! let wkt = GeometryInput::from("POINT(558288 104518)");
//!
//! let prepared = prepare_parameters(&query, Some(&filters), Some(&wkt));
//! assert_eq!(
//!     prepared.get("filter").unwrap().to_string(),
//!     "((description='Building'))and(INTERSECTS(geometry,POINT(558288 104518)))",
//! );
//! ```

pub mod types;
pub mod features;
pub mod errors;
pub mod filters;
pub mod geometry;
pub mod collections;
pub mod telemetry;

// Re-export commonly used types
pub use types::{FilterParams, Link, OneOrMany, ParamValue, QueryParameters};
pub use features::{CollectionResults, Feature, FeatureResponse, SearchAreas, SearchResult};
pub use errors::{ErrorResult, WrapperError, API_ERROR_SOURCE, WRAPPER_ERROR_SOURCE};
pub use filters::{build_filter, build_spatial_filter, combine_filters, normalize_crs, prepare_parameters};
pub use geometry::{explode, parse_wkt, AtomicGeometry, GeometryError, GeometryInput};
pub use collections::{
    latest_collection_lookup, Catalog, CatalogCollection, CollectionIdError, CollectionLookup,
    LatestCollections, RecentUpdates,
};
pub use telemetry::TelemetryRecord;

/// Feature API constants
pub mod api {
    /// Maximum features the API returns per page.
    pub const PAGE_SIZE: u32 = 100;
    /// Query parameter naming the page size.
    pub const LIMIT_PARAM: &str = "limit";
    /// Query parameter naming the page offset.
    pub const OFFSET_PARAM: &str = "offset";
    /// Credential parameter/header that bypasses OAuth.
    pub const KEY_PARAM: &str = "key";
}

/// Media types used in feature responses
pub mod media_types {
    /// GeoJSON media type
    pub const GEO_JSON: &str = "application/geo+json";
    /// JSON media type
    pub const JSON: &str = "application/json";
}
