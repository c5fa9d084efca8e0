//! Request pipeline for the OS NGD Features API.
//!
//! A pipeline is a stack of [`Fetch`] implementations. The [`BaseRequester`]
//! issues a single items request; middlewares add OAuth token handling,
//! offset pagination, compound geometry fan-out and multi-collection fan-out.
//! [`PipelineBuilder`] assembles any subset of these in a fixed order:
//!
//! ```text
//! collections -> geometry -> pagination -> auth -> base
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use features_client::{Capabilities, ClientConfig, FeatureRequest, PipelineBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = PipelineBuilder::new(ClientConfig::from_env()?)?;
//! let pipeline = builder.build(Capabilities::NONE.with_auth().with_pagination());
//!
//! let request = FeatureRequest::for_collection("bld-fts-buildingpart-1").with_limit(Some(250));
//! let result = pipeline.fetch(request).await.map_err(|e| e.description)?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod base;
pub mod collection_fanout;
pub mod config;
pub mod fetch;
pub mod geometry_fanout;
pub mod http;
pub mod merge;
pub mod pagination;
pub mod pipeline;
pub mod request;
pub mod resolver;
pub mod telemetry;

pub use auth::{
    AuthMiddleware, InMemoryTokenStore, OAuthTokenProvider, TokenError, TokenProvider, TokenStore,
};
pub use base::BaseRequester;
pub use collection_fanout::CollectionFanoutMiddleware;
pub use config::{parse_bool, ClientConfig, ConfigError, RetryPolicy};
pub use fetch::{Fetch, FetchResult};
pub use geometry_fanout::GeometryFanoutMiddleware;
pub use merge::{concat_results, merge_results};
pub use pagination::PaginationMiddleware;
pub use pipeline::{Capabilities, PipelineBuilder};
pub use request::{FeatureRequest, Headers, DEFAULT_REQUEST_LIMIT};
pub use resolver::{CatalogResolver, CollectionResolver, StaticResolver};
pub use telemetry::{MemorySink, NoopSink, TelemetrySink, TracingSink};
