//! Application state for the features API.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use features_client::{
    Capabilities, ClientConfig, CollectionResolver, Fetch, PipelineBuilder, TelemetrySink,
};

/// Shared application state.
pub struct AppState {
    /// One pipeline per capability set, all sharing a client and token store.
    pipelines: HashMap<Capabilities, Arc<dyn Fetch>>,

    /// Catalog lookups for the latest-collections endpoints.
    pub resolver: Arc<dyn CollectionResolver>,

    /// Sink for per-request telemetry records, shared with the pipelines.
    pub telemetry: Arc<dyn TelemetrySink>,

    /// Default for requests that do not set `log-request-details`.
    pub log_request_details: bool,

    /// Renders `/metrics`; absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState from environment configuration.
    pub fn new() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        let builder = PipelineBuilder::new(config)?;
        Ok(Self::from_builder(builder))
    }

    /// Build every pipeline from a configured builder. The endpoints share
    /// the builder's resolver and telemetry sink.
    pub fn from_builder(builder: PipelineBuilder) -> Self {
        let pipelines = builder.build_all().into_iter().collect();
        Self {
            pipelines,
            resolver: builder.collection_resolver(),
            telemetry: builder.telemetry_sink(),
            log_request_details: builder.config().log_request_details,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// The pipeline for a capability set.
    pub fn pipeline(&self, caps: Capabilities) -> Option<Arc<dyn Fetch>> {
        self.pipelines.get(&caps).cloned()
    }
}
