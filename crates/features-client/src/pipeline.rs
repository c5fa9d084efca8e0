//! Composition of pipelines from capability sets.
//!
//! Layers always stack in the same order, outermost first:
//! collection fan-out, geometry fan-out, pagination, auth, base requester.
//! Any subset may be enabled, giving 16 pipelines.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;

use crate::auth::{AuthMiddleware, InMemoryTokenStore, OAuthTokenProvider, TokenProvider, TokenStore};
use crate::base::BaseRequester;
use crate::collection_fanout::CollectionFanoutMiddleware;
use crate::config::{ClientConfig, ConfigError};
use crate::fetch::Fetch;
use crate::geometry_fanout::GeometryFanoutMiddleware;
use crate::pagination::PaginationMiddleware;
use crate::resolver::{CatalogResolver, CollectionResolver};
use crate::telemetry::{TelemetrySink, TracingSink};

const AUTH: &str = "auth";
const LIMIT: &str = "limit";
const GEOM: &str = "geom";
const COL: &str = "col";

/// Which optional layers a pipeline includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub auth: bool,
    pub pagination: bool,
    pub geometry: bool,
    pub collections: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        auth: false,
        pagination: false,
        geometry: false,
        collections: false,
    };

    pub fn with_auth(mut self) -> Self {
        self.auth = true;
        self
    }

    pub fn with_pagination(mut self) -> Self {
        self.pagination = true;
        self
    }

    pub fn with_geometry(mut self) -> Self {
        self.geometry = true;
        self
    }

    pub fn with_collections(mut self) -> Self {
        self.collections = true;
        self
    }

    /// All 16 combinations.
    pub fn all() -> Vec<Capabilities> {
        (0u8..16)
            .map(|bits| Capabilities {
                auth: bits & 1 != 0,
                pagination: bits & 2 != 0,
                geometry: bits & 4 != 0,
                collections: bits & 8 != 0,
            })
            .collect()
    }

    /// Route variant such as `limit-geom-col`, or `None` for the bare pipeline.
    pub fn variant(&self) -> Option<String> {
        let parts: Vec<&str> = [
            (self.auth, AUTH),
            (self.pagination, LIMIT),
            (self.geometry, GEOM),
            (self.collections, COL),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .collect();
        (!parts.is_empty()).then(|| parts.join("-"))
    }

    /// Parse a route variant. Parts must appear in canonical order, each at most once.
    pub fn from_variant(variant: &str) -> Option<Capabilities> {
        let mut caps = Capabilities::NONE;
        let mut rank = 0;
        for part in variant.split('-') {
            let (next_rank, flag) = match part {
                AUTH => (1, &mut caps.auth),
                LIMIT => (2, &mut caps.pagination),
                GEOM => (3, &mut caps.geometry),
                COL => (4, &mut caps.collections),
                _ => return None,
            };
            if next_rank <= rank {
                return None;
            }
            *flag = true;
            rank = next_rank;
        }
        Some(caps)
    }

    /// Route name relative to the items endpoint, e.g. `items/auth-limit`.
    pub fn route_name(&self) -> String {
        match self.variant() {
            Some(variant) => format!("items/{}", variant),
            None => "items".to_string(),
        }
    }

    /// Names of the wrapper-owned query parameters this pipeline accepts.
    pub fn wrapper_parameters(&self) -> Vec<&'static str> {
        let mut params = vec!["log-request-details", "use-latest-collection"];
        if self.pagination {
            params.extend(["limit", "request-limit"]);
        }
        if self.geometry {
            params.extend(["wkt", "hierarchical-output"]);
        }
        if self.collections {
            params.push("collection");
            if !self.geometry {
                params.push("hierarchical-output");
            }
        }
        params
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.route_name())
    }
}

/// Builds pipelines that share one HTTP client, token store and resolver.
pub struct PipelineBuilder {
    client: Client,
    config: Arc<ClientConfig>,
    token_store: Arc<dyn TokenStore>,
    token_provider: Arc<dyn TokenProvider>,
    resolver: Arc<dyn CollectionResolver>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl PipelineBuilder {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        let config = Arc::new(config);
        Self {
            token_provider: Arc::new(OAuthTokenProvider::new(client.clone(), &config)),
            resolver: Arc::new(CatalogResolver::new(client.clone(), &config)),
            token_store: Arc::new(InMemoryTokenStore::new()),
            telemetry: Arc::new(TracingSink),
            client,
            config,
        }
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = store;
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = provider;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn CollectionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared catalog resolver.
    pub fn collection_resolver(&self) -> Arc<dyn CollectionResolver> {
        self.resolver.clone()
    }

    /// The sink every built pipeline reports to.
    pub fn telemetry_sink(&self) -> Arc<dyn TelemetrySink> {
        self.telemetry.clone()
    }

    pub fn base(&self) -> BaseRequester {
        BaseRequester::new(self.client.clone(), self.config.clone())
            .with_resolver(self.resolver.clone())
            .with_telemetry(self.telemetry.clone())
    }

    /// Build the pipeline for a capability set.
    pub fn build(&self, caps: Capabilities) -> Arc<dyn Fetch> {
        let mut pipeline: Box<dyn Fetch> = Box::new(self.base());
        if caps.auth {
            pipeline = Box::new(AuthMiddleware::new(
                pipeline,
                self.token_store.clone(),
                self.token_provider.clone(),
            ));
        }
        if caps.pagination {
            pipeline = Box::new(PaginationMiddleware::new(pipeline));
        }
        if caps.geometry {
            pipeline = Box::new(GeometryFanoutMiddleware::new(pipeline));
        }
        if caps.collections {
            pipeline = Box::new(CollectionFanoutMiddleware::new(
                pipeline,
                self.resolver.clone(),
            ));
        }
        Arc::from(pipeline)
    }

    /// Build all 16 pipelines.
    pub fn build_all(&self) -> Vec<(Capabilities, Arc<dyn Fetch>)> {
        Capabilities::all()
            .into_iter()
            .map(|caps| (caps, self.build(caps)))
            .collect()
    }
}
