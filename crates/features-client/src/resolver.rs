//! Resolution of collection basenames to their latest version.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Client;
use tracing::{debug, instrument};

use features_protocol::collections::{self, flag_recent_versions};
use features_protocol::{
    Catalog, CollectionLookup, ErrorResult, LatestCollections, RecentUpdates,
};

use crate::config::{ClientConfig, RetryPolicy};
use crate::http::get_json;

/// Source of the collection catalog.
///
/// Only [`catalog`](CollectionResolver::catalog) is required; lookups are
/// derived from it.
#[async_trait]
pub trait CollectionResolver: Send + Sync {
    async fn catalog(&self) -> Result<Catalog, ErrorResult>;

    /// Basename → latest full id for every collection.
    async fn latest_lookup(&self) -> Result<CollectionLookup, ErrorResult> {
        Ok(self.catalog().await?.lookup())
    }

    /// Resolve basenames to latest ids, in order. Unknown basenames are a 404.
    async fn resolve(&self, basenames: &[String]) -> Result<Vec<String>, ErrorResult> {
        let lookup = self.latest_lookup().await?;
        collections::resolve_specific(&lookup, basenames).map_err(ErrorResult::from)
    }

    /// Resolve the unversioned entries of a list, leaving versioned ones untouched.
    async fn apply_latest(&self, ids: &[String]) -> Result<Vec<String>, ErrorResult> {
        if ids.iter().all(|id| collections::has_version(id)) {
            return Ok(ids.to_vec());
        }
        let lookup = self.latest_lookup().await?;
        collections::apply_latest(&lookup, ids).map_err(ErrorResult::from)
    }

    /// Latest lookup, optionally flagged with versions started in the last `days`.
    async fn latest_collections(
        &self,
        recent_update_days: Option<u32>,
    ) -> Result<LatestCollections, ErrorResult> {
        let catalog = self.catalog().await?;
        let lookup = catalog.lookup();
        Ok(match recent_update_days.filter(|&days| days > 0) {
            Some(days) => LatestCollections::Flagged(recent_updates(
                lookup,
                &catalog,
                days,
            )),
            None => LatestCollections::Lookup(lookup),
        })
    }
}

fn recent_updates(lookup: CollectionLookup, catalog: &Catalog, days: u32) -> RecentUpdates {
    flag_recent_versions(lookup, &catalog.collections, days, Utc::now())
}

/// Fetches the catalog from `GET {base}/collections/`.
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    client: Client,
    url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CatalogResolver {
    pub fn new(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            url: format!("{}/collections/", config.base_url),
            timeout: config.request_timeout,
            retry: config.retry.clone(),
        }
    }
}

#[async_trait]
impl CollectionResolver for CatalogResolver {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn catalog(&self) -> Result<Catalog, ErrorResult> {
        let response = get_json(
            &self.client,
            &self.url,
            &[],
            HeaderMap::new(),
            self.timeout,
            &self.retry,
        )
        .await?;

        if response.is_error() {
            return Err(response.into_error());
        }

        let catalog: Catalog = serde_json::from_value(response.body).map_err(|e| {
            ErrorResult::api(500, format!("Unexpected collections response: {}", e))
        })?;
        debug!(collections = catalog.collections.len(), "Fetched collection catalog");
        Ok(catalog)
    }
}

/// A fixed catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    catalog: Catalog,
}

impl StaticResolver {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// A catalog with just these ids and no extents.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Catalog {
            collections: ids
                .into_iter()
                .map(|id| features_protocol::CatalogCollection::new(id))
                .collect(),
            links: Vec::new(),
        })
    }
}

#[async_trait]
impl CollectionResolver for StaticResolver {
    async fn catalog(&self) -> Result<Catalog, ErrorResult> {
        Ok(self.catalog.clone())
    }
}
