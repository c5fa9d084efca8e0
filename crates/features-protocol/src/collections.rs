//! Versioned collection identifiers and the latest-version catalog lookup.
//!
//! Collection ids follow `theme-collection-featuretype-version`
//! (e.g. `bld-fts-buildingline-2`). The basename is the id without its
//! trailing version segment.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::WrapperError;
use crate::types::Link;

/// Format of the start date in a catalog collection's temporal extent.
pub const CATALOG_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Default window for `recent-update-days`.
pub const DEFAULT_RECENT_UPDATE_DAYS: u32 = 31;

/// Basename → latest full collection id.
pub type CollectionLookup = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq)]
pub enum CollectionIdError {
    #[error("Collection id '{0}' has no version suffix")]
    MissingVersion(String),

    #[error("Collection id '{id}' has an invalid version '{version}'")]
    InvalidVersion { id: String, version: String },
}

/// Split an id into basename and version.
pub fn split_version(id: &str) -> Result<(&str, u32), CollectionIdError> {
    let (basename, version) = id
        .rsplit_once('-')
        .ok_or_else(|| CollectionIdError::MissingVersion(id.to_string()))?;
    match version.parse::<u32>() {
        Ok(v) if v > 0 && !basename.is_empty() => Ok((basename, v)),
        _ => Err(CollectionIdError::InvalidVersion {
            id: id.to_string(),
            version: version.to_string(),
        }),
    }
}

/// Whether the id already names a specific version.
pub fn has_version(id: &str) -> bool {
    split_version(id).is_ok()
}

/// The id with any version suffix removed.
pub fn basename(id: &str) -> &str {
    split_version(id).map(|(base, _)| base).unwrap_or(id)
}

/// Build the basename → latest id lookup from catalog ids.
///
/// Ids without an integer version suffix are skipped.
pub fn latest_collection_lookup<'a, I>(ids: I) -> CollectionLookup
where
    I: IntoIterator<Item = &'a str>,
{
    let mut latest: BTreeMap<&str, u32> = BTreeMap::new();
    for id in ids {
        if let Ok((base, version)) = split_version(id) {
            let entry = latest.entry(base).or_insert(version);
            *entry = (*entry).max(version);
        }
    }
    latest
        .into_iter()
        .map(|(base, version)| (base.to_string(), format!("{}-{}", base, version)))
        .collect()
}

/// Resolve each basename to its latest id, in input order.
pub fn resolve_specific(
    lookup: &CollectionLookup,
    basenames: &[String],
) -> Result<Vec<String>, WrapperError> {
    basenames
        .iter()
        .map(|name| {
            lookup
                .get(name)
                .cloned()
                .ok_or_else(|| WrapperError::UnsupportedCollection(name.clone()))
        })
        .collect()
}

/// Resolve the unversioned entries of a collection list, leaving versioned ones untouched.
pub fn apply_latest(
    lookup: &CollectionLookup,
    collections: &[String],
) -> Result<Vec<String>, WrapperError> {
    collections
        .iter()
        .map(|id| {
            if has_version(id) {
                Ok(id.clone())
            } else {
                lookup
                    .get(id)
                    .cloned()
                    .ok_or_else(|| WrapperError::UnsupportedCollection(id.clone()))
            }
        })
        .collect()
}

/// Temporal extent with time intervals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalExtent {
    /// Time intervals as [start, end] pairs (ISO 8601). null marks an open end.
    #[serde(default)]
    pub interval: Vec<Vec<Option<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trs: Option<String>,
}

impl TemporalExtent {
    /// Start of the first interval.
    pub fn start(&self) -> Option<&str> {
        self.interval.first()?.first()?.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CatalogExtent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalExtent>,
}

/// One entry of `GET /collections/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogCollection {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<CatalogExtent>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogCollection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            extent: None,
            extra: Map::new(),
        }
    }

    /// Set the version start date (first interval start).
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.extent = Some(CatalogExtent {
            spatial: None,
            temporal: Some(TemporalExtent {
                interval: vec![vec![Some(start.into()), None]],
                trs: None,
            }),
        });
        self
    }

    /// When this version of the collection became available.
    pub fn version_start(&self) -> Option<DateTime<Utc>> {
        let start = self.extent.as_ref()?.temporal.as_ref()?.start()?;
        NaiveDateTime::parse_from_str(start, CATALOG_DATE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// The catalog document returned by `GET /collections/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Catalog {
    #[serde(default)]
    pub collections: Vec<CatalogCollection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Catalog {
    pub fn lookup(&self) -> CollectionLookup {
        latest_collection_lookup(self.collections.iter().map(|c| c.id.as_str()))
    }
}

/// Latest-version lookup plus the collections updated within a window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RecentUpdates {
    pub collection_lookup: CollectionLookup,
    pub recent_update_threshold_days: u32,
    pub recent_collection_updates: Vec<String>,
}

/// Flag latest versions whose start date falls after `now - days`.
///
/// Catalog entries without a parseable start date are never flagged.
pub fn flag_recent_versions(
    lookup: CollectionLookup,
    catalog: &[CatalogCollection],
    days: u32,
    now: DateTime<Utc>,
) -> RecentUpdates {
    let cutoff = now - Duration::days(i64::from(days));
    let recent = catalog
        .iter()
        .filter(|c| lookup.values().any(|id| *id == c.id))
        .filter(|c| c.version_start().is_some_and(|start| start > cutoff))
        .map(|c| c.id.clone())
        .collect();

    RecentUpdates {
        collection_lookup: lookup,
        recent_update_threshold_days: days,
        recent_collection_updates: recent,
    }
}

/// Response body of the latest-collections endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum LatestCollections {
    Lookup(CollectionLookup),
    Flagged(RecentUpdates),
}
