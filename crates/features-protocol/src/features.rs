//! GeoJSON feature and search result types.
//!
//! [`SearchResult`] is a GeoJSON `FeatureCollection` augmented with request
//! accounting (`numberOfRequests`, `numberReturned`, `timeStamp`, and the
//! per-collection breakdowns added by collection fan-out).

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::WrapperError;
use crate::types::{Link, OneOrMany};

const COLLECTION_KEY: &str = "collection";
const SEARCH_AREA_KEY: &str = "searchAreaNumber";

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Current time in the format used for `timeStamp`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A single GeoJSON feature returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type", default = "feature_type")]
    pub type_: String,

    /// Feature identifier, unique within a collection.
    #[serde(default)]
    pub id: Value,

    /// GeoJSON geometry object.
    #[serde(default)]
    pub geometry: Value,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,

    /// The collection this feature was returned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// The search area(s) this feature was found in, under geometry fan-out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_area_number: Option<OneOrMany<usize>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// Create a feature with an id and geometry.
    pub fn new(id: impl Into<Value>, geometry: Value) -> Self {
        Self {
            type_: feature_type(),
            id: id.into(),
            geometry,
            properties: Map::new(),
            collection: None,
            search_area_number: None,
            extra: Map::new(),
        }
    }

    /// Set a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Identity used for deduplication: the id's JSON encoding, so `5` and
    /// `"5"` stay distinct. Features without an id have none.
    pub fn dedup_key(&self) -> Option<String> {
        match &self.id {
            Value::Null => None,
            id => Some(id.to_string()),
        }
    }

    /// Tag the feature with the collection it came from.
    pub fn set_collection(&mut self, collection: &str) {
        self.collection = Some(collection.to_string());
        self.properties
            .insert(COLLECTION_KEY.to_string(), Value::from(collection));
    }

    /// Tag the feature with the search area it was found in.
    pub fn set_search_area(&mut self, area: usize) {
        self.search_area_number = Some(OneOrMany::One(area));
        self.mirror_search_area();
    }

    /// Record that the feature was also found in another search area.
    pub fn append_search_area(&mut self, area: usize) {
        match self.search_area_number.as_mut() {
            Some(existing) => existing.push(area),
            None => self.search_area_number = Some(OneOrMany::One(area)),
        }
        self.mirror_search_area();
    }

    fn mirror_search_area(&mut self) {
        if let Some(area) = &self.search_area_number {
            let value = serde_json::to_value(area).unwrap_or(Value::Null);
            self.properties.insert(SEARCH_AREA_KEY.to_string(), value);
        }
    }
}

/// A FeatureCollection with request accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type", default = "feature_collection_type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Set on per-area results in hierarchical geometry fan-out output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_area_number: Option<usize>,

    #[serde(default)]
    pub number_of_requests: u32,

    #[serde(default)]
    pub number_returned: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_requests_by_collection: Option<BTreeMap<String, u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_returned_by_collection: Option<BTreeMap<String, usize>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default)]
    pub features: Vec<Feature>,

    /// Other members of the API response (e.g. `numberMatched`), passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchResult {
    /// Create a fresh result over a feature list, stamped with the current time.
    pub fn new(features: Vec<Feature>, number_of_requests: u32) -> Self {
        Self {
            type_: feature_collection_type(),
            collection: None,
            search_area_number: None,
            number_of_requests,
            number_returned: features.len(),
            number_of_requests_by_collection: None,
            number_returned_by_collection: None,
            time_stamp: Some(timestamp_now()),
            links: Vec::new(),
            features,
            extra: Map::new(),
        }
    }

    /// An empty result with no requests made.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn with_collection(mut self, collection: Option<String>) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    /// Whether the server signalled another page via a `rel=next` link.
    pub fn has_next_page(&self) -> bool {
        self.links.iter().any(Link::is_next)
    }
}

impl Default for SearchResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// The unmerged per-area results of a geometry fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchAreas {
    pub search_areas: Vec<SearchResult>,
}

/// Per-collection results of a collection fan-out, in request order.
///
/// Serialises as a JSON object keyed by collection id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionResults(Vec<(String, FeatureResponse)>);

impl CollectionResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, collection: impl Into<String>, response: FeatureResponse) {
        self.0.push((collection.into(), response));
    }

    pub fn get(&self, collection: &str) -> Option<&FeatureResponse> {
        self.0
            .iter()
            .find(|(id, _)| id == collection)
            .map(|(_, response)| response)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureResponse)> {
        self.0.iter().map(|(id, response)| (id.as_str(), response))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CollectionResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (collection, response) in &self.0 {
            map.serialize_entry(collection, response)?;
        }
        map.end()
    }
}

/// What a pipeline returns on success.
///
/// Non-hierarchical pipelines always produce [`FeatureResponse::Features`];
/// the other variants appear only when `hierarchical_output` is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureResponse {
    Features(SearchResult),
    SearchAreas(SearchAreas),
    ByCollection(CollectionResults),
}

impl FeatureResponse {
    /// Unwrap a flat result; hierarchical shapes cannot be merged further.
    pub fn into_search_result(self) -> Result<SearchResult, WrapperError> {
        match self {
            FeatureResponse::Features(result) => Ok(result),
            FeatureResponse::SearchAreas(_) => Err(WrapperError::UnexpectedResponse(
                "expected a feature collection, got search areas".to_string(),
            )),
            FeatureResponse::ByCollection(_) => Err(WrapperError::UnexpectedResponse(
                "expected a feature collection, got per-collection results".to_string(),
            )),
        }
    }

    pub fn as_search_result(&self) -> Option<&SearchResult> {
        match self {
            FeatureResponse::Features(result) => Some(result),
            _ => None,
        }
    }
}

impl From<SearchResult> for FeatureResponse {
    fn from(result: SearchResult) -> Self {
        FeatureResponse::Features(result)
    }
}
