//! Merging of fan-out sub-results.
//!
//! Geometry fan-out folds its search areas in request order with
//! deduplication: a feature seen for the first time is appended and tagged,
//! a feature whose id was already seen gets the new search area number
//! appended instead. Collection fan-out concatenates: the same id in two
//! collections is two features.

use std::collections::{BTreeMap, HashMap};

use features_protocol::{Feature, SearchResult};

/// Fold search-area sub-results into one result, deduplicating on feature id.
///
/// `numberOfRequests` is summed, `numberReturned` is the merged feature count.
/// Features without an id are never treated as duplicates.
pub fn merge_results<I>(parts: I) -> SearchResult
where
    I: IntoIterator<Item = (usize, SearchResult)>,
{
    let mut features: Vec<Feature> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut requests: u32 = 0;

    for (area, part) in parts {
        requests += part.number_of_requests;

        for mut feature in part.features {
            let Some(key) = feature.dedup_key() else {
                feature.set_search_area(area);
                features.push(feature);
                continue;
            };

            match seen.get(&key) {
                Some(&index) => features[index].append_search_area(area),
                None => {
                    feature.set_search_area(area);
                    seen.insert(key, features.len());
                    features.push(feature);
                }
            }
        }
    }

    SearchResult::new(features, requests)
}

/// Join per-collection sub-results in order, tagging each feature with its
/// collection and recording per-collection request and feature counts.
pub fn concat_results<I>(parts: I) -> SearchResult
where
    I: IntoIterator<Item = (String, SearchResult)>,
{
    let mut features: Vec<Feature> = Vec::new();
    let mut requests: u32 = 0;
    let mut requests_by_collection: BTreeMap<String, u32> = BTreeMap::new();
    let mut returned_by_collection: BTreeMap<String, usize> = BTreeMap::new();

    for (collection, part) in parts {
        requests += part.number_of_requests;
        *requests_by_collection.entry(collection.clone()).or_default() +=
            part.number_of_requests;
        *returned_by_collection.entry(collection.clone()).or_default() += part.features.len();

        features.extend(part.features.into_iter().map(|mut feature| {
            feature.set_collection(&collection);
            feature
        }));
    }

    let mut merged = SearchResult::new(features, requests);
    merged.number_of_requests_by_collection = Some(requests_by_collection);
    merged.number_returned_by_collection = Some(returned_by_collection);
    merged
}
