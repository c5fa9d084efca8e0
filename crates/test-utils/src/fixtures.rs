//! Common test fixtures for catalyst-features tests.
//!
//! Collection ids, search geometries and catalog documents that mirror what
//! the NGD Features API serves.

use serde_json::{json, Value};

/// Versioned collection ids used across tests.
pub mod collections {
    pub const BUILDING_PART_1: &str = "bld-fts-buildingpart-1";
    pub const BUILDING_PART_2: &str = "bld-fts-buildingpart-2";
    pub const ROAD_LINK_1: &str = "trn-ntwk-roadlink-1";
    pub const ROAD_LINK_2: &str = "trn-ntwk-roadlink-2";
    pub const ROAD_LINK_4: &str = "trn-ntwk-roadlink-4";
    pub const WATER_LINK_1: &str = "wtr-ntwk-waterlink-1";
}

/// Search geometries in British National Grid coordinates.
pub mod wkt {
    /// A single point in Exeter.
    pub const POINT: &str = "POINT(292000 92500)";

    /// A small square polygon.
    pub const SQUARE: &str = "POLYGON((292000 92000, 292500 92000, 292500 92500, 292000 92500, 292000 92000))";

    /// Two disjoint squares.
    pub const TWO_SQUARES: &str = "MULTIPOLYGON(((292000 92000, 292500 92000, 292500 92500, 292000 92500, 292000 92000)), ((293000 93000, 293500 93000, 293500 93500, 293000 93500, 293000 93000)))";

    /// A point and a line, giving two search areas of different types.
    pub const MIXED_COLLECTION: &str =
        "GEOMETRYCOLLECTION(POINT(292000 92500), LINESTRING(292000 92000, 293000 93000))";

    /// Truncated WKT.
    pub const INVALID: &str = "POLYGON((292000 92000, 292500";
}

/// One catalog entry with a temporal extent start date.
pub fn catalog_entry(id: &str, start: &str) -> Value {
    json!({
        "id": id,
        "title": id,
        "extent": {
            "spatial": {"bbox": [[-10.76, 49.52, 1.93, 61.36]]},
            "temporal": {
                "interval": [[start, null]],
                "trs": "http://www.opengis.net/def/uom/ISO-8601/0/Gregorian"
            }
        }
    })
}

/// A catalog document listing every collection in [`collections`].
pub fn catalog() -> Value {
    catalog_with(&[
        (collections::BUILDING_PART_1, "2023-03-01T00:00:00Z"),
        (collections::BUILDING_PART_2, "2024-06-01T00:00:00Z"),
        (collections::ROAD_LINK_1, "2022-01-01T00:00:00Z"),
        (collections::ROAD_LINK_2, "2023-01-01T00:00:00Z"),
        (collections::ROAD_LINK_4, "2024-09-01T00:00:00Z"),
        (collections::WATER_LINK_1, "2022-05-01T00:00:00Z"),
    ])
}

/// A catalog document for the given (id, version start) pairs.
pub fn catalog_with(entries: &[(&str, &str)]) -> Value {
    let collections: Vec<Value> = entries
        .iter()
        .map(|(id, start)| catalog_entry(id, start))
        .collect();
    json!({
        "collections": collections,
        "links": [{"href": "https://api.os.uk/features/ngd/ofa/v1/collections", "rel": "self"}]
    })
}

/// Error body in the shape the upstream API returns.
pub fn api_error(code: u16, description: &str) -> Value {
    json!({"code": code, "description": description})
}
