//! Indexed restaurant documents as stored in the search backend.
//!
//! These types mirror the denormalized `restaurants` index: each restaurant
//! carries its location and the aggregated tag annotations computed by the
//! indexing pipeline. Field names follow the wire format of the index, so the
//! same structs deserialize straight out of a hit's `_source`.

use serde::{Deserialize, Serialize};

/// Identifier of a tag in the relational store.
pub type TagId = i64;

/// Mean earth radius in meters, as used by the backend's arc distance.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographical point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
}

impl GeoPoint {
    /// Create a point. Coordinates are not validated; the backend rejects
    /// malformed ones.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance to another point, in meters.
    #[must_use]
    pub fn distance_meters_to(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

/// A tag attached to an indexed restaurant, with backend-computed aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagAnnotation {
    pub tag_id: TagId,
    pub tag_name: String,
    /// Mean confidence of the tag across reviews, nominally 0.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    /// How many times the tag was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
}

/// A restaurant document in the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedRestaurant {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category: String,
    pub location: GeoPoint,
    pub kakao_place_id: String,
    #[serde(default)]
    pub tags: Vec<TagAnnotation>,
}

/// A tag record as held by the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Index field names used when building queries.
pub mod fields {
    pub const NAME: &str = "name";
    pub const ADDRESS: &str = "address";
    pub const CATEGORY: &str = "category";
    pub const LOCATION: &str = "location";
    pub const KAKAO_PLACE_ID: &str = "kakaoPlaceId";
    pub const TAGS: &str = "tags";
    pub const TAG_NAME: &str = "tags.tagName";
    pub const TAG_AVG_CONFIDENCE: &str = "tags.avgConfidence";
    pub const TAG_FREQUENCY: &str = "tags.frequency";
}
