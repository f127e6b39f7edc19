use serde::{Deserialize, Serialize};

use super::{Result, SearchError, SearchOperation};
use crate::{
    backend::RawHit,
    document::{GeoPoint, IndexedRestaurant, TagAnnotation},
};

/// A restaurant as returned to callers of the search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantResult {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub category: String,
    pub location: GeoPoint,
    pub kakao_place_id: String,
    pub tags: Vec<TagAnnotation>,
}

impl From<IndexedRestaurant> for RestaurantResult {
    fn from(doc: IndexedRestaurant) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            address: doc.address,
            category: doc.category,
            location: doc.location,
            kakao_place_id: doc.kakao_place_id,
            tags: doc.tags,
        }
    }
}

/// Maps hits to results, keeping their order.
pub fn to_results(operation: SearchOperation, hits: Vec<RawHit>) -> Result<Vec<RestaurantResult>> {
    hits.into_iter()
        .map(|hit| {
            hit.source
                .map(RestaurantResult::from)
                .ok_or(SearchError::MissingSource { operation })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64) -> RawHit {
        RawHit {
            id: Some(id.to_string()),
            score: Some(1.0),
            source: Some(IndexedRestaurant {
                id,
                name: format!("restaurant {id}"),
                address: "서울".into(),
                category: "한식".into(),
                location: GeoPoint::new(37.5, 127.0),
                kakao_place_id: format!("k{id}"),
                tags: vec![],
            }),
            sort: vec![],
        }
    }

    #[test]
    fn test_maps_in_order() {
        let results = to_results(SearchOperation::NearbySearch, vec![hit(3), hit(1), hit(2)]).unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(results[0].kakao_place_id, "k3");
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let mut broken = hit(1);
        broken.source = None;
        let err = to_results(SearchOperation::RelevanceSearch, vec![hit(2), broken]).unwrap_err();
        assert!(matches!(
            err,
            SearchError::MissingSource {
                operation: SearchOperation::RelevanceSearch
            }
        ));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = RestaurantResult::from(hit(5).source.unwrap());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["kakaoPlaceId"], "k5");
        assert_eq!(value["location"]["lat"], 37.5);
    }
}
