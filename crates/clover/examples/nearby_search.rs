//! Nearby and relevance search
//!
//! This example demonstrates the three search operations against a small set
//! of restaurants held in memory. Set `CLOVER_ES_URL` to run the same
//! searches against a live Elasticsearch cluster instead.

use clover::{
    BackendConfig, GeoPoint, InMemoryBackend, InMemoryTagResolver, IndexedRestaurant,
    RestaurantResult, RestaurantSearcher, SearchConfig, Tag, TagAnnotation,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    clover::init_logging(tracing::Level::INFO)?;

    let tags = InMemoryTagResolver::new([Tag::new(1, "cozy"), Tag::new(2, "spicy")]);
    let searcher = if std::env::var("CLOVER_ES_URL").is_ok() {
        let config = SearchConfig {
            backend: BackendConfig::from_env()?,
            ..SearchConfig::default()
        };
        RestaurantSearcher::connect(config, tags)?
    } else {
        RestaurantSearcher::from_components(
            SearchConfig::default(),
            InMemoryBackend::with_documents("restaurants", sample_restaurants()),
            tags,
        )
    };

    let gangnam = GeoPoint::new(37.50, 127.03);

    println!("Within 1km of Gangnam station:");
    let nearby = searcher.search_nearby(gangnam, 1000)?;
    print_results(&nearby, gangnam);

    println!("\nCozy places matching 'coffee':");
    let relevant = searcher.search_relevant(Some("coffee"), &[1])?;
    print_results(&relevant, gangnam);

    println!("\nTypo tolerant search for 'burgr':");
    let fuzzy = searcher.search_relevant(Some("burgr"), &[])?;
    print_results(&fuzzy, gangnam);

    println!("\nLookup by kakao place id:");
    match searcher.find_by_external_id("1003") {
        Ok(found) => println!("  {} ({})", found.name, found.category),
        Err(e) if e.is_not_found() => println!("  not found"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn print_results(results: &[RestaurantResult], origin: GeoPoint) {
    if results.is_empty() {
        println!("  no results");
    }
    for (i, r) in results.iter().enumerate() {
        let tags: Vec<&str> = r.tags.iter().map(|t| t.tag_name.as_str()).collect();
        println!(
            "  {}. {} [{}] {:.0}m tags: {:?}",
            i + 1,
            r.name,
            r.category,
            origin.distance_meters_to(&r.location),
            tags
        );
    }
}

fn sample_restaurants() -> Vec<IndexedRestaurant> {
    let place = |id: i64, name: &str, category: &str, lat: f64, tags: Vec<TagAnnotation>| {
        IndexedRestaurant {
            id,
            name: name.to_string(),
            address: "서울 강남구 강남대로".to_string(),
            category: category.to_string(),
            location: GeoPoint::new(lat, 127.03),
            kakao_place_id: (1000 + id).to_string(),
            tags,
        }
    };
    let tag = |id: i64, name: &str, confidence: f64, frequency: u64| TagAnnotation {
        tag_id: id,
        tag_name: name.to_string(),
        avg_confidence: Some(confidence),
        frequency: Some(frequency),
    };

    vec![
        place(1, "Corner Pub", "음식점 > 술집 > 호프", 37.5018, vec![]),
        place(2, "Clover Coffee", "음식점 > 카페", 37.5045, vec![tag(1, "cozy", 0.92, 14)]),
        place(3, "Burger Joint", "음식점 > 양식 > 햄버거", 37.5031, vec![]),
        place(4, "Coffee Lab", "음식점 > 카페", 37.5060, vec![tag(1, "cozy", 0.55, 3)]),
        place(5, "Mala House", "음식점 > 중식", 37.5120, vec![tag(2, "spicy", 0.88, 21)]),
    ]
}
