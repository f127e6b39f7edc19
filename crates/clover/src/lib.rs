//! Clover - Restaurant Search and Ranking Library
//!
//! Clover finds restaurants for end users by combining geographic proximity
//! filtering with weighted, fuzzy text matching and tag-based relevance scoring
//! against an Elasticsearch-compatible document index.
//!
//! # Quick Start
//!
//! ```rust
//! use clover::{
//!     GeoPoint, InMemoryBackend, InMemoryTagResolver, IndexedRestaurant, RestaurantSearcher,
//!     SearchConfig, Tag,
//! };
//!
//! let cafe = IndexedRestaurant {
//!     id: 1,
//!     name: "Clover Coffee".into(),
//!     address: "서울 강남구 테헤란로".into(),
//!     category: "음식점 > 카페".into(),
//!     location: GeoPoint::new(37.5045, 127.03),
//!     kakao_place_id: "1001".into(),
//!     tags: vec![],
//! };
//!
//! let searcher = RestaurantSearcher::from_components(
//!     SearchConfig::default(),
//!     InMemoryBackend::with_documents("restaurants", [cafe]),
//!     InMemoryTagResolver::new([Tag::new(1, "cozy")]),
//! );
//!
//! // Everything within a kilometer, nearest first
//! let nearby = searcher.search_nearby(GeoPoint::new(37.50, 127.03), 1000)?;
//! assert_eq!(nearby.len(), 1);
//!
//! // Exact lookup by the external place id
//! let found = searcher.find_by_external_id("1001")?;
//! assert_eq!(found.name, "Clover Coffee");
//! # Ok::<(), clover::SearchError>(())
//! ```
//!
//! # Search Types
//!
//! - **Nearby search**: restaurants within a radius, sorted by distance, with
//!   bar-type and snack-type venues excluded
//! - **Relevance search**: fuzzy multi-field text match and/or tag matching,
//!   ranked by the backend with confidence and frequency boosts per tag
//! - **Lookup**: a single restaurant by its kakao place id
//!
//! Queries are built as plain [`query::SearchRequest`] values and rendered to
//! the Elasticsearch DSL only at the backend boundary.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod backend;
mod config;
mod core;
mod document;
pub mod error;
pub mod query;
mod search;
mod tags;

pub use crate::core::{RestaurantSearcher, SearchIntent};

pub use backend::{ElasticsearchBackend, InMemoryBackend, SearchBackend};
pub use config::{
    BackendConfig, MAX_RESULTS, SearchConfig, SearchConfigBuilder, TagBoostBuilder,
    TagBoostParams, TextMatchBuilder, TextMatchParams,
};
pub use document::{GeoPoint, IndexedRestaurant, Tag, TagAnnotation, TagId, fields};
pub use search::{
    QueryBuilder, RestaurantResult, ScoreComposer, SearchError, SearchExecutor, SearchHits,
    SearchOperation, to_results,
};
pub use tags::{InMemoryTagResolver, TagResolver};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Clover library.
///
/// Sets up structured logging filtered by `RUST_LOG` when present, otherwise
/// by `level`. Calling it more than once is harmless.
///
/// # Examples
///
/// ```rust
/// use clover::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), clover::error::CloverError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::CloverError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}
