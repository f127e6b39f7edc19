//! The restaurant search facade.
//!
//! [`RestaurantSearcher`] ties together the configuration, a search backend and
//! a tag resolver, and exposes the three search operations: nearby search,
//! relevance search over text and tags, and lookup by kakao place id.
//!
//! # Quick Start
//!
//! ```rust
//! use clover::{GeoPoint, InMemoryBackend, InMemoryTagResolver, RestaurantSearcher, SearchConfig};
//!
//! let searcher = RestaurantSearcher::from_components(
//!     SearchConfig::default(),
//!     InMemoryBackend::with_documents("restaurants", []),
//!     InMemoryTagResolver::default(),
//! );
//!
//! let nearby = searcher.search_nearby(GeoPoint::new(37.50, 127.03), 1000)?;
//! assert!(nearby.is_empty());
//! # Ok::<(), clover::SearchError>(())
//! ```

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    backend::{ElasticsearchBackend, SearchBackend},
    config::SearchConfig,
    document::{GeoPoint, TagId},
    error::CloverError,
    search::{
        QueryBuilder, RestaurantResult, SearchError, SearchExecutor, SearchOperation, to_results,
    },
    tags::TagResolver,
};

/// What the caller is looking for.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchIntent {
    /// Restaurants within `radius_meters` of `point`, nearest first.
    Nearby { point: GeoPoint, radius_meters: u32 },
    /// Restaurants matching free text and any of the tags. Either may be
    /// empty; with both empty every restaurant matches.
    Relevance {
        text: Option<String>,
        tag_ids: Vec<TagId>,
    },
}

/// Restaurant search over a document backend.
///
/// Holds no mutable state; clones share the backend and tag resolver, and a
/// single searcher can serve any number of threads.
///
/// # Examples
///
/// ```rust,no_run
/// use clover::{InMemoryTagResolver, RestaurantSearcher, SearchConfig};
///
/// let searcher = RestaurantSearcher::connect(SearchConfig::default(), InMemoryTagResolver::default())?;
/// let results = searcher.search_relevant(Some("파스타"), &[])?;
/// println!("Found {} restaurants", results.len());
/// # Ok::<(), clover::error::CloverError>(())
/// ```
#[derive(Clone)]
pub struct RestaurantSearcher {
    config: SearchConfig,
    executor: SearchExecutor,
    resolver: Arc<dyn TagResolver>,
}

impl RestaurantSearcher {
    /// Connect to the Elasticsearch cluster named in `config.backend`.
    #[instrument(name = "Connect RestaurantSearcher", level = "info", skip_all)]
    pub fn connect(
        config: SearchConfig,
        resolver: impl TagResolver + 'static,
    ) -> Result<Self, CloverError> {
        let backend = ElasticsearchBackend::new(&config.backend)?;
        info!(
            url = backend.base_url(),
            index = %config.index,
            "RestaurantSearcher connected"
        );
        Ok(Self::from_components(config, backend, resolver))
    }

    /// Create a searcher from an already built backend and resolver.
    pub fn from_components(
        config: SearchConfig,
        backend: impl SearchBackend + 'static,
        resolver: impl TagResolver + 'static,
    ) -> Self {
        let executor = SearchExecutor::new(Arc::new(backend), &config.index, config.max_results);
        Self {
            config,
            executor,
            resolver: Arc::new(resolver),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.config, self.resolver.as_ref())
    }

    /// Run whichever search `intent` describes.
    pub fn search(&self, intent: &SearchIntent) -> Result<Vec<RestaurantResult>, SearchError> {
        match intent {
            SearchIntent::Nearby {
                point,
                radius_meters,
            } => self.search_nearby(*point, *radius_meters),
            SearchIntent::Relevance { text, tag_ids } => {
                self.search_relevant(text.as_deref(), tag_ids)
            }
        }
    }

    /// Restaurants within `radius_meters` of `point`, nearest first, excluding
    /// the configured categories.
    #[instrument(name = "Nearby search", level = "info", skip(self))]
    pub fn search_nearby(
        &self,
        point: GeoPoint,
        radius_meters: u32,
    ) -> Result<Vec<RestaurantResult>, SearchError> {
        let operation = SearchOperation::NearbySearch;
        let request = self.query_builder().build_geo_query(point, radius_meters);
        let hits = self.executor.execute(operation, &request)?;
        to_results(operation, hits.hits)
    }

    /// Restaurants matching `text` and at least one of `tag_ids`, best first.
    #[instrument(name = "Relevance search", level = "info", skip(self))]
    pub fn search_relevant(
        &self,
        text: Option<&str>,
        tag_ids: &[TagId],
    ) -> Result<Vec<RestaurantResult>, SearchError> {
        let operation = SearchOperation::RelevanceSearch;
        let request = self.query_builder().build_relevance_query(text, tag_ids)?;
        let hits = self.executor.execute(operation, &request)?;
        to_results(operation, hits.hits)
    }

    /// The restaurant with the given kakao place id.
    ///
    /// Fails with [`SearchError::NotFound`] when no restaurant has the id. If
    /// several do, the first hit is returned and the duplicate is logged.
    #[instrument(name = "Lookup by kakao place id", level = "info", skip(self))]
    pub fn find_by_external_id(&self, external_id: &str) -> Result<RestaurantResult, SearchError> {
        let operation = SearchOperation::ExternalIdLookup;
        let request = self.query_builder().build_external_id_query(external_id);
        let hits = self.executor.execute(operation, &request)?;

        if hits.total > 1 {
            warn!(
                external_id,
                total = hits.total,
                "Kakao place id is not unique in the index, using the first hit"
            );
        }
        let first = hits
            .hits
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::NotFound {
                external_id: external_id.to_string(),
            })?;

        to_results(operation, vec![first])?
            .pop()
            .ok_or(SearchError::MissingSource { operation })
    }
}

impl std::fmt::Debug for RestaurantSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestaurantSearcher")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
