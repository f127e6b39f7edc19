use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{Result, SearchError, SearchOperation};
use crate::{
    backend::{RawHit, SearchBackend},
    config::MAX_RESULTS,
    query::SearchRequest,
};

/// Hits of one executed request, in backend order.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    /// Number of matching documents, which may exceed `hits.len()`.
    pub total: u64,
    pub hits: Vec<RawHit>,
}

/// Runs requests against one index of a backend.
///
/// Each call is a single attempt. Backend failures come back as
/// [`SearchError::Backend`] tagged with the operation, and nothing is retried.
#[derive(Clone)]
pub struct SearchExecutor {
    backend: Arc<dyn SearchBackend>,
    index: String,
    max_results: usize,
}

impl SearchExecutor {
    /// `max_results` is clamped to `1..=MAX_RESULTS`.
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>, max_results: usize) -> Self {
        Self {
            backend,
            index: index.into(),
            max_results: max_results.clamp(1, MAX_RESULTS),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    #[instrument(name = "Execute search", level = "debug", skip(self, request), fields(index = %self.index))]
    pub fn execute(&self, operation: SearchOperation, request: &SearchRequest) -> Result<SearchHits> {
        let t_search = std::time::Instant::now();
        let response = self.backend.search(&self.index, request).map_err(|source| {
            warn!(%operation, error = %source, "Search backend call failed");
            SearchError::Backend { operation, source }
        })?;

        let total = response.hits.total_value();
        let mut hits = response.hits.hits;
        let cap = request
            .size
            .map_or(self.max_results, |size| size.min(self.max_results));
        if hits.len() > cap {
            warn!(%operation, returned = hits.len(), cap, "Backend returned more hits than requested");
            hits.truncate(cap);
        }

        info!(
            %operation,
            total,
            returned = hits.len(),
            elapsed = ?t_search.elapsed(),
            "Search complete"
        );
        Ok(SearchHits { total, hits })
    }
}

impl std::fmt::Debug for SearchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchExecutor")
            .field("index", &self.index)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}
