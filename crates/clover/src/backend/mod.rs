//! Search backends that execute a [`SearchRequest`] against an index.
//!
//! [`ElasticsearchBackend`] talks to a real cluster over HTTP.
//! [`InMemoryBackend`] evaluates the same query tree over documents held in
//! memory, which lets ranking and filtering be exercised without a cluster.

mod elasticsearch;
mod memory;

pub use elasticsearch::ElasticsearchBackend;
pub use error::BackendError;
pub use memory::InMemoryBackend;
use serde::{Deserialize, Serialize};

use crate::{document::IndexedRestaurant, query::SearchRequest};

/// Executes structured queries against a named index.
///
/// Implementations make exactly one attempt per call and hold no per-call
/// state, so a single backend can be shared across threads.
pub trait SearchBackend: Send + Sync {
    fn search(&self, index: &str, request: &SearchRequest) -> Result<RawSearchResponse, BackendError>;
}

impl<B: SearchBackend + ?Sized> SearchBackend for Box<B> {
    fn search(&self, index: &str, request: &SearchRequest) -> Result<RawSearchResponse, BackendError> {
        (**self).search(index, request)
    }
}

/// The parts of a `_search` response this crate consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSearchResponse {
    #[serde(default)]
    pub took: u64,
    pub hits: RawHits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

impl RawHits {
    /// Total matching documents, falling back to the returned hit count when the
    /// backend did not report a total.
    pub fn total_value(&self) -> u64 {
        self.total
            .as_ref()
            .map_or(self.hits.len() as u64, TotalHits::value)
    }
}

/// `hits.total`, either `{"value": n, "relation": "eq"}` or a bare integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Object { value: u64, relation: String },
    Count(u64),
}

impl TotalHits {
    pub const fn value(&self) -> u64 {
        match self {
            Self::Object { value, .. } | Self::Count(value) => *value,
        }
    }
}

/// One hit: the stored document plus its score and sort values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<IndexedRestaurant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<serde_json::Value>,
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum BackendError {
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("backend returned status {status}: {body}")]
        Status { status: u16, body: String },
        #[error("malformed backend response: {0}")]
        Decode(#[from] serde_json::Error),
        #[error("runtime error: {0}")]
        Runtime(#[from] std::io::Error),
        #[error("query not supported: {0}")]
        Unsupported(String),
    }
}
