//! Query construction, execution and result mapping for restaurant search.
//!
//! [`QueryBuilder`] turns search intent into a [`crate::query::SearchRequest`],
//! [`ScoreComposer`] supplies the tag boosts it embeds, [`SearchExecutor`] runs
//! the request against a backend and [`to_results`] maps the raw hits.

pub use error::{SearchError, SearchOperation};
mod builder;
mod executor;
mod mapper;
mod scoring;

pub use builder::QueryBuilder;
pub(crate) use error::Result;
pub use executor::{SearchExecutor, SearchHits};
pub use mapper::{RestaurantResult, to_results};
pub use scoring::ScoreComposer;

mod error {
    use std::fmt;

    use thiserror::Error;

    use crate::backend::BackendError;

    /// The search operation a failure happened in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SearchOperation {
        NearbySearch,
        RelevanceSearch,
        ExternalIdLookup,
    }

    impl fmt::Display for SearchOperation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                Self::NearbySearch => "location-based restaurant search",
                Self::RelevanceSearch => "tag and keyword restaurant search",
                Self::ExternalIdLookup => "restaurant lookup by kakao place id",
            })
        }
    }

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("{operation} failed: {source}")]
        Backend {
            operation: SearchOperation,
            source: BackendError,
        },
        #[error("no restaurant found for kakao place id {external_id}")]
        NotFound { external_id: String },
        #[error("{operation} returned a hit without a source document")]
        MissingSource { operation: SearchOperation },
        #[error(transparent)]
        TagResolution(anyhow::Error),
    }

    impl SearchError {
        /// True for the "no such record" outcome of an external id lookup.
        pub const fn is_not_found(&self) -> bool {
            matches!(self, Self::NotFound { .. })
        }

        /// The operation a backend failure or missing source happened in.
        pub const fn operation(&self) -> Option<SearchOperation> {
            match self {
                Self::Backend { operation, .. } | Self::MissingSource { operation } => {
                    Some(*operation)
                }
                Self::NotFound { .. } => Some(SearchOperation::ExternalIdLookup),
                Self::TagResolution(_) => Some(SearchOperation::RelevanceSearch),
            }
        }
    }

    pub type Result<T> = std::result::Result<T, SearchError>;
}
