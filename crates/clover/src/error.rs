use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloverError {
    #[error("Search error: {0}")]
    SearchError(#[from] crate::search::SearchError),
    #[error("Backend error: {0}")]
    BackendError(#[from] crate::backend::BackendError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CloverError>;
