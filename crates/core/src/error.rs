use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index error: {0}")]
    Index(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {provider}: {details}")]
    BackendResponse { provider: String, details: String },

    #[error("{0} returned an empty reply")]
    EmptyReply(String),

    #[error("generation provider not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T, E = ImportError> = std::result::Result<T, E>;
