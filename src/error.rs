//! Error types for page serving and learn dispatch

use thiserror::Error;

/// Request shape problems, rejected before the cache or dispatcher is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("invalid page offset {0}: must be non-negative")]
    NegativeOffset(i64),
}

/// Failure reported by a corpus source.
///
/// Cloned once per coalesced waiter, so it carries messages rather than
/// boxed sources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("corpus unavailable: {0}")]
    Unavailable(String),

    #[error("corpus I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CorpusError {
    fn from(e: std::io::Error) -> Self {
        CorpusError::Io(e.to_string())
    }
}

/// Result type for page cache operations
pub type PageResult<T> = std::result::Result<T, PageError>;

/// Errors surfaced by [`crate::PageCache`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("error fetching page {offset} for {language}: {source}")]
    Fetch {
        language: String,
        offset: u64,
        source: CorpusError,
    },

    #[error("error encoding page: {0}")]
    Encode(String),

    #[error("peer {node} failed: {message}")]
    Peer { node: String, message: String },
}

/// Errors from [`crate::LearnDispatcher::submit`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unable to find language: {0}")]
    UnknownLanguage(String),

    #[error("learn queue full for {0}")]
    QueueFull(String),

    #[error("learn consumer for {0} has shut down")]
    Closed(String),

    #[error("no tokio runtime to run the learn consumer")]
    NoRuntime,
}

/// Errors loading or validating [`crate::ServiceConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
