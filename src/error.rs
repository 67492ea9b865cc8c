//! Error types for every collaborator the orchestrator talks to.
//!
//! Each failure class has its own enum so the call sites can decide how far
//! an error is allowed to travel: construction errors abort startup, the
//! rest are logged and absorbed inside a platform's turn.

use thiserror::Error;

/// Setup failure for a searcher, storer or notifier.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("authentication with {platform} failed: {source}")]
    Auth {
        platform: &'static str,
        #[source]
        source: UpstreamError,
    },

    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
}

/// Failure talking to an external platform.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited (status {status})")]
    RateLimited { status: u16 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::Parse(err.to_string())
    }
}

/// Failure reading or writing the dedup index or a watermark.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("dynamodb error: {0}")]
    DynamoDb(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure delivering a result to one notification sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{sink} rejected the message (status {status}): {message}")]
    Rejected {
        sink: &'static str,
        status: u16,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Network(err.to_string())
    }
}
