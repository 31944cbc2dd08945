// Error types for swr-cache.
// Covers fetch and filter failures, HTTP fetcher errors, and cache I/O errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwrError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Filter failed: {0}")]
    Filter(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SwrError>;
