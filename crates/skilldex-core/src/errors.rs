//! Crate-wide error types.
//!
//! Each pipeline stage gets its own `thiserror` enum rather than one
//! monolithic error, so callers can match on the stage that failed.

use thiserror::Error;

/// Errors from the code-host client and token pool.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no credential available in the token pool")]
    PoolExhausted,

    #[error("primary rate limit hit, retry after reset")]
    PrimaryRateLimited,

    #[error("secondary rate limit (abuse detection), retry after {retry_after_secs}s")]
    SecondaryRateLimited { retry_after_secs: u64 },

    #[error("resource not found")]
    NotFound,

    #[error("beyond first 1000 results for this query segment")]
    BeyondResultCap,

    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Result alias for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors from discovery strategies.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("code-host client error: {0}")]
    Client(#[from] ClientError),

    #[error("invalid branch selection input: {0}")]
    InvalidBranchInput(String),
}

/// Result alias for discovery operations.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Errors from the candidate fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("code-host client error: {0}")]
    Client(#[from] ClientError),

    #[error("candidate not found, skip silently")]
    Skip,
}

/// Result alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Errors from the format-aware parser.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("missing or malformed frontmatter field: {0}")]
    InvalidFrontmatter(String),

    #[error("empty body")]
    EmptyBody,

    #[error("invalid YAML frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result alias for parse operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
