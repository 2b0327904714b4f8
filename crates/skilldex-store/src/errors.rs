//! Crate-wide error types, following the same one-enum-per-concern
//! convention `skilldex-core` uses.

use thiserror::Error;

/// Errors from the Postgres-backed catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("skill record not found: {0}")]
    NotFound(String),
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
