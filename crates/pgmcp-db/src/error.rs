//! Error types for the database client manager and registry.

use thiserror::Error;

/// Errors surfaced by the client manager and registry.
#[derive(Debug, Error)]
pub enum DbError {
    /// An identity hash was required but empty.
    #[error("identity hash required")]
    EmptyIdentity,

    /// A requested database name has no matching configuration entry.
    #[error("database '{0}' not configured")]
    UnknownDatabase(String),

    /// Connection establishment failed.
    #[error("connect failed for database '{database}': {reason}")]
    Connect { database: String, reason: String },

    /// The one-time metadata load after connect failed.
    #[error("metadata load failed for database '{database}': {source}")]
    MetadataLoad {
        database: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// A pooled connection could not be checked out.
    #[error("pool error for database '{database}': {source}")]
    Pool {
        database: String,
        #[source]
        source: deadpool_postgres::PoolError,
    },

    /// Query execution failed.
    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// Client metadata has not finished loading yet.
    #[error("client metadata not yet loaded")]
    MetadataNotReady,
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
