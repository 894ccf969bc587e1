//! Error types for ledger, graph, and worker operations

use thiserror::Error;

/// Errors that can occur in event ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Redis command or connection error
    #[error("ledger backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// Event (de)serialization error
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stream entry carried no event_id field
    #[error("stream entry {0} missing event_id")]
    MissingEventId(String),

    /// Event document not found in the JSON store
    #[error("event document not found: {0}")]
    DocumentNotFound(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in graph store operations
#[derive(Debug, Error)]
pub enum GraphError {
    /// Neo4j driver error
    #[error("graph database error: {0}")]
    Database(#[from] neo4rs::Error),

    /// Row column decode error
    #[error("row decode error: {0}")]
    Decode(#[from] neo4rs::DeError),

    /// Property (de)serialization error
    #[error("property serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection error
    #[error("graph connection error: {0}")]
    Connection(String),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors surfaced by consumer workers
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Ledger-side failure
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Graph-side failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Extraction service failure
    #[error("extraction error: {0}")]
    Extraction(String),
}

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

impl From<redis::RedisError> for WorkerError {
    fn from(err: redis::RedisError) -> Self {
        WorkerError::Ledger(LedgerError::Backend(err))
    }
}
