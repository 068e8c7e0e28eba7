//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error raised by any diary backend, local or remote
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Local key-value file could not be read or written
    #[error("Diary storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local key-value file holds malformed JSON
    #[error("Diary serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote document store failure
    #[error("Diary database error: {0}")]
    Database(#[from] SqlxError),

    /// The backend cannot serve the requested scope
    #[error("Invalid diary scope: {0}")]
    InvalidScope(String),

    /// An entry id is already owned by another scope
    #[error("Diary entry {0} already exists in another scope")]
    Conflict(Uuid),

    /// A stored record could not be mapped back to a diary entry
    #[error("Corrupt diary record: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    /// Whether repeating the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::Io(_) => true,
            PersistenceError::Database(e) => {
                matches!(e, SqlxError::Io(_) | SqlxError::PoolTimedOut)
            }
            _ => false,
        }
    }
}

/// Type alias for Result with PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;
