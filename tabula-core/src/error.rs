//! Error types for tabula-core

use thiserror::Error;

/// Main error type for the tabula-core library
#[derive(Error, Debug)]
pub enum Error {
    /// The database file could not be opened or reached
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed schema descriptor, undeclared column, or DDL failure
    #[error("schema error: {0}")]
    Schema(String),

    /// Statement-level failure reported by the engine
    #[error("query error: {0}")]
    Query(String),

    /// Uniqueness, not-null, or foreign-key violation on write
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Protocol misuse, e.g. nesting transaction scopes
    #[error("invalid state: {0}")]
    State(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Constraint(e.to_string())
            }
            _ => Error::Query(e.to_string()),
        }
    }
}

/// Result type alias for tabula-core
pub type Result<T> = std::result::Result<T, Error>;
