//! Database error types for kyb-db.

use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// A uniqueness invariant rejected the write.
    #[error("Duplicate {entity}: {detail}")]
    Duplicate { entity: &'static str, detail: String },

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// JSON column encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether a libSQL error is a UNIQUE constraint violation.
    #[must_use]
    pub fn is_unique_violation(err: &libsql::Error) -> bool {
        err.to_string().contains("UNIQUE constraint failed")
    }

    /// Map a write error to [`DatabaseError::Duplicate`] when it is a
    /// uniqueness violation.
    #[must_use]
    pub fn from_write(err: libsql::Error, entity: &'static str) -> Self {
        if Self::is_unique_violation(&err) {
            Self::Duplicate {
                entity,
                detail: err.to_string(),
            }
        } else {
            Self::LibSql(err)
        }
    }
}
