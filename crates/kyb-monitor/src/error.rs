//! Monitor error types.

use kyb_db::error::DatabaseError;
use thiserror::Error;

/// Errors from pipeline operations.
///
/// Registry failures never appear here: the runner turns them into job state.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("counterparty {0} is archived")]
    Archived(String),
}

impl MonitorError {
    /// Whether the underlying storage error is a uniqueness conflict.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::Duplicate { .. }))
    }
}
