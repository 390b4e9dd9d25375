//! Index error types
//!
//! Error codes:
//! - FACETDEX_UNKNOWN_INDEX (programming error, never retried)
//! - FACETDEX_INVALID_NAME
//! - FACETDEX_INVALID_QUERY_MODEL
//! - store codes, passed through unchanged

use thiserror::Error;

use crate::store::StoreError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Index group errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Operation referenced an index that was never registered
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// Namespace or index name cannot be used in a key
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A filter group model with no usable group reached a path that needs one
    #[error("Invalid query model: {0}")]
    InvalidQueryModel(String),

    /// Backing store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IndexError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::UnknownIndex(_) => "FACETDEX_UNKNOWN_INDEX",
            IndexError::InvalidName { .. } => "FACETDEX_INVALID_NAME",
            IndexError::InvalidQueryModel(_) => "FACETDEX_INVALID_QUERY_MODEL",
            IndexError::Store(e) => e.code(),
        }
    }

    /// Whether a caller-side retry can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
