//! # Backing Store Errors

use thiserror::Error;

/// Result type for backing store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store errors
///
/// Store failures are never retried or hidden by the index layer; they
/// reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not execute the request (connection lost, shut down)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A reply did not have the shape the command implies
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply {
        expected: &'static str,
        actual: &'static str,
    },

    /// A key pattern could not be compiled
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl StoreError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "FACETDEX_STORE_UNAVAILABLE",
            StoreError::UnexpectedReply { .. } => "FACETDEX_STORE_UNEXPECTED_REPLY",
            StoreError::InvalidPattern { .. } => "FACETDEX_STORE_INVALID_PATTERN",
        }
    }

    /// Whether a caller-side retry can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StoreError::Unavailable("down".into()).code(),
            "FACETDEX_STORE_UNAVAILABLE"
        );
        assert_eq!(
            StoreError::InvalidPattern {
                pattern: "[".into(),
                reason: "unclosed".into()
            }
            .code(),
            "FACETDEX_STORE_INVALID_PATTERN"
        );
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(StoreError::Unavailable("x".into()).is_retryable());
        assert!(!StoreError::UnexpectedReply {
            expected: "bool",
            actual: "members"
        }
        .is_retryable());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Unavailable("connection refused".into());
        assert_eq!(format!("{}", err), "Store unavailable: connection refused");
    }
}
