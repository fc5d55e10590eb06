//! Error types for Strata storage
//!
//! This module defines the storage-level error type shared by every crate.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::PageId;
use thiserror::Error;

/// Result type alias for storage operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Storage-level errors
#[derive(Debug, Error)]
pub enum StrataError {
    /// Page run was never allocated (or not visible in this snapshot)
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    /// Write length does not match the allocated run
    #[error("Page run {page} holds {expected} bytes, got {got}")]
    PageSizeMismatch {
        /// Start of the run
        page: PageId,
        /// Allocated run length in bytes
        expected: usize,
        /// Length of the rejected write
        got: usize,
    },

    /// Another write transaction currently holds the writer slot
    #[error("A write transaction is already active")]
    WriterBusy,

    /// Invalid input
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the problem
        message: String,
    },

    /// Internal invariant violated
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the problem
        message: String,
    },
}

impl StrataError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StrataError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        StrataError::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_page_not_found() {
        let err = StrataError::PageNotFound(PageId::new(7));
        assert!(err.to_string().contains("Page not found"));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_error_display_size_mismatch() {
        let err = StrataError::PageSizeMismatch {
            page: PageId::new(3),
            expected: 8192,
            got: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("8192"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_constructors() {
        assert!(matches!(
            StrataError::invalid_input("bad"),
            StrataError::InvalidInput { .. }
        ));
        assert!(matches!(
            StrataError::internal("oops"),
            StrataError::Internal { .. }
        ));
    }
}
