//! Error types for the vector index

use strata_core::StrataError;
use thiserror::Error;

use crate::vector::types::EmbeddingType;

/// Errors raised by the vector index
#[derive(Debug, Error)]
pub enum VectorError {
    /// Field with the given name already exists
    #[error("Vector field already exists: {name}")]
    FieldAlreadyExists {
        /// Field name
        name: String,
    },

    /// Field with the given name was not found
    #[error("Vector field not found: {name}")]
    FieldNotFound {
        /// Field name
        name: String,
    },

    /// Vector length doesn't match what the field already holds
    #[error("Dimension mismatch: expected {expected} bytes, got {got}")]
    DimensionMismatch {
        /// Byte length recorded for the field
        expected: usize,
        /// Byte length of the rejected vector
        got: usize,
    },

    /// Field options or configuration values are invalid
    #[error("Invalid options: {reason}")]
    InvalidOptions {
        /// Why the options were rejected
        reason: String,
    },

    /// Vector id is outside the positive 63-bit range
    #[error("Invalid vector id: {id}")]
    InvalidId {
        /// The rejected id
        id: u64,
    },

    /// The id is already registered in the field
    #[error("Vector {id} is already registered")]
    DuplicateNode {
        /// The duplicated id
        id: u64,
    },

    /// Unsupported precision conversion
    #[error("Cannot encode {from:?} vectors as {to:?}")]
    InvalidEncoding {
        /// Source precision
        from: EmbeddingType,
        /// Requested destination precision
        to: EmbeddingType,
    },

    /// Raw vector bytes (or their base64 text) are malformed
    #[error("Corrupt vector input: {reason}")]
    CorruptInput {
        /// Description of the problem
        reason: String,
    },

    /// Insertion failed after the graph was touched
    #[error("Registration of vector {id} failed: {source}")]
    Registration {
        /// Id being registered
        id: u64,
        /// Underlying cause
        #[source]
        source: Box<VectorError>,
    },

    /// An earlier failure poisoned this registration session
    #[error("Registration aborted after vector {id} failed: {reason}")]
    RegistrationAborted {
        /// Id whose insertion failed
        id: u64,
        /// Message of the original failure
        reason: String,
    },

    /// Query vector cannot be searched in this field
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Description of the problem
        reason: String,
    },

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] StrataError),

    /// Record serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error class, as seen by callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorErrorKind {
    /// Field definition or dimensionality conflict; fatal, no retry
    Configuration,
    /// Unsupported conversion or corrupt input; skip the offending item
    Encoding,
    /// Insert failed mid-flight; the whole registration is aborted
    Registration,
    /// Malformed query, reported when the search is constructed
    Search,
    /// Underlying store failure
    Storage,
}

impl VectorError {
    /// Classify this error
    pub fn kind(&self) -> VectorErrorKind {
        match self {
            VectorError::FieldAlreadyExists { .. }
            | VectorError::FieldNotFound { .. }
            | VectorError::DimensionMismatch { .. }
            | VectorError::InvalidOptions { .. }
            | VectorError::InvalidId { .. }
            | VectorError::DuplicateNode { .. } => VectorErrorKind::Configuration,
            VectorError::InvalidEncoding { .. } | VectorError::CorruptInput { .. } => {
                VectorErrorKind::Encoding
            }
            VectorError::Registration { .. } | VectorError::RegistrationAborted { .. } => {
                VectorErrorKind::Registration
            }
            VectorError::InvalidQuery { .. } => VectorErrorKind::Search,
            VectorError::Storage(_) | VectorError::Serialization(_) => VectorErrorKind::Storage,
        }
    }

    /// Check if this error indicates the field was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, VectorError::FieldNotFound { .. })
    }

    /// The innermost cause, looking through registration wrappers
    pub fn root_cause(&self) -> &VectorError {
        match self {
            VectorError::Registration { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn invalid_options(reason: impl Into<String>) -> Self {
        VectorError::InvalidOptions {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        VectorError::CorruptInput {
            reason: reason.into(),
        }
    }
}

impl From<rmp_serde::encode::Error> for VectorError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        VectorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for VectorError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        VectorError::Serialization(e.to_string())
    }
}

/// Result type alias for vector operations
pub type VectorResult<T> = Result<T, VectorError>;
