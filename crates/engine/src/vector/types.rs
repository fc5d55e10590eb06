//! Core types for the vector index
//!
//! Field options are fixed when a field is created and persisted as a
//! `FieldRecord` (MessagePack) in the store's key space.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::VectorIndexConfig;
use crate::vector::error::{VectorError, VectorResult};

/// Identifier of a registered vector
///
/// The caller's document key. Must be a positive 63-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(u64);

impl VectorId {
    /// Largest id accepted by the index
    pub const MAX: u64 = i64::MAX as u64;

    /// Validate and wrap a caller-supplied id
    pub fn new(raw: u64) -> VectorResult<Self> {
        if raw == 0 || raw > Self::MAX {
            return Err(VectorError::InvalidId { id: raw });
        }
        Ok(VectorId(raw))
    }

    /// Raw id
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Precision of a stored or raw embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingType {
    /// 32-bit float components (little-endian)
    Single,
    /// Signed byte components followed by an f32 scale trailer
    Int8,
    /// One sign bit per component, 8 components per byte
    Binary,
}

/// Distance metric for Single and Int8 fields
///
/// Binary fields always compare by Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`
    #[default]
    Cosine,
    /// L2 distance
    Euclidean,
}

/// Per-field index options, immutable once the field exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorOptions {
    /// Maximum out-degree of a node on any layer
    pub number_of_edges: usize,
    /// Default beam width (`ef`) while building the graph
    pub number_of_candidates: usize,
    /// Precision of vectors handed to `register`
    pub source: EmbeddingType,
    /// Precision stored in containers
    pub destination: EmbeddingType,
    /// Metric for non-binary destinations
    pub metric: DistanceMetric,
    /// Raw vector length in bytes (0 = taken from the first registered vector)
    pub vector_byte_size: usize,
}

impl VectorOptions {
    /// Upper bound on `number_of_edges`
    pub const MAX_EDGES: usize = 512;

    /// Options with explicit graph parameters, Single→Single, cosine
    pub fn new(number_of_edges: usize, number_of_candidates: usize) -> Self {
        VectorOptions {
            number_of_edges,
            number_of_candidates,
            source: EmbeddingType::Single,
            destination: EmbeddingType::Single,
            metric: DistanceMetric::Cosine,
            vector_byte_size: 0,
        }
    }

    /// Options using the graph parameters from `config`
    pub fn with_defaults(config: &VectorIndexConfig) -> Self {
        Self::new(config.number_of_edges, config.number_of_candidates)
    }

    /// Set the stored precision
    pub fn destination(mut self, destination: EmbeddingType) -> Self {
        self.destination = destination;
        self
    }

    /// Set the precision of raw input vectors
    pub fn source(mut self, source: EmbeddingType) -> Self {
        self.source = source;
        self
    }

    /// Set the distance metric
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Fix the raw vector length up front
    pub fn vector_byte_size(mut self, size: usize) -> Self {
        self.vector_byte_size = size;
        self
    }

    /// Check the options before a field is created
    pub fn validate(&self) -> VectorResult<()> {
        if self.number_of_edges < 2 || self.number_of_edges > Self::MAX_EDGES {
            return Err(VectorError::invalid_options(format!(
                "number_of_edges must be in 2..={}, got {}",
                Self::MAX_EDGES,
                self.number_of_edges
            )));
        }
        if self.number_of_candidates == 0 {
            return Err(VectorError::invalid_options(
                "number_of_candidates must be positive",
            ));
        }
        if self.source != EmbeddingType::Single && self.source != self.destination {
            return Err(VectorError::InvalidEncoding {
                from: self.source,
                to: self.destination,
            });
        }
        if self.source == EmbeddingType::Single && self.vector_byte_size % 4 != 0 {
            return Err(VectorError::invalid_options(format!(
                "vector_byte_size {} is not a whole number of f32 components",
                self.vector_byte_size
            )));
        }
        Ok(())
    }
}

/// Field definition stored in the key space (MessagePack serialized)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Field name
    pub name: String,
    /// Options fixed at creation
    pub options: VectorOptions,
    /// Store version the creating transaction read from
    pub created_version: u64,
}

impl FieldRecord {
    /// Serialize to bytes (MessagePack)
    pub fn to_bytes(&self) -> VectorResult<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    /// Deserialize from bytes (MessagePack)
    pub fn from_bytes(data: &[u8]) -> VectorResult<Self> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

/// A raw (not yet encoded) embedding
#[derive(Debug, Clone, PartialEq)]
pub struct RawVector(Vec<u8>);

impl RawVector {
    /// Wrap already-encoded raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        RawVector(bytes)
    }

    /// Little-endian bytes of an f32 slice
    pub fn from_f32(values: &[f32]) -> Self {
        let mut bytes = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        RawVector(bytes)
    }

    /// Decode standard base64 text
    pub fn from_base64(text: &str) -> VectorResult<Self> {
        STANDARD
            .decode(text.trim())
            .map(RawVector)
            .map_err(|e| VectorError::corrupt(format!("invalid base64: {}", e)))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Validate a field name
///
/// # Validation Rules
/// - Cannot be empty
/// - Cannot exceed 256 bytes
/// - Cannot contain '/' (used as key separator)
/// - Cannot contain null bytes
pub fn validate_field_name(name: &str) -> VectorResult<()> {
    let reason = if name.is_empty() {
        "field name cannot be empty"
    } else if name.len() > 256 {
        "field name cannot exceed 256 bytes"
    } else if name.contains('/') {
        "field name cannot contain '/'"
    } else if name.contains('\0') {
        "field name cannot contain null bytes"
    } else {
        return Ok(());
    };
    Err(VectorError::invalid_options(format!("{:?}: {}", name, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id_range() {
        assert!(VectorId::new(0).is_err());
        assert!(VectorId::new(1).is_ok());
        assert!(VectorId::new(VectorId::MAX).is_ok());
        assert!(matches!(
            VectorId::new(u64::MAX),
            Err(VectorError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_options_validation() {
        assert!(VectorOptions::new(3, 16).validate().is_ok());
        assert!(VectorOptions::new(1, 16).validate().is_err());
        assert!(VectorOptions::new(3, 0).validate().is_err());
        assert!(VectorOptions::new(3, 16)
            .vector_byte_size(6)
            .validate()
            .is_err());

        let err = VectorOptions::new(3, 16)
            .source(EmbeddingType::Int8)
            .destination(EmbeddingType::Binary)
            .validate()
            .unwrap_err();
        assert!(matches!(err, VectorError::InvalidEncoding { .. }));

        // Pass-through of quantized input is allowed
        assert!(VectorOptions::new(3, 16)
            .source(EmbeddingType::Binary)
            .destination(EmbeddingType::Binary)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_field_record_roundtrip() {
        let record = FieldRecord {
            name: "embedding".into(),
            options: VectorOptions::new(8, 32).destination(EmbeddingType::Int8),
            created_version: 3,
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(FieldRecord::from_bytes(&bytes).unwrap(), record);
        assert!(FieldRecord::from_bytes(&[0xc1]).is_err());
    }

    #[test]
    fn test_raw_vector_from_f32() {
        let raw = RawVector::from_f32(&[1.0, -2.5]);
        assert_eq!(raw.as_bytes().len(), 8);
        assert_eq!(LittleEndian::read_f32(&raw.as_bytes()[4..]), -2.5);
    }

    #[test]
    fn test_raw_vector_from_base64() {
        let raw = RawVector::from_f32(&[0.5, 0.25]);
        let text = STANDARD.encode(raw.as_bytes());
        assert_eq!(RawVector::from_base64(&text).unwrap(), raw);

        let err = RawVector::from_base64("not base64!!").unwrap_err();
        assert!(matches!(err, VectorError::CorruptInput { .. }));
    }

    #[test]
    fn test_field_names() {
        assert!(validate_field_name("embedding").is_ok());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name("a/b").is_err());
        assert!(validate_field_name("a\0b").is_err());
        assert!(validate_field_name(&"x".repeat(257)).is_err());
    }
}
