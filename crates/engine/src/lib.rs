//! Vector index engine for Strata
//!
//! This crate implements the HNSW vector index that lives inside the
//! transactional page store:
//! - Codec: precision conversion (Single/Int8/Binary) and distance scoring
//! - Containers: page-aligned packing of fixed-size encoded vectors
//! - Graph: layered HNSW adjacency persisted as node records
//! - Registration: write-scoped insertion session with seeded layer draws
//! - Search: exact scan and approximate graph traversal behind `NearestSearch`
//! - Config: `vector.toml` defaults for new fields and sessions
//!
//! The engine never locks anything itself. It reads and writes through the
//! `PageRead`/`PageWrite` seam and relies on the store's one-writer,
//! many-readers isolation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod vector;

pub use config::{BufferGrowthKind, VectorIndexConfig, CONFIG_FILE_NAME};
pub use vector::{
    collect_all, ApproximateSearch, BufferGrowth, DistanceMetric, DoublingGrowth, EmbeddingType,
    ExactSearch, FieldRecord, GraphIndex, GrowableBuffer, GrowthPolicy, NearestSearch, RawVector,
    Registration, TextEmbedder, TieredGrowth, VectorError, VectorErrorKind, VectorId, VectorIndex,
    VectorOptions, VectorResult,
};
