//! HNSW vector index
//!
//! ## Layout
//!
//! | Module         | Contents                                           |
//! |----------------|----------------------------------------------------|
//! | `types`        | Ids, precisions, field options and records         |
//! | `codec`        | Precision conversion, distance and score           |
//! | `container`    | Page-run packing of encoded vectors                |
//! | `graph`        | HNSW nodes, insertion and traversal                |
//! | `registration` | Write session that inserts vectors                 |
//! | `search`       | Exact and approximate search sessions              |
//! | `buffer`       | Result buffers with pluggable growth               |
//! | `index`        | Field catalog and entry points                     |

pub mod buffer;
pub mod codec;
pub mod container;
pub(crate) mod distance;
pub mod error;
pub mod graph;
pub mod index;
pub(crate) mod keys;
pub mod registration;
pub mod search;
pub mod types;

pub use buffer::{BufferGrowth, DoublingGrowth, GrowableBuffer, GrowthPolicy, TieredGrowth};
pub use codec::Codec;
pub use container::{ContainerHandle, ContainerRecord, SlotRef};
pub use error::{VectorError, VectorErrorKind, VectorResult};
pub use graph::{GraphHeader, GraphIndex, NodeRecord, MAX_LEVEL};
pub use index::VectorIndex;
pub use registration::{Registration, TextEmbedder};
pub use search::{collect_all, ApproximateSearch, ExactSearch, NearestSearch};
pub use types::{
    validate_field_name, DistanceMetric, EmbeddingType, FieldRecord, RawVector, VectorId,
    VectorOptions,
};
