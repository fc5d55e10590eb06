//! StrataVec - transactional HNSW vector index for Strata
//!
//! Vectors live in the same page store as the documents they describe, so a
//! registration commits or rolls back together with the rest of the write
//! transaction, and every reader searches a consistent snapshot.
//!
//! # Quick Start
//!
//! ```ignore
//! use stratavec::{PageStore, VectorIndex, VectorOptions};
//!
//! let store = PageStore::new();
//! let index = VectorIndex::default();
//!
//! let mut txn = store.begin_write();
//! index.create_field(&mut txn, "embedding", VectorOptions::new(16, 64))?;
//! let mut registration = index.open_registration(&mut txn, "embedding")?;
//! registration.register_f32(1, &[0.1, 0.2, 0.3])?;
//! registration.commit()?;
//! txn.commit()?;
//!
//! let read = store.begin_read();
//! let search = index.approximate_nearest(&read, "embedding", 64, &query, 0.5)?;
//! ```
//!
//! # Crates
//!
//! | Crate            | Contents                                       |
//! |------------------|------------------------------------------------|
//! | `strata-core`    | Errors, page layout limits, `PageRead`/`PageWrite` |
//! | `strata-storage` | In-memory MVCC page store                      |
//! | `strata-engine`  | Vector fields, registration, search            |
//! | `strata-search`  | Query operators including the vector match     |

pub use strata_core::{PageRead, PageWrite, StrataError, StrataResult};
pub use strata_engine::*;
pub use strata_search::{
    remove_duplicates, AndMatch, BoostMatch, QueryMatch, SortedIdMatch, VectorQueryMatch,
};
pub use strata_storage::{PageStore, ReadTransaction, WriteTransaction};
