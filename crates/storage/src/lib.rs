//! Storage layer for Strata
//!
//! This crate implements the transactional page store the vector index runs on:
//! - PageStore: Committed state behind a `parking_lot::RwLock`, single writer slot
//! - ReadTransaction: Immutable snapshot of a committed version
//! - WriteTransaction: Copy-on-write overlay, published atomically on commit
//!
//! # Isolation
//!
//! One writer, many readers. Readers hold an `Arc` of the state they started
//! on and never observe later commits. The writer buffers every page and key
//! change privately until `commit()`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod snapshot;
pub mod store;
pub mod transaction;

pub use snapshot::StoreSnapshot;
pub use store::PageStore;
pub use transaction::{ReadTransaction, WriteTransaction};
