//! Core traits for the transaction seam
//!
//! The vector index never talks to a concrete store. It reads and writes
//! through these traits, which a transaction of the underlying page store
//! implements. Isolation (one writer, many snapshot readers) is the
//! implementor's guarantee; callers acquire no locks of their own.

use std::sync::Arc;

use crate::error::StrataResult;
use crate::types::PageId;

/// Key/value pairs returned by a prefix scan, in key order
pub type KeyValues = Vec<(Vec<u8>, Arc<Vec<u8>>)>;

/// Read access to a consistent snapshot
///
/// Every value returned reflects the snapshot the transaction was opened on,
/// plus (for write transactions) the transaction's own uncommitted writes.
pub trait PageRead {
    /// Read the full contents of an allocated page run
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the run is not visible to this transaction.
    fn read_run(&self, page: PageId) -> StrataResult<Arc<Vec<u8>>>;

    /// Get the value stored under `key` in the ordered key space
    fn get(&self, key: &[u8]) -> StrataResult<Option<Arc<Vec<u8>>>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> StrataResult<KeyValues>;

    /// Committed version this transaction reads from
    fn version(&self) -> u64;
}

/// Write access within the single active write transaction
pub trait PageWrite: PageRead {
    /// Allocate a zero-filled run of `pages` contiguous pages
    fn allocate(&mut self, pages: u32) -> StrataResult<PageId>;

    /// Replace the contents of an allocated run
    ///
    /// # Errors
    ///
    /// Returns `PageSizeMismatch` if `data` is not exactly the run length.
    fn write_run(&mut self, page: PageId, data: Vec<u8>) -> StrataResult<()>;

    /// Insert or replace a key in the ordered key space
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> StrataResult<()>;

    /// Remove a key from the ordered key space
    fn delete(&mut self, key: &[u8]) -> StrataResult<()>;
}
