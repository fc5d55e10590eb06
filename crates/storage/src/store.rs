//! PageStore: committed state plus the single writer slot
//!
//! The store owns the latest committed `StoreSnapshot` and a mutex that
//! serializes write transactions. It performs no I/O; durability belongs to
//! the layers above and below this crate.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use strata_core::{StrataError, StrataResult};
use tracing::debug;

use crate::snapshot::StoreSnapshot;
use crate::transaction::{ReadTransaction, WriteTransaction};

/// Transactional page store
///
/// # Thread Safety
///
/// `PageStore` is `Send + Sync`. Any number of threads may hold read
/// transactions while one thread holds the write transaction.
#[derive(Debug, Default)]
pub struct PageStore {
    /// Latest committed state
    current: RwLock<Arc<StoreSnapshot>>,
    /// Held for the lifetime of a write transaction
    writer: Mutex<()>,
}

impl PageStore {
    /// Create a new empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest committed version
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Open a read transaction on the latest committed version
    pub fn begin_read(&self) -> ReadTransaction {
        ReadTransaction::new(self.current.read().clone())
    }

    /// Open the write transaction, blocking until the writer slot is free
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        let guard = self.writer.lock();
        let base = self.current.read().clone();
        debug!(target: "strata::storage", version = base.version, "Write transaction opened");
        WriteTransaction::new(self, guard, base)
    }

    /// Open the write transaction without blocking
    ///
    /// # Errors
    ///
    /// Returns `WriterBusy` if another write transaction is active.
    pub fn try_begin_write(&self) -> StrataResult<WriteTransaction<'_>> {
        let guard = self.writer.try_lock().ok_or(StrataError::WriterBusy)?;
        let base = self.current.read().clone();
        Ok(WriteTransaction::new(self, guard, base))
    }

    /// Replace the committed state. Only called by a committing writer.
    pub(crate) fn publish(&self, snapshot: StoreSnapshot) -> u64 {
        let version = snapshot.version;
        *self.current.write() = Arc::new(snapshot);
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{PageRead, PageWrite};

    #[test]
    fn test_new_store_is_empty() {
        let store = PageStore::new();
        assert_eq!(store.version(), 0);
        let read = store.begin_read();
        assert!(read.get(b"anything").unwrap().is_none());
    }

    #[test]
    fn test_single_writer_slot() {
        let store = PageStore::new();
        let txn = store.begin_write();
        assert!(matches!(
            store.try_begin_write(),
            Err(StrataError::WriterBusy)
        ));
        drop(txn);
        assert!(store.try_begin_write().is_ok());
    }

    #[test]
    fn test_commit_advances_version() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        txn.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(txn.commit().unwrap(), 1);
        assert_eq!(store.version(), 1);
    }
}
