//! Read and write transactions
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. begin_write() - acquire writer slot, capture base snapshot
//! 2. allocate()/write_run()/put()/delete() - buffered in the overlay
//! 3. commit() - clone base maps, apply overlay, bump version, publish
//! 4. drop - release writer slot
//! ```
//!
//! Because there is only ever one writer, the base snapshot is always the
//! latest committed state and commit never conflicts.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::MutexGuard;
use strata_core::{
    KeyValues, PageId, PageRead, PageWrite, StrataError, StrataResult, PAGE_SIZE,
};
use tracing::debug;

use crate::snapshot::StoreSnapshot;
use crate::store::PageStore;

/// Read-only view of one committed version
#[derive(Debug, Clone)]
pub struct ReadTransaction {
    snapshot: Arc<StoreSnapshot>,
}

impl ReadTransaction {
    pub(crate) fn new(snapshot: Arc<StoreSnapshot>) -> Self {
        ReadTransaction { snapshot }
    }
}

impl PageRead for ReadTransaction {
    fn read_run(&self, page: PageId) -> StrataResult<Arc<Vec<u8>>> {
        self.snapshot.read_run(page)
    }

    fn get(&self, key: &[u8]) -> StrataResult<Option<Arc<Vec<u8>>>> {
        Ok(self.snapshot.get(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StrataResult<KeyValues> {
        Ok(self.snapshot.scan_prefix(prefix))
    }

    fn version(&self) -> u64 {
        self.snapshot.version
    }
}

/// The single active write transaction
///
/// Holds the store's writer slot until committed, rolled back or dropped.
/// Dropping without `commit()` discards every buffered write.
pub struct WriteTransaction<'a> {
    store: &'a PageStore,
    _writer: MutexGuard<'a, ()>,
    base: Arc<StoreSnapshot>,
    next_page: u64,
    /// Page runs written or allocated by this transaction
    dirty_runs: BTreeMap<PageId, Arc<Vec<u8>>>,
    /// Key changes; `None` marks a deletion
    dirty_entries: BTreeMap<Vec<u8>, Option<Arc<Vec<u8>>>>,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(
        store: &'a PageStore,
        writer: MutexGuard<'a, ()>,
        base: Arc<StoreSnapshot>,
    ) -> Self {
        let next_page = base.next_page;
        WriteTransaction {
            store,
            _writer: writer,
            base,
            next_page,
            dirty_runs: BTreeMap::new(),
            dirty_entries: BTreeMap::new(),
        }
    }

    /// True if nothing has been written yet
    pub fn is_clean(&self) -> bool {
        self.dirty_runs.is_empty() && self.dirty_entries.is_empty()
    }

    /// Publish all buffered writes atomically
    ///
    /// Returns the new committed version.
    pub fn commit(mut self) -> StrataResult<u64> {
        let mut next = (*self.base).clone();
        next.version = self.base.version + 1;
        next.next_page = self.next_page;

        let runs = std::mem::take(&mut self.dirty_runs);
        let entries = std::mem::take(&mut self.dirty_entries);
        let (run_count, entry_count) = (runs.len(), entries.len());

        next.runs.extend(runs);
        for (key, value) in entries {
            match value {
                Some(v) => {
                    next.entries.insert(key, v);
                }
                None => {
                    next.entries.remove(&key);
                }
            }
        }

        let version = self.store.publish(next);
        debug!(
            target: "strata::storage",
            version,
            runs = run_count,
            entries = entry_count,
            "Write transaction committed"
        );
        Ok(version)
    }

    /// Discard all buffered writes
    pub fn rollback(mut self) {
        self.dirty_runs.clear();
        self.dirty_entries.clear();
        debug!(
            target: "strata::storage",
            version = self.base.version,
            "Write transaction rolled back"
        );
    }

    fn run_len(&self, page: PageId) -> StrataResult<usize> {
        if let Some(run) = self.dirty_runs.get(&page) {
            return Ok(run.len());
        }
        Ok(self.base.read_run(page)?.len())
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.is_clean() {
            debug!(
                target: "strata::storage",
                runs = self.dirty_runs.len(),
                entries = self.dirty_entries.len(),
                "Write transaction dropped without commit"
            );
        }
    }
}

impl PageRead for WriteTransaction<'_> {
    fn read_run(&self, page: PageId) -> StrataResult<Arc<Vec<u8>>> {
        match self.dirty_runs.get(&page) {
            Some(run) => Ok(run.clone()),
            None => self.base.read_run(page),
        }
    }

    fn get(&self, key: &[u8]) -> StrataResult<Option<Arc<Vec<u8>>>> {
        match self.dirty_entries.get(key) {
            Some(value) => Ok(value.clone()),
            None => Ok(self.base.get(key)),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StrataResult<KeyValues> {
        let mut merged: BTreeMap<Vec<u8>, Arc<Vec<u8>>> =
            self.base.scan_prefix(prefix).into_iter().collect();
        for (key, value) in self
            .dirty_entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn version(&self) -> u64 {
        self.base.version
    }
}

impl PageWrite for WriteTransaction<'_> {
    fn allocate(&mut self, pages: u32) -> StrataResult<PageId> {
        if pages == 0 {
            return Err(StrataError::invalid_input("cannot allocate an empty page run"));
        }
        let page = PageId::new(self.next_page);
        self.next_page += pages as u64;
        self.dirty_runs
            .insert(page, Arc::new(vec![0u8; pages as usize * PAGE_SIZE]));
        Ok(page)
    }

    fn write_run(&mut self, page: PageId, data: Vec<u8>) -> StrataResult<()> {
        let expected = self.run_len(page)?;
        if data.len() != expected {
            return Err(StrataError::PageSizeMismatch {
                page,
                expected,
                got: data.len(),
            });
        }
        self.dirty_runs.insert(page, Arc::new(data));
        Ok(())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> StrataResult<()> {
        self.dirty_entries.insert(key, Some(Arc::new(value)));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StrataResult<()> {
        self.dirty_entries.insert(key.to_vec(), None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zero_filled_and_contiguous() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        let a = txn.allocate(2).unwrap();
        let b = txn.allocate(1).unwrap();
        assert_eq!(b.as_u64(), a.as_u64() + 2);
        let run = txn.read_run(a).unwrap();
        assert_eq!(run.len(), 2 * PAGE_SIZE);
        assert!(run.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocate_zero_pages_rejected() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        assert!(txn.allocate(0).is_err());
    }

    #[test]
    fn test_write_run_size_checked() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        let page = txn.allocate(1).unwrap();
        let err = txn.write_run(page, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, StrataError::PageSizeMismatch { .. }));
        assert!(txn.write_run(page, vec![7u8; PAGE_SIZE]).is_ok());
        assert_eq!(txn.read_run(page).unwrap()[0], 7);
    }

    #[test]
    fn test_write_to_unallocated_run() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        let err = txn.write_run(PageId::new(99), vec![0u8; PAGE_SIZE]).unwrap_err();
        assert!(matches!(err, StrataError::PageNotFound(_)));
    }

    #[test]
    fn test_reader_does_not_see_uncommitted_or_later_writes() {
        let store = PageStore::new();
        let before = store.begin_read();

        let mut txn = store.begin_write();
        txn.put(b"key".to_vec(), b"value".to_vec()).unwrap();
        let page = txn.allocate(1).unwrap();
        assert!(store.begin_read().get(b"key").unwrap().is_none());
        txn.commit().unwrap();

        assert!(before.get(b"key").unwrap().is_none());
        assert!(before.read_run(page).is_err());

        let after = store.begin_read();
        assert_eq!(after.get(b"key").unwrap().unwrap().as_slice(), b"value");
        assert!(after.read_run(page).is_ok());
        assert_eq!(after.version(), 1);
    }

    #[test]
    fn test_rollback_discards_everything() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        txn.put(b"key".to_vec(), b"value".to_vec()).unwrap();
        let page = txn.allocate(1).unwrap();
        txn.rollback();

        let read = store.begin_read();
        assert!(read.get(b"key").unwrap().is_none());
        assert!(read.read_run(page).is_err());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_scan_prefix_merges_overlay() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        txn.put(b"p/1".to_vec(), b"a".to_vec()).unwrap();
        txn.put(b"p/2".to_vec(), b"b".to_vec()).unwrap();
        txn.put(b"q/1".to_vec(), b"c".to_vec()).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin_write();
        txn.delete(b"p/1").unwrap();
        txn.put(b"p/3".to_vec(), b"d".to_vec()).unwrap();
        let keys: Vec<Vec<u8>> = txn
            .scan_prefix(b"p/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p/2".to_vec(), b"p/3".to_vec()]);
    }

    #[test]
    fn test_page_numbers_continue_after_commit() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        let first = txn.allocate(3).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin_write();
        let second = txn.allocate(1).unwrap();
        assert_eq!(second.as_u64(), first.as_u64() + 3);
    }
}
