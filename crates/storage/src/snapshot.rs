//! StoreSnapshot: immutable committed state
//!
//! Each commit produces a new `StoreSnapshot`. Page runs and values are
//! `Arc`-shared, so producing the next snapshot copies map nodes and pointers
//! but never page contents.
//!
//! # Design Notes
//!
//! - **Immutable**: Once published, a snapshot never changes
//! - **Thread-safe**: Shared between readers behind an `Arc`
//! - **Ordered**: BTreeMap for deterministic prefix scans

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_core::{KeyValues, PageId, StrataError, StrataResult};

/// Point-in-time state of the page store
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Commit version (0 = nothing committed yet)
    pub(crate) version: u64,
    /// Next unallocated page number
    pub(crate) next_page: u64,
    /// Page runs keyed by their first page
    pub(crate) runs: BTreeMap<PageId, Arc<Vec<u8>>>,
    /// Ordered key space
    pub(crate) entries: BTreeMap<Vec<u8>, Arc<Vec<u8>>>,
}

impl StoreSnapshot {
    /// Commit version of this snapshot
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of allocated page runs
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of keys
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn read_run(&self, page: PageId) -> StrataResult<Arc<Vec<u8>>> {
        self.runs
            .get(&page)
            .cloned()
            .ok_or(StrataError::PageNotFound(page))
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Arc<Vec<u8>>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn scan_prefix(&self, prefix: &[u8]) -> KeyValues {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::default();
        for key in ["vec/a", "vec/b", "vec/c", "other"] {
            snapshot
                .entries
                .insert(key.as_bytes().to_vec(), Arc::new(key.as_bytes().to_vec()));
        }
        snapshot.runs.insert(PageId::new(0), Arc::new(vec![1, 2, 3]));
        snapshot
    }

    #[test]
    fn test_scan_prefix_is_ordered_and_bounded() {
        let snapshot = populated();
        let keys: Vec<Vec<u8>> = snapshot
            .scan_prefix(b"vec/")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![b"vec/a".to_vec(), b"vec/b".to_vec(), b"vec/c".to_vec()]
        );
    }

    #[test]
    fn test_missing_run() {
        let snapshot = populated();
        assert!(snapshot.read_run(PageId::new(0)).is_ok());
        assert!(matches!(
            snapshot.read_run(PageId::new(5)),
            Err(StrataError::PageNotFound(_))
        ));
    }
}
