//! Vector container store
//!
//! Encoded vectors of one field are packed into containers: page runs holding
//! up to `N` equally sized slots, where `N` is the largest count that fits the
//! container byte budget and a single-byte slot index (see
//! `strata_core::ContainerLayout`).
//!
//! ## Placement
//!
//! Containers are append-mostly. A new vector goes into the most recently
//! opened container while it has free slots; only a full container causes a
//! new run to be allocated. A slot, once issued, never moves.
//!
//! Each container has a `ContainerRecord` in the key space listing the ids in
//! slot order, which lets the exact search walk every vector in insertion
//! order without touching the graph.

use std::collections::hash_map::Entry;
use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strata_core::{ContainerLayout, PageId, PageRead, PageWrite, StrataError};

use crate::vector::error::{VectorError, VectorResult};
use crate::vector::keys::FieldKeys;
use crate::vector::types::VectorId;

/// Handle of an allocated container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerHandle(PageId);

impl ContainerHandle {
    /// First page of the container's run
    pub fn page(&self) -> PageId {
        self.0
    }
}

/// Location of one stored vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// Container holding the vector
    pub container: ContainerHandle,
    /// Slot within the container
    pub slot: u8,
}

/// Occupancy of one container (MessagePack serialized)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Ids in slot order
    pub ids: Vec<VectorId>,
}

/// Session-scoped cache and write buffer over a field's containers
#[derive(Debug)]
pub struct ContainerStore {
    keys: FieldKeys,
    layout: ContainerLayout,
    records: FxHashMap<ContainerHandle, ContainerRecord>,
    data: FxHashMap<ContainerHandle, Arc<Vec<u8>>>,
    /// BTreeSet so flushes happen in page order
    dirty: BTreeSet<ContainerHandle>,
}

impl ContainerStore {
    pub(crate) fn new(keys: FieldKeys, layout: ContainerLayout) -> Self {
        ContainerStore {
            keys,
            layout,
            records: FxHashMap::default(),
            data: FxHashMap::default(),
            dirty: BTreeSet::new(),
        }
    }

    /// Return a container with a free slot
    ///
    /// Reuses `open` while it has room, otherwise allocates a new run.
    pub fn allocate<W: PageWrite + ?Sized>(
        &mut self,
        txn: &mut W,
        open: Option<ContainerHandle>,
    ) -> VectorResult<ContainerHandle> {
        if let Some(handle) = open {
            self.load(&*txn, handle)?;
            if self.used(handle) < self.layout.slots {
                return Ok(handle);
            }
        }

        let handle = ContainerHandle(txn.allocate(self.layout.pages)?);
        let run = txn.read_run(handle.page())?;
        self.records.insert(handle, ContainerRecord { ids: Vec::new() });
        self.data.insert(handle, run);
        self.dirty.insert(handle);
        Ok(handle)
    }

    /// Store `bytes` for `id` in the next free slot of `handle`
    pub fn put<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        handle: ContainerHandle,
        id: VectorId,
        bytes: &[u8],
    ) -> VectorResult<u8> {
        if bytes.len() != self.layout.vector_len {
            return Err(VectorError::DimensionMismatch {
                expected: self.layout.vector_len,
                got: bytes.len(),
            });
        }
        self.load(txn, handle)?;

        let slot = self.used(handle);
        if slot >= self.layout.slots {
            return Err(StrataError::internal(format!(
                "container {} is full ({} slots)",
                handle.page(),
                self.layout.slots
            ))
            .into());
        }
        let slot = slot as u8;
        let offset = self.layout.slot_offset(slot);

        let data = self
            .data
            .get_mut(&handle)
            .ok_or_else(|| StrataError::internal("container data not loaded"))?;
        Arc::make_mut(data)[offset..offset + bytes.len()].copy_from_slice(bytes);
        if let Some(record) = self.records.get_mut(&handle) {
            record.ids.push(id);
        }
        self.dirty.insert(handle);
        Ok(slot)
    }

    /// Encoded bytes stored at `slot`
    pub fn get<R: PageRead + ?Sized>(&mut self, txn: &R, at: SlotRef) -> VectorResult<&[u8]> {
        self.load(txn, at.container)?;
        if at.slot as usize >= self.used(at.container) {
            return Err(StrataError::internal(format!(
                "slot {} of container {} is not occupied",
                at.slot,
                at.container.page()
            ))
            .into());
        }
        let offset = self.layout.slot_offset(at.slot);
        let data = self
            .data
            .get(&at.container)
            .ok_or_else(|| StrataError::internal("container data not loaded"))?;
        Ok(&data[offset..offset + self.layout.vector_len])
    }

    /// Write every modified container and its record to `txn`
    ///
    /// Returns the number of containers written.
    pub fn flush<W: PageWrite + ?Sized>(&mut self, txn: &mut W) -> VectorResult<usize> {
        let dirty = std::mem::take(&mut self.dirty);
        for handle in &dirty {
            let data = self
                .data
                .remove(handle)
                .ok_or_else(|| StrataError::internal("dirty container has no data"))?;
            let bytes = Arc::try_unwrap(data).unwrap_or_else(|shared| (*shared).clone());
            txn.write_run(handle.page(), bytes)?;

            let record = self
                .records
                .get(handle)
                .ok_or_else(|| StrataError::internal("dirty container has no record"))?;
            txn.put(self.keys.container(handle.page()), rmp_serde::to_vec(record)?)?;
        }
        Ok(dirty.len())
    }

    fn used(&self, handle: ContainerHandle) -> usize {
        self.records.get(&handle).map_or(0, |r| r.ids.len())
    }

    fn load<R: PageRead + ?Sized>(&mut self, txn: &R, handle: ContainerHandle) -> VectorResult<()> {
        if let Entry::Vacant(slot) = self.records.entry(handle) {
            let raw = txn
                .get(&self.keys.container(handle.page()))?
                .ok_or_else(|| {
                    StrataError::internal(format!("missing record for container {}", handle.page()))
                })?;
            slot.insert(rmp_serde::from_slice(&raw)?);
        }
        if let Entry::Vacant(slot) = self.data.entry(handle) {
            slot.insert(txn.read_run(handle.page())?);
        }
        Ok(())
    }
}

/// Walk every stored vector of a field in insertion order
///
/// Containers are visited in allocation order and slots in fill order.
pub(crate) fn scan_all<R, F>(
    txn: &R,
    keys: &FieldKeys,
    layout: ContainerLayout,
    mut visit: F,
) -> VectorResult<usize>
where
    R: PageRead + ?Sized,
    F: FnMut(VectorId, &[u8]),
{
    let mut visited = 0;
    for (key, raw) in txn.scan_prefix(keys.container_prefix())? {
        let page_bytes: [u8; 8] = key[keys.container_prefix().len()..]
            .try_into()
            .map_err(|_| StrataError::internal("malformed container key"))?;
        let page = PageId::new(u64::from_be_bytes(page_bytes));
        let record: ContainerRecord = rmp_serde::from_slice(&raw)?;
        let data = txn.read_run(page)?;
        for (slot, id) in record.ids.iter().enumerate() {
            let offset = layout.slot_offset(slot as u8);
            visit(*id, &data[offset..offset + layout.vector_len]);
            visited += 1;
        }
    }
    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::PAGE_SIZE;
    use strata_storage::PageStore;

    fn id(raw: u64) -> VectorId {
        VectorId::new(raw).unwrap()
    }

    #[test]
    fn test_fills_open_container_before_allocating() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        // 100 KiB vectors: two per container
        let layout = ContainerLayout::for_vector_len(100 * 1024).unwrap();
        assert_eq!(layout.slots, 2);
        let mut containers = ContainerStore::new(FieldKeys::new("f"), layout);
        let vector = vec![7u8; layout.vector_len];

        let first = containers.allocate(&mut txn, None).unwrap();
        assert_eq!(containers.put(&txn, first, id(1), &vector).unwrap(), 0);
        let again = containers.allocate(&mut txn, Some(first)).unwrap();
        assert_eq!(again, first);
        assert_eq!(containers.put(&txn, first, id(2), &vector).unwrap(), 1);

        let second = containers.allocate(&mut txn, Some(first)).unwrap();
        assert_ne!(second, first);
        assert_eq!(containers.put(&txn, second, id(3), &vector).unwrap(), 0);
    }

    #[test]
    fn test_put_rejects_wrong_length() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        let layout = ContainerLayout::for_vector_len(16).unwrap();
        let mut containers = ContainerStore::new(FieldKeys::new("f"), layout);
        let handle = containers.allocate(&mut txn, None).unwrap();
        let err = containers.put(&txn, handle, id(1), &[0u8; 8]).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 16, got: 8 }));
    }

    #[test]
    fn test_flush_and_reload() {
        let store = PageStore::new();
        let layout = ContainerLayout::for_vector_len(16).unwrap();
        let keys = FieldKeys::new("f");

        let mut txn = store.begin_write();
        let mut containers = ContainerStore::new(keys.clone(), layout);
        let handle = containers.allocate(&mut txn, None).unwrap();
        for i in 1..=3u8 {
            containers.put(&txn, handle, id(i as u64), &[i; 16]).unwrap();
        }
        assert_eq!(containers.flush(&mut txn).unwrap(), 1);
        txn.commit().unwrap();

        let read = store.begin_read();
        let mut reader = ContainerStore::new(keys.clone(), layout);
        let at = SlotRef {
            container: handle,
            slot: 2,
        };
        assert_eq!(reader.get(&read, at).unwrap(), &[3u8; 16]);
        assert!(reader
            .get(&read, SlotRef { container: handle, slot: 3 })
            .is_err());

        let mut seen = Vec::new();
        let count = scan_all(&read, &keys, layout, |id, bytes| {
            seen.push((id.as_u64(), bytes[0]))
        })
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_small_vectors_share_one_page_run() {
        let store = PageStore::new();
        let mut txn = store.begin_write();
        let layout = ContainerLayout::for_vector_len(16).unwrap();
        assert_eq!(layout.pages as usize * PAGE_SIZE, PAGE_SIZE);
        let mut containers = ContainerStore::new(FieldKeys::new("f"), layout);
        let mut open = None;
        let mut handles = BTreeSet::new();
        for i in 1..=255u64 {
            let handle = containers.allocate(&mut txn, open).unwrap();
            containers.put(&txn, handle, id(i), &[0u8; 16]).unwrap();
            open = Some(handle);
            handles.insert(handle);
        }
        assert_eq!(handles.len(), 1);
        let next = containers.allocate(&mut txn, open).unwrap();
        assert!(!handles.contains(&next));
    }
}
