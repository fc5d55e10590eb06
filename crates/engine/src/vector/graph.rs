//! HNSW (Hierarchical Navigable Small World) graph
//!
//! The graph lives entirely in the store: one `NodeRecord` per vector in the
//! key space, one `GraphHeader` per field, encoded vectors in containers.
//! Nodes reference each other only by `VectorId`, never by pointer, so a
//! read transaction's snapshot is a complete, consistent graph.
//!
//! ## Algorithm
//!
//! - Layer 0 contains every node; a node drawn at level L is on layers 0..=L
//! - Every node keeps at most `number_of_edges` neighbors on every layer
//! - Every node except the first on a layer has a parent there, found by a
//!   breadth-first walk from the insert candidates to the nearest node with
//!   fewer than `number_of_edges` tree edges. The edges between a node and its
//!   parent are pinned in both lists and never pruned, so each layer is a
//!   spanning tree plus extra edges and every node stays reachable
//! - Search greedily descends from the entry point to layer 1, then runs a
//!   beam search of width `ef` on layer 0
//! - Neighbor selection keeps pinned edges, then applies the diversity
//!   heuristic (a candidate is kept if it is closer to the base node than to
//!   any already selected neighbor), then tops up with the closest skipped
//!   candidates
//!
//! ## Determinism
//!
//! - Candidates order by (distance asc, VectorId asc); every tie goes to the
//!   lower id
//! - Neighbor lists are persisted in selection order
//! - Level draws come from a seeded RNG owned by the registration session

use std::cmp::{Ordering, Reverse};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strata_core::{ContainerLayout, PageRead, PageWrite, StrataError};

use crate::vector::buffer::{GrowableBuffer, GrowthPolicy};
use crate::vector::codec::Codec;
use crate::vector::container::{ContainerHandle, ContainerStore, SlotRef};
use crate::vector::error::{VectorError, VectorResult};
use crate::vector::keys::FieldKeys;
use crate::vector::types::VectorId;

/// Highest layer a node can be drawn on
pub const MAX_LEVEL: usize = 16;

/// Neighbor list of one node on one layer
pub type Neighbors = SmallVec<[VectorId; 16]>;

/// Per-field graph state (MessagePack serialized)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphHeader {
    /// Node on the top layer where every search starts
    pub entry_point: Option<VectorId>,
    /// Top layer of the graph
    pub max_level: usize,
    /// Registered vectors
    pub node_count: u64,
    /// Raw input length in bytes (0 until the first insert)
    pub raw_len: usize,
    /// Encoded length in bytes (0 until the first insert)
    pub vector_len: usize,
    /// Most recently allocated container
    pub open_container: Option<ContainerHandle>,
}

/// One graph node (MessagePack serialized)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Highest layer this node is on
    pub level: usize,
    /// Where the encoded vector is stored
    pub location: SlotRef,
    /// `neighbors[layer]`, for layers 0..=level
    pub neighbors: Vec<Neighbors>,
    /// `parents[layer]`; `None` for the first node on a layer
    pub parents: Vec<Option<VectorId>>,
}

impl NodeRecord {
    fn new(level: usize, location: SlotRef) -> Self {
        NodeRecord {
            level,
            location,
            neighbors: vec![Neighbors::new(); level + 1],
            parents: vec![None; level + 1],
        }
    }
}

/// A node and its distance to the current query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Distance to the query (lower = closer)
    pub distance: f32,
    /// Node id
    pub id: VectorId,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Less = closer; ties go to the lower id
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Transaction-scoped working copy of one field's graph
///
/// Nodes and containers are loaded lazily from the transaction and cached.
/// Mutations stay in the cache until `flush`.
#[derive(Debug)]
pub(crate) struct GraphState {
    keys: FieldKeys,
    codec: Codec,
    header: GraphHeader,
    nodes: FxHashMap<VectorId, NodeRecord>,
    /// BTreeSet so flushes happen in id order
    dirty: BTreeSet<VectorId>,
    containers: Option<ContainerStore>,
    visited: FxHashSet<VectorId>,
    scratch: Vec<u8>,
}

impl GraphState {
    /// Load the header of a field's graph
    pub(crate) fn open<R: PageRead + ?Sized>(
        txn: &R,
        keys: FieldKeys,
        codec: Codec,
    ) -> VectorResult<Self> {
        let header: GraphHeader = match txn.get(keys.graph())? {
            Some(raw) => rmp_serde::from_slice(&raw)?,
            None => GraphHeader::default(),
        };
        let containers = if header.vector_len > 0 {
            Some(ContainerStore::new(
                keys.clone(),
                layout_for(header.vector_len)?,
            ))
        } else {
            None
        };
        Ok(GraphState {
            keys,
            codec,
            header,
            nodes: FxHashMap::default(),
            dirty: BTreeSet::new(),
            containers,
            visited: FxHashSet::default(),
            scratch: Vec::new(),
        })
    }

    pub(crate) fn header(&self) -> &GraphHeader {
        &self.header
    }

    /// Fix the vector lengths on the first insert
    pub(crate) fn init_lengths(&mut self, raw_len: usize, vector_len: usize) -> VectorResult<()> {
        if self.containers.is_none() {
            self.containers = Some(ContainerStore::new(
                self.keys.clone(),
                layout_for(vector_len)?,
            ));
            self.header.raw_len = raw_len;
            self.header.vector_len = vector_len;
        }
        Ok(())
    }

    /// Container geometry; only known once the first vector is stored
    pub(crate) fn containers_layout(&self) -> VectorResult<ContainerLayout> {
        layout_for(self.header.vector_len)
    }

    /// Container store; only available once lengths are known
    pub(crate) fn containers_mut(&mut self) -> VectorResult<&mut ContainerStore> {
        self.containers
            .as_mut()
            .ok_or_else(|| StrataError::internal("graph has no container layout yet").into())
    }

    pub(crate) fn set_open_container(&mut self, handle: ContainerHandle) {
        self.header.open_container = Some(handle);
    }

    /// Whether `id` is registered (in the snapshot or this session)
    pub(crate) fn contains<R: PageRead + ?Sized>(
        &self,
        txn: &R,
        id: VectorId,
    ) -> VectorResult<bool> {
        if self.nodes.contains_key(&id) {
            return Ok(true);
        }
        Ok(txn.get(&self.keys.node(id))?.is_some())
    }

    pub(crate) fn node<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        id: VectorId,
    ) -> VectorResult<&NodeRecord> {
        let node = match self.nodes.entry(id) {
            Entry::Occupied(cached) => cached.into_mut(),
            Entry::Vacant(slot) => {
                let raw = txn.get(&self.keys.node(id))?.ok_or_else(|| {
                    StrataError::internal(format!("graph references missing node {}", id))
                })?;
                slot.insert(rmp_serde::from_slice(&raw)?)
            }
        };
        Ok(&*node)
    }

    /// Copy of a node's neighbors on `layer` (empty above the node's level)
    pub(crate) fn neighbors<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        id: VectorId,
        layer: usize,
    ) -> VectorResult<Neighbors> {
        Ok(self
            .node(txn, id)?
            .neighbors
            .get(layer)
            .cloned()
            .unwrap_or_default())
    }

    fn set_neighbors(&mut self, id: VectorId, layer: usize, neighbors: Neighbors) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let Some(slot) = node.neighbors.get_mut(layer) {
                *slot = neighbors;
                self.dirty.insert(id);
            }
        }
    }

    fn parent<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        id: VectorId,
        layer: usize,
    ) -> VectorResult<Option<VectorId>> {
        Ok(self.node(txn, id)?.parents.get(layer).copied().flatten())
    }

    fn set_parent(&mut self, id: VectorId, layer: usize, parent: VectorId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let Some(slot) = node.parents.get_mut(layer) {
                *slot = Some(parent);
                self.dirty.insert(id);
            }
        }
    }

    /// Entries of `list` joined to `from` by a parent link in either direction
    fn tree_edges<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        from: VectorId,
        layer: usize,
        list: &[VectorId],
    ) -> VectorResult<Neighbors> {
        let own = self.parent(txn, from, layer)?;
        let mut pinned = Neighbors::new();
        for &other in list {
            if own == Some(other) || self.parent(txn, other, layer)? == Some(from) {
                pinned.push(other);
            }
        }
        Ok(pinned)
    }

    /// Nearest node on `layer` that can take one more tree edge
    ///
    /// Walks the layer breadth first from `seeds` (closest first). A node with
    /// fewer than `m` tree edges always exists in a connected layer.
    fn find_parent<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        seeds: &[Candidate],
        layer: usize,
        m: usize,
    ) -> VectorResult<VectorId> {
        let mut queue: VecDeque<VectorId> = seeds.iter().map(|c| c.id).collect();
        let mut seen = FxHashSet::default();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let list = self.neighbors(txn, id, layer)?;
            if self.tree_edges(txn, id, layer, &list)?.len() < m {
                return Ok(id);
            }
            queue.extend(list);
        }
        Err(StrataError::internal(format!(
            "no node on layer {} can take a tree edge",
            layer
        ))
        .into())
    }

    /// Encoded vector of a registered node
    pub(crate) fn vector<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        id: VectorId,
    ) -> VectorResult<&[u8]> {
        let location = self.node(txn, id)?.location;
        self.containers_mut()?.get(txn, location)
    }

    fn distance_to<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        query: &[u8],
        id: VectorId,
    ) -> VectorResult<f32> {
        let codec = self.codec;
        let vector = self.vector(txn, id)?;
        Ok(codec.distance(query, vector))
    }

    fn distance_between<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        a: VectorId,
        b: VectorId,
    ) -> VectorResult<f32> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend_from_slice(self.vector(txn, a)?);
        let distance = self.distance_to(txn, &scratch, b)?;
        self.scratch = scratch;
        Ok(distance)
    }

    /// Beam search on one layer (SEARCH-LAYER)
    ///
    /// Writes up to `ef` nodes closest to `query` into `out`, closest first.
    pub(crate) fn search_layer<R, P>(
        &mut self,
        txn: &R,
        query: &[u8],
        entries: &[Candidate],
        ef: usize,
        layer: usize,
        out: &mut GrowableBuffer<Candidate, P>,
    ) -> VectorResult<()>
    where
        R: PageRead + ?Sized,
        P: GrowthPolicy,
    {
        let ef = ef.max(1);
        let mut visited = std::mem::take(&mut self.visited);
        visited.clear();

        // Candidates: min-heap, nearest popped first for expansion
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        // Results: max-heap, farthest on top for O(1) eviction
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &entry in entries {
            if visited.insert(entry.id) {
                candidates.push(Reverse(entry));
                results.push(entry);
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(Reverse(nearest)) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if results.len() >= ef && nearest > *worst {
                    break;
                }
            }

            for neighbor in self.neighbors(txn, nearest.id, layer)? {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = Candidate {
                    distance: self.distance_to(txn, query, neighbor)?,
                    id: neighbor,
                };
                let admit = match results.peek() {
                    Some(worst) if results.len() >= ef => candidate < *worst,
                    _ => true,
                };
                if admit {
                    candidates.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        self.visited = visited;
        out.clear();
        out.extend(results.into_sorted_vec());
        Ok(())
    }

    /// Greedy descent from `from_layer` down to `to_layer` (ef = 1)
    ///
    /// On each layer, moves to the best neighbor until no neighbor improves.
    fn greedy_descend<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        query: &[u8],
        entry: Candidate,
        from_layer: usize,
        to_layer: usize,
    ) -> VectorResult<Candidate> {
        let mut current = entry;
        if to_layer > from_layer {
            return Ok(current);
        }
        for layer in (to_layer..=from_layer).rev() {
            loop {
                let mut improved = false;
                for neighbor in self.neighbors(txn, current.id, layer)? {
                    let candidate = Candidate {
                        distance: self.distance_to(txn, query, neighbor)?,
                        id: neighbor,
                    };
                    if candidate < current {
                        current = candidate;
                        improved = true;
                    }
                }
                if !improved {
                    break;
                }
            }
        }
        Ok(current)
    }

    /// Pick up to `m` neighbors from `candidates` (sorted closest first)
    ///
    /// Every `pinned` candidate is kept. Further candidates are kept when they
    /// are closer to the base than to every neighbor already kept; remaining
    /// room is filled with the closest skipped candidates. The result is in
    /// candidate order.
    fn select_neighbors<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        candidates: &[Candidate],
        m: usize,
        pinned: &[VectorId],
    ) -> VectorResult<Neighbors> {
        let mut selected: Neighbors = candidates
            .iter()
            .map(|c| c.id)
            .filter(|id| pinned.contains(id))
            .collect();
        let mut skipped = Neighbors::new();
        for candidate in candidates {
            if selected.len() >= m {
                break;
            }
            if pinned.contains(&candidate.id) {
                continue;
            }
            let mut diverse = true;
            for &kept in selected.iter() {
                if self.distance_between(txn, candidate.id, kept)? < candidate.distance {
                    diverse = false;
                    break;
                }
            }
            if diverse {
                selected.push(candidate.id);
            } else {
                skipped.push(candidate.id);
            }
        }
        for id in skipped {
            if selected.len() >= m {
                break;
            }
            selected.push(id);
        }
        selected.sort_by_key(|id| candidates.iter().position(|c| c.id == *id));
        Ok(selected)
    }

    /// Add the edge `from -> to` on `layer`, pruning `from` back to `m` edges
    ///
    /// Tree edges of `from` survive the prune.
    fn connect<R: PageRead + ?Sized>(
        &mut self,
        txn: &R,
        from: VectorId,
        to: VectorId,
        layer: usize,
        m: usize,
    ) -> VectorResult<()> {
        let mut list = self.neighbors(txn, from, layer)?;
        if list.contains(&to) {
            return Ok(());
        }
        list.push(to);

        if list.len() > m {
            let mut scored: SmallVec<[Candidate; 17]> = SmallVec::with_capacity(list.len());
            for &other in list.iter() {
                scored.push(Candidate {
                    distance: self.distance_between(txn, from, other)?,
                    id: other,
                });
            }
            scored.sort_unstable();
            let pinned = self.tree_edges(txn, from, layer, &list)?;
            list = self.select_neighbors(txn, &scored, m, &pinned)?;
        }
        self.set_neighbors(from, layer, list);
        Ok(())
    }

    /// Insert a stored vector into the graph (INSERT)
    ///
    /// The vector must already be in a container at `location`. `scratch` is
    /// the session's candidate buffer.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert<R, P>(
        &mut self,
        txn: &R,
        id: VectorId,
        location: SlotRef,
        level: usize,
        m: usize,
        ef_construction: usize,
        scratch: &mut GrowableBuffer<Candidate, P>,
    ) -> VectorResult<()>
    where
        R: PageRead + ?Sized,
        P: GrowthPolicy,
    {
        match self.nodes.entry(id) {
            Entry::Occupied(_) => return Err(VectorError::DuplicateNode { id: id.as_u64() }),
            Entry::Vacant(slot) => {
                slot.insert(NodeRecord::new(level, location));
            }
        }
        self.dirty.insert(id);

        let entry_id = match self.header.entry_point {
            Some(entry_id) => entry_id,
            None => {
                self.header.entry_point = Some(id);
                self.header.max_level = level;
                self.header.node_count += 1;
                return Ok(());
            }
        };

        let query = self.vector(txn, id)?.to_vec();
        let top = self.header.max_level;
        let mut entry = Candidate {
            distance: self.distance_to(txn, &query, entry_id)?,
            id: entry_id,
        };
        if top > level {
            entry = self.greedy_descend(txn, &query, entry, top, level + 1)?;
        }

        let mut entries = vec![entry];
        for layer in (0..=level.min(top)).rev() {
            let ef = ef_construction.max(m);
            self.search_layer(txn, &query, &entries, ef, layer, scratch)?;
            let parent = self.find_parent(txn, scratch.as_slice(), layer, m)?;
            self.set_parent(id, layer, parent);

            let selected = if scratch.as_slice().iter().any(|c| c.id == parent) {
                self.select_neighbors(txn, scratch.as_slice(), m, &[parent])?
            } else {
                let mut candidates = scratch.as_slice().to_vec();
                candidates.push(Candidate {
                    distance: self.distance_to(txn, &query, parent)?,
                    id: parent,
                });
                candidates.sort_unstable();
                self.select_neighbors(txn, &candidates, m, &[parent])?
            };
            self.set_neighbors(id, layer, selected.clone());
            for &neighbor in selected.iter().filter(|&&n| n != parent) {
                self.connect(txn, neighbor, id, layer, m)?;
            }
            self.connect(txn, parent, id, layer, m)?;

            entries.clear();
            entries.extend_from_slice(scratch.as_slice());
        }

        if level > top {
            self.header.entry_point = Some(id);
            self.header.max_level = level;
        }
        self.header.node_count += 1;
        Ok(())
    }

    /// Approximate nearest neighbors of `query` with beam width `ef`
    pub(crate) fn search<R, P>(
        &mut self,
        txn: &R,
        query: &[u8],
        ef: usize,
        out: &mut GrowableBuffer<Candidate, P>,
    ) -> VectorResult<()>
    where
        R: PageRead + ?Sized,
        P: GrowthPolicy,
    {
        out.clear();
        let entry_id = match self.header.entry_point {
            Some(id) => id,
            None => return Ok(()),
        };
        let entry = Candidate {
            distance: self.distance_to(txn, query, entry_id)?,
            id: entry_id,
        };
        let entry = self.greedy_descend(txn, query, entry, self.header.max_level, 1)?;
        self.search_layer(txn, query, &[entry], ef, 0, out)
    }

    /// Write modified nodes, containers and the header to `txn`
    ///
    /// Returns the number of node records written.
    pub(crate) fn flush<W: PageWrite + ?Sized>(&mut self, txn: &mut W) -> VectorResult<usize> {
        if let Some(containers) = self.containers.as_mut() {
            containers.flush(txn)?;
        }
        let dirty = std::mem::take(&mut self.dirty);
        for id in &dirty {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| StrataError::internal("dirty node not cached"))?;
            txn.put(self.keys.node(*id), rmp_serde::to_vec(node)?)?;
        }
        txn.put(self.keys.graph().to_vec(), rmp_serde::to_vec(&self.header)?)?;
        Ok(dirty.len())
    }
}

fn layout_for(vector_len: usize) -> VectorResult<ContainerLayout> {
    ContainerLayout::for_vector_len(vector_len)
        .ok_or_else(|| VectorError::corrupt("zero-length encoded vector"))
}

/// Read-only view of a field's graph, for inspection
pub struct GraphIndex<'t, R: PageRead + ?Sized> {
    txn: &'t R,
    state: GraphState,
}

impl<'t, R: PageRead + ?Sized> GraphIndex<'t, R> {
    pub(crate) fn new(txn: &'t R, state: GraphState) -> Self {
        GraphIndex { txn, state }
    }

    /// Registered vectors
    pub fn node_count(&self) -> u64 {
        self.state.header.node_count
    }

    /// Top layer
    pub fn max_level(&self) -> usize {
        self.state.header.max_level
    }

    /// Entry point on the top layer
    pub fn entry_point(&self) -> Option<u64> {
        self.state.header.entry_point.map(VectorId::as_u64)
    }

    /// Encoded vector length (0 while the field is empty)
    pub fn vector_len(&self) -> usize {
        self.state.header.vector_len
    }

    /// Highest layer of node `id`
    pub fn level(&mut self, id: u64) -> VectorResult<usize> {
        let id = VectorId::new(id)?;
        Ok(self.state.node(self.txn, id)?.level)
    }

    /// Neighbors of node `id` on `layer`, in stored order
    pub fn neighbors(&mut self, id: u64, layer: usize) -> VectorResult<Vec<u64>> {
        let id = VectorId::new(id)?;
        Ok(self
            .state
            .neighbors(self.txn, id, layer)?
            .into_iter()
            .map(VectorId::as_u64)
            .collect())
    }
}
