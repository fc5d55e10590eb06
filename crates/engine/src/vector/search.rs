//! Nearest-neighbor search sessions
//!
//! Both strategies do their work when they are constructed and then stream
//! the result set through `fill`:
//!
//! - `ExactSearch` visits every stored vector and keeps the `k` closest
//! - `ApproximateSearch` descends the HNSW graph and beam-searches layer 0
//!
//! Query problems (wrong length, corrupt bytes) surface from the constructor,
//! so `fill` cannot fail. Results stream closest first.
//!
//! ## Empty vs. exhausted
//!
//! `is_empty()` is true when the search found nothing at all; the first
//! `fill` then returns 0. `is_exhausted()` becomes true once a `fill` call has
//! returned 0, whether or not earlier calls produced results.

use std::collections::BinaryHeap;

use strata_core::PageRead;
use tracing::debug;

use crate::vector::buffer::{BufferGrowth, GrowableBuffer};
use crate::vector::codec::Codec;
use crate::vector::container::scan_all;
use crate::vector::error::{VectorError, VectorResult};
use crate::vector::graph::{Candidate, GraphState};
use crate::vector::keys::FieldKeys;
use crate::vector::types::FieldRecord;

/// A constructed nearest-neighbor search
pub trait NearestSearch {
    /// Write the next results into the two buffers, closest first
    ///
    /// Writes `min(ids.len(), distances.len(), remaining)` pairs and returns
    /// the count. A return of 0 is terminal.
    fn fill(&mut self, ids: &mut [u64], distances: &mut [f32]) -> usize;

    /// True if the search produced no results at all
    fn is_empty(&self) -> bool;

    /// True once `fill` has returned 0
    fn is_exhausted(&self) -> bool;

    /// Results not yet handed out by `fill`
    fn remaining(&self) -> usize;

    /// Similarity score of a distance produced by this search
    fn score(&self, distance: f32) -> f32;
}

/// Result set shared by both search strategies
#[derive(Debug)]
struct ResultStream {
    results: GrowableBuffer<Candidate>,
    cursor: usize,
    exhausted: bool,
    codec: Codec,
    vector_len: usize,
}

impl ResultStream {
    fn new(codec: Codec, vector_len: usize, growth: BufferGrowth) -> Self {
        ResultStream {
            results: GrowableBuffer::new(growth),
            cursor: 0,
            exhausted: false,
            codec,
            vector_len,
        }
    }

    fn score(&self, distance: f32) -> f32 {
        self.codec.distance_to_score(distance, self.vector_len)
    }

    /// Keep candidates scoring at least `min_similarity`, in order
    fn accept<'c>(
        &mut self,
        candidates: impl IntoIterator<Item = &'c Candidate>,
        min_similarity: f32,
    ) {
        for candidate in candidates {
            if self.score(candidate.distance) >= min_similarity {
                self.results.push(*candidate);
            }
        }
    }

    fn fill(&mut self, ids: &mut [u64], distances: &mut [f32]) -> usize {
        let pending = &self.results.as_slice()[self.cursor..];
        let count = pending.len().min(ids.len()).min(distances.len());
        for (i, candidate) in pending[..count].iter().enumerate() {
            ids[i] = candidate.id.as_u64();
            distances[i] = candidate.distance;
        }
        self.cursor += count;
        if count == 0 && !self.exhausted {
            self.exhausted = true;
            debug!(target: "strata::vector", returned = self.results.len(), "Search exhausted");
        }
        count
    }

    fn remaining(&self) -> usize {
        self.results.len() - self.cursor
    }
}

/// Encode a query in the field's stored precision
///
/// Every failure is reported as `InvalidQuery`.
fn encode_query(
    field: &FieldRecord,
    codec: Codec,
    raw_len: usize,
    query: &[u8],
) -> VectorResult<Vec<u8>> {
    if raw_len > 0 && query.len() != raw_len {
        return Err(VectorError::InvalidQuery {
            reason: format!(
                "query is {} bytes, field '{}' holds {}-byte vectors",
                query.len(),
                field.name,
                raw_len
            ),
        });
    }
    codec.encode(query).map_err(|e| VectorError::InvalidQuery {
        reason: e.to_string(),
    })
}

/// Exhaustive scan keeping the `k` closest vectors
#[derive(Debug)]
pub struct ExactSearch {
    stream: ResultStream,
}

impl ExactSearch {
    pub(crate) fn new<R: PageRead + ?Sized>(
        txn: &R,
        field: &FieldRecord,
        k: usize,
        query: &[u8],
        min_similarity: f32,
        growth: BufferGrowth,
    ) -> VectorResult<Self> {
        let codec = Codec::for_options(&field.options);
        let keys = FieldKeys::new(&field.name);
        let graph = GraphState::open(txn, keys.clone(), codec)?;
        let header = graph.header();
        let mut stream = ResultStream::new(codec, header.vector_len, growth);
        let encoded = encode_query(field, codec, header.raw_len, query)?;

        if header.node_count > 0 && k > 0 {
            let layout = graph.containers_layout()?;
            // Max-heap of the k closest so far; the farthest is evicted first
            let mut closest: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
            let scanned = scan_all(txn, &keys, layout, |id, stored| {
                let candidate = Candidate {
                    distance: codec.distance(&encoded, stored),
                    id,
                };
                if closest.len() < k {
                    closest.push(candidate);
                } else if closest.peek().is_some_and(|worst| candidate < *worst) {
                    closest.pop();
                    closest.push(candidate);
                }
            })?;
            stream.accept(closest.into_sorted_vec().iter(), min_similarity);
            debug!(
                target: "strata::vector",
                field = %field.name,
                scanned,
                k,
                results = stream.results.len(),
                "Exact search constructed"
            );
        }
        Ok(ExactSearch { stream })
    }
}

impl NearestSearch for ExactSearch {
    fn fill(&mut self, ids: &mut [u64], distances: &mut [f32]) -> usize {
        self.stream.fill(ids, distances)
    }

    fn is_empty(&self) -> bool {
        self.stream.results.is_empty()
    }

    fn is_exhausted(&self) -> bool {
        self.stream.exhausted
    }

    fn remaining(&self) -> usize {
        self.stream.remaining()
    }

    fn score(&self, distance: f32) -> f32 {
        self.stream.score(distance)
    }
}

/// HNSW graph search with a caller-chosen beam width
///
/// Returns up to `candidate_breadth` results; `limit` caps that further.
/// When the breadth covers every node the graph is skipped and all vectors
/// are scanned, so the result equals an exact search with the same `k`.
#[derive(Debug)]
pub struct ApproximateSearch {
    stream: ResultStream,
}

impl ApproximateSearch {
    pub(crate) fn new<R: PageRead + ?Sized>(
        txn: &R,
        field: &FieldRecord,
        candidate_breadth: usize,
        query: &[u8],
        min_similarity: f32,
        growth: BufferGrowth,
    ) -> VectorResult<Self> {
        if candidate_breadth == 0 {
            return Err(VectorError::InvalidQuery {
                reason: "candidate breadth must be positive".into(),
            });
        }
        let codec = Codec::for_options(&field.options);
        let mut graph = GraphState::open(txn, FieldKeys::new(&field.name), codec)?;
        let node_count = graph.header().node_count;

        if node_count > 0 && candidate_breadth as u64 >= node_count {
            let exact = ExactSearch::new(
                txn,
                field,
                candidate_breadth,
                query,
                min_similarity,
                growth,
            )?;
            return Ok(ApproximateSearch {
                stream: exact.stream,
            });
        }

        let mut stream = ResultStream::new(codec, graph.header().vector_len, growth);
        let encoded = encode_query(field, codec, graph.header().raw_len, query)?;
        if node_count > 0 {
            let mut found = GrowableBuffer::new(growth);
            graph.search(txn, &encoded, candidate_breadth, &mut found)?;
            stream.accept(found.iter(), min_similarity);
        }
        debug!(
            target: "strata::vector",
            field = %field.name,
            nodes = node_count,
            ef = candidate_breadth,
            results = stream.results.len(),
            "Approximate search constructed"
        );
        Ok(ApproximateSearch { stream })
    }

    /// Keep at most the `k` closest results
    pub fn limit(mut self, k: usize) -> Self {
        if self.stream.results.len() > k {
            self.stream.results.truncate(k.max(self.stream.cursor));
        }
        self
    }
}

impl NearestSearch for ApproximateSearch {
    fn fill(&mut self, ids: &mut [u64], distances: &mut [f32]) -> usize {
        self.stream.fill(ids, distances)
    }

    fn is_empty(&self) -> bool {
        self.stream.results.is_empty()
    }

    fn is_exhausted(&self) -> bool {
        self.stream.exhausted
    }

    fn remaining(&self) -> usize {
        self.stream.remaining()
    }

    fn score(&self, distance: f32) -> f32 {
        self.stream.score(distance)
    }
}

impl<S: NearestSearch + ?Sized> NearestSearch for Box<S> {
    fn fill(&mut self, ids: &mut [u64], distances: &mut [f32]) -> usize {
        (**self).fill(ids, distances)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn remaining(&self) -> usize {
        (**self).remaining()
    }

    fn score(&self, distance: f32) -> f32 {
        (**self).score(distance)
    }
}

/// Drain a search into `(id, distance)` pairs, closest first
pub fn collect_all<S: NearestSearch + ?Sized>(search: &mut S) -> Vec<(u64, f32)> {
    let mut ids = [0u64; 64];
    let mut distances = [0f32; 64];
    let mut out = Vec::with_capacity(search.remaining());
    loop {
        let n = search.fill(&mut ids, &mut distances);
        if n == 0 {
            return out;
        }
        out.extend(ids[..n].iter().copied().zip(distances[..n].iter().copied()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::index::VectorIndex;
    use crate::vector::types::{DistanceMetric, VectorOptions};
    use strata_storage::PageStore;

    fn populated(points: &[(u64, [f32; 2])]) -> (PageStore, VectorIndex) {
        let store = PageStore::new();
        let index = VectorIndex::default();
        let mut txn = store.begin_write();
        let options = VectorOptions::new(4, 16).metric(DistanceMetric::Euclidean);
        index.create_field(&mut txn, "f", options).unwrap();
        let mut registration = index.open_registration(&mut txn, "f").unwrap();
        for (id, values) in points {
            registration.register_f32(*id, values).unwrap();
        }
        registration.commit().unwrap();
        txn.commit().unwrap();
        (store, index)
    }

    fn query(values: &[f32]) -> Vec<u8> {
        crate::vector::types::RawVector::from_f32(values).into_bytes()
    }

    #[test]
    fn test_exact_returns_k_closest_in_order() {
        let (store, index) = populated(&[
            (1, [0.0, 0.0]),
            (2, [3.0, 0.0]),
            (3, [1.0, 0.0]),
            (4, [2.0, 0.0]),
        ]);
        let txn = store.begin_read();
        let mut search = index.exact_nearest(&txn, "f", 3, &query(&[0.1, 0.0]), 0.0).unwrap();
        assert_eq!(search.remaining(), 3);
        let ids: Vec<u64> = collect_all(&mut search).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert!(search.is_exhausted());
    }

    #[test]
    fn test_fill_respects_buffer_size() {
        let points: Vec<(u64, [f32; 2])> = (1..=10).map(|i| (i, [i as f32, 0.0])).collect();
        let (store, index) = populated(&points);
        let txn = store.begin_read();
        let mut search = index.exact_nearest(&txn, "f", 10, &query(&[0.0, 0.0]), 0.0).unwrap();

        let mut ids = [0u64; 4];
        let mut distances = [0f32; 4];
        assert_eq!(search.fill(&mut ids, &mut distances), 4);
        assert_eq!(ids, [1, 2, 3, 4]);
        assert_eq!(search.fill(&mut ids, &mut distances[..2]), 2);
        assert_eq!(&ids[..2], &[5, 6]);
        assert_eq!(search.fill(&mut ids, &mut distances), 4);
        assert!(!search.is_exhausted());
        assert_eq!(search.fill(&mut ids, &mut distances), 0);
        assert!(search.is_exhausted());
        assert!(!search.is_empty());
    }

    #[test]
    fn test_min_similarity_filters() {
        let (store, index) = populated(&[(1, [0.0, 0.0]), (2, [1.0, 0.0]), (3, [9.0, 0.0])]);
        let txn = store.begin_read();
        // Euclidean score 1/(1+d): 1.0, 0.5, 0.1
        let mut search = index.exact_nearest(&txn, "f", 10, &query(&[0.0, 0.0]), 0.5).unwrap();
        let found = collect_all(&mut search);
        assert_eq!(found.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2]);
        assert!(found.windows(2).all(|w| search.score(w[0].1) >= search.score(w[1].1)));
    }

    #[test]
    fn test_wrong_query_length_fails_at_construction() {
        let (store, index) = populated(&[(1, [0.0, 0.0])]);
        let txn = store.begin_read();
        let err = index.exact_nearest(&txn, "f", 1, &query(&[0.0, 0.0, 0.0]), 0.0).unwrap_err();
        assert!(matches!(err, VectorError::InvalidQuery { .. }));
        let err = index.approximate_nearest(&txn, "f", 8, &[1, 2, 3], 0.0).unwrap_err();
        assert!(matches!(err, VectorError::InvalidQuery { .. }));
        assert!(index.approximate_nearest(&txn, "f", 0, &query(&[0.0, 0.0]), 0.0).is_err());
    }

    #[test]
    fn test_approximate_limit() {
        let points: Vec<(u64, [f32; 2])> = (1..=40)
            .map(|i| (i, [(i % 5) as f32, (i / 5) as f32]))
            .collect();
        let (store, index) = populated(&points);
        let txn = store.begin_read();
        let mut search = index
            .approximate_nearest(&txn, "f", 16, &query(&[0.0, 1.0]), 0.0)
            .unwrap()
            .limit(3);
        let found = collect_all(&mut search);
        assert_eq!(found.len(), 3);
        // (0,1) is id 5
        assert_eq!(found[0], (5, 0.0));
    }

    #[test]
    fn test_boxed_search_dispatch() {
        let (store, index) = populated(&[(1, [0.0, 0.0]), (2, [1.0, 1.0])]);
        let txn = store.begin_read();
        let mut search: Box<dyn NearestSearch> =
            Box::new(index.approximate_nearest(&txn, "f", 8, &query(&[1.0, 1.0]), 0.0).unwrap());
        assert_eq!(collect_all(&mut search)[0].0, 2);
    }
}
