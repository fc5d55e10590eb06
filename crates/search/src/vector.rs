//! Vector query operator
//!
//! Wraps a nearest-neighbor search so the boolean evaluator can use it like
//! any other `QueryMatch`. The mode is fixed at construction:
//!
//! | Mode       | `fill` order                 | Scores from                       |
//! |------------|------------------------------|-----------------------------------|
//! | standalone | search order, closest first  | distances of the last `fill`      |
//! | composed   | ascending id, deduplicated   | binary search in the match set    |
//!
//! A composed match drains the search completely on first use, because
//! intersections need a globally ordered id stream. A search that was empty
//! at construction yields nothing in either mode.

use strata_engine::{BufferGrowth, GrowableBuffer, NearestSearch};
use tracing::debug;

use crate::matcher::{intersect_sorted, QueryMatch};

/// Ids pulled from the search per `fill` call while draining
const DRAIN_BATCH: usize = 256;

/// Collapse runs of equal ids in an id-sorted sequence, keeping the minimum
/// distance of each run
///
/// Single left-to-right pass. The deduplicated prefix is written in place;
/// returns its length.
pub fn remove_duplicates(matches: &mut [(u64, f32)]) -> usize {
    if matches.is_empty() {
        return 0;
    }
    let mut last = 0;
    for i in 1..matches.len() {
        let (id, distance) = matches[i];
        if id == matches[last].0 {
            if distance < matches[last].1 {
                matches[last].1 = distance;
            }
        } else {
            last += 1;
            matches[last] = (id, distance);
        }
    }
    last + 1
}

#[derive(Debug)]
enum Mode {
    Standalone {
        /// Ids and distances of the last `fill`, aligned by position
        ids: Vec<u64>,
        distances: Vec<f32>,
    },
    Composed {
        /// (id, distance), ascending by id, unique ids
        matches: GrowableBuffer<(u64, f32)>,
        materialized: bool,
        cursor: usize,
    },
}

/// `QueryMatch` over a nearest-neighbor search
#[derive(Debug)]
pub struct VectorQueryMatch<S: NearestSearch> {
    search: S,
    mode: Mode,
    empty: bool,
}

impl<S: NearestSearch> VectorQueryMatch<S> {
    /// The vector clause is the whole query; keep the search's order
    pub fn standalone(search: S) -> Self {
        let empty = search.is_empty();
        VectorQueryMatch {
            search,
            mode: Mode::Standalone {
                ids: Vec::new(),
                distances: Vec::new(),
            },
            empty,
        }
    }

    /// The vector clause is combined with other operators
    pub fn composed(search: S, growth: BufferGrowth) -> Self {
        let empty = search.is_empty();
        VectorQueryMatch {
            search,
            mode: Mode::Composed {
                matches: GrowableBuffer::new(growth),
                materialized: false,
                cursor: 0,
            },
            empty,
        }
    }

    /// True if the underlying search found nothing
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// True in standalone mode
    pub fn is_standalone(&self) -> bool {
        matches!(self.mode, Mode::Standalone { .. })
    }

    /// Drain the search into the sorted, deduplicated match set
    fn materialize(&mut self) {
        let (matches, materialized) = match &mut self.mode {
            Mode::Composed {
                matches,
                materialized,
                ..
            } => (matches, materialized),
            Mode::Standalone { .. } => return,
        };
        if *materialized {
            return;
        }
        *materialized = true;
        if self.empty {
            return;
        }

        let mut ids = [0u64; DRAIN_BATCH];
        let mut distances = [0f32; DRAIN_BATCH];
        loop {
            let n = self.search.fill(&mut ids, &mut distances);
            if n == 0 {
                break;
            }
            matches.extend(ids[..n].iter().copied().zip(distances[..n].iter().copied()));
        }
        let drained = matches.len();
        matches
            .as_mut_slice()
            .sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        let unique = remove_duplicates(matches.as_mut_slice());
        matches.truncate(unique);
        debug!(target: "strata::vector", drained, unique, "Vector match materialized");
    }

    fn standalone_score(
        &self,
        ids: &[u64],
        scores: &mut [f32],
        boost: f32,
        last_ids: &[u64],
        last_distances: &[f32],
    ) {
        for (i, (id, score)) in ids.iter().zip(scores.iter_mut()).enumerate() {
            let distance = if last_ids.get(i) == Some(id) {
                Some(last_distances[i])
            } else {
                // Caller narrowed the batch; find the id in it
                last_ids.iter().position(|x| x == id).map(|p| last_distances[p])
            };
            *score = distance.map_or(0.0, |d| self.search.score(d) * boost);
        }
    }
}

impl<S: NearestSearch> QueryMatch for VectorQueryMatch<S> {
    fn fill(&mut self, out: &mut [u64]) -> usize {
        if self.empty {
            return 0;
        }
        self.materialize();
        match &mut self.mode {
            Mode::Standalone { ids, distances } => {
                distances.clear();
                distances.resize(out.len(), 0.0);
                let n = self.search.fill(out, distances);
                distances.truncate(n);
                ids.clear();
                ids.extend_from_slice(&out[..n]);
                n
            }
            Mode::Composed { matches, cursor, .. } => {
                let pending = &matches.as_slice()[*cursor..];
                let n = pending.len().min(out.len());
                for (slot, m) in out.iter_mut().zip(pending[..n].iter()) {
                    *slot = m.0;
                }
                *cursor += n;
                n
            }
        }
    }

    fn and_with(&mut self, ids: &mut [u64], count: usize) -> usize {
        if self.empty {
            return 0;
        }
        self.materialize();
        match &self.mode {
            Mode::Composed { matches, .. } => {
                intersect_sorted(ids, count, matches.as_slice(), |m| m.0)
            }
            // Only the last batch is known; keep the ids it contains
            Mode::Standalone { ids: last, .. } => {
                let mut kept = 0;
                for i in 0..count {
                    if last.contains(&ids[i]) {
                        ids[kept] = ids[i];
                        kept += 1;
                    }
                }
                kept
            }
        }
    }

    fn score(&mut self, ids: &[u64], scores: &mut [f32], boost: f32) {
        if self.empty {
            scores.iter_mut().for_each(|s| *s = 0.0);
            return;
        }
        self.materialize();
        match &self.mode {
            Mode::Standalone {
                ids: last_ids,
                distances,
            } => self.standalone_score(ids, scores, boost, last_ids, distances),
            Mode::Composed { matches, .. } => {
                let matches = matches.as_slice();
                for (id, score) in ids.iter().zip(scores.iter_mut()) {
                    *score = match matches.binary_search_by_key(id, |m| m.0) {
                        Ok(i) => self.search.score(matches[i].1) * boost,
                        Err(_) => 0.0,
                    };
                }
            }
        }
    }

    fn attempt_to_skip_sorting(&self) -> bool {
        self.is_standalone()
    }

    fn is_bounded(&self) -> bool {
        true
    }
}
