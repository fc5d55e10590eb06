//! Query operators for the boolean evaluator
//!
//! This module provides:
//! - QueryMatch trait implemented by every operator
//! - SortedIdMatch: a pre-sorted posting list
//! - AndMatch: intersection of several operators
//! - BoostMatch: scales the scores of an operator
//!
//! # Id order
//!
//! Operators that take part in an intersection must `fill` ids in ascending
//! order, and `and_with` expects its input ascending. Operators whose natural
//! order is relevance (a standalone vector match) report it through
//! `attempt_to_skip_sorting` and are not intersected.

// ============================================================================
// QueryMatch Trait
// ============================================================================

/// A query operator producing matching document ids
pub trait QueryMatch {
    /// Write the next matching ids into `ids`
    ///
    /// Returns the number written; 0 means the operator is done.
    fn fill(&mut self, ids: &mut [u64]) -> usize;

    /// Keep only the ids in `ids[..count]` this operator matches
    ///
    /// `ids[..count]` must be ascending. Survivors are compacted to the front
    /// in their original order; returns how many survived.
    fn and_with(&mut self, ids: &mut [u64], count: usize) -> usize;

    /// Write `boost * score(id)` for every id into `scores`
    ///
    /// Ids this operator does not match score 0.
    fn score(&mut self, ids: &[u64], scores: &mut [f32], boost: f32);

    /// True if `fill` already yields ids in final ranking order
    fn attempt_to_skip_sorting(&self) -> bool;

    /// True if the operator matches a known, capped set of ids
    fn is_bounded(&self) -> bool;
}

impl<M: QueryMatch + ?Sized> QueryMatch for Box<M> {
    fn fill(&mut self, ids: &mut [u64]) -> usize {
        (**self).fill(ids)
    }

    fn and_with(&mut self, ids: &mut [u64], count: usize) -> usize {
        (**self).and_with(ids, count)
    }

    fn score(&mut self, ids: &[u64], scores: &mut [f32], boost: f32) {
        (**self).score(ids, scores, boost)
    }

    fn attempt_to_skip_sorting(&self) -> bool {
        (**self).attempt_to_skip_sorting()
    }

    fn is_bounded(&self) -> bool {
        (**self).is_bounded()
    }
}

/// Intersect ascending `ids[..count]` with the ascending `matches`
///
/// Survivors are compacted to the front of `ids`.
pub(crate) fn intersect_sorted<T>(
    ids: &mut [u64],
    count: usize,
    matches: &[T],
    key: impl Fn(&T) -> u64,
) -> usize {
    let mut kept = 0;
    let mut j = 0;
    for i in 0..count {
        let id = ids[i];
        while j < matches.len() && key(&matches[j]) < id {
            j += 1;
        }
        if j == matches.len() {
            break;
        }
        if key(&matches[j]) == id {
            ids[kept] = id;
            kept += 1;
        }
    }
    kept
}

// ============================================================================
// SortedIdMatch
// ============================================================================

/// A materialized posting list, ascending by id
///
/// Each id carries a score (1.0 unless given).
#[derive(Debug, Clone, Default)]
pub struct SortedIdMatch {
    postings: Vec<(u64, f32)>,
    cursor: usize,
}

impl SortedIdMatch {
    /// Posting list over `ids`, each scoring 1.0
    ///
    /// Input order does not matter; duplicates are dropped.
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self::with_scores(ids.into_iter().map(|id| (id, 1.0)))
    }

    /// Posting list with explicit per-id scores
    ///
    /// For duplicate ids the highest score is kept.
    pub fn with_scores(postings: impl IntoIterator<Item = (u64, f32)>) -> Self {
        let mut postings: Vec<(u64, f32)> = postings.into_iter().collect();
        postings.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(b.1.total_cmp(&a.1)));
        postings.dedup_by_key(|p| p.0);
        SortedIdMatch { postings, cursor: 0 }
    }

    /// Number of ids in the list
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// True if the list is empty
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

impl QueryMatch for SortedIdMatch {
    fn fill(&mut self, ids: &mut [u64]) -> usize {
        let pending = &self.postings[self.cursor..];
        let count = pending.len().min(ids.len());
        for (slot, posting) in ids.iter_mut().zip(pending[..count].iter()) {
            *slot = posting.0;
        }
        self.cursor += count;
        count
    }

    fn and_with(&mut self, ids: &mut [u64], count: usize) -> usize {
        intersect_sorted(ids, count, &self.postings, |p| p.0)
    }

    fn score(&mut self, ids: &[u64], scores: &mut [f32], boost: f32) {
        for (id, score) in ids.iter().zip(scores.iter_mut()) {
            *score = match self.postings.binary_search_by_key(id, |p| p.0) {
                Ok(i) => self.postings[i].1 * boost,
                Err(_) => 0.0,
            };
        }
    }

    fn attempt_to_skip_sorting(&self) -> bool {
        false
    }

    fn is_bounded(&self) -> bool {
        true
    }
}

// ============================================================================
// AndMatch
// ============================================================================

/// Intersection of two or more operators
///
/// One child leads: its `fill` output is narrowed by every other child's
/// `and_with`. The first bounded child leads, otherwise the first child.
/// Scores are the sum of the children's scores.
pub struct AndMatch {
    children: Vec<Box<dyn QueryMatch>>,
    lead: usize,
}

impl AndMatch {
    /// Intersect `children`
    pub fn new(children: Vec<Box<dyn QueryMatch>>) -> Self {
        let lead = children.iter().position(|c| c.is_bounded()).unwrap_or(0);
        AndMatch { children, lead }
    }
}

impl QueryMatch for AndMatch {
    fn fill(&mut self, ids: &mut [u64]) -> usize {
        if self.children.is_empty() {
            return 0;
        }
        loop {
            let mut count = self.children[self.lead].fill(ids);
            if count == 0 {
                return 0;
            }
            for (i, child) in self.children.iter_mut().enumerate() {
                if i != self.lead && count > 0 {
                    count = child.and_with(ids, count);
                }
            }
            if count > 0 {
                return count;
            }
        }
    }

    fn and_with(&mut self, ids: &mut [u64], count: usize) -> usize {
        let mut count = count;
        for child in self.children.iter_mut() {
            if count == 0 {
                break;
            }
            count = child.and_with(ids, count);
        }
        count
    }

    fn score(&mut self, ids: &[u64], scores: &mut [f32], boost: f32) {
        let n = ids.len().min(scores.len());
        scores[..n].iter_mut().for_each(|s| *s = 0.0);
        let mut child_scores = vec![0.0f32; n];
        for child in self.children.iter_mut() {
            child.score(&ids[..n], &mut child_scores, boost);
            for (total, part) in scores[..n].iter_mut().zip(child_scores.iter()) {
                *total += *part;
            }
        }
    }

    fn attempt_to_skip_sorting(&self) -> bool {
        false
    }

    fn is_bounded(&self) -> bool {
        self.children.iter().any(|c| c.is_bounded())
    }
}

// ============================================================================
// BoostMatch
// ============================================================================

/// Multiplies the scores of an operator by a constant factor
///
/// Positive factors keep the inner ranking order.
pub struct BoostMatch<M: QueryMatch> {
    inner: M,
    factor: f32,
}

impl<M: QueryMatch> BoostMatch<M> {
    /// Boost `inner` by `factor`
    pub fn new(inner: M, factor: f32) -> Self {
        BoostMatch { inner, factor }
    }
}

impl<M: QueryMatch> QueryMatch for BoostMatch<M> {
    fn fill(&mut self, ids: &mut [u64]) -> usize {
        self.inner.fill(ids)
    }

    fn and_with(&mut self, ids: &mut [u64], count: usize) -> usize {
        self.inner.and_with(ids, count)
    }

    fn score(&mut self, ids: &[u64], scores: &mut [f32], boost: f32) {
        self.inner.score(ids, scores, boost * self.factor)
    }

    fn attempt_to_skip_sorting(&self) -> bool {
        self.factor > 0.0 && self.inner.attempt_to_skip_sorting()
    }

    fn is_bounded(&self) -> bool {
        self.inner.is_bounded()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(m: &mut dyn QueryMatch) -> Vec<u64> {
        let mut out = Vec::new();
        let mut buf = [0u64; 3];
        loop {
            let n = m.fill(&mut buf);
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_sorted_match_sorts_and_dedups() {
        let mut m = SortedIdMatch::new([9, 3, 5, 3, 1]);
        assert_eq!(m.len(), 4);
        assert_eq!(drain(&mut m), vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_sorted_match_and_with() {
        let mut m = SortedIdMatch::new([2, 4, 6, 8]);
        let mut ids = [1, 2, 3, 4, 8, 10];
        let n = m.and_with(&mut ids, 6);
        assert_eq!(&ids[..n], &[2, 4, 8]);
        assert_eq!(m.and_with(&mut ids, 0), 0);
    }

    #[test]
    fn test_sorted_match_scores() {
        let mut m = SortedIdMatch::with_scores([(1, 0.5), (2, 2.0), (1, 0.75)]);
        let mut scores = [0.0; 3];
        m.score(&[1, 2, 3], &mut scores, 2.0);
        assert_eq!(scores, [1.5, 4.0, 0.0]);
    }

    #[test]
    fn test_and_match_intersects() {
        let mut and = AndMatch::new(vec![
            Box::new(SortedIdMatch::new(1..=20)),
            Box::new(SortedIdMatch::new((0..=20).step_by(3))),
            Box::new(SortedIdMatch::new((0..=20).step_by(2))),
        ]);
        assert_eq!(drain(&mut and), vec![6, 12, 18]);

        let mut scores = [0.0; 2];
        and.score(&[6, 7], &mut scores, 1.0);
        assert_eq!(scores, [3.0, 1.0]);
    }

    #[test]
    fn test_and_match_skips_empty_batches() {
        // The first two fill batches of the lead share nothing with the other child
        let mut and = AndMatch::new(vec![
            Box::new(SortedIdMatch::new(1..=9)),
            Box::new(SortedIdMatch::new([9])),
        ]);
        assert_eq!(drain(&mut and), vec![9]);
    }

    #[test]
    fn test_boost_scales_scores() {
        let mut boosted = BoostMatch::new(SortedIdMatch::new([1, 2]), 3.0);
        let mut scores = [0.0; 2];
        boosted.score(&[1, 2], &mut scores, 2.0);
        assert_eq!(scores, [6.0, 6.0]);
        assert!(boosted.is_bounded());
        assert!(!boosted.attempt_to_skip_sorting());
    }

    #[test]
    fn test_intersect_sorted_stops_early() {
        let matches = [5u64, 7];
        let mut ids = [1, 5, 6, 7, 100, 200];
        let n = intersect_sorted(&mut ids, 6, &matches, |m| *m);
        assert_eq!(&ids[..n], &[5, 7]);
    }
}
