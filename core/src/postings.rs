//! Positional postings and the pure algebra over them.
//!
//! Every function here expects lists sorted by `doc_id` (the build-time invariant of
//! [`PostingsList`]) but tolerates several entries per document.

use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One occurrence of a term: the document and the token position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub offset: u32,
}

impl Posting {
    pub fn new(doc_id: DocId, offset: u32) -> Self {
        Self { doc_id, offset }
    }
}

/// A query result: an immutable posting paired with a score owned by one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub offset: u32,
    pub score: f64,
}

impl ScoredDoc {
    pub fn new(posting: Posting, score: f64) -> Self {
        Self { doc_id: posting.doc_id, offset: posting.offset, score }
    }
}

/// Postings for one term, sorted by `doc_id` ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingsList {
    entries: Vec<Posting>,
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(entries: Vec<Posting>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, posting: Posting) {
        self.entries.push(posting);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Posting> {
        self.entries.last()
    }

    pub fn into_vec(self) -> Vec<Posting> {
        self.entries
    }

    /// Distinct document ids in list order.
    pub fn doc_ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.entries.iter().map(|p| p.doc_id).collect();
        ids.dedup();
        ids
    }

    /// Number of entries for `doc_id`. Relies on the sort invariant.
    pub fn count_for(&self, doc_id: DocId) -> usize {
        let start = self.entries.partition_point(|p| p.doc_id < doc_id);
        let end = self.entries.partition_point(|p| p.doc_id <= doc_id);
        end - start
    }

    /// Stable sort by document id; offsets keep their relative order per document.
    pub fn sort_by_doc_id(&mut self) {
        self.entries.sort_by_key(|p| p.doc_id);
    }

    /// Collapse to one entry per document (the first one).
    ///
    /// Sorts first: adjacent-only collapsing of an unsorted list would leave duplicates.
    pub fn deduplicate(&mut self) {
        self.sort_by_doc_id();
        self.entries.dedup_by_key(|p| p.doc_id);
    }
}

impl FromIterator<Posting> for PostingsList {
    fn from_iter<I: IntoIterator<Item = Posting>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Documents present in both lists, one entry per document (taken from `a`).
pub fn intersect(a: &PostingsList, b: &PostingsList) -> PostingsList {
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut out = PostingsList::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    // duplicate doc ids on either side can produce repeated matches
    out.deduplicate();
    out
}

/// Entries of `a` whose term is followed by `b`'s term exactly `k` positions later.
///
/// `b` is grouped into doc -> offsets once, then each entry of `a` is probed.
pub fn phrase_intersect(a: &PostingsList, b: &PostingsList, k: u32) -> PostingsList {
    let mut positions: HashMap<DocId, HashSet<u32>> = HashMap::with_capacity(b.len());
    for p in b {
        positions.entry(p.doc_id).or_default().insert(p.offset);
    }
    a.iter()
        .filter(|p| {
            positions
                .get(&p.doc_id)
                .is_some_and(|offsets| offsets.contains(&(p.offset + k)))
        })
        .copied()
        .collect()
}

/// Set union over documents, keeping the first representative seen (from `a` first).
pub fn union(a: &PostingsList, b: &PostingsList) -> PostingsList {
    let mut seen: HashSet<DocId> = HashSet::with_capacity(a.len() + b.len());
    let mut out: PostingsList = a
        .iter()
        .chain(b.iter())
        .filter(|p| seen.insert(p.doc_id))
        .copied()
        .collect();
    out.sort_by_doc_id();
    out
}

/// Union that keeps every position of every list, sorted by (doc, offset).
///
/// Used when a wildcard stands in a phrase: any expansion may fill the slot.
pub fn merge_positions<'a, I>(lists: I) -> PostingsList
where
    I: IntoIterator<Item = &'a PostingsList>,
{
    let mut entries: Vec<Posting> = lists.into_iter().flat_map(|l| l.iter().copied()).collect();
    entries.sort_by_key(|p| (p.doc_id, p.offset));
    entries.dedup();
    PostingsList::from_vec(entries)
}

/// Stable sort, highest score first.
pub fn sort_by_score(results: &mut [ScoredDoc]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Keep the first occurrence of every document, preserving order.
pub fn dedup_first(results: Vec<ScoredDoc>) -> Vec<ScoredDoc> {
    let mut seen: HashSet<DocId> = HashSet::with_capacity(results.len());
    results.into_iter().filter(|r| seen.insert(r.doc_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(pairs: &[(DocId, u32)]) -> PostingsList {
        pairs.iter().map(|&(d, o)| Posting::new(d, o)).collect()
    }

    fn doc_set(l: &PostingsList) -> HashSet<DocId> {
        l.iter().map(|p| p.doc_id).collect()
    }

    #[test]
    fn intersect_is_commutative_on_doc_sets() {
        let a = list(&[(1, 0), (1, 4), (3, 2), (5, 1), (9, 0)]);
        let b = list(&[(0, 3), (1, 1), (5, 7), (5, 9), (9, 2), (11, 0)]);
        let ab = intersect(&a, &b);
        let ba = intersect(&b, &a);
        assert_eq!(doc_set(&ab), doc_set(&ba));
        assert_eq!(doc_set(&ab), [1, 5, 9].into_iter().collect());
        assert_eq!(ab.len(), 3);
    }

    #[test]
    fn intersect_with_empty_is_empty() {
        let a = list(&[(1, 0), (2, 0)]);
        assert!(intersect(&a, &PostingsList::new()).is_empty());
    }

    #[test]
    fn phrase_requires_exact_gap() {
        // doc 0: T1@3 T2@4 ; doc 1: T1@3 T2@5
        let t1 = list(&[(0, 3), (1, 3)]);
        let t2 = list(&[(0, 4), (1, 5)]);
        let hits = phrase_intersect(&t1, &t2, 1);
        assert_eq!(hits.doc_ids(), vec![0]);
        let hits = phrase_intersect(&t1, &t2, 2);
        assert_eq!(hits.doc_ids(), vec![1]);
    }

    #[test]
    fn phrase_keeps_start_offsets() {
        let t1 = list(&[(2, 0), (2, 10)]);
        let t2 = list(&[(2, 11)]);
        let hits = phrase_intersect(&t1, &t2, 1);
        assert_eq!(hits.as_slice(), &[Posting::new(2, 10)]);
    }

    #[test]
    fn union_keeps_one_entry_per_doc() {
        let a = list(&[(1, 0), (1, 2), (4, 0)]);
        let b = list(&[(0, 5), (4, 9)]);
        let u = union(&a, &b);
        assert_eq!(u.as_slice(), &[Posting::new(0, 5), Posting::new(1, 0), Posting::new(4, 0)]);
    }

    #[test]
    fn deduplicate_is_idempotent() {
        let mut l = list(&[(1, 0), (1, 3), (2, 1), (7, 0), (7, 2), (7, 9)]);
        l.deduplicate();
        let once = l.clone();
        l.deduplicate();
        assert_eq!(l, once);
        assert_eq!(once.doc_ids(), vec![1, 2, 7]);
    }

    #[test]
    fn deduplicate_handles_unsorted_input() {
        let mut l = list(&[(3, 0), (1, 0), (3, 1), (1, 5)]);
        l.deduplicate();
        assert_eq!(l.doc_ids(), vec![1, 3]);
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn count_for_counts_occurrences() {
        let l = list(&[(0, 1), (2, 0), (2, 4), (2, 8), (5, 0)]);
        assert_eq!(l.count_for(2), 3);
        assert_eq!(l.count_for(1), 0);
        assert_eq!(l.count_for(5), 1);
    }

    #[test]
    fn score_sort_is_stable_and_descending() {
        let mut r = vec![
            ScoredDoc { doc_id: 1, offset: 0, score: 0.5 },
            ScoredDoc { doc_id: 2, offset: 0, score: 0.9 },
            ScoredDoc { doc_id: 3, offset: 0, score: 0.5 },
        ];
        sort_by_score(&mut r);
        let ids: Vec<DocId> = r.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn merge_positions_keeps_all_offsets() {
        let a = list(&[(0, 1), (2, 3)]);
        let b = list(&[(0, 4), (0, 1)]);
        let m = merge_positions([&a, &b]);
        assert_eq!(m.as_slice(), &[Posting::new(0, 1), Posting::new(0, 4), Posting::new(2, 3)]);
    }
}
