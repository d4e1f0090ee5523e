//! Spelling suggestions for query terms that are not in the index.
//!
//! Candidates come from the k-gram index (Jaccard overlap) and are filtered by
//! edit distance. Whole-query suggestions are scored by how many documents the
//! corrected query matches, using the regular search path.

use crate::index::PostingsStore;
use crate::kgram::KGramIndex;
use crate::query::{Query, QueryType, RankingType};
use crate::search::Searcher;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SpellChecker {
    pub jaccard_threshold: f64,
    pub max_edit_distance: usize,
    /// Upper bound on candidate phrases evaluated per call.
    pub max_phrases: usize,
}

impl Default for SpellChecker {
    fn default() -> Self {
        Self { jaccard_threshold: 0.3, max_edit_distance: 2, max_phrases: 256 }
    }
}

impl SpellChecker {
    pub fn new() -> Self { Self::default() }

    /// Up to `limit` corrected queries, best first. Empty when every term is known.
    pub fn check(&self, searcher: &Searcher<'_>, kgrams: &KGramIndex, query: &Query, limit: usize) -> Vec<String> {
        let store = searcher.store();
        let mut any_missing = false;
        let alternatives: Vec<Vec<String>> = query
            .iter()
            .map(|t| {
                if t.is_wildcard() || store.postings(&t.term).is_some() {
                    return vec![t.term.clone()];
                }
                any_missing = true;
                let found = self.corrections(store, kgrams, &t.term, limit);
                if found.is_empty() { vec![t.term.clone()] } else { found }
            })
            .collect();
        if !any_missing {
            return Vec::new();
        }

        let mut phrases: Vec<Vec<String>> = vec![Vec::new()];
        for alts in &alternatives {
            phrases = phrases
                .iter()
                .flat_map(|p| {
                    alts.iter().map(move |a| {
                        let mut next = p.clone();
                        next.push(a.clone());
                        next
                    })
                })
                .take(self.max_phrases)
                .collect();
        }

        let mut scored: Vec<(usize, String)> = phrases
            .into_iter()
            .map(|terms| {
                let q = Query::from_terms(terms.iter().cloned());
                let hits = searcher
                    .search(&q, QueryType::Intersection, RankingType::TfIdf)
                    .map(|r| r.len())
                    .unwrap_or(0);
                (hits, terms.join(" "))
            })
            .filter(|(hits, _)| *hits > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(limit).map(|(_, phrase)| phrase).collect()
    }

    /// Dictionary terms close to `token`, most frequent first.
    pub fn corrections(&self, store: &dyn PostingsStore, kgrams: &KGramIndex, token: &str, limit: usize) -> Vec<String> {
        let query_grams = kgrams.kgrams(token);
        let mut overlap: HashMap<u32, usize> = HashMap::new();
        for g in &query_grams {
            for &id in kgrams.postings(g) {
                *overlap.entry(id).or_insert(0) += 1;
            }
        }
        let mut found: Vec<(u32, &str)> = overlap
            .into_iter()
            .filter_map(|(id, shared)| {
                let term = kgrams.term(id)?;
                let j = jaccard(query_grams.len(), kgrams.kgrams(term).len(), shared);
                (j >= self.jaccard_threshold && edit_distance(token, term) <= self.max_edit_distance)
                    .then(|| (store.document_frequency(term), term))
            })
            .collect();
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        found.into_iter().take(limit).map(|(_, t)| t.to_string()).collect()
    }
}

fn jaccard(size_a: usize, size_b: usize, shared: usize) -> f64 {
    let union = size_a + size_b - shared;
    if union == 0 { 0.0 } else { shared as f64 / union as f64 }
}

/// Levenshtein distance with insert/delete cost 1 and substitution cost 2.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let sub = if a[i - 1] == b[j - 1] { 0 } else { 2 };
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + sub);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
