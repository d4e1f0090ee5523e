//! K-gram index over the dictionary, used for wildcard expansion and spelling.

use crate::query::Query;
use crate::tokenizer::WILDCARD;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

const START: char = '^';
const END: char = '$';

/// Resolves a wildcard pattern into the concrete dictionary terms it matches.
pub trait WildcardExpander: Send + Sync {
    fn expand_wildcard(&self, pattern: &str) -> Query;
}

#[derive(Debug, Default)]
pub struct KGramIndex {
    k: usize,
    terms: Vec<String>,
    term_ids: HashMap<String, u32>,
    /// k-gram -> ascending term ids
    index: HashMap<String, Vec<u32>>,
}

impl KGramIndex {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1), ..Self::default() }
    }

    /// Build from a dictionary. Terms are inserted in sorted order so every
    /// k-gram postings list is sorted by term id.
    pub fn from_terms<'a, I>(k: usize, terms: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sorted: BTreeSet<&str> = terms.into_iter().collect();
        let mut idx = Self::new(k);
        for t in sorted {
            idx.insert(t);
        }
        tracing::debug!(k = idx.k, terms = idx.terms.len(), kgrams = idx.index.len(), "built k-gram index");
        idx
    }

    pub fn insert(&mut self, term: &str) {
        if self.term_ids.contains_key(term) {
            return;
        }
        let id = self.terms.len() as u32;
        self.terms.push(term.to_string());
        self.term_ids.insert(term.to_string(), id);
        for kgram in self.kgrams(term) {
            self.index.entry(kgram).or_default().push(id);
        }
    }

    pub fn k(&self) -> usize { self.k }

    pub fn term(&self, id: u32) -> Option<&str> {
        self.terms.get(id as usize).map(String::as_str)
    }

    pub fn postings(&self, kgram: &str) -> &[u32] {
        self.index.get(kgram).map_or(&[], Vec::as_slice)
    }

    /// Distinct k-grams of `^term$`, in order of first appearance.
    pub fn kgrams(&self, term: &str) -> Vec<String> {
        let padded: Vec<char> = std::iter::once(START)
            .chain(term.chars())
            .chain(std::iter::once(END))
            .collect();
        fragment_kgrams(&padded, self.k)
    }

    fn matching_terms(&self, pattern: &str) -> Vec<&str> {
        let padded = format!("{START}{pattern}{END}");
        let mut candidates: Option<Vec<u32>> = None;
        for fragment in padded.split(WILDCARD) {
            let chars: Vec<char> = fragment.chars().collect();
            for kgram in fragment_kgrams(&chars, self.k) {
                let ids = self.postings(&kgram);
                candidates = Some(match candidates {
                    None => ids.to_vec(),
                    Some(prev) => intersect_sorted(&prev, ids),
                });
            }
        }
        let verify = wildcard_regex(pattern);
        let ids: Vec<u32> = match candidates {
            Some(ids) => ids,
            None => (0..self.terms.len() as u32).collect(),
        };
        let mut out: Vec<&str> = ids
            .into_iter()
            .filter_map(|id| self.term(id))
            .filter(|t| verify.is_match(t))
            .collect();
        out.sort_unstable();
        out
    }
}

impl WildcardExpander for KGramIndex {
    fn expand_wildcard(&self, pattern: &str) -> Query {
        Query::from_terms(self.matching_terms(pattern))
    }
}

fn fragment_kgrams(chars: &[char], k: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    if chars.len() < k {
        return out;
    }
    for w in chars.windows(k) {
        let g: String = w.iter().collect();
        if seen.insert(g.clone()) {
            out.push(g);
        }
    }
    out
}

fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn wildcard_regex(pattern: &str) -> Regex {
    let body: Vec<String> = pattern.split(WILDCARD).map(regex::escape).collect();
    // every piece is escaped, so the pattern is always valid
    Regex::new(&format!("^{}$", body.join(".*"))).expect("escaped wildcard pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx() -> KGramIndex {
        KGramIndex::from_terms(2, ["cat", "cart", "car", "scat", "dog", "cast"])
    }

    fn expand(idx: &KGramIndex, p: &str) -> Vec<String> {
        idx.expand_wildcard(p).terms.into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn kgrams_are_padded() {
        assert_eq!(idx().kgrams("cat"), vec!["^c", "ca", "at", "t$"]);
    }

    #[test]
    fn prefix_and_infix_wildcards() {
        let i = idx();
        assert_eq!(expand(&i, "ca*"), vec!["car", "cart", "cast", "cat"]);
        assert_eq!(expand(&i, "c*t"), vec!["cart", "cast", "cat"]);
        assert_eq!(expand(&i, "*at"), vec!["cat", "scat"]);
        assert!(expand(&i, "x*").is_empty());
    }

    #[test]
    fn bare_star_matches_everything() {
        assert_eq!(expand(&idx(), "*").len(), 6);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let i = KGramIndex::from_terms(2, ["a.b", "axb"]);
        assert_eq!(expand(&i, "a.*"), vec!["a.b"]);
    }
}
