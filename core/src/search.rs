//! Boolean and ranked query evaluation.

use crate::config::RankingConfig;
use crate::error::{Error, Result};
use crate::graph::LinkGraph;
use crate::hits::HitsRanker;
use crate::index::PostingsStore;
use crate::kgram::WildcardExpander;
use crate::pagerank::{Convergence, PageRankTable};
use crate::postings::{self, Posting, PostingsList, ScoredDoc};
use crate::query::{Query, QueryTerm, QueryType, RankingType};
use crate::DocId;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;

/// Last path component; link titles are bare file names.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Maps documents to link-graph nodes (by file name) and back.
///
/// Documents in different directories can share a file name, so one node may
/// stand for several documents.
#[derive(Debug, Clone, Default)]
pub struct CrossReference {
    doc_to_node: HashMap<DocId, usize>,
    node_to_docs: HashMap<usize, Vec<DocId>>,
}

impl CrossReference {
    pub fn build(store: &dyn PostingsStore, graph: &LinkGraph) -> Self {
        let mut xref = CrossReference::default();
        for doc_id in 0..store.num_docs() {
            let Some(name) = store.document_name(doc_id) else { continue };
            if let Some(node) = graph.node_for_title(file_name(name)) {
                xref.doc_to_node.insert(doc_id, node);
                xref.node_to_docs.entry(node).or_default().push(doc_id);
            }
        }
        tracing::info!(
            docs = store.num_docs(),
            linked = xref.doc_to_node.len(),
            "built document/link cross reference"
        );
        xref
    }

    pub fn node(&self, doc_id: DocId) -> Option<usize> {
        self.doc_to_node.get(&doc_id).copied()
    }

    /// Documents sharing the node's title, in document id order.
    pub fn docs(&self, node: usize) -> &[DocId] {
        self.node_to_docs.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize { self.doc_to_node.len() }

    pub fn is_empty(&self) -> bool { self.doc_to_node.is_empty() }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Unranked results are ordered by document id and carry score 0.
    pub hits: Vec<ScoredDoc>,
    /// Set when HITS ran for this query.
    pub hits_convergence: Option<Convergence>,
}

impl SearchResults {
    pub fn len(&self) -> usize { self.hits.len() }

    pub fn is_empty(&self) -> bool { self.hits.is_empty() }

    pub fn doc_ids(&self) -> Vec<DocId> { self.hits.iter().map(|h| h.doc_id).collect() }
}

/// A term's postings, or the fact that the term is not in the index.
enum Resolved<'s> {
    Missing,
    Found(Cow<'s, PostingsList>),
}

/// Evaluates queries against frozen index structures. Cheap to build per query.
pub struct Searcher<'a> {
    store: &'a dyn PostingsStore,
    wildcards: Option<&'a dyn WildcardExpander>,
    pagerank: Option<&'a PageRankTable>,
    links: Option<(&'a LinkGraph, &'a CrossReference)>,
    config: &'a RankingConfig,
}

impl<'a> Searcher<'a> {
    pub fn new(store: &'a dyn PostingsStore, config: &'a RankingConfig) -> Self {
        Self { store, wildcards: None, pagerank: None, links: None, config }
    }

    pub fn with_wildcards(mut self, expander: &'a dyn WildcardExpander) -> Self {
        self.wildcards = Some(expander);
        self
    }

    pub fn with_pagerank(mut self, table: &'a PageRankTable) -> Self {
        self.pagerank = Some(table);
        self
    }

    pub fn with_link_graph(mut self, graph: &'a LinkGraph, xref: &'a CrossReference) -> Self {
        self.links = Some((graph, xref));
        self
    }

    pub fn store(&self) -> &'a dyn PostingsStore { self.store }

    pub fn search(&self, query: &Query, query_type: QueryType, ranking: RankingType) -> Result<SearchResults> {
        let results = match query_type {
            QueryType::Intersection => unranked(self.intersection(query)),
            QueryType::Phrase => unranked(self.phrase(query)),
            QueryType::Ranked => self.ranked(query, ranking)?,
        };
        tracing::debug!(terms = query.len(), ?query_type, ?ranking, hits = results.len(), "search finished");
        Ok(results)
    }

    /// Expanded terms of a wildcard pattern, each inheriting the pattern's weight.
    fn expand(&self, term: &QueryTerm) -> Vec<QueryTerm> {
        match self.wildcards {
            Some(w) => w
                .expand_wildcard(&term.term)
                .terms
                .into_iter()
                .map(|t| QueryTerm::with_weight(t.term, term.weight))
                .collect(),
            None => Vec::new(),
        }
    }

    fn resolve(&self, term: &QueryTerm, keep_positions: bool) -> Resolved<'a> {
        if !term.is_wildcard() {
            return match self.store.postings(&term.term) {
                Some(list) => Resolved::Found(Cow::Borrowed(list)),
                None => Resolved::Missing,
            };
        }
        let lists: Vec<&PostingsList> = self
            .expand(term)
            .iter()
            .filter_map(|t| self.store.postings(&t.term))
            .collect();
        if lists.is_empty() {
            return Resolved::Missing;
        }
        let merged = if keep_positions {
            postings::merge_positions(lists)
        } else {
            let mut u = lists.into_iter().fold(PostingsList::new(), |acc, l| postings::union(&acc, l));
            u.deduplicate();
            u
        };
        Resolved::Found(Cow::Owned(merged))
    }

    fn intersection(&self, query: &Query) -> PostingsList {
        let mut acc: Option<PostingsList> = None;
        for term in query.iter() {
            let list = match self.resolve(term, false) {
                Resolved::Missing => return PostingsList::new(),
                Resolved::Found(l) => l,
            };
            acc = Some(match acc {
                None => list.into_owned(),
                Some(prev) => postings::intersect(&prev, &list),
            });
            if acc.as_ref().is_some_and(PostingsList::is_empty) {
                break;
            }
        }
        let mut result = acc.unwrap_or_default();
        result.deduplicate();
        result
    }

    fn phrase(&self, query: &Query) -> PostingsList {
        let mut acc: Option<PostingsList> = None;
        for (k, term) in query.iter().enumerate() {
            let list = match self.resolve(term, true) {
                Resolved::Missing => return PostingsList::new(),
                Resolved::Found(l) => l,
            };
            acc = Some(match acc {
                None => list.into_owned(),
                Some(prev) => postings::phrase_intersect(&prev, &list, k as u32),
            });
            if acc.as_ref().is_some_and(PostingsList::is_empty) {
                break;
            }
        }
        let mut result = acc.unwrap_or_default();
        result.deduplicate();
        result
    }

    fn ranked(&self, query: &Query, ranking: RankingType) -> Result<SearchResults> {
        // candidate set, and the concrete terms that contribute to TF-IDF
        let mut candidates = PostingsList::new();
        let mut scoring_terms: Vec<QueryTerm> = Vec::new();
        for term in query.iter() {
            match self.resolve(term, false) {
                Resolved::Missing => continue,
                Resolved::Found(list) => candidates = postings::union(&candidates, &list),
            }
            if term.is_wildcard() {
                scoring_terms.extend(self.expand(term));
            } else {
                scoring_terms.push(term.clone());
            }
        }
        if candidates.is_empty() {
            return Ok(SearchResults::default());
        }

        let mut hits_convergence = None;
        let mut scored: Vec<ScoredDoc> = match ranking {
            RankingType::TfIdf => self.tf_idf(&candidates, &scoring_terms),
            RankingType::PageRank => {
                let table = self.pagerank.ok_or(Error::MissingPageRank(ranking))?;
                candidates.iter().map(|p| ScoredDoc::new(*p, self.pagerank_of(table, p.doc_id))).collect()
            }
            RankingType::Hits => {
                let (scored, convergence) = self.hits(&candidates)?;
                hits_convergence = Some(convergence);
                scored
            }
            RankingType::Combination => {
                let table = self.pagerank.ok_or(Error::MissingPageRank(ranking))?;
                let w1 = self.config.combination_weight;
                self.tf_idf(&candidates, &scoring_terms)
                    .into_iter()
                    .map(|mut d| {
                        d.score = w1 * self.pagerank_of(table, d.doc_id) + (1.0 - w1) * d.score;
                        d
                    })
                    .collect()
            }
        };

        postings::sort_by_score(&mut scored);
        let hits = postings::dedup_first(scored);
        Ok(SearchResults { hits, hits_convergence })
    }

    fn pagerank_of(&self, table: &PageRankTable, doc_id: DocId) -> f64 {
        self.store
            .document_name(doc_id)
            .and_then(|name| table.get(file_name(name)))
            .unwrap_or(0.0)
    }

    /// `Σ idf(t) · w(t) · tf(t, d) / len(d)`, with `idf(t) = log10(N / df(t))`.
    ///
    /// When every candidate scores exactly zero (all terms occur in every document)
    /// the idf factor is dropped so results are still ordered by term frequency.
    fn tf_idf(&self, candidates: &PostingsList, terms: &[QueryTerm]) -> Vec<ScoredDoc> {
        let total = self.store.num_docs() as f64;
        let weighted_tf = |doc_id: DocId, term: &QueryTerm| -> f64 {
            let len = self.store.document_length(doc_id);
            if len == 0 {
                return 0.0;
            }
            term.weight * self.store.term_frequency(doc_id, &term.term) as f64 / len as f64
        };
        let idfs: Vec<f64> = terms
            .iter()
            .map(|t| match self.store.document_frequency(&t.term) {
                0 => 0.0,
                df => (total / df as f64).log10(),
            })
            .collect();

        let mut scored: Vec<ScoredDoc> = candidates
            .iter()
            .map(|p| {
                let score = terms.iter().zip(&idfs).map(|(t, idf)| idf * weighted_tf(p.doc_id, t)).sum::<f64>();
                ScoredDoc::new(*p, score)
            })
            .collect();

        if scored.iter().all(|d| d.score == 0.0) {
            for d in scored.iter_mut() {
                d.score = terms.iter().map(|t| weighted_tf(d.doc_id, t)).sum();
            }
        }
        scored
    }

    fn hits(&self, candidates: &PostingsList) -> Result<(Vec<ScoredDoc>, Convergence)> {
        let (graph, xref) = self.links.ok_or(Error::MissingLinkGraph)?;
        let seeds: Vec<usize> = candidates.iter().filter_map(|p| xref.node(p.doc_id)).collect();
        let result = HitsRanker::new(graph, self.config).rank(seeds);

        let mut scored: Vec<ScoredDoc> = result
            .scores()
            .flat_map(|(node, score)| {
                xref.docs(node).iter().map(move |&doc_id| ScoredDoc::new(Posting::new(doc_id, 0), score))
            })
            .collect();
        // matches outside the link graph are still results, with no link score
        scored.extend(
            candidates
                .iter()
                .filter(|p| xref.node(p.doc_id).is_none())
                .map(|p| ScoredDoc::new(*p, 0.0)),
        );
        Ok((scored, result.convergence))
    }
}

fn unranked(list: PostingsList) -> SearchResults {
    SearchResults {
        hits: list.iter().map(|p| ScoredDoc::new(*p, 0.0)).collect(),
        hits_convergence: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name("davisWiki/hello.f"), "hello.f");
        assert_eq!(file_name("c:\\docs\\a.txt"), "a.txt");
        assert_eq!(file_name("plain"), "plain");
    }
}
