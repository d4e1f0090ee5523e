use crate::error::Error;
use crate::tokenizer::{normalize_query_word, TokenizerOptions, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A query term and its weight (1.0 unless the caller lowers it, e.g. for a
/// spelling-corrected term).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub term: String,
    pub weight: f64,
}

impl QueryTerm {
    pub fn new(term: impl Into<String>) -> Self {
        Self { term: term.into(), weight: 1.0 }
    }

    pub fn with_weight(term: impl Into<String>, weight: f64) -> Self {
        Self { term: term.into(), weight }
    }

    pub fn is_wildcard(&self) -> bool {
        self.term.contains(WILDCARD)
    }
}

/// Ordered sequence of weighted terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub terms: Vec<QueryTerm>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-normalized terms, each with weight 1.0.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { terms: terms.into_iter().map(QueryTerm::new).collect() }
    }

    /// Split raw text on whitespace and normalize each word like the index did.
    pub fn parse(text: &str, options: TokenizerOptions) -> Self {
        let terms = text
            .split_whitespace()
            .flat_map(|w| normalize_query_word(w, options))
            .map(QueryTerm::new)
            .collect();
        Self { terms }
    }

    pub fn add_term(&mut self, term: impl Into<String>) {
        self.terms.push(QueryTerm::new(term));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryTerm> {
        self.terms.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Intersection,
    Phrase,
    Ranked,
}

/// Scoring policy; only consulted for [`QueryType::Ranked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingType {
    #[default]
    TfIdf,
    PageRank,
    Hits,
    Combination,
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intersection" => Ok(QueryType::Intersection),
            "phrase" => Ok(QueryType::Phrase),
            "ranked" => Ok(QueryType::Ranked),
            _ => Err(Error::UnknownQueryType(s.to_string())),
        }
    }
}

impl FromStr for RankingType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "tf_idf" | "tfidf" => Ok(RankingType::TfIdf),
            "pagerank" | "page_rank" => Ok(RankingType::PageRank),
            "hits" => Ok(RankingType::Hits),
            "combination" => Ok(RankingType::Combination),
            _ => Err(Error::UnknownRankingType(s.to_string())),
        }
    }
}

impl fmt::Display for RankingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RankingType::TfIdf => "TF-IDF",
            RankingType::PageRank => "PageRank",
            RankingType::Hits => "HITS",
            RankingType::Combination => "combination",
        };
        f.write_str(name)
    }
}
