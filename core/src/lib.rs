//! Query evaluation and multi-signal ranking over a positional inverted index.
//!
//! The index, the link graph and the PageRank score table are built offline and
//! are read-only while queries are served. Per-query state (scores, HITS vectors)
//! lives only inside a single [`search::Searcher::search`] call.

pub mod config;
pub mod error;
pub mod graph;
pub mod hits;
pub mod index;
pub mod kgram;
pub mod pagerank;
pub mod persist;
pub mod postings;
pub mod query;
pub mod search;
pub mod spelling;
pub mod tokenizer;

/// Dense document identifier assigned at index-build time.
pub type DocId = u32;

/// Node identifier in the link graph's private numbering space.
pub type NodeId = u32;

pub use config::RankingConfig;
pub use error::{Error, Result};
pub use graph::{LinkGraph, LoadReport};
pub use hits::{HitsRanker, HitsResult};
pub use index::{InvertedIndex, PostingsStore};
pub use kgram::{KGramIndex, WildcardExpander};
pub use pagerank::{Convergence, MonteCarloMethod, PageRankResult, PageRankTable, PowerIteration};
pub use postings::{Posting, PostingsList, ScoredDoc};
pub use query::{Query, QueryTerm, QueryType, RankingType};
pub use search::{CrossReference, SearchResults, Searcher};
pub use spelling::SpellChecker;
