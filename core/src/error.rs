use crate::query::RankingType;
use thiserror::Error;

/// Errors raised by the ranking core.
///
/// Non-convergence and partial loads are not errors; they are reported through
/// [`crate::Convergence`] and [`crate::LoadReport`] alongside the best-effort result.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown query type: {0}")]
    UnknownQueryType(String),

    #[error("unknown ranking type: {0}")]
    UnknownRankingType(String),

    #[error("unknown Monte Carlo method: {0}")]
    UnknownMethod(String),

    /// A link, title or score file line that could not be parsed.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("{0} ranking requires a PageRank score table")]
    MissingPageRank(RankingType),

    #[error("HITS ranking requires a link graph")]
    MissingLinkGraph,
}

impl Error {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord { line, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
