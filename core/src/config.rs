use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Tunables for the link-analysis engines and the combination ranking.
///
/// Every field has a default, so a JSON config file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Probability that the random surfer gets bored and jumps anywhere.
    pub damping: f64,
    pub pagerank_epsilon: f64,
    pub pagerank_max_iterations: usize,
    /// Weight of PageRank in COMBINATION ranking; the rest goes to TF-IDF.
    pub combination_weight: f64,
    /// HITS stops when the hub delta is at most this times the subgraph size.
    pub hits_epsilon_per_node: f64,
    pub hits_max_iterations: usize,
    /// Capacity policy for link, title and score files.
    pub max_nodes: usize,
    pub monte_carlo_walks: usize,
    pub seed: Option<u64>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            damping: 0.15,
            pagerank_epsilon: 1e-4,
            pagerank_max_iterations: 100_000,
            combination_weight: 0.007,
            hits_epsilon_per_node: 1e-4,
            hits_max_iterations: 1000,
            max_nodes: 2_000_000,
            monte_carlo_walks: 100_000,
            seed: None,
        }
    }
}

impl RankingConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref())?;
        let config: RankingConfig = serde_json::from_reader(BufReader::new(f))?;
        config.validate()?;
        tracing::info!(path = %path.as_ref().display(), ?config, "loaded ranking config");
        Ok(config)
    }

    /// Reject values the engines cannot run with. A walk only ends through the
    /// damping coin flip, so `damping` must be in `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.damping > 0.0 && self.damping <= 1.0,
            "damping must be in (0, 1], got {}",
            self.damping
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.combination_weight),
            "combination_weight must be in [0, 1], got {}",
            self.combination_weight
        );
        Ok(())
    }

    /// Load from `path` when given, otherwise fall back to the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let c: RankingConfig = serde_json::from_str(r#"{ "damping": 0.2, "seed": 7 }"#).unwrap();
        assert_eq!(c.damping, 0.2);
        assert_eq!(c.seed, Some(7));
        assert_eq!(c.combination_weight, 0.007);
        assert_eq!(c.hits_max_iterations, 1000);
    }

    #[test]
    fn out_of_range_damping_is_rejected() {
        for damping in [0.0, -0.1, 1.5, f64::NAN] {
            let c = RankingConfig { damping, ..RankingConfig::default() };
            assert!(c.validate().is_err(), "{damping}");
        }
        assert!(RankingConfig { damping: 1.0, ..RankingConfig::default() }.validate().is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.json");
        std::fs::write(&path, r#"{ "damping": 0 }"#).unwrap();
        assert!(RankingConfig::load(&path).is_err());
    }
}
