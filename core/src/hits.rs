//! Query-time hubs and authorities on a subgraph induced by a base set.

use crate::config::RankingConfig;
use crate::graph::LinkGraph;
use crate::pagerank::Convergence;
use std::collections::HashMap;

/// Base set plus its one-hop neighbourhood, with adjacency restricted to it.
#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    /// Local index -> graph dense index, in insertion order.
    pub nodes: Vec<usize>,
    /// Local out-adjacency; only edges with both ends inside the subgraph.
    pub out: Vec<Vec<usize>>,
}

impl Subgraph {
    /// For every seed add its out-neighbours, its in-neighbours and itself.
    pub fn induce<I>(graph: &LinkGraph, seeds: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut local: HashMap<usize, usize> = HashMap::new();
        let mut nodes = Vec::new();
        let mut add = |n: usize| {
            local.entry(n).or_insert_with(|| {
                nodes.push(n);
                nodes.len() - 1
            });
        };
        for seed in seeds {
            graph.out_neighbors(seed).iter().copied().for_each(&mut add);
            graph.in_neighbors(seed).iter().copied().for_each(&mut add);
            add(seed);
        }
        let out = nodes
            .iter()
            .map(|&n| graph.out_neighbors(n).iter().filter_map(|t| local.get(t).copied()).collect())
            .collect();
        Self { nodes, out }
    }

    /// The whole graph as one subgraph.
    pub fn whole(graph: &LinkGraph) -> Self {
        Self {
            nodes: (0..graph.len()).collect(),
            out: (0..graph.len()).map(|n| graph.out_neighbors(n).to_vec()).collect(),
        }
    }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn edge_count(&self) -> usize { self.out.iter().map(Vec::len).sum() }
}

/// Converged (or best-effort) hub and authority vectors for one subgraph.
#[derive(Debug, Clone)]
pub struct HitsResult {
    pub subgraph: Subgraph,
    pub hubs: Vec<f64>,
    pub authorities: Vec<f64>,
    pub convergence: Convergence,
}

impl HitsResult {
    /// `0.5 * hub + 0.5 * authority` for a local node.
    pub fn score(&self, local: usize) -> f64 {
        0.5 * self.hubs[local] + 0.5 * self.authorities[local]
    }

    /// `(graph index, combined score)` for every node of the subgraph.
    pub fn scores(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.subgraph.nodes.iter().enumerate().map(|(l, &g)| (g, self.score(l)))
    }

    /// Graph indices of the `n` best hubs, best first.
    pub fn top_hubs(&self, n: usize) -> Vec<(usize, f64)> {
        top(&self.subgraph.nodes, &self.hubs, n)
    }

    pub fn top_authorities(&self, n: usize) -> Vec<(usize, f64)> {
        top(&self.subgraph.nodes, &self.authorities, n)
    }
}

fn top(nodes: &[usize], values: &[f64], n: usize) -> Vec<(usize, f64)> {
    let mut v: Vec<(usize, f64)> = nodes.iter().copied().zip(values.iter().copied()).collect();
    v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.truncate(n);
    v
}

pub struct HitsRanker<'g> {
    graph: &'g LinkGraph,
    epsilon_per_node: f64,
    max_iterations: usize,
}

impl<'g> HitsRanker<'g> {
    pub fn new(graph: &'g LinkGraph, config: &RankingConfig) -> Self {
        Self {
            graph,
            epsilon_per_node: config.hits_epsilon_per_node,
            max_iterations: config.hits_max_iterations,
        }
    }

    /// HITS on the subgraph induced by `seeds` (graph dense indices).
    pub fn rank<I>(&self, seeds: I) -> HitsResult
    where
        I: IntoIterator<Item = usize>,
    {
        let sub = Subgraph::induce(self.graph, seeds);
        tracing::debug!(nodes = sub.len(), edges = sub.edge_count(), "induced HITS subgraph");
        self.iterate(sub)
    }

    /// HITS on the entire link graph.
    pub fn rank_all(&self) -> HitsResult {
        self.iterate(Subgraph::whole(self.graph))
    }

    /// Mutual reinforcement until the hub vector settles.
    ///
    /// Only the hub delta is checked against `epsilon_per_node * len`; the
    /// authority vector is not part of the stopping rule.
    pub fn iterate(&self, subgraph: Subgraph) -> HitsResult {
        let n = subgraph.len();
        let mut hubs = vec![1.0; n];
        let mut authorities = vec![1.0; n];
        let threshold = self.epsilon_per_node * n as f64;
        let mut iterations = 0;
        let mut error = if n == 0 { 0.0 } else { f64::INFINITY };

        while error > threshold && iterations < self.max_iterations {
            let mut new_hubs = vec![0.0; n];
            let mut new_auth = vec![0.0; n];
            for (i, targets) in subgraph.out.iter().enumerate() {
                for &j in targets {
                    new_hubs[i] += authorities[j];
                    new_auth[j] += hubs[i];
                }
            }
            normalize(&mut new_hubs, &hubs);
            normalize(&mut new_auth, &authorities);
            error = new_hubs.iter().zip(&hubs).map(|(a, b)| (a - b).abs()).sum();
            hubs = new_hubs;
            authorities = new_auth;
            iterations += 1;
        }

        let converged = error <= threshold;
        if !converged {
            tracing::warn!(iterations, error, nodes = n, "HITS reached its iteration cap without converging");
        }
        HitsResult {
            subgraph,
            hubs,
            authorities,
            convergence: Convergence { iterations, delta: error, converged },
        }
    }
}

/// L2-normalize `v`; a zero vector takes the previous values instead.
fn normalize(v: &mut [f64], previous: &[f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    } else {
        v.copy_from_slice(previous);
    }
}
