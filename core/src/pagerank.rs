//! Global PageRank over the link graph.
//!
//! Two estimators: dense power iteration and Monte-Carlo random walks. Both
//! produce one score per graph node (dense index order), which is then turned
//! into a [`PageRankTable`] keyed by document title and persisted.

use crate::config::RankingConfig;
use crate::error::Error;
use crate::graph::{records, LinkGraph, LoadReport};
use crate::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Whether an iterative engine met its epsilon or ran out of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub iterations: usize,
    /// Last measured change between successive vectors.
    pub delta: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationState {
    Idle,
    Iterating,
    Converged,
    /// Iteration cap reached without meeting epsilon; scores are best-effort.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct PageRankResult {
    /// Indexed by the graph's dense node index.
    pub scores: Vec<f64>,
    pub convergence: Convergence,
}

impl PageRankResult {
    pub fn into_table(self, graph: &LinkGraph) -> PageRankTable {
        PageRankTable::from_scores(graph, &self.scores)
    }
}

/// Power iteration `a' = aP` with uniform redistribution of dangling mass.
///
/// Driven one [`step`](Self::step) at a time so a caller can interleave its own
/// deadline checks; [`run`](Self::run) loops to completion.
pub struct PowerIteration<'g> {
    graph: &'g LinkGraph,
    damping: f64,
    epsilon: f64,
    max_iterations: usize,
    scores: Vec<f64>,
    iterations: usize,
    delta: f64,
    state: IterationState,
}

impl<'g> PowerIteration<'g> {
    pub fn new(graph: &'g LinkGraph, config: &RankingConfig) -> Self {
        let n = graph.len();
        let start = if n == 0 { 0.0 } else { 1.0 / n as f64 };
        Self {
            graph,
            damping: config.damping,
            epsilon: config.pagerank_epsilon,
            max_iterations: config.pagerank_max_iterations,
            scores: vec![start; n],
            iterations: 0,
            delta: f64::INFINITY,
            state: IterationState::Idle,
        }
    }

    pub fn state(&self) -> IterationState { self.state }

    pub fn scores(&self) -> &[f64] { &self.scores }

    pub fn step(&mut self) -> IterationState {
        if matches!(self.state, IterationState::Converged | IterationState::Exhausted) {
            return self.state;
        }
        let n = self.graph.len();
        if n == 0 {
            self.delta = 0.0;
            self.state = IterationState::Converged;
            return self.state;
        }
        self.state = IterationState::Iterating;

        let nf = n as f64;
        let d = self.damping;
        let graph = self.graph;
        let old = &self.scores;

        let (dangling, linked): (f64, f64) = (0..n)
            .into_par_iter()
            .map(|j| if graph.is_dangling(j) { (old[j], 0.0) } else { (0.0, old[j]) })
            .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
        // mass every node receives regardless of its in-links
        let base = d * linked / nf + dangling / nf;

        let next: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|i| {
                let follow: f64 = graph
                    .in_neighbors(i)
                    .iter()
                    .map(|&j| old[j] / graph.out_degree(j) as f64)
                    .sum();
                base + (1.0 - d) * follow
            })
            .collect();

        self.delta = next.iter().zip(old.iter()).map(|(a, b)| (a - b).abs()).sum();
        self.scores = next;
        self.iterations += 1;

        if self.delta < self.epsilon {
            self.state = IterationState::Converged;
        } else if self.iterations >= self.max_iterations {
            tracing::warn!(
                iterations = self.iterations,
                delta = self.delta,
                "PageRank reached its iteration cap without converging"
            );
            self.state = IterationState::Exhausted;
        }
        self.state
    }

    pub fn run(mut self) -> PageRankResult {
        let start = std::time::Instant::now();
        while matches!(self.step(), IterationState::Iterating) {}
        let convergence = Convergence {
            iterations: self.iterations,
            delta: self.delta,
            converged: self.state == IterationState::Converged,
        };
        tracing::info!(
            nodes = self.graph.len(),
            iterations = convergence.iterations,
            delta = convergence.delta,
            converged = convergence.converged,
            took_s = start.elapsed().as_secs_f64(),
            "power iteration finished"
        );
        PageRankResult { scores: self.scores, convergence }
    }
}

/// Power iteration with the settings from `config`.
pub fn power_iteration(graph: &LinkGraph, config: &RankingConfig) -> PageRankResult {
    PowerIteration::new(graph, config).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonteCarloMethod {
    /// Count each walk's final node; walks start at random nodes.
    EndPointRandomStart,
    /// Count each walk's final node; one walk per node per round.
    EndPointCyclicStart,
    /// Count every visited node; walks start at random nodes.
    CompletePathRandomStart,
    /// Like [`Self::CompletePathRandomStart`], but a walk ends at a dangling node.
    CompletePathDanglingStop,
}

impl FromStr for MonteCarloMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mc-end-point-random" | "1" => Ok(Self::EndPointRandomStart),
            "mc-end-point-cyclic" | "2" => Ok(Self::EndPointCyclicStart),
            "mc-complete-path" | "3" => Ok(Self::CompletePathRandomStart),
            "mc-complete-path-stop" | "4" => Ok(Self::CompletePathDanglingStop),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

/// Walks handed to one rayon task; each task owns its RNG and counters.
const WALKS_PER_CHUNK: usize = 4096;

/// Estimate PageRank by simulating random walks.
///
/// `walks` is W: the number of walks for random-start methods, or the number of
/// rounds over all nodes for the cyclic method. Each step ends the walk with
/// probability `damping`, otherwise follows a random out-link (or jumps anywhere
/// from a dangling node). `damping` must be in `(0, 1]`, see
/// [`RankingConfig::validate`].
pub fn monte_carlo(
    graph: &LinkGraph,
    method: MonteCarloMethod,
    walks: usize,
    damping: f64,
    seed: Option<u64>,
) -> PageRankResult {
    let n = graph.len();
    let units = match method {
        MonteCarloMethod::EndPointCyclicStart => walks.saturating_mul(n),
        _ => walks,
    };
    let done = Convergence { iterations: units, delta: 0.0, converged: true };
    if n == 0 || units == 0 {
        return PageRankResult { scores: vec![0.0; n], convergence: done };
    }

    let base_seed = seed.unwrap_or_else(rand::random);
    let chunks = units.div_ceil(WALKS_PER_CHUNK);
    let start = std::time::Instant::now();

    let counts: Vec<u64> = (0..chunks)
        .into_par_iter()
        .fold(
            || vec![0u64; n],
            |mut counts, chunk| {
                let mut rng = StdRng::seed_from_u64(base_seed ^ (chunk as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                let lo = chunk * WALKS_PER_CHUNK;
                let hi = (lo + WALKS_PER_CHUNK).min(units);
                for unit in lo..hi {
                    let from = match method {
                        MonteCarloMethod::EndPointCyclicStart => unit % n,
                        _ => rng.random_range(0..n),
                    };
                    walk(graph, method, from, damping, &mut rng, &mut counts);
                }
                counts
            },
        )
        .reduce(
            || vec![0u64; n],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );

    let total: u64 = counts.iter().sum();
    let denom = match method {
        MonteCarloMethod::EndPointRandomStart | MonteCarloMethod::EndPointCyclicStart => units as f64,
        _ => total.max(1) as f64,
    };
    let scores: Vec<f64> = counts.into_iter().map(|c| c as f64 / denom).collect();
    tracing::info!(?method, walks, visits = total, took_s = start.elapsed().as_secs_f64(), "Monte Carlo finished");
    PageRankResult { scores, convergence: done }
}

fn walk(
    graph: &LinkGraph,
    method: MonteCarloMethod,
    from: usize,
    damping: f64,
    rng: &mut StdRng,
    counts: &mut [u64],
) {
    let complete_path = matches!(
        method,
        MonteCarloMethod::CompletePathRandomStart | MonteCarloMethod::CompletePathDanglingStop
    );
    let mut node = from;
    loop {
        if complete_path {
            counts[node] += 1;
        }
        if method == MonteCarloMethod::CompletePathDanglingStop && graph.is_dangling(node) {
            break;
        }
        if rng.random::<f64>() < damping {
            break;
        }
        let out = graph.out_neighbors(node);
        node = if out.is_empty() { rng.random_range(0..graph.len()) } else { out[rng.random_range(0..out.len())] };
    }
    if !complete_path {
        counts[node] += 1;
    }
}

/// One row of the persisted score file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRankEntry {
    pub title: String,
    pub score: f64,
    pub node_id: NodeId,
}

/// Title -> score lookup consumed read-only at query time.
#[derive(Debug, Clone, Default)]
pub struct PageRankTable {
    entries: HashMap<String, PageRankEntry>,
}

impl PageRankTable {
    /// One entry per node. When titles repeat, the lowest node keeps the title
    /// and the others are dropped with a warning.
    pub fn from_scores(graph: &LinkGraph, scores: &[f64]) -> Self {
        let mut entries: HashMap<String, PageRankEntry> = HashMap::with_capacity(scores.len());
        let mut duplicates = 0usize;
        for (i, &score) in scores.iter().enumerate() {
            let title = graph.display_name(i);
            if entries.contains_key(&title) {
                tracing::debug!(title = %title, node = graph.node_id(i), "duplicate title");
                duplicates += 1;
                continue;
            }
            entries.insert(title.clone(), PageRankEntry { title, score, node_id: graph.node_id(i) });
        }
        if duplicates > 0 {
            tracing::warn!(duplicates, "nodes sharing a title were left out of the PageRank table");
        }
        Self { entries }
    }

    pub fn insert(&mut self, entry: PageRankEntry) {
        self.entries.insert(entry.title.clone(), entry);
    }

    pub fn get(&self, title: &str) -> Option<f64> {
        self.entries.get(title).map(|e| e.score)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn total(&self) -> f64 { self.entries.values().map(|e| e.score).sum() }

    /// Entries by descending score, ties by title.
    pub fn sorted(&self) -> Vec<&PageRankEntry> {
        let mut v: Vec<&PageRankEntry> = self.entries.values().collect();
        v.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.title.cmp(&b.title)));
        v
    }

    pub fn top(&self, n: usize) -> Vec<&PageRankEntry> {
        let mut v = self.sorted();
        v.truncate(n);
        v
    }

    /// Write `title=score;nodeID` lines, highest score first.
    pub fn write_to<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        for e in self.sorted() {
            writeln!(w, "{}={};{}", e.title, e.score, e.node_id)?;
        }
        w.flush()
    }

    /// Read a score file, skipping malformed lines and stopping at `max_entries`.
    pub fn read_from<R: BufRead>(reader: R, max_entries: usize) -> std::io::Result<(Self, LoadReport)> {
        let mut table = PageRankTable::default();
        let mut report = LoadReport::default();
        for record in records(reader) {
            let (n, line) = record?;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping score record");
                    report.malformed += 1;
                    continue;
                }
            };
            if line.trim().is_empty() { continue; }
            if table.len() >= max_entries {
                tracing::warn!(max_entries, "stopped reading scores since table is full");
                report.capacity_exceeded = true;
                break;
            }
            match parse_score_line(&line, n) {
                Ok(entry) => {
                    table.insert(entry);
                    report.lines_read += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping score record");
                    report.malformed += 1;
                }
            }
        }
        tracing::info!(entries = table.len(), malformed = report.malformed, "loaded PageRank table");
        Ok((table, report))
    }
}

/// Sum of squared differences between an exact ranking and an estimate, taken
/// over the exact table's `top` best titles. A title outside the estimate's own
/// top `top` counts as 0 there.
pub fn compare(exact: &PageRankTable, estimate: &PageRankTable, top: usize) -> f64 {
    let estimated: HashMap<&str, f64> = estimate.top(top).into_iter().map(|e| (e.title.as_str(), e.score)).collect();
    exact
        .top(top)
        .into_iter()
        .map(|e| {
            let d = e.score - estimated.get(e.title.as_str()).copied().unwrap_or(0.0);
            d * d
        })
        .sum()
}

fn parse_score_line(line: &str, n: usize) -> Result<PageRankEntry, Error> {
    let (head, node) = line.rsplit_once(';').ok_or_else(|| Error::malformed(n, "missing ';'"))?;
    let (title, score) = head.rsplit_once('=').ok_or_else(|| Error::malformed(n, "missing '='"))?;
    let score: f64 = score.trim().parse().map_err(|_| Error::malformed(n, format!("bad score {score:?}")))?;
    let node_id: NodeId = node.trim().parse().map_err(|_| Error::malformed(n, format!("bad node id {node:?}")))?;
    if title.is_empty() {
        return Err(Error::malformed(n, "empty title"));
    }
    Ok(PageRankEntry { title: title.to_string(), score, node_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle() -> LinkGraph {
        let mut b = LinkGraph::builder();
        b.add_edge(1, 2).add_edge(2, 3).add_edge(3, 1);
        b.build()
    }

    #[test]
    fn state_machine_moves_from_idle() {
        let g = cycle();
        let mut it = PowerIteration::new(&g, &RankingConfig::default());
        assert_eq!(it.state(), IterationState::Idle);
        let s = it.step();
        assert_eq!(s, IterationState::Converged);
        assert_eq!(it.step(), IterationState::Converged);
    }

    #[test]
    fn exhausted_is_reported_not_fatal() {
        let mut b = LinkGraph::builder();
        b.add_edge(1, 2).add_edge(1, 3).add_edge(3, 1).add_node(4);
        let g = b.build();
        let config = RankingConfig { pagerank_max_iterations: 1, pagerank_epsilon: 0.0, ..RankingConfig::default() };
        let r = power_iteration(&g, &config);
        assert!(!r.convergence.converged);
        assert_eq!(r.convergence.iterations, 1);
        assert!((r.scores.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dangling_mass_is_redistributed() {
        // 2 is dangling; mass must not leak
        let mut b = LinkGraph::builder();
        b.add_edge(1, 2).add_edge(3, 2).add_edge(3, 1);
        let g = b.build();
        let r = power_iteration(&g, &RankingConfig::default());
        assert!(r.convergence.converged);
        assert!((r.scores.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        let top = r.scores.iter().copied().fold(f64::MIN, f64::max);
        assert_eq!(top, r.scores[g.index_of(2).unwrap()]);
    }

    #[test]
    fn end_point_estimates_sum_to_one() {
        let g = cycle();
        for method in [MonteCarloMethod::EndPointRandomStart, MonteCarloMethod::EndPointCyclicStart] {
            let r = monte_carlo(&g, method, 3000, 0.15, Some(42));
            assert!((r.scores.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn monte_carlo_is_reproducible_with_seed() {
        let g = cycle();
        let a = monte_carlo(&g, MonteCarloMethod::CompletePathRandomStart, 5000, 0.15, Some(7));
        let b = monte_carlo(&g, MonteCarloMethod::CompletePathRandomStart, 5000, 0.15, Some(7));
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn score_line_round_trip() {
        let mut t = PageRankTable::default();
        t.insert(PageRankEntry { title: "a=b.f".into(), score: 0.25, node_id: 4 });
        t.insert(PageRankEntry { title: "c.f".into(), score: 0.75, node_id: 9 });
        let mut buf = Vec::new();
        t.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("c.f=0.75;9\n"));
        let (back, report) = PageRankTable::read_from(std::io::Cursor::new(buf), 10).unwrap();
        assert_eq!(report.malformed, 0);
        assert_eq!(back.get("a=b.f"), Some(0.25));
    }

    #[test]
    fn bad_score_lines_are_skipped() {
        let input = "a.f=0.5;1\nb.f=oops;2\nnothing\n";
        let (t, report) = PageRankTable::read_from(std::io::Cursor::new(input), 10).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(report.malformed, 2);
    }

    #[test]
    fn non_utf8_score_line_is_skipped() {
        let input: &[u8] = b"a.f=0.5;1\nb\xff.f=0.5;2\nc.f=0.25;3\n";
        let (t, report) = PageRankTable::read_from(std::io::Cursor::new(input), 10).unwrap();
        assert_eq!(report.malformed, 1);
        assert_eq!(t.get("a.f"), Some(0.5));
        assert_eq!(t.get("c.f"), Some(0.25));
    }

    #[test]
    fn compare_counts_missing_titles_as_zero() {
        let table = |rows: &[(&str, f64)]| {
            let mut t = PageRankTable::default();
            for (i, (title, score)) in rows.iter().enumerate() {
                t.insert(PageRankEntry { title: title.to_string(), score: *score, node_id: i as NodeId });
            }
            t
        };
        let exact = table(&[("a.f", 0.5), ("b.f", 0.3), ("c.f", 0.2)]);
        assert_eq!(compare(&exact, &exact, 30), 0.0);

        // c.f falls outside the estimate's top 2, b.f is off by 0.1
        let estimate = table(&[("a.f", 0.5), ("b.f", 0.2), ("c.f", 0.1)]);
        let d = compare(&exact, &estimate, 2);
        assert!((d - 0.01).abs() < 1e-12, "{d}");
        let d = compare(&exact, &estimate, 3);
        assert!((d - 0.02).abs() < 1e-12, "{d}");
    }

    #[test]
    fn repeated_titles_keep_the_first_node() {
        let mut b = LinkGraph::builder();
        b.add_edge(1, 2).add_edge(2, 3).add_edge(3, 1);
        b.set_title(1, "same.f").set_title(2, "same.f").set_title(3, "other.f");
        let g = b.build();
        let table = PageRankTable::from_scores(&g, &[0.5, 0.25, 0.25]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("same.f"), Some(0.5));
        assert_eq!(table.top(1)[0].node_id, 1);
    }
}
