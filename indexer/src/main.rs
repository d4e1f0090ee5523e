use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ranksearch_core::graph::LinkGraph;
use ranksearch_core::pagerank::{compare, monte_carlo, MonteCarloMethod, PowerIteration};
use ranksearch_core::persist::{load_link_graph, load_pagerank, save_index, save_pagerank, IndexPaths};
use ranksearch_core::tokenizer::{tokenize_with, TokenizerOptions};
use ranksearch_core::{HitsRanker, InvertedIndex, PageRankResult, PostingsStore, RankingConfig};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    body: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the positional index and compute link-analysis scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from .txt files, or JSON/JSONL documents, in a file or directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Drop English stopwords (positions still count them)
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Apply the English Snowball stemmer
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
    /// Compute PageRank over a link graph and write the score file
    Pagerank {
        #[command(flatten)]
        graph: GraphArgs,
        /// Score file to write (title=score;nodeID per line)
        #[arg(long, default_value = "./PagerankScore.txt")]
        output: String,
        #[arg(long, value_enum, default_value_t = Method::Power)]
        method: Method,
        /// Number of walks (rounds over all nodes for the cyclic method)
        #[arg(long)]
        walks: Option<usize>,
        #[arg(long)]
        damping: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        /// How many top documents to log and compare
        #[arg(long, default_value_t = 30)]
        top: usize,
        /// Exact score file to measure this run against
        #[arg(long)]
        compare_with: Option<String>,
        /// Where `walks;sum` is appended (defaults to measure-<method>.txt)
        #[arg(long, requires = "compare_with")]
        measure_file: Option<String>,
    },
    /// Run HITS over the whole link graph and report the best hubs and authorities
    Hits {
        #[command(flatten)]
        graph: GraphArgs,
        #[arg(long, default_value_t = 30)]
        top: usize,
    },
}

#[derive(clap::Args)]
struct GraphArgs {
    /// Links file (nodeID;out1,out2,...)
    #[arg(long)]
    links: String,
    /// Titles file (nodeID;title)
    #[arg(long)]
    titles: String,
    /// JSON ranking config; defaults apply to missing keys
    #[arg(long)]
    config: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Power,
    McEndPointRandom,
    McEndPointCyclic,
    McCompletePath,
    McCompletePathStop,
}

impl Method {
    fn name(self) -> String {
        self.to_possible_value().map(|v| v.get_name().to_string()).unwrap_or_default()
    }

    fn monte_carlo(self) -> Option<MonteCarloMethod> {
        match self {
            Method::Power => None,
            Method::McEndPointRandom => Some(MonteCarloMethod::EndPointRandomStart),
            Method::McEndPointCyclic => Some(MonteCarloMethod::EndPointCyclicStart),
            Method::McCompletePath => Some(MonteCarloMethod::CompletePathRandomStart),
            Method::McCompletePathStop => Some(MonteCarloMethod::CompletePathDanglingStop),
        }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords, stem } => {
            let options = TokenizerOptions { remove_stopwords: stopwords, stem };
            build_index(&input, &output, options)
        }
        Commands::Pagerank { graph, output, method, walks, damping, seed, top, compare_with, measure_file } => {
            let config = RankingConfig::load_or_default(graph.config.as_deref())?;
            let config = with_overrides(config, damping, walks, seed)?;
            let (links, _) = load_link_graph(&graph.links, &graph.titles, config.max_nodes)?;
            let result = compute_pagerank(&links, method, &config);
            let table = result.into_table(&links);
            for (rank, e) in table.top(top).iter().enumerate() {
                tracing::info!(rank = rank + 1, title = %e.title, score = e.score, "pagerank");
            }
            save_pagerank(&output, &table)?;
            if let Some(exact) = compare_with {
                let (exact, _) = load_pagerank(&exact, config.max_nodes)?;
                let sum = compare(&exact, &table, top);
                let measure = measure_file.unwrap_or_else(|| format!("measure-{}.txt", method.name()));
                tracing::info!(?method, walks = config.monte_carlo_walks, sum, measure = %measure, "compared with exact ranking");
                append_measurement(&measure, config.monte_carlo_walks, sum)?;
            }
            Ok(())
        }
        Commands::Hits { graph, top } => {
            let config = RankingConfig::load_or_default(graph.config.as_deref())?;
            let (links, _) = load_link_graph(&graph.links, &graph.titles, config.max_nodes)?;
            let result = HitsRanker::new(&links, &config).rank_all();
            tracing::info!(
                iterations = result.convergence.iterations,
                converged = result.convergence.converged,
                "HITS finished"
            );
            for (n, score) in result.top_hubs(top) {
                println!("hub\t{}\t{:.5}", links.display_name(n), score);
            }
            for (n, score) in result.top_authorities(top) {
                println!("authority\t{}\t{:.5}", links.display_name(n), score);
            }
            Ok(())
        }
    }
}

/// Command-line values win over the config file; the result is validated again.
fn with_overrides(
    mut config: RankingConfig,
    damping: Option<f64>,
    walks: Option<usize>,
    seed: Option<u64>,
) -> Result<RankingConfig> {
    if let Some(d) = damping { config.damping = d; }
    if let Some(w) = walks { config.monte_carlo_walks = w; }
    if seed.is_some() { config.seed = seed; }
    config.validate()?;
    Ok(config)
}

/// One `walks;sum` line per run, so repeated runs build up a series.
fn append_measurement(path: &str, walks: usize, sum: f64) -> Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{};{}", walks, sum)?;
    Ok(())
}

fn compute_pagerank(graph: &LinkGraph, method: Method, config: &RankingConfig) -> PageRankResult {
    match method.monte_carlo() {
        None => PowerIteration::new(graph, config).run(),
        Some(mc) => monte_carlo(graph, mc, config.monte_carlo_walks, config.damping, config.seed),
    }
}

fn build_index(input: &str, output: &str, options: TokenizerOptions) -> Result<()> {
    let input_path = Path::new(input);
    let out_paths = IndexPaths::new(output);
    let mut index = InvertedIndex::with_options(options);

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("txt" | "json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    // stable document ids across runs
    files.sort();

    for file in files {
        match extension(&file) {
            Some("jsonl") => index_jsonl(&file, &mut index)?,
            Some("json") => index_json(&file, &mut index)?,
            _ => {
                let body = fs::read_to_string(&file)?;
                let name = file.strip_prefix(input_path).unwrap_or(&file).to_string_lossy().to_string();
                let name = if name.is_empty() { file.to_string_lossy().to_string() } else { name };
                index.add_document(name, tokenize_with(&body, options));
            }
        }
    }

    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "ingested documents");
    save_index(&out_paths, &index)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}

fn index_jsonl(file: &Path, index: &mut InvertedIndex) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        ingest_doc(doc, index);
    }
    Ok(())
}

fn index_json(file: &Path, index: &mut InvertedIndex) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                ingest_doc(serde_json::from_value(v)?, index);
            }
        }
        serde_json::Value::Object(_) => ingest_doc(serde_json::from_value(json)?, index),
        _ => tracing::warn!(file = %file.display(), "skipping JSON that is neither object nor array"),
    }
    Ok(())
}

fn ingest_doc(doc: InputDoc, index: &mut InvertedIndex) {
    let options = index.options();
    index.add_document(doc.id, tokenize_with(&doc.body, options));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranksearch_core::persist::load_index;

    #[test]
    fn builds_from_text_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.txt"), "the cat sat").unwrap();
        fs::write(input.join("b.jsonl"), "{\"id\":\"b1\",\"body\":\"the cat ran\"}\n\n").unwrap();
        let out = dir.path().join("index");

        build_index(input.to_str().unwrap(), out.to_str().unwrap(), TokenizerOptions::default()).unwrap();
        let index = load_index(&IndexPaths::new(&out)).unwrap();
        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.document_name(0), Some("a.txt"));
        assert_eq!(index.document_name(1), Some("b1"));
        assert_eq!(index.document_frequency("cat"), 2);
    }

    #[test]
    fn zero_damping_override_is_rejected() {
        assert!(with_overrides(RankingConfig::default(), Some(0.0), None, None).is_err());
        let c = with_overrides(RankingConfig::default(), Some(0.3), Some(10), Some(5)).unwrap();
        assert_eq!((c.damping, c.monte_carlo_walks, c.seed), (0.3, 10, Some(5)));
    }

    #[test]
    fn measurements_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measure-mc-end-point-random.txt");
        let path = path.to_str().unwrap();
        append_measurement(path, 1000, 0.5).unwrap();
        append_measurement(path, 2000, 0.25).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "1000;0.5\n2000;0.25\n");
        assert_eq!(Method::McEndPointRandom.name(), "mc-end-point-random");
    }

    #[test]
    fn every_method_produces_a_full_table() {
        let mut b = LinkGraph::builder();
        b.add_edge(1, 2).add_edge(2, 3).add_edge(3, 1).add_node(4);
        let g = b.build();
        let config = RankingConfig { monte_carlo_walks: 500, seed: Some(1), ..RankingConfig::default() };
        for m in Method::value_variants() {
            let table = compute_pagerank(&g, *m, &config).into_table(&g);
            assert_eq!(table.len(), 4);
        }
    }
}
