use crate::graph::{LinkGraph, LoadReport};
use crate::index::{InvertedIndex, PostingsStore};
use crate::pagerank::PageRankTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &InvertedIndex) -> Self {
        Self {
            num_docs: index.num_docs(),
            num_terms: index.num_terms(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = BufWriter::new(File::create(paths.index())?);
    bincode::serialize_into(&mut f, index)?;
    f.flush()?;
    save_meta(paths, &MetaFile::describe(index))?;
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        anyhow::bail!("index format version {} is not supported (expected {})", meta.version, FORMAT_VERSION);
    }
    let f = BufReader::new(File::open(paths.index()).with_context(|| format!("opening {}", paths.index().display()))?);
    let index: InvertedIndex = bincode::deserialize_from(f)?;
    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "loaded index");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Load the link graph from a links file and a titles file.
pub fn load_link_graph<P: AsRef<Path>, Q: AsRef<Path>>(
    links: P,
    titles: Q,
    max_nodes: usize,
) -> Result<(LinkGraph, LoadReport)> {
    let links = links.as_ref();
    let titles = titles.as_ref();
    let l = BufReader::new(File::open(links).with_context(|| format!("opening {}", links.display()))?);
    let t = BufReader::new(File::open(titles).with_context(|| format!("opening {}", titles.display()))?);
    Ok(LinkGraph::from_readers(l, t, max_nodes)?)
}

pub fn save_pagerank<P: AsRef<Path>>(path: P, table: &PageRankTable) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir)?;
    }
    let f = BufWriter::new(File::create(path)?);
    table.write_to(f)?;
    tracing::info!(path = %path.display(), entries = table.len(), "wrote PageRank table");
    Ok(())
}

pub fn load_pagerank<P: AsRef<Path>>(path: P, max_entries: usize) -> Result<(PageRankTable, LoadReport)> {
    let path = path.as_ref();
    let f = BufReader::new(File::open(path).with_context(|| format!("opening {}", path.display()))?);
    Ok(PageRankTable::read_from(f, max_entries)?)
}
