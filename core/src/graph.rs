//! Immutable directed link graph shared by PageRank and HITS.
//!
//! Nodes keep their external [`NodeId`] but are addressed internally by a dense
//! index (`0..len`) so scores can live in plain vectors.

use crate::error::Error;
use crate::NodeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::BufRead;

/// Outcome of reading a line-oriented input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub lines_read: usize,
    pub malformed: usize,
    /// Loading stopped early because the configured capacity was reached.
    pub capacity_exceeded: bool,
}

impl LoadReport {
    pub fn merge(self, other: LoadReport) -> LoadReport {
        LoadReport {
            lines_read: self.lines_read + other.lines_read,
            malformed: self.malformed + other.malformed,
            capacity_exceeded: self.capacity_exceeded || other.capacity_exceeded,
        }
    }
}

/// Mutable accumulator; [`LinkGraphBuilder::build`] freezes it.
#[derive(Debug, Default)]
pub struct LinkGraphBuilder {
    edges: BTreeMap<NodeId, BTreeSet<NodeId>>,
    titles: HashMap<NodeId, String>,
}

impl LinkGraphBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add_node(&mut self, node: NodeId) -> &mut Self {
        self.edges.entry(node).or_default();
        self
    }

    /// Repeated edges are ignored and do not raise the out-degree.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.edges.entry(from).or_default().insert(to);
        self.edges.entry(to).or_default();
        self
    }

    pub fn set_title(&mut self, node: NodeId, title: impl Into<String>) -> &mut Self {
        self.titles.insert(node, title.into());
        self
    }

    pub fn node_count(&self) -> usize { self.edges.len() }

    fn would_add(&self, nodes: &[NodeId]) -> usize {
        let fresh: BTreeSet<&NodeId> = nodes.iter().filter(|n| !self.edges.contains_key(n)).collect();
        fresh.len()
    }

    pub fn build(self) -> LinkGraph {
        let ids: Vec<NodeId> = self.edges.keys().copied().collect();
        let index_of: HashMap<NodeId, usize> = ids.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let mut out = vec![Vec::new(); ids.len()];
        let mut inc = vec![Vec::new(); ids.len()];
        for (from, targets) in &self.edges {
            let f = index_of[from];
            for to in targets {
                let t = index_of[to];
                out[f].push(t);
                inc[t].push(f);
            }
        }
        let mut titles = vec![None; ids.len()];
        let mut title_to_node = HashMap::with_capacity(self.titles.len());
        for (node, title) in self.titles {
            if let Some(&i) = index_of.get(&node) {
                title_to_node.insert(title.clone(), i);
                titles[i] = Some(title);
            }
        }
        LinkGraph { ids, index_of, out, inc, titles, title_to_node }
    }
}

#[derive(Debug, Default)]
pub struct LinkGraph {
    ids: Vec<NodeId>,
    index_of: HashMap<NodeId, usize>,
    out: Vec<Vec<usize>>,
    /// Inverted adjacency, so in-neighbour lookups do not scan the graph.
    inc: Vec<Vec<usize>>,
    titles: Vec<Option<String>>,
    title_to_node: HashMap<String, usize>,
}

impl LinkGraph {
    pub fn builder() -> LinkGraphBuilder { LinkGraphBuilder::new() }

    /// Read a links file (`nodeID;out1,out2,...`) and a titles file (`nodeID;title`).
    ///
    /// Malformed lines are skipped with a warning; reading stops once `max_nodes`
    /// distinct nodes are loaded, keeping what was read so far.
    pub fn from_readers<L: BufRead, T: BufRead>(
        links: L,
        titles: T,
        max_nodes: usize,
    ) -> std::io::Result<(LinkGraph, LoadReport)> {
        let mut builder = LinkGraphBuilder::new();
        let mut report = LoadReport::default();

        for record in records(links) {
            let (n, line) = record?;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping link record");
                    report.malformed += 1;
                    continue;
                }
            };
            if line.trim().is_empty() { continue; }
            let (from, targets) = match parse_link_line(&line, n) {
                Ok(rec) => rec,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping link record");
                    report.malformed += 1;
                    continue;
                }
            };
            let mut touched = targets.clone();
            touched.push(from);
            if builder.node_count() + builder.would_add(&touched) > max_nodes {
                tracing::warn!(max_nodes, line = n, "stopped reading links since node table is full");
                report.capacity_exceeded = true;
                break;
            }
            builder.add_node(from);
            for to in targets {
                builder.add_edge(from, to);
            }
            report.lines_read += 1;
        }

        let mut title_report = LoadReport::default();
        for record in records(titles) {
            let (n, line) = record?;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping title record");
                    title_report.malformed += 1;
                    continue;
                }
            };
            if line.trim().is_empty() { continue; }
            if title_report.lines_read >= max_nodes {
                tracing::warn!(max_nodes, "stopped reading titles since table is full");
                title_report.capacity_exceeded = true;
                break;
            }
            match parse_title_line(&line, n) {
                Ok((node, title)) => {
                    builder.set_title(node, title);
                    title_report.lines_read += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping title record");
                    title_report.malformed += 1;
                }
            }
        }

        let graph = builder.build();
        let report = report.merge(title_report);
        tracing::info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            malformed = report.malformed,
            capacity_exceeded = report.capacity_exceeded,
            "loaded link graph"
        );
        Ok((graph, report))
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn edge_count(&self) -> usize { self.out.iter().map(Vec::len).sum() }

    pub fn node_id(&self, idx: usize) -> NodeId { self.ids[idx] }

    pub fn index_of(&self, node: NodeId) -> Option<usize> { self.index_of.get(&node).copied() }

    pub fn out_neighbors(&self, idx: usize) -> &[usize] { &self.out[idx] }

    pub fn in_neighbors(&self, idx: usize) -> &[usize] { &self.inc[idx] }

    pub fn out_degree(&self, idx: usize) -> usize { self.out[idx].len() }

    pub fn is_dangling(&self, idx: usize) -> bool { self.out[idx].is_empty() }

    pub fn title(&self, idx: usize) -> Option<&str> { self.titles[idx].as_deref() }

    /// Title, or the node id rendered as text when the titles file had none.
    pub fn display_name(&self, idx: usize) -> String {
        self.title(idx).map_or_else(|| self.ids[idx].to_string(), str::to_string)
    }

    pub fn node_for_title(&self, title: &str) -> Option<usize> { self.title_to_node.get(title).copied() }
}

/// Numbered lines of `reader`, starting at 1. A line that is not UTF-8 is a
/// malformed record rather than a read failure.
pub(crate) fn records<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<(usize, Result<String, Error>)>> {
    reader.split(b'\n').enumerate().map(|(i, bytes)| {
        let n = i + 1;
        let mut bytes = bytes?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok((n, String::from_utf8(bytes).map_err(|_| Error::malformed(n, "not valid UTF-8"))))
    })
}

fn parse_node(s: &str, line: usize) -> Result<NodeId, Error> {
    s.trim().parse().map_err(|_| Error::malformed(line, format!("bad node id {s:?}")))
}

fn parse_link_line(line: &str, n: usize) -> Result<(NodeId, Vec<NodeId>), Error> {
    let (from, rest) = line.split_once(';').ok_or_else(|| Error::malformed(n, "missing ';'"))?;
    let from = parse_node(from, n)?;
    let targets = rest
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_node(s, n))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((from, targets))
}

fn parse_title_line(line: &str, n: usize) -> Result<(NodeId, String), Error> {
    let (node, title) = line.split_once(';').ok_or_else(|| Error::malformed(n, "missing ';'"))?;
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::malformed(n, "empty title"));
    }
    Ok((parse_node(node, n)?, title.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_links_and_titles() {
        let links = "1;2,3\n2;3\n3;\n";
        let titles = "1;a.f\n2;b.f\n3;c.f\n";
        let (g, report) = LinkGraph::from_readers(Cursor::new(links), Cursor::new(titles), 100).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.edge_count(), 3);
        let n3 = g.index_of(3).unwrap();
        assert!(g.is_dangling(n3));
        assert_eq!(g.in_neighbors(n3).len(), 2);
        assert_eq!(g.node_for_title("b.f"), g.index_of(2));
        assert_eq!(report.lines_read, 6);
        assert_eq!(report.malformed, 0);
    }

    #[test]
    fn duplicate_edges_do_not_raise_out_degree() {
        let (g, _) = LinkGraph::from_readers(Cursor::new("1;2,2,2\n1;2\n"), Cursor::new(""), 10).unwrap();
        assert_eq!(g.out_degree(g.index_of(1).unwrap()), 1);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let links = "1;2\nnot a line\n2;x\n3;1\n";
        let (g, report) = LinkGraph::from_readers(Cursor::new(links), Cursor::new("oops\n"), 10).unwrap();
        assert_eq!(report.malformed, 3);
        assert_eq!(g.len(), 3);
        assert!(!report.capacity_exceeded);
    }

    #[test]
    fn capacity_stops_loading_but_keeps_data() {
        let links = "1;2\n3;4\n5;6\n";
        let (g, report) = LinkGraph::from_readers(Cursor::new(links), Cursor::new(""), 4).unwrap();
        assert!(report.capacity_exceeded);
        assert_eq!(g.len(), 4);
        assert_eq!(report.lines_read, 2);
    }

    #[test]
    fn non_utf8_lines_are_malformed_not_fatal() {
        let links: &[u8] = b"1;2\n\xff;3\n2;1\r\n";
        let titles: &[u8] = b"1;a.f\n2;caf\xe9.f\n";
        let (g, report) = LinkGraph::from_readers(Cursor::new(links), Cursor::new(titles), 100).unwrap();
        assert_eq!(report.malformed, 2);
        assert_eq!(g.len(), 2);
        assert_eq!(g.title(g.index_of(1).unwrap()), Some("a.f"));
        assert_eq!(g.title(g.index_of(2).unwrap()), None);
        assert_eq!(g.out_neighbors(g.index_of(2).unwrap()), &[g.index_of(1).unwrap()]);
    }
}
