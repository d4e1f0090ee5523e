use ranksearch_core::graph::LinkGraph;
use ranksearch_core::pagerank::{monte_carlo, power_iteration, MonteCarloMethod};
use ranksearch_core::persist::{load_link_graph, load_pagerank, save_pagerank};
use ranksearch_core::{HitsRanker, PageRankTable, RankingConfig};
use std::fs;

fn graph(edges: &[(u32, u32)]) -> LinkGraph {
    let mut b = LinkGraph::builder();
    for &(f, t) in edges {
        b.add_edge(f, t);
    }
    b.build()
}

#[test]
fn power_iteration_is_stochastic_without_dangling_nodes() {
    let g = graph(&[(1, 2), (1, 3), (2, 3), (3, 1), (4, 1), (4, 3), (2, 4)]);
    let r = power_iteration(&g, &RankingConfig::default());
    assert!(r.convergence.converged);
    assert!((r.scores.iter().sum::<f64>() - 1.0).abs() < 1e-6);
}

#[test]
fn three_cycle_converges_to_uniform() {
    let g = graph(&[(1, 2), (2, 3), (3, 1)]);
    let r = power_iteration(&g, &RankingConfig::default());
    for s in &r.scores {
        assert!((s - 1.0 / 3.0).abs() < 1e-6);
    }
}

#[test]
fn monte_carlo_agrees_with_power_iteration() {
    let g = graph(&[(1, 2), (1, 3), (2, 3), (3, 1), (4, 3), (5, 4), (5, 1)]);
    let exact = power_iteration(&g, &RankingConfig::default()).scores;
    for method in [
        MonteCarloMethod::EndPointRandomStart,
        MonteCarloMethod::EndPointCyclicStart,
        MonteCarloMethod::CompletePathRandomStart,
    ] {
        let est = monte_carlo(&g, method, 200_000, 0.15, Some(11)).scores;
        for (e, x) in est.iter().zip(&exact) {
            assert!((e - x).abs() < 0.02, "{method:?}: {e} vs {x}");
        }
    }
}

#[test]
fn dangling_stop_walks_count_the_dangling_node() {
    // 3 is dangling and collects every walk that reaches it
    let g = graph(&[(1, 3), (2, 3)]);
    let r = monte_carlo(&g, MonteCarloMethod::CompletePathDanglingStop, 10_000, 0.15, Some(3));
    assert!((r.scores.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    let three = g.index_of(3).unwrap();
    assert!(r.scores.iter().enumerate().all(|(i, s)| i == three || *s <= r.scores[three]));
}

#[test]
fn hits_single_node_stays_finite() {
    let mut b = LinkGraph::builder();
    b.add_node(1);
    let g = b.build();
    let r = HitsRanker::new(&g, &RankingConfig::default()).rank([0]);
    assert_eq!(r.hubs[0], 1.0);
    assert_eq!(r.authorities[0], 1.0);
    assert!(!r.score(0).is_nan());
}

#[test]
fn dangling_node_never_becomes_a_hub() {
    let g = graph(&[(1, 2), (2, 3), (1, 3)]);
    let r = HitsRanker::new(&g, &RankingConfig::default()).rank_all();
    let three = g.index_of(3).unwrap();
    assert_eq!(r.hubs[three], 0.0);
    assert!(r.authorities[three] > 0.0);
    assert_eq!(r.top_authorities(1)[0].0, three);
}

#[test]
fn files_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let links = dir.path().join("links.txt");
    let titles = dir.path().join("titles.txt");
    fs::write(&links, "0;1,2\n1;2\n2;0\nbroken\n").unwrap();
    fs::write(&titles, "0;zero.f\n1;one.f\n2;two.f\n").unwrap();

    let (g, report) = load_link_graph(&links, &titles, 100).unwrap();
    assert_eq!(g.len(), 3);
    assert_eq!(report.malformed, 1);

    let table = power_iteration(&g, &RankingConfig::default()).into_table(&g);
    let scores = dir.path().join("out/PagerankScore.txt");
    save_pagerank(&scores, &table).unwrap();
    let (back, report): (PageRankTable, _) = load_pagerank(&scores, 100).unwrap();
    assert_eq!(report.malformed, 0);
    assert_eq!(back.len(), 3);
    assert!((back.total() - 1.0).abs() < 1e-6);
    let first = back.top(1)[0];
    assert_eq!(first.title, "two.f");
}
