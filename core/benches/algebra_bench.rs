use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ranksearch_core::graph::LinkGraph;
use ranksearch_core::pagerank::power_iteration;
use ranksearch_core::postings::{intersect, phrase_intersect, Posting, PostingsList};
use ranksearch_core::{HitsRanker, RankingConfig};

fn postings(step: u32, n: u32) -> PostingsList {
    (0..n).map(|i| Posting::new(i * step, i % 50)).collect()
}

fn bench_algebra(c: &mut Criterion) {
    let a = postings(2, 100_000);
    let b = postings(3, 100_000);
    c.bench_function("intersect_100k", |bch| bch.iter(|| intersect(black_box(&a), black_box(&b))));
    c.bench_function("phrase_intersect_100k", |bch| {
        bch.iter(|| phrase_intersect(black_box(&a), black_box(&b), 1))
    });
}

fn ring(n: u32) -> LinkGraph {
    let mut g = LinkGraph::builder();
    for i in 0..n {
        g.add_edge(i, (i + 1) % n).add_edge(i, (i * 7 + 3) % n);
    }
    g.build()
}

fn bench_link_analysis(c: &mut Criterion) {
    let g = ring(10_000);
    let config = RankingConfig::default();
    c.bench_function("pagerank_power_10k", |b| b.iter(|| power_iteration(black_box(&g), &config)));
    let seeds: Vec<usize> = (0..200).collect();
    c.bench_function("hits_200_seeds", |b| {
        b.iter(|| HitsRanker::new(&g, &config).rank(seeds.iter().copied()))
    });
}

criterion_group!(benches, bench_algebra, bench_link_analysis);
criterion_main!(benches);
