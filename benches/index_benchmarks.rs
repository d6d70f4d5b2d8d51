//! Module Index Benchmarks
//!
//! Measures index construction over snapshots of increasing size and the
//! claim lookups the resolver chain performs for every import.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use gitpress::content::{ContentProvider, MemoryContentProvider, Snapshot};
use gitpress::plugin::{install_repo_importer, ModuleIndex, ResolverChain, StaticResolver};

/// Snapshot with `modules` plugin sources spread over packages, plus as many posts
fn snapshot_with(modules: usize) -> Arc<Snapshot> {
    let mut files = Vec::with_capacity(modules * 2);
    for i in 0..modules {
        let package = i % 16;
        if i < 16 {
            files.push((format!("plugins/pkg{}/__init__.rhai", package), String::new()));
        }
        files.push((format!("plugins/pkg{}/module{}.rhai", package, i), String::new()));
        files.push((format!("content/posts/post{}.rst", i), "Title\n=====\n".to_string()));
    }
    MemoryContentProvider::with_files(files)
        .current_snapshot()
        .expect("memory snapshot")
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for size in [10, 100, 1000] {
        let snapshot = snapshot_with(size);
        group.throughput(Throughput::Elements(snapshot.paths().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| ModuleIndex::build(black_box(snapshot), "plugins"))
        });
    }

    group.finish();
}

fn bench_chain_find(c: &mut Criterion) {
    let chain = ResolverChain::new();
    chain.install(Arc::new(StaticResolver::for_namespace("gitpress.plugins", "plugins")));
    install_repo_importer(&chain, "gitpress.plugins", snapshot_with(1000), "plugins");

    c.bench_function("chain_find_hit", |b| {
        b.iter(|| chain.find(black_box("gitpress.plugins.pkg7.module503")))
    });
    c.bench_function("chain_find_miss", |b| {
        b.iter(|| chain.find(black_box("gitpress.plugins.pkg7.absent")))
    });
}

criterion_group!(benches, bench_index_build, bench_chain_find);
criterion_main!(benches);
