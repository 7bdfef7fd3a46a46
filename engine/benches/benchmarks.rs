//! Performance benchmarks for treesync-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use treesync_engine::{
    export_incremental, export_node, replay, Importer, InvalidatingVisitor, InvalidationTree,
    LiveTree, MemoryTree, NodeData,
};

/// A two-level spec: `groups` groups of `per_group` items each.
fn create_spec(groups: usize, per_group: usize) -> NodeData {
    (0..groups).fold(NodeData::new("root"), |root, g| {
        let group = (0..per_group).fold(
            NodeData::new(format!("g{g}")).with_role("groups"),
            |group, i| {
                group.with_child(
                    NodeData::new(format!("g{g}-i{i}"))
                        .with_role("items")
                        .with_property("name", format!("Item {i}"))
                        .with_reference("group", format!("g{g}")),
                )
            },
        );
        root.with_child(group)
    })
}

/// The same spec with every group's items reversed.
fn reversed(spec: &NodeData) -> NodeData {
    let mut spec = spec.clone();
    for group in &mut spec.children {
        group.children.reverse();
    }
    spec
}

fn imported(spec: &NodeData) -> MemoryTree {
    let mut tree = MemoryTree::new();
    let root = tree.root();
    Importer::default().import(&mut tree, &root, spec).unwrap();
    tree.take_changes();
    tree
}

fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import");

    for size in [10, 50, 100].iter() {
        let spec = create_spec(*size, 10);

        group.bench_with_input(BenchmarkId::new("into_empty", size), &spec, |b, spec| {
            b.iter(|| {
                let mut tree = MemoryTree::new();
                let root = tree.root();
                Importer::default().import(&mut tree, &root, black_box(spec))
            })
        });

        group.bench_with_input(BenchmarkId::new("unchanged", size), &spec, |b, spec| {
            let mut tree = imported(spec);
            let root = tree.root();
            b.iter(|| Importer::default().import(&mut tree, &root, black_box(spec)))
        });

        let reordered = reversed(&spec);
        group.bench_with_input(BenchmarkId::new("reorder", size), &spec, |b, spec| {
            b.iter_batched(
                || imported(spec),
                |mut tree| {
                    let root = tree.root();
                    Importer::default().import(&mut tree, &root, black_box(&reordered))
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_invalidation(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidation");

    for limit in [16, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("invalidate", limit), limit, |b, &limit| {
            let paths: Vec<Vec<u32>> = (0..1000u32)
                .map(|i| vec![0, i % 10, i % 100, i])
                .collect();
            b.iter(|| {
                let mut invalidations = InvalidationTree::new(0u32, limit).unwrap();
                for path in &paths {
                    let _ = invalidations.invalidate(black_box(path), false);
                }
                invalidations.size()
            })
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for size in [10, 100].iter() {
        let spec = create_spec(*size, 10);
        let tree = imported(&spec);
        let root = tree.root();

        group.bench_function(BenchmarkId::new("full", size), |b| {
            b.iter(|| export_node(black_box(&tree), &root))
        });

        group.bench_function(BenchmarkId::new("incremental_one_change", size), |b| {
            let previous = export_node(&tree, &root);
            let mut changed = tree.clone();
            if let Some(node) = changed.find("g0-i0") {
                let _ = changed.set_property(&node, "name", Some("Changed"));
            }
            let mut invalidations = InvalidationTree::new(root, 1000).unwrap();
            let changes = changed.take_changes();
            let _ = replay(
                &changes,
                &mut InvalidatingVisitor::new(&changed, &mut invalidations),
            );

            b.iter(|| export_incremental(black_box(&changed), &root, &previous, &invalidations))
        });
    }

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    let spec = create_spec(10, 10);
    let json = spec.to_json().unwrap();

    group.bench_function("spec_to_json", |b| b.iter(|| black_box(&spec).to_json()));
    group.bench_function("spec_from_json", |b| {
        b.iter(|| NodeData::from_json(black_box(&json)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_import,
    bench_invalidation,
    bench_export,
    bench_serialization,
);
criterion_main!(benches);
