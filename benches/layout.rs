use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mapping_rs_editor::config::Config;
use mapping_rs_editor::editor::Editor;
use mapping_rs_editor::geometry::SizeTable;
use mapping_rs_editor::ir::{Area, Edge, Endpoint, GraphObject, GraphStore};
use mapping_rs_editor::layout::{analyze_connectivity, compute_auto_layout};
use std::hint::black_box;

/// `entries` input fields feeding chains of `depth` operations, with every
/// other node fanning out to the next chain as well, plus a few constants.
fn mapping_graph(entries: usize, depth: usize) -> GraphStore {
    let mut store = GraphStore::new();
    let fields: Vec<String> = (0..entries).map(|i| format!("f{i}")).collect();
    store
        .input
        .insert(GraphObject::vertex("msg", "msg").with_fields(fields.iter().cloned()));
    store
        .output
        .insert(GraphObject::vertex("out", "out").with_fields(fields.iter().cloned()));

    let node = |chain: usize, step: usize| format!("op-{chain}-{step}");
    let mut edge_id = 0usize;
    let mut link = |store: &mut GraphStore, from: Endpoint, to: Endpoint| {
        edge_id += 1;
        store.edges.push(Edge::new(&format!("e{edge_id}"), from, to));
    };

    for chain in 0..entries {
        for step in 0..depth {
            let id = node(chain, step);
            store
                .operations
                .insert(GraphObject::vertex(&id, &id).with_fields(["in", "out"]));
        }
        link(
            &mut store,
            Endpoint::new(Area::Input, "msg", &fields[chain]),
            Endpoint::new(Area::Operations, &node(chain, 0), "in"),
        );
        for step in 1..depth {
            link(
                &mut store,
                Endpoint::new(Area::Operations, &node(chain, step - 1), "out"),
                Endpoint::new(Area::Operations, &node(chain, step), "in"),
            );
            if step % 2 == 0 && chain + 1 < entries {
                link(
                    &mut store,
                    Endpoint::new(Area::Operations, &node(chain, step - 1), "out"),
                    Endpoint::new(Area::Operations, &node(chain + 1, step), "in"),
                );
            }
        }
        link(
            &mut store,
            Endpoint::new(Area::Operations, &node(chain, depth - 1), "out"),
            Endpoint::new(Area::Output, "out", &fields[chain]),
        );
        if chain % 3 == 0 {
            let constant = format!("const-{chain}");
            store
                .operations
                .insert(GraphObject::vertex(&constant, &constant).with_fields(["value"]));
            link(
                &mut store,
                Endpoint::new(Area::Operations, &constant, "value"),
                Endpoint::new(Area::Output, "out", &fields[chain]),
            );
        }
    }
    store
}

fn bench_connectivity(c: &mut Criterion) {
    let config = Config::default();
    let mut group = c.benchmark_group("connectivity");
    for (entries, depth) in [(4, 4), (16, 8), (48, 12)] {
        let store = mapping_graph(entries, depth);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{entries}x{depth}")),
            &store,
            |b, store| {
                b.iter(|| {
                    let result = analyze_connectivity(black_box(store), Area::Operations, &config.layout.ports);
                    black_box(result.branches.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let config = Config::default();
    let mut group = c.benchmark_group("auto_layout");
    for (entries, depth) in [(4, 4), (16, 8), (48, 12)] {
        let store = mapping_graph(entries, depth);
        let sizes = SizeTable::declared(&store, &config.layout);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{entries}x{depth}")),
            &store,
            |b, store| {
                b.iter(|| {
                    let layout = compute_auto_layout(black_box(store), Area::Operations, &sizes, &config.layout);
                    black_box(layout.map(|layout| layout.moves.len()));
                });
            },
        );
    }
    group.finish();
}

fn bench_undo_redo(c: &mut Criterion) {
    let config = Config::default();
    let store = mapping_graph(16, 8);
    let sizes = SizeTable::declared(&store, &config.layout);
    let mut editor = Editor::new(store, sizes, &config);
    editor.run_auto_layout(Area::Operations);
    c.bench_function("undo_redo_layout", |b| {
        b.iter(|| {
            black_box(editor.undo());
            black_box(editor.redo());
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_connectivity, bench_layout, bench_undo_redo
);
criterion_main!(benches);
