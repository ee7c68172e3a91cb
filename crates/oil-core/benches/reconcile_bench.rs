//! Benchmarks for mutation reconciliation.
//!
//! Run with: cargo bench -p oil-core --bench reconcile_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oil_core::{Application, ApplicationConfig, Controller, ControllerDefinition};
use oil_dom::{Document, NodeId, NodeSpec, element};
use std::hint::black_box;

struct List;
impl Controller for List {}

/// A `list` controller with `items` targets, every fourth one nested under
/// its own inner `list`.
fn list_spec(items: usize) -> NodeSpec {
    let mut spec = element("ul").attr("data-oil-controller", "list");
    for i in 0..items {
        let item = element("li").attr("data-oil-target", "list.item");
        spec = if i % 4 == 3 {
            spec.child(element("ul").attr("data-oil-controller", "list").child(item))
        } else {
            spec.child(item)
        };
    }
    spec
}

fn started() -> (Document, Application) {
    let mut doc = Document::new();
    let mut app = Application::launch(ApplicationConfig::default(), &mut doc).unwrap();
    app.register(
        &mut doc,
        ControllerDefinition::new("list", || List).with_targets(["item"]),
    )
    .unwrap();
    (doc, app)
}

fn insert(doc: &mut Document, spec: &NodeSpec) -> NodeId {
    let root = doc.document_element();
    let node = doc.build(spec);
    doc.append_child(root, node).unwrap();
    node
}

fn bench_insert_subtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/insert_subtree");

    for items in [16, 128, 1024] {
        group.throughput(Throughput::Elements(items as u64));
        let spec = list_spec(items);
        group.bench_with_input(BenchmarkId::new("settle", items), &spec, |b, spec| {
            b.iter_batched(
                started,
                |(mut doc, mut app)| {
                    insert(&mut doc, spec);
                    black_box(app.settle(&mut doc))
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_reattach(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/reattach");

    for items in [16, 128, 1024] {
        group.throughput(Throughput::Elements(items as u64));
        let (mut doc, mut app) = started();
        let node = insert(&mut doc, &list_spec(items));
        app.settle(&mut doc);
        let root = doc.document_element();
        group.bench_function(BenchmarkId::new("remove_append", items), |b| {
            b.iter(|| {
                doc.remove(node).unwrap();
                app.settle(&mut doc);
                doc.append_child(root, node).unwrap();
                black_box(app.settle(&mut doc))
            })
        });
    }

    group.finish();
}

fn bench_attribute_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/attribute_churn");

    for items in [16, 128] {
        group.throughput(Throughput::Elements(items as u64));
        let (mut doc, mut app) = started();
        let node = insert(&mut doc, &list_spec(items));
        app.settle(&mut doc);
        let targets: Vec<NodeId> = doc.descendant_elements(node);
        group.bench_function(BenchmarkId::new("retarget", items), |b| {
            b.iter(|| {
                for &t in &targets {
                    doc.set_attribute(t, "data-oil-target", "list.other").unwrap();
                }
                app.settle(&mut doc);
                for &t in &targets {
                    doc.set_attribute(t, "data-oil-target", "list.item").unwrap();
                }
                black_box(app.settle(&mut doc))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_subtree,
    bench_reattach,
    bench_attribute_churn
);
criterion_main!(benches);
