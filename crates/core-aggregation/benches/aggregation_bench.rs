//! Aggregation recompute benchmark: fan-in graphs with every container
//! collapsed, the worst case for the grouping pass.

use std::hint::black_box;

use core_aggregation::{AggregationEngine, AggregationOp};
use core_graph::{Container, Edge, GraphStore, Node};
use criterion::{Criterion, criterion_group, criterion_main};

fn fan_in_store(containers: usize, nodes_per: usize) -> GraphStore {
    let mut store = GraphStore::new();
    store.insert_node(Node::new("hub"));
    for c in 0..containers {
        let mut children = Vec::new();
        for n in 0..nodes_per {
            let id = format!("n{c}_{n}");
            store.insert_node(Node::new(id.clone()));
            store.insert_edge(Edge::new(format!("e{c}_{n}"), id.clone(), "hub"));
            children.push(id);
        }
        let cid = format!("c{c}");
        store.insert_container(Container::new(cid.clone(), children));
        store.container_mut(&cid).unwrap().collapsed = true;
    }
    store
}

fn bench_recompute(c: &mut Criterion) {
    let store = fan_in_store(50, 20);
    c.bench_function("recompute_50x20_collapsed", |b| {
        b.iter(|| {
            let mut engine = AggregationEngine::new();
            engine.recompute(black_box(&store), Some(("c0", AggregationOp::Aggregate)));
            black_box(engine.aggregate_count())
        })
    });
}

criterion_group!(benches, bench_recompute);
criterion_main!(benches);
