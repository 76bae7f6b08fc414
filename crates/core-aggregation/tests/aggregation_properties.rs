//! Property-based tests for the aggregation mapping contract.

use core_aggregation::AggregationEngine;
use core_graph::{Container, Edge, GraphStore, Node};
use proptest::prelude::*;

/// Build a two-level forest: `containers` top-level containers each holding
/// `width` nodes, plus one external hub node. Every interior node gets an
/// edge to the hub; `collapsed_mask` selects which containers collapse.
fn forest(containers: usize, width: usize, collapsed_mask: u32) -> GraphStore {
    let mut store = GraphStore::new();
    store.insert_node(Node::new("hub"));
    for c in 0..containers {
        let mut children = Vec::new();
        for n in 0..width {
            let id = format!("n{c}_{n}");
            store.insert_node(Node::new(id.clone()));
            store.insert_edge(Edge::new(format!("e{c}_{n}"), id.clone(), "hub"));
            children.push(id);
        }
        let cid = format!("c{c}");
        store.insert_container(Container::new(cid.clone(), children));
        if collapsed_mask & (1 << c) != 0 {
            store.container_mut(&cid).unwrap().collapsed = true;
        }
    }
    store
}

proptest! {
    // Every collapsed container with at least one member edge yields exactly
    // one aggregate whose member count equals its node fan-out.
    #[test]
    fn one_aggregate_per_collapsed_container(
        containers in 1usize..6,
        width in 1usize..5,
        mask in 0u32..64,
    ) {
        let store = forest(containers, width, mask);
        let mut engine = AggregationEngine::new();
        engine.recompute(&store, None);

        let collapsed: Vec<usize> = (0..containers)
            .filter(|c| mask & (1 << c) != 0)
            .collect();
        prop_assert_eq!(engine.aggregate_count(), collapsed.len());
        for c in collapsed {
            let cid = format!("c{c}");
            let agg = engine
                .aggregated_edges()
                .find(|a| a.source == cid || a.target == cid)
                .expect("collapsed container has an aggregate");
            prop_assert_eq!(agg.original_edge_ids.len(), width);
            prop_assert_eq!(agg.aggregation_source.as_str(), cid.as_str());
        }
    }

    // The bijection holds under any collapse mask: forward and reverse
    // lookups agree, and the consistency validator passes.
    #[test]
    fn mapping_bijection_holds(
        containers in 1usize..6,
        width in 1usize..5,
        mask in 0u32..64,
    ) {
        let store = forest(containers, width, mask);
        let mut engine = AggregationEngine::new();
        engine.recompute(&store, None);

        for agg in engine.aggregated_edges() {
            prop_assert!(!agg.original_edge_ids.is_empty());
            for member in &agg.original_edge_ids {
                let via_forward = engine.aggregate_for(member).expect("forward mapping");
                prop_assert_eq!(&via_forward.id, &agg.id);
            }
        }
        prop_assert!(engine.validate_consistency(&store).is_ok());
    }

    // collapse → expand round-trips to an empty aggregate set no matter
    // which container collapsed first.
    #[test]
    fn collapse_expand_round_trip(
        containers in 1usize..5,
        width in 1usize..4,
        which in 0usize..5,
    ) {
        let mut store = forest(containers, width, 0);
        let cid = format!("c{}", which % containers);
        let mut engine = AggregationEngine::new();
        engine.recompute(&store, None);
        prop_assert_eq!(engine.aggregate_count(), 0);

        store.container_mut(&cid).unwrap().collapsed = true;
        engine.recompute(&store, None);
        store.container_mut(&cid).unwrap().collapsed = false;
        engine.recompute(&store, None);

        prop_assert_eq!(engine.aggregate_count(), 0);
        prop_assert!(store.edges().iter().all(|e| !engine.is_shadowed(&e.id)));
    }
}
