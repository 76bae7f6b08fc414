//! First-layout smart collapse.
//!
//! Large graphs open with every container collapsed, then greedily re-expand
//! the cheapest containers until a screen-area budget is spent. "Cheapest"
//! is the estimated extra area an expansion reveals:
//!
//! `cost = max(0, expanded_area − collapsed_area)` where `expanded_area`
//! approximates the sum of direct-child footprints (collapsed footprint for
//! sub-containers, default or computed size for nodes) plus border padding.
//!
//! The loop only pops a candidate while `running_cost + top.cost` stays
//! within the budget, so no expansion can overshoot it. Expanding a
//! container pushes its newly revealed collapsed children as candidates,
//! which is why the opening pass collapses *every* container outermost-first
//! rather than just the roots.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use core_graph::{COLLAPSED_CONTAINER_DIMENSIONS, DEFAULT_NODE_DIMENSIONS, GraphStore};

use crate::VisualizationState;

/// Default screen-area budget (px²). Roughly a 1080p viewport with headroom;
/// tunable via `arbor.toml` and overridable per call for tests.
pub const DEFAULT_SMART_COLLAPSE_BUDGET: f64 = 1_200_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SmartCollapseOutcome {
    /// Containers re-expanded, in expansion order.
    pub expanded: Vec<String>,
    pub budget: f64,
    pub cost_spent: f64,
}

#[derive(Debug, PartialEq)]
struct Candidate {
    cost: f64,
    id: String,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Estimated area revealed by expanding `container_id`.
pub fn expansion_cost(store: &GraphStore, container_id: &str) -> f64 {
    let Some(container) = store.container(container_id) else {
        return 0.0;
    };
    let mut expanded = core_graph::BORDER_PADDING;
    for child in &container.children {
        if store.containers().contains(child) {
            expanded += COLLAPSED_CONTAINER_DIMENSIONS.area();
        } else if let Some(node) = store.node(child) {
            expanded += node
                .dimensions
                .unwrap_or(DEFAULT_NODE_DIMENSIONS)
                .area();
        }
    }
    (expanded - COLLAPSED_CONTAINER_DIMENSIONS.area()).max(0.0)
}

pub(crate) fn run(state: &mut VisualizationState, budget: f64) -> SmartCollapseOutcome {
    // Opening pass: everything collapsed, outermost-first so intermediate
    // states stay invariant-valid.
    state.collapse_all_internal(None);

    let mut heap: BinaryHeap<Reverse<Candidate>> = state
        .graph()
        .root_containers()
        .iter()
        .map(|c| {
            Reverse(Candidate {
                cost: expansion_cost(state.graph(), &c.id),
                id: c.id.clone(),
            })
        })
        .collect();

    let mut outcome = SmartCollapseOutcome {
        expanded: Vec::new(),
        budget,
        cost_spent: 0.0,
    };

    loop {
        let Some(top_cost) = heap.peek().map(|Reverse(c)| c.cost) else {
            break;
        };
        if outcome.cost_spent + top_cost > budget {
            break;
        }
        let Some(Reverse(candidate)) = heap.pop() else {
            break;
        };
        state.expand_internal(&candidate.id);
        outcome.cost_spent += candidate.cost;
        outcome.expanded.push(candidate.id.clone());

        // Newly revealed collapsed children become candidates.
        let children: Vec<String> = state
            .graph()
            .container(&candidate.id)
            .map(|c| c.children.clone())
            .unwrap_or_default();
        for child in children {
            if state
                .graph()
                .container(&child)
                .is_some_and(|c| c.collapsed)
            {
                heap.push(Reverse(Candidate {
                    cost: expansion_cost(state.graph(), &child),
                    id: child,
                }));
            }
        }
    }

    tracing::info!(
        target: "state.smart_collapse",
        budget,
        spent = outcome.cost_spent,
        expanded = outcome.expanded.len(),
        "smart_collapse_applied"
    );
    outcome
}
