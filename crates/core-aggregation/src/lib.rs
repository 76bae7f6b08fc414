//! Edge aggregation under container collapse.
//!
//! When a container collapses, its interior disappears from view; edges that
//! cross the collapsed boundary are rewritten into synthetic *aggregated*
//! edges attached to the collapsed container itself. This crate owns that
//! rewrite and the bidirectional original↔aggregated mapping.
//!
//! Projection rule: every endpoint maps to its *aggregation representative*
//! `rep(x)` — the outermost collapsed ancestor container, or `x` itself when
//! no ancestor is collapsed. An edge `(u, v)`:
//! * is untouched when both representatives equal the endpoints;
//! * is self-absorbed (no aggregate, both endpoints invisible) when
//!   `rep(u) == rep(v)`;
//! * otherwise joins the aggregate for the unordered pair
//!   `{rep(u), rep(v)}`.
//!
//! Mapping contract (checked by `validate_consistency`):
//! * every crossed original edge maps to exactly one aggregate;
//! * every aggregate has a non-empty member set;
//! * reverse lookup of any member returns the same aggregate.
//!
//! Recompute is collect-then-swap: the new grouping is built completely in
//! locals and installed in one assignment, so both maps always describe the
//! same generation. Aggregate ids are deterministic over the endpoint pair
//! plus the member set (fixed-seed hash), so collapsing the same shape twice
//! reuses the same id.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::time::Instant;

use ahash::RandomState;
use core_graph::{AggregatedEdge, GraphStore, OrderedStore};
use thiserror::Error;

/// Fixed seeds: aggregate ids must be stable across processes and runs.
const ID_HASH_SEEDS: (u64, u64, u64, u64) = (
    0x6172_626f_7220_3031,
    0x6167_6772_6567_6174,
    0x6564_6765_2069_6473,
    0x7374_6162_6c65_2e2e,
);

/// Maintained-index vs. fresh-recompute divergence report.
#[derive(Debug, Error)]
#[error("aggregation indexes diverged from recomputed state ({} finding(s))", divergences.len())]
pub struct AggregationInconsistency {
    pub divergences: Vec<String>,
}

/// One collapse/expand recompute, recorded for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationOp {
    Aggregate,
    Restore,
}

#[derive(Debug, Clone)]
pub struct AggregationEvent {
    pub operation: AggregationOp,
    pub container_id: String,
    /// Original edges whose mapping changed in this recompute.
    pub edge_count: usize,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    aggregated: OrderedStore<AggregatedEdge>,
    original_to_aggregated: HashMap<String, String>,
    history: Vec<AggregationEvent>,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The aggregation representative of `id`: outermost collapsed ancestor
    /// container, or `id` itself when no ancestor is collapsed.
    pub fn representative(store: &GraphStore, id: &str) -> String {
        let mut rep = id.to_owned();
        for ancestor in store.ancestors(id) {
            if store
                .container(&ancestor)
                .is_some_and(|c| c.collapsed)
            {
                rep = ancestor;
            }
        }
        rep
    }

    /// Aggregated edges in first-contributing-original-edge order.
    pub fn aggregated_edges(&self) -> impl Iterator<Item = &AggregatedEdge> {
        self.aggregated.iter()
    }

    pub fn aggregated_edge(&self, id: &str) -> Option<&AggregatedEdge> {
        self.aggregated.get(id)
    }

    pub fn aggregate_count(&self) -> usize {
        self.aggregated.len()
    }

    /// True if `edge_id` is currently represented by an aggregate (and must
    /// therefore not render as itself).
    pub fn is_shadowed(&self, edge_id: &str) -> bool {
        self.original_to_aggregated.contains_key(edge_id)
    }

    /// Forward lookup: original edge id → owning aggregate.
    pub fn aggregate_for(&self, edge_id: &str) -> Option<&AggregatedEdge> {
        self.original_to_aggregated
            .get(edge_id)
            .and_then(|agg_id| self.aggregated.get(agg_id))
    }

    pub fn history(&self) -> &[AggregationEvent] {
        &self.history
    }

    /// Rebuild the aggregate set from the store's current collapse flags.
    ///
    /// `trigger` names the container whose collapsed flag changed and whether
    /// it collapsed or expanded; it drives the history record only — the
    /// grouping itself is always derived from the full store so nested and
    /// overlapping collapses cannot leave stale aggregates behind.
    pub fn recompute(&mut self, store: &GraphStore, trigger: Option<(&str, AggregationOp)>) {
        let previous_mapping = std::mem::take(&mut self.original_to_aggregated);

        let (aggregated, mapping) = Self::compute(store);
        let changed = mapping
            .iter()
            .filter(|&(edge, agg)| previous_mapping.get(edge.as_str()) != Some(agg))
            .count()
            + previous_mapping
                .keys()
                .filter(|edge| !mapping.contains_key(edge.as_str()))
                .count();

        self.aggregated = aggregated;
        self.original_to_aggregated = mapping;

        if let Some((container_id, operation)) = trigger {
            tracing::debug!(
                target: "state.aggregation",
                container = container_id,
                op = ?operation,
                changed,
                aggregates = self.aggregated.len(),
                "aggregation_recompute"
            );
            self.history.push(AggregationEvent {
                operation,
                container_id: container_id.to_owned(),
                edge_count: changed,
                timestamp: Instant::now(),
            });
        }
    }

    /// Recompute from scratch and compare against the maintained indexes.
    pub fn validate_consistency(&self, store: &GraphStore) -> Result<(), AggregationInconsistency> {
        let (fresh, fresh_mapping) = Self::compute(store);
        let mut divergences = Vec::new();

        for agg in fresh.iter() {
            match self.aggregated.get(&agg.id) {
                None => divergences.push(format!("missing aggregate {}", agg.id)),
                Some(existing) if existing != agg => {
                    divergences.push(format!("aggregate {} differs from recomputed form", agg.id));
                }
                Some(_) => {}
            }
        }
        for agg in self.aggregated.iter() {
            if fresh.get(&agg.id).is_none() {
                divergences.push(format!("stale aggregate {}", agg.id));
            }
            if agg.original_edge_ids.is_empty() {
                divergences.push(format!("aggregate {} has no members", agg.id));
            }
            for member in &agg.original_edge_ids {
                if self.original_to_aggregated.get(member) != Some(&agg.id) {
                    divergences.push(format!(
                        "member {member} of {} does not map back to it",
                        agg.id
                    ));
                }
            }
        }
        for (edge, agg_id) in &self.original_to_aggregated {
            if fresh_mapping.get(edge) != Some(agg_id) {
                divergences.push(format!("edge {edge} maps to {agg_id}, recompute disagrees"));
            }
        }

        if divergences.is_empty() {
            Ok(())
        } else {
            Err(AggregationInconsistency { divergences })
        }
    }

    /// Pure grouping pass over the whole store.
    fn compute(store: &GraphStore) -> (OrderedStore<AggregatedEdge>, HashMap<String, String>) {
        // Group key: unordered rep pair, normalized by sorting.
        // Vec preserves first-contribution order for the output store.
        let mut group_order: Vec<(String, String)> = Vec::new();
        let mut groups: HashMap<(String, String), Vec<String>> = HashMap::new();

        for edge in store.edges().iter() {
            let rep_u = Self::representative(store, &edge.source);
            let rep_v = Self::representative(store, &edge.target);
            let crossed = rep_u != edge.source || rep_v != edge.target;
            if !crossed || rep_u == rep_v {
                // Untouched, or self-absorbed inside one collapsed subtree.
                continue;
            }
            let key = if rep_u <= rep_v {
                (rep_u, rep_v)
            } else {
                (rep_v, rep_u)
            };
            let members = groups.entry(key.clone()).or_insert_with(|| {
                group_order.push(key);
                Vec::new()
            });
            members.push(edge.id.clone());
        }

        let mut aggregated = OrderedStore::new();
        let mut mapping = HashMap::new();
        for key in &group_order {
            let members = &groups[key];
            let id = aggregate_id(&key.0, &key.1, members);
            for member in members {
                mapping.insert(member.clone(), id.clone());
            }
            aggregated.insert(AggregatedEdge {
                id,
                source: key.0.clone(),
                target: key.1.clone(),
                original_edge_ids: members.clone(),
                aggregation_source: aggregation_source(store, &key.0, &key.1),
                label: member_label(members.len()),
            });
        }
        (aggregated, mapping)
    }
}

fn member_label(count: usize) -> String {
    if count == 1 {
        "1 edge".to_owned()
    } else {
        format!("{count} edges")
    }
}

/// The container whose collapse produced the grouping. Of the two endpoint
/// representatives, only collapsed containers qualify; when both do, the id
/// sorting first wins.
fn aggregation_source(store: &GraphStore, a: &str, b: &str) -> String {
    let is_collapsed =
        |id: &str| store.container(id).is_some_and(|c| c.collapsed);
    match (is_collapsed(a), is_collapsed(b)) {
        (true, true) => {
            if a <= b {
                a.to_owned()
            } else {
                b.to_owned()
            }
        }
        (true, false) => a.to_owned(),
        (false, true) => b.to_owned(),
        // Unreachable when called on a crossed pair; fall back to sort order
        // so the field is still deterministic.
        (false, false) => {
            if a <= b {
                a.to_owned()
            } else {
                b.to_owned()
            }
        }
    }
}

/// Deterministic aggregate id: the sorted endpoint pair plus a stable hash of
/// the sorted member set. Same pair + same members ⇒ same id, across runs.
fn aggregate_id(a: &str, b: &str, members: &[String]) -> String {
    let hasher_factory = RandomState::with_seeds(
        ID_HASH_SEEDS.0,
        ID_HASH_SEEDS.1,
        ID_HASH_SEEDS.2,
        ID_HASH_SEEDS.3,
    );
    let mut hasher = hasher_factory.build_hasher();
    a.hash(&mut hasher);
    b.hash(&mut hasher);
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    for member in sorted {
        member.hash(&mut hasher);
    }
    format!("agg_{a}__{b}_{:016x}", hasher.finish())
}
