//! Authoritative visualization state.
//!
//! `VisualizationState` owns the graph store, the aggregation engine, and
//! the visibility index, and is the only writer to any of them. Everything
//! the coordinator or a user-facing layer does to the model goes through the
//! methods here, which preserve the core invariants:
//!
//! * ids are unique per kind; node and container ids are disjoint;
//! * edge endpoints always resolve to an existing node or container;
//! * the container relation is a forest (no cycles, at most one parent);
//! * the aggregation mapping is a bijection over crossed edges;
//! * cached visibility equals recomputed visibility.
//!
//! Mutations validate *before* touching anything: a rejected call returns an
//! `InvariantViolation` listing every failed invariant and leaves the state
//! exactly as it was. Duplicate-id inserts with an identical payload are
//! upserts (no-op success); toggle-style calls on unknown ids are no-ops.
//!
//! Collapse/expand drive the aggregation engine and a subtree-scoped
//! visibility refresh. Any *user-initiated* collapse or expand permanently
//! disables the first-layout smart-collapse heuristic; the heuristic's own
//! internal expansions do not.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use core_aggregation::{AggregationEngine, AggregationEvent, AggregationOp};
use core_graph::{
    AggregatedEdge, Container, Dimensions, Edge, GraphStore, Node, Point, RoutingSection,
    label_dimensions,
};
use core_visibility::VisibilityIndex;

mod invariants;
mod render_config;
mod search;
mod smart_collapse;

pub use invariants::{InvariantViolation, Violation};
pub use render_config::{RenderConfig, RenderConfigPatch};
pub use search::{SearchField, SearchMatch, SearchResult, perform_search};
pub use smart_collapse::{DEFAULT_SMART_COLLAPSE_BUDGET, SmartCollapseOutcome, expansion_cost};

/// Navigation selections kept for diagnostics, newest first.
pub const NAV_HISTORY_MAX: usize = 32;

/// Coarse lifecycle marker for the layout/render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutPhase {
    #[default]
    Idle,
    LayingOut,
    Ready,
    Rendering,
    Displayed,
    Error,
}

impl std::fmt::Display for LayoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayoutPhase::Idle => "idle",
            LayoutPhase::LayingOut => "laying_out",
            LayoutPhase::Ready => "ready",
            LayoutPhase::Rendering => "rendering",
            LayoutPhase::Displayed => "displayed",
            LayoutPhase::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisualizationState {
    graph: GraphStore,
    engine: AggregationEngine,
    visibility: VisibilityIndex,
    render_config: RenderConfig,
    layout_phase: LayoutPhase,
    layout_count: u64,
    last_layout_duration: Option<Duration>,
    smart_collapse_enabled: bool,
    smart_collapse_budget: f64,
    smart_collapse_override: bool,
    selection: Option<String>,
    nav_history: VecDeque<String>,
}

impl VisualizationState {
    pub fn new() -> Self {
        Self {
            smart_collapse_enabled: true,
            smart_collapse_budget: DEFAULT_SMART_COLLAPSE_BUDGET,
            ..Self::default()
        }
    }

    // ---------------------------------------------------------------------
    // Read access
    // ---------------------------------------------------------------------

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub fn visibility(&self) -> &VisibilityIndex {
        &self.visibility
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }

    pub fn visible_nodes(&self) -> Vec<&Node> {
        self.visibility.visible_nodes(&self.graph)
    }

    pub fn visible_containers(&self) -> Vec<&Container> {
        self.visibility.visible_containers(&self.graph)
    }

    pub fn visible_edges(&self) -> Vec<&Edge> {
        self.visibility.visible_edges(&self.graph, &self.engine)
    }

    pub fn aggregated_edges(&self) -> Vec<&AggregatedEdge> {
        self.visibility.aggregated_edges(&self.engine)
    }

    pub fn aggregation_history(&self) -> &[AggregationEvent] {
        self.engine.history()
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn navigation_history(&self) -> impl Iterator<Item = &str> {
        self.nav_history.iter().map(String::as_str)
    }

    // ---------------------------------------------------------------------
    // Node CRUD
    // ---------------------------------------------------------------------

    pub fn add_node(&mut self, node: Node) -> Result<(), InvariantViolation> {
        let mut violations = Vec::new();
        if let Some(existing) = self.graph.node(&node.id) {
            if *existing == node {
                // Upsert-on-equal: identical payload, nothing to do.
                return Ok(());
            }
            violations.push(Violation::DuplicateId {
                kind: "node",
                id: node.id.clone(),
            });
        }
        if self.graph.containers().contains(&node.id) {
            violations.push(Violation::NodeContainerIdCollision { id: node.id.clone() });
        }
        if !violations.is_empty() {
            return Err(InvariantViolation::new(violations));
        }
        tracing::debug!(target: "state.mutate", id = %node.id, "add_node");
        let id = node.id.clone();
        self.graph.insert_node(node);
        self.visibility.refresh_entity(&self.graph, &id);
        Ok(())
    }

    /// Replace an existing node's payload. Unknown ids are rejected the same
    /// way a conflicting insert is, so callers cannot silently create nodes
    /// through the update path.
    pub fn update_node(&mut self, node: Node) -> Result<(), InvariantViolation> {
        if !self.graph.nodes().contains(&node.id) {
            return Err(InvariantViolation::single(Violation::DuplicateId {
                kind: "node",
                id: node.id.clone(),
            }));
        }
        let id = node.id.clone();
        self.graph.insert_node(node);
        self.visibility.refresh_entity(&self.graph, &id);
        Ok(())
    }

    /// Remove a node and everything that referenced it: incident edges and
    /// the parent container's child entry. Returns the node, or `None` for
    /// unknown ids.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let node = self.graph.remove_node(id)?;
        tracing::debug!(target: "state.mutate", id, "remove_node");
        self.remove_incident_edges(id);
        self.detach_from_parent(id);
        self.visibility.purge(id);
        self.engine.recompute(&self.graph, None);
        Some(node)
    }

    pub fn set_node_hidden(&mut self, id: &str, hidden: bool) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        if node.hidden == hidden {
            return false;
        }
        node.hidden = hidden;
        self.visibility.refresh_entity(&self.graph, id);
        true
    }

    /// Flip a node between short and long label, re-deriving its footprint
    /// from the displayed text. When long labels are globally disabled the
    /// node resets to the default footprint instead.
    pub fn toggle_node_label(&mut self, id: &str) -> bool {
        let long_labels_enabled = self.render_config.long_labels_enabled;
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        if !long_labels_enabled {
            let was_long = node.showing_long_label;
            node.showing_long_label = false;
            node.dimensions = Some(core_graph::DEFAULT_NODE_DIMENSIONS);
            return was_long;
        }
        node.showing_long_label = !node.showing_long_label;
        node.dimensions = Some(label_dimensions(node.display_label()));
        true
    }

    // ---------------------------------------------------------------------
    // Edge CRUD
    // ---------------------------------------------------------------------

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), InvariantViolation> {
        let mut violations = Vec::new();
        if let Some(existing) = self.graph.edge(&edge.id) {
            if *existing == edge {
                return Ok(());
            }
            violations.push(Violation::DuplicateId {
                kind: "edge",
                id: edge.id.clone(),
            });
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.graph.resolves(endpoint) {
                violations.push(Violation::UnresolvedEndpoint {
                    edge: edge.id.clone(),
                    endpoint: endpoint.clone(),
                });
            }
        }
        if !violations.is_empty() {
            return Err(InvariantViolation::new(violations));
        }
        tracing::debug!(target: "state.mutate", id = %edge.id, "add_edge");
        self.graph.insert_edge(edge);
        // A new edge can cross an already-collapsed boundary.
        self.engine.recompute(&self.graph, None);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let edge = self.graph.remove_edge(id)?;
        tracing::debug!(target: "state.mutate", id, "remove_edge");
        if self.engine.is_shadowed(id) {
            self.engine.recompute(&self.graph, None);
        }
        Some(edge)
    }

    pub fn set_edge_hidden(&mut self, id: &str, hidden: bool) -> bool {
        match self.graph.edge_mut(id) {
            Some(edge) if edge.hidden != hidden => {
                edge.hidden = hidden;
                true
            }
            _ => false,
        }
    }

    // ---------------------------------------------------------------------
    // Container CRUD
    // ---------------------------------------------------------------------

    pub fn add_container(&mut self, container: Container) -> Result<(), InvariantViolation> {
        let mut violations = Vec::new();
        if let Some(existing) = self.graph.container(&container.id) {
            if *existing == container {
                return Ok(());
            }
            violations.push(Violation::DuplicateId {
                kind: "container",
                id: container.id.clone(),
            });
        }
        if self.graph.nodes().contains(&container.id) {
            violations.push(Violation::NodeContainerIdCollision {
                id: container.id.clone(),
            });
        }
        self.validate_container_shape(&container, &mut violations);
        if !violations.is_empty() {
            return Err(InvariantViolation::new(violations));
        }
        tracing::debug!(
            target: "state.mutate",
            id = %container.id,
            children = container.children.len(),
            "add_container"
        );
        let id = container.id.clone();
        let collapsed = container.collapsed;
        self.graph.insert_container(container);
        self.visibility.refresh_subtree(&self.graph, &id);
        if collapsed {
            self.engine
                .recompute(&self.graph, Some((&id, AggregationOp::Aggregate)));
        }
        Ok(())
    }

    /// Replace an existing container (children list included) under full
    /// validation.
    pub fn update_container(&mut self, container: Container) -> Result<(), InvariantViolation> {
        if !self.graph.containers().contains(&container.id) {
            return Err(InvariantViolation::single(Violation::DuplicateId {
                kind: "container",
                id: container.id.clone(),
            }));
        }
        let mut violations = Vec::new();
        self.validate_container_shape(&container, &mut violations);
        if !violations.is_empty() {
            return Err(InvariantViolation::new(violations));
        }
        let id = container.id.clone();
        self.graph.insert_container(container);
        self.visibility.rebuild(&self.graph);
        self.engine.recompute(&self.graph, None);
        tracing::debug!(target: "state.mutate", id = %id, "update_container");
        Ok(())
    }

    /// Remove a container, splicing its children up to the removed
    /// container's own parent (or to the roots).
    pub fn remove_container(&mut self, id: &str) -> Option<Container> {
        let parent = self.graph.parent_of(id).map(str::to_owned);
        let removed = self.graph.remove_container(id)?;
        tracing::debug!(target: "state.mutate", id, "remove_container");
        if let Some(parent_id) = parent
            && let Some(parent_container) = self.graph.container_mut(&parent_id)
        {
            let idx = parent_container
                .children
                .iter()
                .position(|c| c == id)
                .unwrap_or(parent_container.children.len());
            parent_container.children.retain(|c| c != id);
            for (offset, child) in removed.children.iter().enumerate() {
                parent_container.children.insert(idx + offset, child.clone());
            }
        }
        self.graph.rebuild_parent_index();
        self.remove_incident_edges(id);
        self.visibility.purge(id);
        for child in &removed.children {
            self.visibility.refresh_entity(&self.graph, child);
        }
        self.engine.recompute(&self.graph, None);
        Some(removed)
    }

    pub fn set_container_hidden(&mut self, id: &str, hidden: bool) -> bool {
        let Some(container) = self.graph.container_mut(id) else {
            return false;
        };
        if container.hidden == hidden {
            return false;
        }
        container.hidden = hidden;
        self.visibility.refresh_subtree(&self.graph, id);
        true
    }

    /// Shared shape checks for insert and update: children resolve, are
    /// unique, have no other parent, and do not make the container its own
    /// ancestor.
    fn validate_container_shape(&self, container: &Container, violations: &mut Vec<Violation>) {
        let mut seen = HashSet::new();
        for child in &container.children {
            if !seen.insert(child.as_str()) {
                violations.push(Violation::DuplicateChild {
                    container: container.id.clone(),
                    child: child.clone(),
                });
                continue;
            }
            if child == &container.id {
                violations.push(Violation::ContainerCycle {
                    container: container.id.clone(),
                });
                continue;
            }
            if !self.graph.resolves(child) {
                violations.push(Violation::UnknownChild {
                    container: container.id.clone(),
                    child: child.clone(),
                });
                continue;
            }
            match self.graph.parent_of(child) {
                Some(parent) if parent != container.id => {
                    violations.push(Violation::MultipleParents {
                        child: child.clone(),
                        existing_parent: parent.to_owned(),
                    });
                }
                _ => {}
            }
            // A child that is an ancestor of this container closes a cycle.
            if self.graph.containers().contains(child)
                && self.graph.is_ancestor(child, &container.id)
            {
                violations.push(Violation::ContainerCycle {
                    container: container.id.clone(),
                });
            }
        }
    }

    // ---------------------------------------------------------------------
    // Collapse / expand
    // ---------------------------------------------------------------------

    /// User-initiated collapse. No-op (false) when the id is unknown or the
    /// container is already collapsed.
    pub fn collapse_container(&mut self, id: &str) -> bool {
        self.disable_smart_collapse();
        self.set_collapsed(id, true)
    }

    /// User-initiated expand. Same no-op rules as `collapse_container`.
    pub fn expand_container(&mut self, id: &str) -> bool {
        self.disable_smart_collapse();
        self.set_collapsed(id, false)
    }

    /// Collapse the named containers (or all), outermost-first so every
    /// intermediate state is invariant-valid.
    pub fn collapse_all_containers(&mut self, ids: Option<&[String]>) -> usize {
        self.disable_smart_collapse();
        self.collapse_all_internal(ids)
    }

    /// Expand the named containers (or all), deepest-first.
    pub fn expand_all_containers(&mut self, ids: Option<&[String]>) -> usize {
        self.disable_smart_collapse();
        let targets = self.ordered_targets(self.graph.containers_deepest_first(), ids);
        targets
            .iter()
            .filter(|id| self.set_collapsed(id.as_str(), false))
            .count()
    }

    pub(crate) fn collapse_all_internal(&mut self, ids: Option<&[String]>) -> usize {
        let targets = self.ordered_targets(self.graph.containers_outermost_first(), ids);
        targets
            .iter()
            .filter(|id| self.set_collapsed(id.as_str(), true))
            .count()
    }

    pub(crate) fn expand_internal(&mut self, id: &str) -> bool {
        self.set_collapsed(id, false)
    }

    fn ordered_targets(&self, ordered: Vec<String>, ids: Option<&[String]>) -> Vec<String> {
        match ids {
            None => ordered,
            Some(wanted) => ordered
                .into_iter()
                .filter(|id| wanted.iter().any(|w| w == id))
                .collect(),
        }
    }

    fn set_collapsed(&mut self, id: &str, collapsed: bool) -> bool {
        let Some(container) = self.graph.container_mut(id) else {
            return false;
        };
        if container.collapsed == collapsed {
            return false;
        }
        container.collapsed = collapsed;
        self.visibility.refresh_subtree(&self.graph, id);
        let op = if collapsed {
            AggregationOp::Aggregate
        } else {
            AggregationOp::Restore
        };
        self.engine.recompute(&self.graph, Some((id, op)));
        tracing::debug!(target: "state.mutate", id, collapsed, "set_collapsed");
        true
    }

    // ---------------------------------------------------------------------
    // Smart collapse
    // ---------------------------------------------------------------------

    pub fn smart_collapse_enabled(&self) -> bool {
        self.smart_collapse_enabled
    }

    pub fn set_smart_collapse_enabled(&mut self, enabled: bool) {
        self.smart_collapse_enabled = enabled;
    }

    pub fn set_smart_collapse_budget(&mut self, budget: f64) {
        self.smart_collapse_budget = budget;
    }

    /// Force the heuristic to run on the next layout even when it is not the
    /// first one. One-shot: consumed by `should_apply_smart_collapse`.
    pub fn set_smart_collapse_override(&mut self) {
        self.smart_collapse_override = true;
    }

    /// Whether the next layout should run the heuristic: first layout with
    /// the heuristic still enabled, or an explicit override. Consumes the
    /// override flag.
    pub fn should_apply_smart_collapse(&mut self) -> bool {
        if self.smart_collapse_override {
            self.smart_collapse_override = false;
            return true;
        }
        self.smart_collapse_enabled && self.is_first_layout()
    }

    fn disable_smart_collapse(&mut self) {
        if self.smart_collapse_enabled {
            tracing::debug!(target: "state.smart_collapse", "disabled_by_user_operation");
            self.smart_collapse_enabled = false;
        }
    }

    /// Run the first-layout heuristic. `budget_override` is for tests and
    /// callers that already resolved configuration.
    pub fn apply_smart_collapse(&mut self, budget_override: Option<f64>) -> SmartCollapseOutcome {
        let budget = budget_override.unwrap_or(self.smart_collapse_budget);
        smart_collapse::run(self, budget)
    }

    // ---------------------------------------------------------------------
    // Search & navigation
    // ---------------------------------------------------------------------

    pub fn perform_search(&self, query: &str) -> Vec<SearchResult> {
        perform_search(&self.graph, query)
    }

    /// Record a navigation selection. Does not move any viewport — that is
    /// the render collaborator's concern.
    pub fn navigate_to_element(&mut self, id: &str) -> bool {
        if !self.graph.resolves(id) {
            return false;
        }
        self.selection = Some(id.to_owned());
        self.nav_history.push_front(id.to_owned());
        self.nav_history.truncate(NAV_HISTORY_MAX);
        true
    }

    // ---------------------------------------------------------------------
    // Layout lifecycle & geometry write-back
    // ---------------------------------------------------------------------

    pub fn layout_phase(&self) -> LayoutPhase {
        self.layout_phase
    }

    pub fn set_layout_phase(&mut self, phase: LayoutPhase) {
        if self.layout_phase != phase {
            tracing::debug!(
                target: "state.layout",
                from = %self.layout_phase,
                to = %phase,
                "layout_phase"
            );
            self.layout_phase = phase;
        }
    }

    pub fn layout_count(&self) -> u64 {
        self.layout_count
    }

    pub fn increment_layout_count(&mut self) {
        self.layout_count += 1;
    }

    pub fn is_first_layout(&self) -> bool {
        self.layout_count == 0
    }

    pub fn last_layout_duration(&self) -> Option<Duration> {
        self.last_layout_duration
    }

    pub fn record_layout_duration(&mut self, elapsed: Duration) {
        self.last_layout_duration = Some(elapsed);
    }

    pub fn set_node_position(&mut self, id: &str, position: Point) -> bool {
        match self.graph.node_mut(id) {
            Some(node) => {
                node.position = Some(position);
                true
            }
            None => false,
        }
    }

    pub fn set_container_geometry(
        &mut self,
        id: &str,
        position: Point,
        dimensions: Dimensions,
    ) -> bool {
        match self.graph.container_mut(id) {
            Some(container) => {
                container.position = Some(position);
                container.dimensions = Some(dimensions);
                true
            }
            None => false,
        }
    }

    pub fn set_edge_routing(&mut self, id: &str, sections: Vec<RoutingSection>) -> bool {
        match self.graph.edge_mut(id) {
            Some(edge) => {
                edge.sections = sections;
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Render config
    // ---------------------------------------------------------------------

    /// Merge a sparse config patch; returns true when anything changed.
    /// Disabling long labels resets every node currently showing one.
    pub fn update_render_config(&mut self, patch: &RenderConfigPatch) -> bool {
        let changed = self.render_config.merge(patch);
        if changed && !self.render_config.long_labels_enabled {
            let ids: Vec<String> = self
                .graph
                .nodes()
                .iter()
                .filter(|n| n.showing_long_label)
                .map(|n| n.id.clone())
                .collect();
            for id in ids {
                if let Some(node) = self.graph.node_mut(&id) {
                    node.showing_long_label = false;
                    node.dimensions = Some(core_graph::DEFAULT_NODE_DIMENSIONS);
                }
            }
        }
        changed
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    /// Full invariant sweep. Cheap enough for tests and post-operation
    /// sanity checks; mutation paths rely on their targeted pre-checks
    /// instead.
    pub fn validate_invariants(&self) -> Result<(), InvariantViolation> {
        let mut violations = Vec::new();

        for node in self.graph.nodes().iter() {
            if self.graph.containers().contains(&node.id) {
                violations.push(Violation::NodeContainerIdCollision {
                    id: node.id.clone(),
                });
            }
        }
        for edge in self.graph.edges().iter() {
            for endpoint in [&edge.source, &edge.target] {
                if !self.graph.resolves(endpoint) {
                    violations.push(Violation::UnresolvedEndpoint {
                        edge: edge.id.clone(),
                        endpoint: endpoint.clone(),
                    });
                }
            }
        }
        let mut child_parents: std::collections::HashMap<&str, &str> =
            std::collections::HashMap::new();
        for container in self.graph.containers().iter() {
            if self
                .graph
                .ancestors(&container.id)
                .iter()
                .any(|a| a == &container.id)
            {
                violations.push(Violation::ContainerCycle {
                    container: container.id.clone(),
                });
            }
            for child in &container.children {
                if let Some(previous) = child_parents.insert(child.as_str(), container.id.as_str())
                    && previous != container.id.as_str()
                {
                    violations.push(Violation::MultipleParents {
                        child: child.clone(),
                        existing_parent: previous.to_owned(),
                    });
                }
            }
        }
        if let Err(err) = self.engine.validate_consistency(&self.graph) {
            for detail in err.divergences {
                violations.push(Violation::AggregationDrift { detail });
            }
        }
        let mut fresh = VisibilityIndex::new();
        fresh.rebuild(&self.graph);
        for id in self
            .graph
            .nodes()
            .ids()
            .chain(self.graph.containers().ids())
        {
            if fresh.is_visible(id) != self.visibility.is_visible(id) {
                violations.push(Violation::VisibilityDrift { id: id.to_owned() });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(InvariantViolation::new(violations))
        }
    }

    /// Aggregation-specific consistency check, exposed separately because
    /// the coordinator's container operations can request it after a batch.
    pub fn validate_aggregation_consistency(
        &self,
    ) -> Result<(), core_aggregation::AggregationInconsistency> {
        self.engine.validate_consistency(&self.graph)
    }

    // ---------------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------------

    fn remove_incident_edges(&mut self, id: &str) {
        let incident: Vec<String> = self
            .graph
            .edges()
            .iter()
            .filter(|e| e.touches(id))
            .map(|e| e.id.clone())
            .collect();
        for edge_id in incident {
            self.graph.remove_edge(&edge_id);
        }
    }

    fn detach_from_parent(&mut self, id: &str) {
        if let Some(parent) = self.graph.parent_of(id).map(str::to_owned)
            && let Some(container) = self.graph.container_mut(&parent)
        {
            container.children.retain(|c| c != id);
            self.graph.rebuild_parent_index();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seeded() -> VisualizationState {
        // C = {n1, n2}, external n3, edges e1=(n1,n3), e2=(n2,n3).
        let mut state = VisualizationState::new();
        for id in ["n1", "n2", "n3"] {
            state.add_node(Node::new(id)).unwrap();
        }
        state
            .add_container(Container::new("C", vec!["n1".into(), "n2".into()]))
            .unwrap();
        state.add_edge(Edge::new("e1", "n1", "n3")).unwrap();
        state.add_edge(Edge::new("e2", "n2", "n3")).unwrap();
        state
    }

    #[test]
    fn duplicate_node_with_equal_payload_is_upsert() {
        let mut state = seeded();
        assert!(state.add_node(Node::new("n1")).is_ok());
        assert_eq!(state.graph().nodes().len(), 3);
    }

    #[test]
    fn duplicate_node_with_different_payload_rejected() {
        let mut state = seeded();
        let err = state
            .add_node(Node::with_labels("n1", "other", "other"))
            .unwrap_err();
        assert!(matches!(
            err.violations[0],
            Violation::DuplicateId { kind: "node", .. }
        ));
    }

    #[test]
    fn rejected_mutation_leaves_state_untouched() {
        let mut state = seeded();
        let before = format!("{:?}", state.graph());
        let err = state.add_edge(Edge::new("e9", "n1", "ghost")).unwrap_err();
        assert!(matches!(
            err.violations[0],
            Violation::UnresolvedEndpoint { .. }
        ));
        assert_eq!(before, format!("{:?}", state.graph()));
    }

    #[test]
    fn container_node_id_collision_rejected() {
        let mut state = seeded();
        let err = state.add_container(Container::new("n1", vec![])).unwrap_err();
        assert!(
            err.violations
                .iter()
                .any(|v| matches!(v, Violation::NodeContainerIdCollision { .. }))
        );
    }

    #[test]
    fn container_cycle_rejected() {
        let mut state = seeded();
        state
            .add_container(Container::new("outer", vec!["C".into()]))
            .unwrap();
        // C adopting outer would make C its own ancestor.
        let mut updated = state.graph().container("C").unwrap().clone();
        updated.children.push("outer".into());
        let err = state.update_container(updated).unwrap_err();
        assert!(
            err.violations
                .iter()
                .any(|v| matches!(v, Violation::ContainerCycle { .. }))
        );
    }

    #[test]
    fn second_parent_rejected() {
        let mut state = seeded();
        let err = state
            .add_container(Container::new("other", vec!["n1".into()]))
            .unwrap_err();
        assert!(
            err.violations
                .iter()
                .any(|v| matches!(v, Violation::MultipleParents { .. }))
        );
    }

    #[test]
    fn collapse_aggregates_and_expand_restores() {
        let mut state = seeded();
        assert!(state.collapse_container("C"));
        assert!(state.visible_edges().is_empty());
        let aggs = state.aggregated_edges();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].original_edge_ids, vec!["e1", "e2"]);

        assert!(state.expand_container("C"));
        assert!(state.aggregated_edges().is_empty());
        assert_eq!(state.visible_edges().len(), 2);
        assert!(state.validate_invariants().is_ok());
    }

    #[test]
    fn collapse_twice_is_noop() {
        let mut state = seeded();
        assert!(state.collapse_container("C"));
        assert!(!state.collapse_container("C"));
        assert!(!state.collapse_container("ghost"));
    }

    #[test]
    fn user_collapse_disables_smart_collapse() {
        let mut state = seeded();
        assert!(state.smart_collapse_enabled());
        state.collapse_container("C");
        assert!(!state.smart_collapse_enabled());
    }

    #[test]
    fn expand_all_is_deepest_first() {
        let mut state = VisualizationState::new();
        state.add_node(Node::new("n1")).unwrap();
        state
            .add_container(Container::new("inner", vec!["n1".into()]))
            .unwrap();
        state
            .add_container(Container::new("outer", vec!["inner".into()]))
            .unwrap();
        state.collapse_all_containers(None);
        assert_eq!(state.expand_all_containers(None), 2);
        assert!(!state.graph().container("inner").unwrap().collapsed);
        assert!(state.validate_invariants().is_ok());
    }

    #[test]
    fn remove_node_cascades_edges_and_parent_entry() {
        let mut state = seeded();
        assert!(state.remove_node("n1").is_some());
        assert!(state.graph().edge("e1").is_none());
        assert!(!state.graph().container("C").unwrap().contains_child("n1"));
        assert!(state.validate_invariants().is_ok());
    }

    #[test]
    fn remove_container_splices_children_to_roots() {
        let mut state = seeded();
        state.collapse_container("C");
        assert!(state.remove_container("C").is_some());
        assert!(state.graph().parent_of("n1").is_none());
        assert!(state.visibility().is_visible("n1"), "freed child visible");
        assert!(state.aggregated_edges().is_empty());
        assert!(state.validate_invariants().is_ok());
    }

    #[test]
    fn toggle_node_label_resizes() {
        let mut state = seeded();
        let node = Node::with_labels("wide", "w", "w".repeat(50));
        state.add_node(node).unwrap();
        assert!(state.toggle_node_label("wide"));
        let stored = state.graph().node("wide").unwrap();
        assert!(stored.showing_long_label);
        assert_eq!(stored.dimensions.unwrap().width, 332.0); // 50*6+32
        assert!(!state.toggle_node_label("ghost"));
    }

    #[test]
    fn disabling_long_labels_resets_nodes() {
        let mut state = seeded();
        state.toggle_node_label("n1");
        state.update_render_config(&RenderConfigPatch {
            long_labels_enabled: Some(false),
            ..Default::default()
        });
        let node = state.graph().node("n1").unwrap();
        assert!(!node.showing_long_label);
        assert_eq!(node.dimensions, Some(core_graph::DEFAULT_NODE_DIMENSIONS));
        // Toggling while disabled keeps the default footprint.
        state.toggle_node_label("n1");
        assert!(!state.graph().node("n1").unwrap().showing_long_label);
    }

    #[test]
    fn navigation_records_history() {
        let mut state = seeded();
        assert!(state.navigate_to_element("n1"));
        assert!(state.navigate_to_element("C"));
        assert!(!state.navigate_to_element("ghost"));
        assert_eq!(state.selection(), Some("C"));
        let history: Vec<&str> = state.navigation_history().collect();
        assert_eq!(history, vec!["C", "n1"]);
    }

    #[test]
    fn layout_lifecycle() {
        let mut state = seeded();
        assert!(state.is_first_layout());
        state.set_layout_phase(LayoutPhase::LayingOut);
        state.increment_layout_count();
        assert!(!state.is_first_layout());
        assert_eq!(state.layout_phase(), LayoutPhase::LayingOut);
    }

    #[test]
    fn invariant_sweep_passes_after_collapse_storm() {
        let mut state = seeded();
        state
            .add_container(Container::new("outer", vec!["C".into(), "n3".into()]))
            .unwrap();
        state.collapse_all_containers(None);
        assert!(state.validate_invariants().is_ok());
        state.expand_all_containers(None);
        assert!(state.validate_invariants().is_ok());
    }
}
