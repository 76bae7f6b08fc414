//! Render collaborator seam.
//!
//! The renderer reads, never writes: `to_render_data` projects the state's
//! visible sequences into flat DTOs an external diagram surface can consume
//! directly. Ordering in the DTOs is the visibility contract's ordering —
//! containers parent-first, nodes in insertion order, aggregated edges after
//! the originals that produced them.
//!
//! Contract:
//! * `nodes` carries containers *and* leaf nodes (discriminated by `kind`)
//!   so the consumer renders nesting without a second lookup.
//! * `edges` carries visible originals followed by visible aggregates;
//!   aggregates have `aggregated = true`, a member count, and — when the
//!   render config asks for it — the `"<n> edges"` label.
//! * Geometry is whatever layout last wrote; elements layout never touched
//!   have `position: None` and the consumer decides a fallback.

use serde::Serialize;
use thiserror::Error;

use core_graph::{Dimensions, ElementKind, Point, RoutingSection};
use core_state::VisualizationState;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer `{renderer}` failed: {detail}")]
    Renderer {
        renderer: &'static str,
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderNode {
    pub id: String,
    pub label: String,
    pub kind: ElementKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Only meaningful for containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub aggregated: bool,
    /// 1 for originals, member count for aggregates.
    pub represented_edges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<RoutingSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct RenderData {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

/// Project the visible graph into render DTOs. Read-only.
pub fn to_render_data(state: &VisualizationState) -> RenderData {
    let graph = state.graph();
    let show_counts = state.render_config().show_aggregated_edge_counts;
    let mut data = RenderData::default();

    for container in state.visible_containers() {
        data.nodes.push(RenderNode {
            id: container.id.clone(),
            label: container.label.clone(),
            kind: ElementKind::Container,
            parent: graph.parent_of(&container.id).map(str::to_owned),
            position: container.position,
            dimensions: container.dimensions,
            collapsed: Some(container.collapsed),
        });
    }
    for node in state.visible_nodes() {
        data.nodes.push(RenderNode {
            id: node.id.clone(),
            label: node.display_label().to_owned(),
            kind: ElementKind::Node,
            parent: graph.parent_of(&node.id).map(str::to_owned),
            position: node.position,
            dimensions: node.dimensions,
            collapsed: None,
        });
    }
    for edge in state.visible_edges() {
        data.edges.push(RenderEdge {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            aggregated: false,
            represented_edges: 1,
            label: None,
            sections: edge.sections.clone(),
        });
    }
    for aggregate in state.aggregated_edges() {
        data.edges.push(RenderEdge {
            id: aggregate.id.clone(),
            source: aggregate.source.clone(),
            target: aggregate.target.clone(),
            aggregated: true,
            represented_edges: aggregate.original_edge_ids.len(),
            label: show_counts.then(|| aggregate.label.clone()),
            sections: Vec::new(),
        });
    }

    tracing::debug!(
        target: "viz.render",
        nodes = data.nodes.len(),
        edges = data.edges.len(),
        "render_data_built"
    );
    data
}

/// One render pass over the state.
pub trait Renderer: Send {
    fn name(&self) -> &'static str;
    fn render(&mut self, state: &VisualizationState) -> Result<RenderData, RenderError>;
}

/// Default renderer: the DTO projection itself.
#[derive(Debug, Default)]
pub struct DataRenderer;

impl DataRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DataRenderer {
    fn name(&self) -> &'static str {
        "data"
    }

    fn render(&mut self, state: &VisualizationState) -> Result<RenderData, RenderError> {
        Ok(to_render_data(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_graph::{Container, Edge, Node};
    use core_state::RenderConfigPatch;

    fn seeded() -> VisualizationState {
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
    fn containers_precede_their_members() {
        let state = seeded();
        let data = to_render_data(&state);
        let ids: Vec<&str> = data.nodes.iter().map(|n| n.id.as_str()).collect();
        let c_pos = ids.iter().position(|i| *i == "C").unwrap();
        let n1_pos = ids.iter().position(|i| *i == "n1").unwrap();
        assert!(c_pos < n1_pos);
        assert_eq!(data.nodes[c_pos].kind, ElementKind::Container);
    }

    #[test]
    fn collapse_swaps_originals_for_one_aggregate() {
        let mut state = seeded();
        state.collapse_container("C");
        let data = to_render_data(&state);
        assert_eq!(data.edges.len(), 1);
        let agg = &data.edges[0];
        assert!(agg.aggregated);
        assert_eq!(agg.represented_edges, 2);
        assert_eq!(agg.label.as_deref(), Some("2 edges"));
        assert!(!data.nodes.iter().any(|n| n.id == "n1"));
    }

    #[test]
    fn aggregate_label_respects_render_config() {
        let mut state = seeded();
        state.update_render_config(&RenderConfigPatch {
            show_aggregated_edge_counts: Some(false),
            ..Default::default()
        });
        state.collapse_container("C");
        let data = to_render_data(&state);
        assert_eq!(data.edges[0].label, None);
    }

    #[test]
    fn parent_field_reflects_nesting() {
        let state = seeded();
        let data = to_render_data(&state);
        let n1 = data.nodes.iter().find(|n| n.id == "n1").unwrap();
        assert_eq!(n1.parent.as_deref(), Some("C"));
        let n3 = data.nodes.iter().find(|n| n.id == "n3").unwrap();
        assert_eq!(n3.parent, None);
    }

    #[test]
    fn serializes_to_stable_json_shape() {
        let state = seeded();
        let json = serde_json::to_value(to_render_data(&state)).unwrap();
        assert!(json.get("nodes").is_some());
        assert!(json.get("edges").is_some());
        assert_eq!(json["edges"][0]["aggregated"], false);
    }
}
