//! Layout collaborator seam.
//!
//! The coordinator drives layout through the `LayoutEngine` trait: one call
//! that mutates the state in place — node positions, container geometry, and
//! optional per-edge routing. Engines are phase-agnostic; the coordinator
//! owns every `LayoutPhase` transition.
//!
//! `TieredLayout` is the built-in engine used by the binary and the test
//! suites. It is intentionally simple and fully deterministic: root elements
//! flow left to right, container interiors stack top to bottom, collapsed
//! containers take their compact footprint, and visible edges get a single
//! straight routing section between endpoint centers. A production
//! deployment swaps in a hierarchical engine behind the same trait.

use thiserror::Error;

use core_graph::{
    COLLAPSED_CONTAINER_DIMENSIONS, DEFAULT_NODE_DIMENSIONS, Dimensions, Point, RoutingSection,
};
use core_state::VisualizationState;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout engine `{engine}` failed: {detail}")]
    Engine {
        engine: &'static str,
        detail: String,
    },
}

/// One-shot layout over the current visible graph.
pub trait LayoutEngine: Send {
    /// Stable identifier for logging and status surfaces.
    fn name(&self) -> &'static str;
    /// Write positions/dimensions (and optionally edge routing) into the
    /// state for every visible node and container.
    fn layout(&mut self, state: &mut VisualizationState) -> Result<(), LayoutError>;
}

const H_GAP: f64 = 48.0;
const V_GAP: f64 = 32.0;
const CONTAINER_PADDING: f64 = 24.0;

/// Deterministic tiered layout: roots in a row, container children in a
/// column inside their parent.
#[derive(Debug, Default)]
pub struct TieredLayout;

#[derive(Debug)]
enum Placement {
    Node { id: String, origin: Point },
    Container {
        id: String,
        origin: Point,
        dims: Dimensions,
    },
}

impl TieredLayout {
    pub fn new() -> Self {
        Self
    }

    /// Size of `id` as placed: collapsed containers use the compact
    /// footprint, expanded ones wrap their stacked children.
    fn measure(&self, state: &VisualizationState, id: &str) -> Dimensions {
        let graph = state.graph();
        if let Some(container) = graph.container(id) {
            if container.collapsed {
                return COLLAPSED_CONTAINER_DIMENSIONS;
            }
            let mut width: f64 = 0.0;
            let mut height: f64 = 0.0;
            for child in &container.children {
                if !state.visibility().is_visible(child) {
                    continue;
                }
                let child_dims = self.measure(state, child);
                width = width.max(child_dims.width);
                if height > 0.0 {
                    height += V_GAP;
                }
                height += child_dims.height;
            }
            Dimensions::new(
                width + 2.0 * CONTAINER_PADDING,
                height + 2.0 * CONTAINER_PADDING,
            )
        } else if let Some(node) = graph.node(id) {
            node.dimensions.unwrap_or(DEFAULT_NODE_DIMENSIONS)
        } else {
            DEFAULT_NODE_DIMENSIONS
        }
    }

    fn place(
        &self,
        state: &VisualizationState,
        id: &str,
        origin: Point,
        out: &mut Vec<Placement>,
    ) {
        let graph = state.graph();
        if let Some(container) = graph.container(id) {
            let dims = self.measure(state, id);
            out.push(Placement::Container {
                id: id.to_owned(),
                origin,
                dims,
            });
            if container.collapsed {
                return;
            }
            let mut cursor_y = origin.y + CONTAINER_PADDING;
            for child in &container.children {
                if !state.visibility().is_visible(child) {
                    continue;
                }
                let child_dims = self.measure(state, child);
                self.place(
                    state,
                    child,
                    Point::new(origin.x + CONTAINER_PADDING, cursor_y),
                    out,
                );
                cursor_y += child_dims.height + V_GAP;
            }
        } else {
            out.push(Placement::Node {
                id: id.to_owned(),
                origin,
            });
        }
    }
}

impl LayoutEngine for TieredLayout {
    fn name(&self) -> &'static str {
        "tiered"
    }

    fn layout(&mut self, state: &mut VisualizationState) -> Result<(), LayoutError> {
        // Plan first (immutable traversal), apply second (mutation); the
        // state is never observed half-laid-out.
        let mut placements = Vec::new();
        let mut cursor_x = 0.0;

        let roots: Vec<String> = {
            let graph = state.graph();
            let mut roots: Vec<String> = graph
                .root_containers()
                .iter()
                .map(|c| c.id.clone())
                .collect();
            roots.extend(
                graph
                    .nodes()
                    .iter()
                    .filter(|n| graph.parent_of(&n.id).is_none())
                    .map(|n| n.id.clone()),
            );
            roots
        };

        for root in roots {
            if !state.visibility().is_visible(&root) {
                continue;
            }
            let dims = self.measure(state, &root);
            self.place(state, &root, Point::new(cursor_x, 0.0), &mut placements);
            cursor_x += dims.width + H_GAP;
        }

        let placed = placements.len();
        for placement in placements {
            match placement {
                Placement::Node { id, origin } => {
                    state.set_node_position(&id, origin);
                }
                Placement::Container { id, origin, dims } => {
                    state.set_container_geometry(&id, origin, dims);
                }
            }
        }
        self.route_visible_edges(state);

        tracing::debug!(target: "layout.tiered", placed, "layout_applied");
        Ok(())
    }
}

impl TieredLayout {
    /// Straight-line routing between endpoint origins for every visible
    /// original edge. Aggregated edges are routed by the renderer from
    /// endpoint geometry; only originals carry persisted sections.
    fn route_visible_edges(&self, state: &mut VisualizationState) {
        let routes: Vec<(String, Point, Point)> = state
            .visible_edges()
            .iter()
            .filter_map(|edge| {
                let from = endpoint_origin(state, &edge.source)?;
                let to = endpoint_origin(state, &edge.target)?;
                Some((edge.id.clone(), from, to))
            })
            .collect();
        for (id, from, to) in routes {
            state.set_edge_routing(
                &id,
                vec![RoutingSection {
                    points: vec![from, to],
                }],
            );
        }
    }
}

fn endpoint_origin(state: &VisualizationState, id: &str) -> Option<Point> {
    let graph = state.graph();
    if let Some(node) = graph.node(id) {
        node.position
    } else {
        graph.container(id).and_then(|c| c.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_graph::{Container, Edge, Node};

    fn seeded() -> VisualizationState {
        let mut state = VisualizationState::new();
        for id in ["n1", "n2", "n3"] {
            state.add_node(Node::new(id)).unwrap();
        }
        state
            .add_container(Container::new("C", vec!["n1".into(), "n2".into()]))
            .unwrap();
        state.add_edge(Edge::new("e1", "n1", "n3")).unwrap();
        state
    }

    #[test]
    fn every_visible_element_gets_geometry() {
        let mut state = seeded();
        TieredLayout::new().layout(&mut state).unwrap();
        for node in state.visible_nodes() {
            assert!(node.position.is_some(), "node {} unplaced", node.id);
        }
        for container in state.visible_containers() {
            assert!(container.position.is_some());
            assert!(container.dimensions.is_some());
        }
    }

    #[test]
    fn collapsed_container_uses_compact_footprint() {
        let mut state = seeded();
        state.collapse_container("C");
        TieredLayout::new().layout(&mut state).unwrap();
        let c = state.graph().container("C").unwrap();
        assert_eq!(c.dimensions, Some(COLLAPSED_CONTAINER_DIMENSIONS));
        // Interior nodes are invisible and keep no fresh position.
        assert!(state.graph().node("n1").unwrap().position.is_none());
    }

    #[test]
    fn layout_is_deterministic() {
        let mut a = seeded();
        let mut b = seeded();
        TieredLayout::new().layout(&mut a).unwrap();
        TieredLayout::new().layout(&mut b).unwrap();
        assert_eq!(
            a.graph().node("n3").unwrap().position,
            b.graph().node("n3").unwrap().position
        );
    }

    #[test]
    fn visible_edges_get_straight_sections() {
        let mut state = seeded();
        TieredLayout::new().layout(&mut state).unwrap();
        let edge = state.graph().edge("e1").unwrap();
        assert_eq!(edge.sections.len(), 1);
        assert_eq!(edge.sections[0].points.len(), 2);
    }

    #[test]
    fn roots_do_not_overlap_horizontally() {
        let mut state = seeded();
        TieredLayout::new().layout(&mut state).unwrap();
        let c = state.graph().container("C").unwrap();
        let n3 = state.graph().node("n3").unwrap();
        let c_right = c.position.unwrap().x + c.dimensions.unwrap().width;
        assert!(n3.position.unwrap().x >= c_right, "n3 placed after C");
    }
}
