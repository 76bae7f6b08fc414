//! Graph entity model: nodes, edges, containers, and derived aggregates.
//!
//! This crate is the leaf of the workspace. It owns the entity types and the
//! insertion-ordered storage every higher layer (aggregation, visibility,
//! state, render) reads through, plus the geometry helpers used when sizing
//! labels and estimating container footprints.
//!
//! Core invariants (enforced by `core-state`, relied upon here):
//! * Entity ids are unique within their kind; node and container ids are
//!   additionally disjoint (an edge endpoint names exactly one entity).
//! * The container parent relation is a forest: every child has at most one
//!   parent and no container is its own ancestor.
//! * `GraphStore::parent_of` is a derived index: containers own the
//!   parent→children direction; the reverse lookup is rebuilt after any
//!   container mutation rather than maintained incrementally.
//!
//! Ordering: all stores preserve insertion order across mutation. Derived
//! views (visibility, render) iterate these stores and therefore inherit a
//! stable order without sorting.

use serde::{Deserialize, Serialize};

pub mod geometry;
pub mod store;

pub use geometry::{
    BORDER_PADDING, COLLAPSED_CONTAINER_DIMENSIONS, DEFAULT_NODE_DIMENSIONS, Dimensions, Point,
    label_dimensions,
};
pub use store::{GraphStore, OrderedStore};

/// A routed edge path segment written back by the layout collaborator.
/// Kept opaque: the core records and hands it to the renderer verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSection {
    pub points: Vec<Point>,
}

/// A leaf graph entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub short_label: String,
    pub long_label: String,
    /// User-defined category (free-form; the core never interprets it).
    pub node_type: String,
    /// Ordered, duplicate-free tags.
    pub semantic_tags: Vec<String>,
    pub hidden: bool,
    pub showing_long_label: bool,
    /// Written by the layout collaborator.
    pub position: Option<Point>,
    /// Computed from label/type via `label_dimensions`.
    pub dimensions: Option<Dimensions>,
}

impl Node {
    /// Minimal constructor; labels default to the id, everything else empty.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            short_label: id.clone(),
            long_label: id.clone(),
            id,
            node_type: String::new(),
            semantic_tags: Vec::new(),
            hidden: false,
            showing_long_label: false,
            position: None,
            dimensions: None,
        }
    }

    pub fn with_labels(
        id: impl Into<String>,
        short_label: impl Into<String>,
        long_label: impl Into<String>,
    ) -> Self {
        let mut n = Self::new(id);
        n.short_label = short_label.into();
        n.long_label = long_label.into();
        n
    }

    /// The label currently selected for display.
    pub fn display_label(&self) -> &str {
        if self.showing_long_label {
            &self.long_label
        } else {
            &self.short_label
        }
    }
}

/// An original (user-supplied) edge. Undirected in the model; `source` /
/// `target` order is preserved for rendering only. Endpoints may name a
/// node or a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub semantic_tags: Vec<String>,
    pub hidden: bool,
    /// Routing written by the layout collaborator (empty until layout runs).
    pub sections: Vec<RoutingSection>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            semantic_tags: Vec::new(),
            hidden: false,
            sections: Vec::new(),
        }
    }

    /// True if `id` is one of the two endpoints.
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// A nested grouping of nodes and/or other containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub label: String,
    pub long_label: String,
    /// Ordered, duplicate-free set of child ids (nodes or containers).
    pub children: Vec<String>,
    pub collapsed: bool,
    pub hidden: bool,
    pub position: Option<Point>,
    pub dimensions: Option<Dimensions>,
}

impl Container {
    pub fn new(id: impl Into<String>, children: Vec<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            long_label: id.clone(),
            id,
            children,
            collapsed: false,
            hidden: false,
            position: None,
            dimensions: None,
        }
    }

    pub fn contains_child(&self, id: &str) -> bool {
        self.children.iter().any(|c| c == id)
    }
}

/// A synthetic edge standing in for one or more original edges that cross a
/// collapsed container boundary. Owned by the aggregation engine; exists only
/// while at least one relevant container is collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEdge {
    /// Deterministic: derived from the endpoint pair and the member set, so
    /// repeated collapses of the same shape reuse the same id.
    pub id: String,
    pub source: String,
    pub target: String,
    /// Original edges represented by this aggregate. Never empty.
    pub original_edge_ids: Vec<String>,
    /// The collapsed container whose collapse produced the grouping.
    pub aggregation_source: String,
    /// Display label, e.g. `"3 edges"`.
    pub label: String,
}

impl AggregatedEdge {
    /// True if `edge_id` is represented by this aggregate.
    pub fn represents(&self, edge_id: &str) -> bool {
        self.original_edge_ids.iter().any(|e| e == edge_id)
    }
}

/// Kind discriminator used by search results and render DTOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Node,
    Container,
}
