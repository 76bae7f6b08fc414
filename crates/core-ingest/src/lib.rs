//! Graph ingestion: JSON → `VisualizationState`.
//!
//! Input is `{nodes: [...], edges: [...], containers: [...]}` carrying ids,
//! labels, tags, and parent/child relationships — *structure only*. UI state
//! (`collapsed`, `hidden`) and styling fields are rejected outright: they
//! belong to the session, not the document, and silently accepting them
//! would let a file pre-seed collapse state the smart-collapse heuristic is
//! supposed to decide.
//!
//! Rejection happens twice: a pre-scan over the raw JSON reports forbidden
//! fields by name (precise diagnostics), and the typed parse denies unknown
//! fields (catch-all for anything the pre-scan list misses).
//!
//! Construction goes through ordinary `VisualizationState` CRUD, so a file
//! that violates a model invariant (dangling edge endpoint, container
//! cycle, duplicate id) fails with the same structured errors a live caller
//! would see. Containers may reference containers defined later in the
//! file; ingestion orders inserts so children exist before their parents.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use core_graph::{Container, Edge, Node};
use core_state::{InvariantViolation, VisualizationState};

/// Fields an input document must never carry (session/UI state, styling).
const FORBIDDEN_FIELDS: &[&str] = &[
    "collapsed",
    "hidden",
    "position",
    "dimensions",
    "style",
    "color",
    "showing_long_label",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed graph JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("forbidden field `{field}` on {section} entry `{id}` (UI state is not ingestable)")]
    ForbiddenField {
        section: &'static str,
        id: String,
        field: String,
    },
    #[error("container(s) reference children that never resolve: {}", ids.join(", "))]
    UnresolvedContainers { ids: Vec<String> },
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeSpec {
    id: String,
    #[serde(default)]
    short_label: Option<String>,
    #[serde(default)]
    long_label: Option<String>,
    #[serde(default, rename = "type")]
    node_type: Option<String>,
    #[serde(default)]
    semantic_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeSpec {
    id: String,
    source: String,
    target: String,
    #[serde(default)]
    semantic_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContainerSpec {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    long_label: Option<String>,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GraphSpec {
    #[serde(default)]
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    edges: Vec<EdgeSpec>,
    #[serde(default)]
    containers: Vec<ContainerSpec>,
}

/// Parse a graph document into a fresh state.
pub fn parse(json: &str) -> Result<VisualizationState, IngestError> {
    let raw: Value = serde_json::from_str(json)?;
    scan_forbidden_fields(&raw)?;
    let spec: GraphSpec = serde_json::from_value(raw)?;
    build_state(spec)
}

fn scan_forbidden_fields(raw: &Value) -> Result<(), IngestError> {
    for section in ["nodes", "edges", "containers"] {
        let Some(entries) = raw.get(section).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(object) = entry.as_object() else {
                continue;
            };
            for field in FORBIDDEN_FIELDS {
                if object.contains_key(*field) {
                    let id = object
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or("<missing id>")
                        .to_owned();
                    // Section names above are static; map back for the error.
                    let section_name = match section {
                        "nodes" => "node",
                        "edges" => "edge",
                        _ => "container",
                    };
                    return Err(IngestError::ForbiddenField {
                        section: section_name,
                        id,
                        field: (*field).to_owned(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn build_state(spec: GraphSpec) -> Result<VisualizationState, IngestError> {
    let mut state = VisualizationState::new();

    for node_spec in spec.nodes {
        let mut node = Node::new(node_spec.id);
        if let Some(short) = node_spec.short_label {
            node.short_label = short;
        }
        if let Some(long) = node_spec.long_label {
            node.long_label = long;
        }
        if let Some(kind) = node_spec.node_type {
            node.node_type = kind;
        }
        node.semantic_tags = node_spec.semantic_tags;
        state.add_node(node)?;
    }

    // Containers may be listed parent-before-child; insert in passes so a
    // container's container-children always exist first.
    let mut pending: Vec<ContainerSpec> = spec.containers;
    while !pending.is_empty() {
        let before = pending.len();
        let container_ids: Vec<String> = pending.iter().map(|c| c.id.clone()).collect();
        let mut deferred = Vec::new();
        for container_spec in pending {
            let blocked = container_spec.children.iter().any(|child| {
                !state.graph().resolves(child) && container_ids.iter().any(|id| id == child)
            });
            if blocked {
                deferred.push(container_spec);
                continue;
            }
            let mut container = Container::new(container_spec.id, container_spec.children);
            if let Some(label) = container_spec.label {
                container.label = label;
            }
            if let Some(long) = container_spec.long_label {
                container.long_label = long;
            }
            state.add_container(container)?;
        }
        if deferred.len() == before {
            return Err(IngestError::UnresolvedContainers {
                ids: deferred.into_iter().map(|c| c.id).collect(),
            });
        }
        pending = deferred;
    }

    for edge_spec in spec.edges {
        let mut edge = Edge::new(edge_spec.id, edge_spec.source, edge_spec.target);
        edge.semantic_tags = edge_spec.semantic_tags;
        state.add_edge(edge)?;
    }

    tracing::info!(
        target: "ingest",
        nodes = state.graph().nodes().len(),
        edges = state.graph().edges().len(),
        containers = state.graph().containers().len(),
        "graph_ingested"
    );
    Ok(state)
}
