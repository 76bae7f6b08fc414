//! Structured invariant violations.
//!
//! Every CRUD path validates *before* committing; a returned
//! `InvariantViolation` therefore guarantees the state is exactly what it
//! was before the call. The error carries one entry per failed invariant so
//! callers can surface all problems at once instead of fixing them one
//! rejection at a time.

use thiserror::Error;

/// A single failed invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("duplicate {kind} id `{id}` with a different payload")]
    DuplicateId { kind: &'static str, id: String },
    #[error("id `{id}` is used by both a node and a container")]
    NodeContainerIdCollision { id: String },
    #[error("edge `{edge}` endpoint `{endpoint}` resolves to no node or container")]
    UnresolvedEndpoint { edge: String, endpoint: String },
    #[error("container `{container}` child `{child}` resolves to no node or container")]
    UnknownChild { container: String, child: String },
    #[error("container `{container}` would become its own ancestor")]
    ContainerCycle { container: String },
    #[error("child `{child}` already belongs to container `{existing_parent}`")]
    MultipleParents {
        child: String,
        existing_parent: String,
    },
    #[error("child `{child}` listed more than once in container `{container}`")]
    DuplicateChild { container: String, child: String },
    #[error("aggregation indexes inconsistent: {detail}")]
    AggregationDrift { detail: String },
    #[error("visibility cache for `{id}` disagrees with recomputation")]
    VisibilityDrift { id: String },
}

/// Aggregate error returned by state mutations and `validate_invariants`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} invariant violation(s): {}", violations.len(), summarize(violations))]
pub struct InvariantViolation {
    pub violations: Vec<Violation>,
}

impl InvariantViolation {
    pub fn new(violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty(), "empty violation list");
        Self { violations }
    }

    pub fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_entry() {
        let err = InvariantViolation::new(vec![
            Violation::NodeContainerIdCollision { id: "x".into() },
            Violation::ContainerCycle {
                container: "c".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 invariant violation(s)"));
        assert!(text.contains("both a node and a container"));
        assert!(text.contains("own ancestor"));
    }
}
