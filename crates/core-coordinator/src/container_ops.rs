//! Container operation façade.
//!
//! User-driven expand/collapse must serialize against layout and render, so
//! these methods wrap the state mutation in a high-priority
//! `application_event` operation and (by default) follow it with one
//! layout+render pipeline pass. All façade methods are async and complete
//! only when the underlying queued operation has settled — callers must not
//! assume synchronous completion.
//!
//! Batch variants run sequentially, continue past individual failures, and
//! report an aggregate outcome; when layout is requested they trigger a
//! single pipeline pass at the end instead of one per container.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::operation::{ApplicationEventKind, EnqueueOptions, OperationClass, OperationThunk};
use crate::{
    CoordinatorError, OperationCoordinator, SharedLayoutEngine, SharedRenderer, SharedState,
    await_completion, lock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOpOptions {
    /// Run the layout+render pipeline after the mutation. Default true.
    pub trigger_layout: bool,
    /// Run the full invariant sweep inside the operation; a failed sweep
    /// fails the operation.
    pub trigger_validation: bool,
    /// Hint for the render collaborator to refit the viewport. The core only
    /// records the hint.
    pub fit_view: bool,
}

impl Default for ContainerOpOptions {
    fn default() -> Self {
        Self {
            trigger_layout: true,
            trigger_validation: false,
            fit_view: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerOpKind {
    Expand,
    Collapse,
}

impl ContainerOpKind {
    fn event_kind(self) -> ApplicationEventKind {
        match self {
            ContainerOpKind::Expand => ApplicationEventKind::ContainerExpand,
            ContainerOpKind::Collapse => ApplicationEventKind::ContainerCollapse,
        }
    }

    fn inverse(self) -> ContainerOpKind {
        match self {
            ContainerOpKind::Expand => ContainerOpKind::Collapse,
            ContainerOpKind::Collapse => ContainerOpKind::Expand,
        }
    }
}

/// Recorded when a container façade operation fails, for `recover_*`.
#[derive(Debug, Clone)]
pub(crate) struct ContainerFailure {
    pub container: String,
    pub kind: ContainerOpKind,
    pub error: String,
}

/// User-driven recovery policy after a failed container operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Re-run the failed operation once.
    Retry,
    /// Best-effort: apply the inverse mutation (collapse after a failed
    /// expand and vice versa) without touching unrelated state.
    Rollback,
    /// Forget the recorded failure.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NoRecordedFailure,
    Retried,
    RolledBack,
    Skipped,
}

/// Aggregate result of a batch container operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl OperationCoordinator {
    /// Expand a container through the queue. Resolves to whether the flag
    /// actually changed (unknown ids and already-expanded containers are
    /// no-ops, not errors).
    pub async fn expand_container(
        &self,
        id: &str,
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
    ) -> Result<bool, CoordinatorError> {
        self.container_op(ContainerOpKind::Expand, id, state, engine, renderer, opts)
            .await
    }

    /// Collapse a container through the queue. Same semantics as
    /// `expand_container`.
    pub async fn collapse_container(
        &self,
        id: &str,
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
    ) -> Result<bool, CoordinatorError> {
        self.container_op(ContainerOpKind::Collapse, id, state, engine, renderer, opts)
            .await
    }

    pub async fn expand_containers(
        &self,
        ids: &[String],
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
    ) -> BatchOutcome {
        self.container_batch(ContainerOpKind::Expand, ids, state, engine, renderer, opts)
            .await
    }

    pub async fn collapse_containers(
        &self,
        ids: &[String],
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
    ) -> BatchOutcome {
        self.container_batch(ContainerOpKind::Collapse, ids, state, engine, renderer, opts)
            .await
    }

    /// Recovery entry point after a failed container operation. `Rollback`
    /// is best-effort: it applies the inverse mutation only.
    pub async fn recover_from_container_operation_error(
        &self,
        id: &str,
        mode: RecoveryMode,
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
    ) -> Result<RecoveryOutcome, CoordinatorError> {
        let Some(failure) = self.take_container_failure(id) else {
            return Ok(RecoveryOutcome::NoRecordedFailure);
        };
        tracing::info!(
            target: "coordinator.queue",
            container = id,
            ?mode,
            original_error = %failure.error,
            "container_recovery"
        );
        let opts = ContainerOpOptions {
            trigger_layout: false,
            ..Default::default()
        };
        // Recovery attempts run under the (longer) application-event
        // deadline: the original tree-op deadline is what just expired.
        let timeout = self.timeouts().application_event;
        match mode {
            RecoveryMode::Skip => Ok(RecoveryOutcome::Skipped),
            RecoveryMode::Retry => {
                self.container_op_with_timeout(failure.kind, id, state, engine, renderer, opts, timeout)
                    .await?;
                Ok(RecoveryOutcome::Retried)
            }
            RecoveryMode::Rollback => {
                self.container_op_with_timeout(
                    failure.kind.inverse(),
                    id,
                    state,
                    engine,
                    renderer,
                    opts,
                    timeout,
                )
                .await?;
                Ok(RecoveryOutcome::RolledBack)
            }
        }
    }

    async fn container_op(
        &self,
        kind: ContainerOpKind,
        id: &str,
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
    ) -> Result<bool, CoordinatorError> {
        let timeout = self.timeouts().tree_op;
        self.container_op_with_timeout(kind, id, state, engine, renderer, opts, timeout)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn container_op_with_timeout(
        &self,
        kind: ContainerOpKind,
        id: &str,
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
        timeout: std::time::Duration,
    ) -> Result<bool, CoordinatorError> {
        let changed = Arc::new(AtomicBool::new(false));
        let thunk = container_thunk(kind, id.to_owned(), state.clone(), opts, changed.clone());
        let event_kind = kind.event_kind();
        let (op_id, rx) = self.enqueue_watched(
            OperationClass::ApplicationEvent,
            Some(event_kind),
            event_kind.priority(),
            thunk,
            EnqueueOptions {
                timeout: Some(timeout),
                max_retries: 0,
            },
        );
        self.process_queue().await;

        match await_completion(rx, &op_id).await {
            Ok(()) => {
                if opts.trigger_layout {
                    self.execute_layout_and_render_pipeline(state, engine, renderer)
                        .await?;
                }
                Ok(changed.load(Ordering::Relaxed))
            }
            Err(err) => {
                self.record_container_failure(ContainerFailure {
                    container: id.to_owned(),
                    kind,
                    error: err.to_string(),
                });
                Err(CoordinatorError::ContainerOperation {
                    container: id.to_owned(),
                    source: err,
                })
            }
        }
    }

    async fn container_batch(
        &self,
        kind: ContainerOpKind,
        ids: &[String],
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
        opts: ContainerOpOptions,
    ) -> BatchOutcome {
        let per_op = ContainerOpOptions {
            trigger_layout: false,
            ..opts
        };
        let mut outcome = BatchOutcome::default();
        for id in ids {
            match self
                .container_op(kind, id, state, engine, renderer, per_op)
                .await
            {
                Ok(_) => outcome.succeeded += 1,
                Err(err) => {
                    outcome.failed += 1;
                    outcome.errors.push(err.to_string());
                }
            }
        }
        if opts.trigger_layout
            && outcome.succeeded > 0
            && let Err(err) = self
                .execute_layout_and_render_pipeline(state, engine, renderer)
                .await
        {
            outcome.errors.push(err.to_string());
        }
        outcome
    }
}

fn container_thunk(
    kind: ContainerOpKind,
    container_id: String,
    state: SharedState,
    opts: ContainerOpOptions,
    changed: Arc<AtomicBool>,
) -> OperationThunk {
    Box::new(move || {
        let state = state.clone();
        let id = container_id.clone();
        let changed = changed.clone();
        Box::pin(async move {
            // Suspension point before the mutation: the deadline race can
            // only observe a timeout at a yield.
            tokio::task::yield_now().await;
            let mut guard = lock(&state);
            let did = match kind {
                ContainerOpKind::Expand => guard.expand_container(&id),
                ContainerOpKind::Collapse => guard.collapse_container(&id),
            };
            changed.store(did, Ordering::Relaxed);
            if opts.fit_view {
                tracing::debug!(target: "coordinator.queue", container = %id, "fit_view_hint");
            }
            if opts.trigger_validation {
                guard.validate_invariants()?;
            }
            tracing::debug!(
                target: "coordinator.queue",
                container = %id,
                ?kind,
                changed = did,
                "container_operation_applied"
            );
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{shared_layout_engine, shared_renderer, shared_state};
    use core_graph::{Container, Edge, Node};
    use core_layout::TieredLayout;
    use core_render::DataRenderer;
    use core_state::{LayoutPhase, VisualizationState};

    fn harness() -> (SharedState, SharedLayoutEngine, SharedRenderer) {
        let mut state = VisualizationState::new();
        for id in ["n1", "n2", "n3"] {
            state.add_node(Node::new(id)).unwrap();
        }
        state
            .add_container(Container::new("C", vec!["n1".into(), "n2".into()]))
            .unwrap();
        state.add_edge(Edge::new("e1", "n1", "n3")).unwrap();
        state.add_edge(Edge::new("e2", "n2", "n3")).unwrap();
        (
            shared_state(state),
            shared_layout_engine(TieredLayout::new()),
            shared_renderer(DataRenderer::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn collapse_through_facade_aggregates_and_renders() {
        let coordinator = OperationCoordinator::new();
        let (state, engine, renderer) = harness();
        let changed = coordinator
            .collapse_container("C", &state, &engine, &renderer, ContainerOpOptions::default())
            .await
            .unwrap();
        assert!(changed);

        let guard = lock(&state);
        assert_eq!(guard.layout_phase(), LayoutPhase::Displayed);
        assert_eq!(guard.aggregated_edges().len(), 1);
        drop(guard);

        let status = coordinator.container_operation_status();
        assert!(status.last_completed.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_container_is_a_noop_not_an_error() {
        let coordinator = OperationCoordinator::new();
        let (state, engine, renderer) = harness();
        let changed = coordinator
            .expand_container(
                "ghost",
                &state,
                &engine,
                &renderer,
                ContainerOpOptions {
                    trigger_layout: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_triggers_single_pipeline() {
        let coordinator = OperationCoordinator::new();
        let (state, engine, renderer) = harness();
        lock(&state)
            .add_container(Container::new("D", vec!["n3".into()]))
            .unwrap();

        let outcome = coordinator
            .collapse_containers(
                &["C".into(), "D".into(), "ghost".into()],
                &state,
                &engine,
                &renderer,
                ContainerOpOptions::default(),
            )
            .await;
        // "ghost" is a no-op success, not a failure.
        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.failed, 0);

        // One layout + one render for the whole batch.
        let status = coordinator.queue_status();
        assert_eq!(
            status.completed,
            3 + 2,
            "three events plus one layout and one render"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_container_op_is_recoverable() {
        let (state, engine, renderer) = harness();
        let opts = ContainerOpOptions {
            trigger_layout: false,
            ..Default::default()
        };
        // A zero tree-op timeout expires at the thunk's first yield.
        let strict = OperationCoordinator::with_timeouts(crate::TimeoutDefaults {
            tree_op: std::time::Duration::from_millis(0),
            ..Default::default()
        });
        let err = strict
            .collapse_container("C", &state, &engine, &renderer, opts)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("C"));

        // Skip clears the recorded failure; a second recover finds nothing.
        let outcome = strict
            .recover_from_container_operation_error(
                "C",
                RecoveryMode::Skip,
                &state,
                &engine,
                &renderer,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Skipped);
        let outcome = strict
            .recover_from_container_operation_error(
                "C",
                RecoveryMode::Retry,
                &state,
                &engine,
                &renderer,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::NoRecordedFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_applies_inverse_operation() {
        let (state, engine, renderer) = harness();
        lock(&state).collapse_container("C");

        let strict = OperationCoordinator::with_timeouts(crate::TimeoutDefaults {
            tree_op: std::time::Duration::from_millis(0),
            ..Default::default()
        });
        let opts = ContainerOpOptions {
            trigger_layout: false,
            ..Default::default()
        };
        assert!(
            strict
                .expand_container("C", &state, &engine, &renderer, opts)
                .await
                .is_err()
        );
        // Rollback applies the inverse of the failed expand: a collapse.
        // The container never left the collapsed state (the thunk timed out
        // before mutating), so the inverse lands as a no-op and the state
        // ends where the rollback contract wants it.
        let outcome = strict
            .recover_from_container_operation_error(
                "C",
                RecoveryMode::Rollback,
                &state,
                &engine,
                &renderer,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::RolledBack);
        assert!(lock(&state).graph().container("C").unwrap().collapsed);
    }
}
