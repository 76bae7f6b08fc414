//! Async operation coordinator.
//!
//! A single cooperative FIFO queue with priority insertion serializes every
//! operation that touches the visualization state: layout runs, render
//! passes, application events (container expand/collapse, search, layout
//! config changes), and render-config updates.
//!
//! Scheduling model:
//! * Strictly serial — at most one operation executes at any instant, and no
//!   operation starts before the previous one produced a result or
//!   exhausted its retries.
//! * Cooperative — `process_queue` awaits each operation inline; the only
//!   suspension points are the operation body, the deadline race, and the
//!   retry backoff sleep. The coordinator's own lock is held only between
//!   yield points, never across one.
//! * Re-entrancy safe — a `process_queue` call while a drain is already in
//!   progress returns immediately; enqueues during a drain append and are
//!   picked up by the active drain.
//!
//! Priority: container expand/collapse events are high, search is normal,
//! layout-config changes are low. A high-priority enqueue is inserted ahead
//! of lower-priority *pending* operations, never ahead of the one already
//! executing; ties keep FIFO order, so completion order within a class
//! equals enqueue order.
//!
//! Failure policy: an operation failure never aborts the queue. Timeouts are
//! a distinct error kind but count as ordinary failures for retry and
//! accounting. Retry backoff is `100ms × retry_count`. Pipeline failures
//! propagate only to the pipeline caller.
//!
//! Nothing here is process-global: independent coordinator/state pairs
//! coexist without any static cross-talk.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
// The tokio clock (not the std one) times operations so tests under a
// paused runtime measure virtual time.
use tokio::time::Instant;

use core_layout::LayoutEngine;
use core_render::{RenderData, Renderer};
use core_state::{LayoutPhase, RenderConfigPatch, VisualizationState};

mod container_ops;
mod operation;
mod status;

pub use container_ops::{BatchOutcome, ContainerOpOptions, RecoveryMode, RecoveryOutcome};
pub use operation::{
    ApplicationEventKind, EnqueueOptions, OperationClass, OperationError, OperationFuture,
    OperationThunk, Priority, TimeoutDefaults,
};
pub use status::{ClassStatus, CurrentOperation, OperationRecord, QueueStatus};

use container_ops::ContainerFailure;
use operation::{CompletionReceiver, QueuedOperation};

/// Completed-operation timings kept for the rolling average.
pub const TIMING_WINDOW: usize = 100;

pub type SharedState = Arc<Mutex<VisualizationState>>;
pub type SharedLayoutEngine = Arc<Mutex<dyn LayoutEngine>>;
pub type SharedRenderer = Arc<Mutex<dyn Renderer>>;

pub fn shared_state(state: VisualizationState) -> SharedState {
    Arc::new(Mutex::new(state))
}

pub fn shared_layout_engine<L: LayoutEngine + 'static>(engine: L) -> SharedLayoutEngine {
    Arc::new(Mutex::new(engine))
}

pub fn shared_renderer<R: Renderer + 'static>(renderer: R) -> SharedRenderer {
    Arc::new(Mutex::new(renderer))
}

/// Poison-recovering lock: a panicked operation must not wedge the queue,
/// and every state mutation re-validates its own invariants anyway.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("pipeline {stage} stage failed: {source}")]
    Pipeline {
        stage: &'static str,
        #[source]
        source: OperationError,
    },
    #[error("container operation on `{container}` failed: {source}")]
    ContainerOperation {
        container: String,
        #[source]
        source: OperationError,
    },
    #[error("render pipeline completed without producing render data")]
    MissingRenderData,
}

#[derive(Default)]
struct Inner {
    pending: VecDeque<QueuedOperation>,
    draining: bool,
    next_seq: u64,
    current: Option<CurrentOperationDetail>,
    completed: Vec<OperationRecord>,
    failed: Vec<OperationRecord>,
    timings: VecDeque<Duration>,
    total_processed: u64,
    errors: Vec<String>,
    last_container_failure: Option<ContainerFailure>,
}

#[derive(Clone)]
struct CurrentOperationDetail {
    id: String,
    class: OperationClass,
    kind: Option<ApplicationEventKind>,
}

pub struct OperationCoordinator {
    inner: Mutex<Inner>,
    timeouts: TimeoutDefaults,
}

impl Default for OperationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self::with_timeouts(TimeoutDefaults::default())
    }

    pub fn with_timeouts(timeouts: TimeoutDefaults) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            timeouts,
        }
    }

    pub fn timeouts(&self) -> TimeoutDefaults {
        self.timeouts
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    // ---------------------------------------------------------------------
    // Enqueue
    // ---------------------------------------------------------------------

    /// Append an operation; returns its monotone id (`op_1`, `op_2`, …).
    /// Never starts a drain — callers decide when to `process_queue`.
    pub fn enqueue(
        &self,
        class: OperationClass,
        thunk: OperationThunk,
        opts: EnqueueOptions,
    ) -> String {
        self.enqueue_full(class, None, Priority::Normal, thunk, opts, false)
            .0
    }

    /// Append an application event; the kind decides queue priority.
    pub fn enqueue_application_event(
        &self,
        kind: ApplicationEventKind,
        thunk: OperationThunk,
        opts: EnqueueOptions,
    ) -> String {
        self.enqueue_full(
            OperationClass::ApplicationEvent,
            Some(kind),
            kind.priority(),
            thunk,
            opts,
            false,
        )
        .0
    }

    /// Enqueue a `render_config_update` that merges `patch` into the state.
    pub fn enqueue_render_config_update(
        &self,
        state: &SharedState,
        patch: RenderConfigPatch,
        opts: EnqueueOptions,
    ) -> String {
        let state = state.clone();
        let thunk: OperationThunk = Box::new(move || {
            let state = state.clone();
            let patch = patch.clone();
            Box::pin(async move {
                let changed = lock(&state).update_render_config(&patch);
                tracing::debug!(target: "coordinator.queue", changed, "render_config_update");
                Ok(())
            })
        });
        self.enqueue(OperationClass::RenderConfigUpdate, thunk, opts)
    }

    pub(crate) fn enqueue_watched(
        &self,
        class: OperationClass,
        kind: Option<ApplicationEventKind>,
        priority: Priority,
        thunk: OperationThunk,
        opts: EnqueueOptions,
    ) -> (String, CompletionReceiver) {
        let (id, rx) = self.enqueue_full(class, kind, priority, thunk, opts, true);
        (id, rx.expect("watched enqueue always carries a receiver"))
    }

    fn enqueue_full(
        &self,
        class: OperationClass,
        kind: Option<ApplicationEventKind>,
        priority: Priority,
        thunk: OperationThunk,
        opts: EnqueueOptions,
        watched: bool,
    ) -> (String, Option<CompletionReceiver>) {
        let timeout = opts.timeout.unwrap_or_else(|| match kind {
            Some(ApplicationEventKind::ContainerExpand)
            | Some(ApplicationEventKind::ContainerCollapse) => self.timeouts.tree_op,
            _ => self.timeouts.for_class(class),
        });
        let (notifier, receiver) = if watched {
            let (tx, rx) = tokio::sync::oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let mut inner = self.lock_inner();
        inner.next_seq += 1;
        let id = format!("op_{}", inner.next_seq);
        let op = QueuedOperation {
            id: id.clone(),
            class,
            kind,
            priority,
            thunk,
            timeout,
            max_retries: opts.max_retries,
            retry_count: 0,
            created_at: Instant::now(),
            notifier,
        };
        // Ahead of strictly lower priority, behind equal: FIFO within a
        // class, and never in front of the executing operation (which is no
        // longer in `pending` at all).
        let pos = inner
            .pending
            .iter()
            .position(|queued| queued.priority < op.priority)
            .unwrap_or(inner.pending.len());
        tracing::debug!(
            target: "coordinator.queue",
            id = %id,
            class = %class,
            ?kind,
            position = pos,
            pending = inner.pending.len() + 1,
            "operation_enqueued"
        );
        inner.pending.insert(pos, op);
        (id, receiver)
    }

    // ---------------------------------------------------------------------
    // Drain
    // ---------------------------------------------------------------------

    /// Drain the queue head-to-tail. Returns immediately if a drain is
    /// already in progress; operations enqueued meanwhile are handled by the
    /// active drain.
    pub async fn process_queue(&self) {
        {
            let mut inner = self.lock_inner();
            if inner.draining {
                tracing::trace!(target: "coordinator.queue", "drain_already_in_progress");
                return;
            }
            inner.draining = true;
        }
        loop {
            let op = {
                let mut inner = self.lock_inner();
                match inner.pending.pop_front() {
                    Some(op) => {
                        inner.current = Some(CurrentOperationDetail {
                            id: op.id.clone(),
                            class: op.class,
                            kind: op.kind,
                        });
                        op
                    }
                    None => {
                        inner.draining = false;
                        inner.current = None;
                        return;
                    }
                }
            };
            self.execute(op).await;
        }
    }

    async fn execute(&self, mut op: QueuedOperation) {
        let started = Instant::now();
        let queued_ms = started.duration_since(op.created_at).as_millis() as u64;
        tracing::debug!(
            target: "coordinator.queue",
            id = %op.id,
            class = %op.class,
            queued_ms,
            "operation_start"
        );
        loop {
            let attempt = (op.thunk)();
            let outcome = match tokio::time::timeout(op.timeout, attempt).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(OperationError::Failed {
                    id: op.id.clone(),
                    detail: format!("{err:#}"),
                }),
                Err(_) => Err(OperationError::Timeout {
                    id: op.id.clone(),
                    after_ms: op.timeout.as_millis() as u64,
                }),
            };
            match outcome {
                Ok(()) => {
                    self.settle(op, started, Ok(()));
                    return;
                }
                Err(err) if op.retry_count < op.max_retries => {
                    op.retry_count += 1;
                    tracing::warn!(
                        target: "coordinator.queue",
                        id = %op.id,
                        attempt = op.retry_count,
                        max = op.max_retries,
                        error = %err,
                        "operation_retry"
                    );
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(op.retry_count)))
                        .await;
                }
                Err(err) => {
                    self.settle(op, started, Err(err));
                    return;
                }
            }
        }
    }

    fn settle(&self, op: QueuedOperation, started: Instant, result: Result<(), OperationError>) {
        let duration = started.elapsed();
        let record = OperationRecord {
            id: op.id.clone(),
            class: op.class,
            kind: op.kind,
            queued_ms: started.duration_since(op.created_at).as_millis() as u64,
            duration_ms: duration.as_millis() as u64,
            retries: op.retry_count,
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        {
            let mut inner = self.lock_inner();
            inner.current = None;
            inner.total_processed += 1;
            match &result {
                Ok(()) => {
                    inner.timings.push_back(duration);
                    while inner.timings.len() > TIMING_WINDOW {
                        inner.timings.pop_front();
                    }
                    inner.completed.push(record);
                }
                Err(err) => {
                    inner.errors.push(err.to_string());
                    inner.failed.push(record);
                }
            }
        }
        match &result {
            Ok(()) => tracing::debug!(
                target: "coordinator.queue",
                id = %op.id,
                duration_ms = duration.as_millis() as u64,
                "operation_completed"
            ),
            Err(err) => tracing::warn!(
                target: "coordinator.queue",
                id = %op.id,
                error = %err,
                "operation_failed"
            ),
        }
        if let Some(tx) = op.notifier {
            let _ = tx.send(result);
        }
    }

    // ---------------------------------------------------------------------
    // Cancellation & history
    // ---------------------------------------------------------------------

    /// Remove a still-pending operation. The executing operation and
    /// finished operations cannot be cancelled.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = {
            let mut inner = self.lock_inner();
            let pos = inner.pending.iter().position(|op| op.id == id);
            pos.and_then(|p| inner.pending.remove(p))
        };
        match removed {
            Some(op) => {
                tracing::debug!(target: "coordinator.queue", id, "operation_cancelled");
                if let Some(tx) = op.notifier {
                    let _ = tx.send(Err(OperationError::Cancelled { id: op.id.clone() }));
                }
                true
            }
            None => false,
        }
    }

    /// Cancel pending application events of one kind; returns how many were
    /// removed.
    pub fn cancel_application_events_by_kind(&self, kind: ApplicationEventKind) -> usize {
        let removed: Vec<QueuedOperation> = {
            let mut inner = self.lock_inner();
            let mut kept = VecDeque::with_capacity(inner.pending.len());
            let mut removed = Vec::new();
            while let Some(op) = inner.pending.pop_front() {
                if op.class == OperationClass::ApplicationEvent && op.kind == Some(kind) {
                    removed.push(op);
                } else {
                    kept.push_back(op);
                }
            }
            inner.pending = kept;
            removed
        };
        let count = removed.len();
        for op in removed {
            if let Some(tx) = op.notifier {
                let _ = tx.send(Err(OperationError::Cancelled { id: op.id.clone() }));
            }
        }
        count
    }

    /// Drop all pending operations. History and statistics are unaffected.
    pub fn clear_queue(&self) -> usize {
        let dropped: Vec<QueuedOperation> = {
            let mut inner = self.lock_inner();
            inner.pending.drain(..).collect()
        };
        let count = dropped.len();
        for op in dropped {
            if let Some(tx) = op.notifier {
                let _ = tx.send(Err(OperationError::Cancelled { id: op.id.clone() }));
            }
        }
        tracing::debug!(target: "coordinator.queue", count, "queue_cleared");
        count
    }

    /// Drop completed/failed history and the timing window.
    pub fn clear_history(&self) {
        let mut inner = self.lock_inner();
        inner.completed.clear();
        inner.failed.clear();
        inner.timings.clear();
        inner.errors.clear();
    }

    // ---------------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------------

    pub fn queue_status(&self) -> QueueStatus {
        let inner = self.lock_inner();
        let (avg, min, max) = status::summarize_timings(&inner.timings);
        QueueStatus {
            pending: inner.pending.len(),
            processing: u8::from(inner.current.is_some()),
            completed: inner.completed.len(),
            failed: inner.failed.len(),
            total_processed: inner.total_processed,
            current_operation: inner.current.as_ref().map(|c| CurrentOperation {
                id: c.id.clone(),
                class: c.class,
            }),
            average_processing_time_ms: avg,
            min_processing_time_ms: min,
            max_processing_time_ms: max,
            errors: inner.errors.clone(),
        }
    }

    pub fn elk_operation_status(&self) -> ClassStatus {
        self.filtered_status(|class, _| class == OperationClass::ElkLayout)
    }

    pub fn render_operation_status(&self) -> ClassStatus {
        self.filtered_status(|class, _| class == OperationClass::Render)
    }

    pub fn application_event_status(&self) -> ClassStatus {
        self.filtered_status(|class, _| class == OperationClass::ApplicationEvent)
    }

    /// Application events of the container kinds only.
    pub fn container_operation_status(&self) -> ClassStatus {
        self.filtered_status(|class, kind| {
            class == OperationClass::ApplicationEvent
                && matches!(
                    kind,
                    Some(ApplicationEventKind::ContainerExpand)
                        | Some(ApplicationEventKind::ContainerCollapse)
                )
        })
    }

    fn filtered_status(
        &self,
        matches: impl Fn(OperationClass, Option<ApplicationEventKind>) -> bool,
    ) -> ClassStatus {
        let inner = self.lock_inner();
        ClassStatus {
            queued: inner
                .pending
                .iter()
                .filter(|op| matches(op.class, op.kind))
                .count(),
            processing: inner
                .current
                .as_ref()
                .is_some_and(|c| matches(c.class, c.kind)),
            last_completed: inner
                .completed
                .iter()
                .rev()
                .find(|r| matches(r.class, r.kind))
                .cloned(),
            last_failed: inner
                .failed
                .iter()
                .rev()
                .find(|r| matches(r.class, r.kind))
                .cloned(),
        }
    }

    pub(crate) fn record_container_failure(&self, failure: ContainerFailure) {
        self.lock_inner().last_container_failure = Some(failure);
    }

    pub(crate) fn take_container_failure(&self, container: &str) -> Option<ContainerFailure> {
        let mut inner = self.lock_inner();
        if inner
            .last_container_failure
            .as_ref()
            .is_some_and(|f| f.container == container)
        {
            inner.last_container_failure.take()
        } else {
            None
        }
    }

    // ---------------------------------------------------------------------
    // Layout + render pipeline
    // ---------------------------------------------------------------------

    /// Enqueue a layout then a render operation and wait for both.
    ///
    /// Phases: `idle → laying_out → ready → rendering → displayed`; any
    /// failure transitions to `error` and propagates to this caller only —
    /// the queue itself keeps draining. The render stage refuses to run if
    /// layout did not reach `ready`, so a failed layout cannot be papered
    /// over by a stale render.
    pub async fn execute_layout_and_render_pipeline(
        &self,
        state: &SharedState,
        engine: &SharedLayoutEngine,
        renderer: &SharedRenderer,
    ) -> Result<RenderData, CoordinatorError> {
        let slot: Arc<Mutex<Option<RenderData>>> = Arc::new(Mutex::new(None));

        let layout_thunk = make_layout_thunk(state.clone(), engine.clone());
        let (layout_id, layout_rx) = self.enqueue_watched(
            OperationClass::ElkLayout,
            None,
            Priority::Normal,
            layout_thunk,
            EnqueueOptions::default(),
        );
        let render_thunk = make_render_thunk(state.clone(), renderer.clone(), slot.clone());
        let (render_id, render_rx) = self.enqueue_watched(
            OperationClass::Render,
            None,
            Priority::Normal,
            render_thunk,
            EnqueueOptions::default(),
        );
        tracing::info!(
            target: "coordinator.pipeline",
            layout_op = %layout_id,
            render_op = %render_id,
            "pipeline_enqueued"
        );

        self.process_queue().await;

        if let Err(err) = await_completion(layout_rx, &layout_id).await {
            lock(state).set_layout_phase(LayoutPhase::Error);
            return Err(CoordinatorError::Pipeline {
                stage: "layout",
                source: err,
            });
        }
        match await_completion(render_rx, &render_id).await {
            Ok(()) => lock(&slot)
                .take()
                .ok_or(CoordinatorError::MissingRenderData),
            Err(err) => {
                lock(state).set_layout_phase(LayoutPhase::Error);
                Err(CoordinatorError::Pipeline {
                    stage: "render",
                    source: err,
                })
            }
        }
    }
}

fn make_layout_thunk(state: SharedState, engine: SharedLayoutEngine) -> OperationThunk {
    Box::new(move || {
        let state = state.clone();
        let engine = engine.clone();
        Box::pin(async move {
            let started = Instant::now();
            let mut guard = lock(&state);
            guard.set_layout_phase(LayoutPhase::LayingOut);
            if guard.should_apply_smart_collapse() {
                let outcome = guard.apply_smart_collapse(None);
                tracing::info!(
                    target: "coordinator.pipeline",
                    expanded = outcome.expanded.len(),
                    spent = outcome.cost_spent,
                    "smart_collapse_before_first_layout"
                );
            }
            lock(&engine).layout(&mut guard)?;
            guard.record_layout_duration(started.elapsed());
            guard.increment_layout_count();
            guard.set_layout_phase(LayoutPhase::Ready);
            Ok(())
        })
    })
}

fn make_render_thunk(
    state: SharedState,
    renderer: SharedRenderer,
    slot: Arc<Mutex<Option<RenderData>>>,
) -> OperationThunk {
    Box::new(move || {
        let state = state.clone();
        let renderer = renderer.clone();
        let slot = slot.clone();
        Box::pin(async move {
            let mut guard = lock(&state);
            if guard.layout_phase() != LayoutPhase::Ready {
                anyhow::bail!(
                    "layout did not reach ready (phase {}); refusing to render",
                    guard.layout_phase()
                );
            }
            guard.set_layout_phase(LayoutPhase::Rendering);
            let data = lock(&renderer).render(&guard)?;
            guard.set_layout_phase(LayoutPhase::Displayed);
            *lock(&slot) = Some(data);
            Ok(())
        })
    })
}

pub(crate) async fn await_completion(
    rx: CompletionReceiver,
    id: &str,
) -> Result<(), OperationError> {
    match rx.await {
        Ok(result) => result,
        // Sender dropped without settling: cancelled or cleared.
        Err(_) => Err(OperationError::Cancelled { id: id.to_owned() }),
    }
}

/// Test-suite convenience: an operation body that only records its
/// execution order in a shared log.
pub fn marker_thunk(log: Arc<Mutex<Vec<String>>>, tag: &str) -> OperationThunk {
    let tag = tag.to_owned();
    Box::new(move || {
        let log = log.clone();
        let tag = tag.clone();
        Box::pin(async move {
            lock(&log).push(tag);
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sequential_fifo_order() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["1", "2", "3"] {
            coordinator.enqueue(
                OperationClass::ApplicationEvent,
                marker_thunk(log.clone(), tag),
                EnqueueOptions::default(),
            );
        }
        coordinator.process_queue().await;

        assert_eq!(*lock(&log), vec!["1", "2", "3"]);
        let status = coordinator.queue_status();
        assert_eq!(status.completed, 3);
        assert_eq!(status.failed, 0);
        assert_eq!(status.pending, 0);
        assert_eq!(status.processing, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn monotone_operation_ids() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = coordinator.enqueue(
            OperationClass::Render,
            marker_thunk(log.clone(), "a"),
            EnqueueOptions::default(),
        );
        let b = coordinator.enqueue(
            OperationClass::Render,
            marker_thunk(log.clone(), "b"),
            EnqueueOptions::default(),
        );
        assert_eq!(a, "op_1");
        assert_eq!(b, "op_2");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_until_success() {
        let coordinator = OperationCoordinator::new();
        let counter = Arc::new(Mutex::new(0u32));
        let c = counter.clone();
        let thunk: OperationThunk = Box::new(move || {
            let c = c.clone();
            Box::pin(async move {
                let mut n = lock(&c);
                *n += 1;
                if *n < 3 {
                    anyhow::bail!("not yet (attempt {n})");
                }
                Ok(())
            })
        });
        coordinator.enqueue(
            OperationClass::ApplicationEvent,
            thunk,
            EnqueueOptions {
                max_retries: 3,
                ..Default::default()
            },
        );
        coordinator.process_queue().await;

        assert_eq!(*lock(&counter), 3);
        let status = coordinator.queue_status();
        assert_eq!(status.completed, 1);
        assert_eq!(status.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_is_one_failure() {
        let coordinator = OperationCoordinator::new();
        let attempts = Arc::new(Mutex::new(0u32));
        let a = attempts.clone();
        let thunk: OperationThunk = Box::new(move || {
            let a = a.clone();
            Box::pin(async move {
                *lock(&a) += 1;
                anyhow::bail!("always failing")
            })
        });
        coordinator.enqueue(
            OperationClass::ApplicationEvent,
            thunk,
            EnqueueOptions {
                max_retries: 2,
                ..Default::default()
            },
        );
        coordinator.process_queue().await;

        assert_eq!(*lock(&attempts), 3, "initial attempt plus two retries");
        let status = coordinator.queue_status();
        assert_eq!(status.completed, 0);
        assert_eq!(status.failed, 1);
        assert!(status.errors[0].contains("always failing"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_timed_out() {
        let coordinator = OperationCoordinator::new();
        let thunk: OperationThunk = Box::new(|| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(2_000)).await;
                Ok(())
            })
        });
        coordinator.enqueue(
            OperationClass::ApplicationEvent,
            thunk,
            EnqueueOptions {
                timeout: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        );
        coordinator.process_queue().await;

        let status = coordinator.queue_status();
        assert_eq!(status.failed, 1);
        assert!(status.errors[0].contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn high_priority_jumps_ahead_of_low() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        coordinator.enqueue_application_event(
            ApplicationEventKind::LayoutConfigChange,
            marker_thunk(log.clone(), "config"),
            EnqueueOptions::default(),
        );
        coordinator.enqueue_application_event(
            ApplicationEventKind::ContainerExpand,
            marker_thunk(log.clone(), "expand"),
            EnqueueOptions::default(),
        );
        coordinator.process_queue().await;

        assert_eq!(*lock(&log), vec!["expand", "config"]);
    }

    #[tokio::test(start_paused = true)]
    async fn same_priority_keeps_fifo() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["s1", "s2", "s3"] {
            coordinator.enqueue_application_event(
                ApplicationEventKind::Search,
                marker_thunk(log.clone(), tag),
                EnqueueOptions::default(),
            );
        }
        coordinator.process_queue().await;
        assert_eq!(*lock(&log), vec!["s1", "s2", "s3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_but_not_finished() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = coordinator.enqueue(
            OperationClass::ApplicationEvent,
            marker_thunk(log.clone(), "victim"),
            EnqueueOptions::default(),
        );
        assert!(coordinator.cancel(&id));
        assert!(!coordinator.cancel(&id), "second cancel is a no-op");

        coordinator.process_queue().await;
        assert!(lock(&log).is_empty());
        assert!(!coordinator.cancel(&id), "finished queue has nothing to cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_by_kind_filters() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        coordinator.enqueue_application_event(
            ApplicationEventKind::Search,
            marker_thunk(log.clone(), "search"),
            EnqueueOptions::default(),
        );
        coordinator.enqueue_application_event(
            ApplicationEventKind::LayoutConfigChange,
            marker_thunk(log.clone(), "config"),
            EnqueueOptions::default(),
        );
        assert_eq!(
            coordinator.cancel_application_events_by_kind(ApplicationEventKind::Search),
            1
        );
        coordinator.process_queue().await;
        assert_eq!(*lock(&log), vec!["config"]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_queue_keeps_history() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        coordinator.enqueue(
            OperationClass::ApplicationEvent,
            marker_thunk(log.clone(), "done"),
            EnqueueOptions::default(),
        );
        coordinator.process_queue().await;
        coordinator.enqueue(
            OperationClass::ApplicationEvent,
            marker_thunk(log.clone(), "dropped"),
            EnqueueOptions::default(),
        );
        assert_eq!(coordinator.clear_queue(), 1);

        let status = coordinator.queue_status();
        assert_eq!(status.completed, 1);
        assert_eq!(status.pending, 0);

        coordinator.clear_history();
        let status = coordinator.queue_status();
        assert_eq!(status.completed, 0);
        assert_eq!(status.total_processed, 1, "lifetime counter survives");
    }

    #[tokio::test(start_paused = true)]
    async fn per_class_status_segmentation() {
        let coordinator = OperationCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        coordinator.enqueue(
            OperationClass::Render,
            marker_thunk(log.clone(), "render"),
            EnqueueOptions::default(),
        );
        coordinator.enqueue_application_event(
            ApplicationEventKind::ContainerCollapse,
            marker_thunk(log.clone(), "collapse"),
            EnqueueOptions::default(),
        );
        coordinator.process_queue().await;

        let render = coordinator.render_operation_status();
        assert!(render.last_completed.is_some());
        assert!(render.last_failed.is_none());
        let containers = coordinator.container_operation_status();
        assert!(containers.last_completed.is_some());
        let elk = coordinator.elk_operation_status();
        assert!(elk.last_completed.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn average_processing_time_tracked() {
        let coordinator = OperationCoordinator::new();
        let thunk: OperationThunk = Box::new(|| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
        });
        coordinator.enqueue(OperationClass::Render, thunk, EnqueueOptions::default());
        coordinator.process_queue().await;
        let status = coordinator.queue_status();
        assert!(status.average_processing_time_ms >= 50.0);
    }
}
