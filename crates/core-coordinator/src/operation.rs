//! Operation envelope: classes, priorities, thunks, and wire errors.
//!
//! Operation kinds are a tagged variant with one shared envelope rather than
//! a trait hierarchy — status segmentation and priority only ever switch on
//! the class, so dynamic dispatch would buy nothing but indirection.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Coarse kind of a queued operation. The wire names are stable identifiers
/// consumed by status surfaces and logs; serialization uses them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationClass {
    #[serde(rename = "elk_layout")]
    ElkLayout,
    #[serde(rename = "reactflow_render")]
    Render,
    #[serde(rename = "application_event")]
    ApplicationEvent,
    #[serde(rename = "render_config_update")]
    RenderConfigUpdate,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::ElkLayout => "elk_layout",
            OperationClass::Render => "reactflow_render",
            OperationClass::ApplicationEvent => "application_event",
            OperationClass::RenderConfigUpdate => "render_config_update",
        }
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of application events. Kind decides queue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEventKind {
    ContainerExpand,
    ContainerCollapse,
    Search,
    LayoutConfigChange,
}

impl ApplicationEventKind {
    pub fn priority(&self) -> Priority {
        match self {
            ApplicationEventKind::ContainerExpand | ApplicationEventKind::ContainerCollapse => {
                Priority::High
            }
            ApplicationEventKind::Search => Priority::Normal,
            ApplicationEventKind::LayoutConfigChange => Priority::Low,
        }
    }
}

/// Queue priority. Higher sorts ahead of lower among *pending* operations;
/// nothing ever preempts the operation already executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Per-class timeout defaults, all overridable per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutDefaults {
    pub layout: Duration,
    pub render: Duration,
    pub application_event: Duration,
    pub render_config: Duration,
    /// Container expand/collapse façade operations.
    pub tree_op: Duration,
}

impl Default for TimeoutDefaults {
    fn default() -> Self {
        Self {
            layout: Duration::from_millis(10_000),
            render: Duration::from_millis(5_000),
            application_event: Duration::from_millis(5_000),
            render_config: Duration::from_millis(3_000),
            tree_op: Duration::from_millis(3_000),
        }
    }
}

impl TimeoutDefaults {
    pub(crate) fn for_class(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::ElkLayout => self.layout,
            OperationClass::Render => self.render,
            OperationClass::ApplicationEvent => self.application_event,
            OperationClass::RenderConfigUpdate => self.render_config,
        }
    }
}

/// Per-operation knobs accepted at enqueue time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Deadline for one attempt; defaults to the class timeout.
    pub timeout: Option<Duration>,
    /// Additional attempts after the first failure. Default 0.
    pub max_retries: u32,
}

pub type OperationFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The operation body. `FnMut` so retry attempts can re-invoke it.
pub type OperationThunk = Box<dyn FnMut() -> OperationFuture + Send>;

/// Terminal outcome of a failed operation, as recorded and surfaced.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// Deadline expired. The attempt's future was dropped; whatever it
    /// committed before its last yield point stands, its result is
    /// discarded.
    #[error("operation {id} timed out after {after_ms} ms")]
    Timeout { id: String, after_ms: u64 },
    #[error("operation {id} failed: {detail}")]
    Failed { id: String, detail: String },
    #[error("operation {id} cancelled before execution")]
    Cancelled { id: String },
}

impl OperationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OperationError::Timeout { .. })
    }
}

pub(crate) type CompletionSender = oneshot::Sender<Result<(), OperationError>>;
pub(crate) type CompletionReceiver = oneshot::Receiver<Result<(), OperationError>>;

/// Envelope for one queued operation.
pub(crate) struct QueuedOperation {
    pub id: String,
    pub class: OperationClass,
    pub kind: Option<ApplicationEventKind>,
    pub priority: Priority,
    pub thunk: OperationThunk,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_count: u32,
    pub created_at: Instant,
    /// Interested caller (façade, pipeline) awaiting this operation.
    pub notifier: Option<CompletionSender>,
}

impl std::fmt::Debug for QueuedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedOperation")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_stable() {
        assert_eq!(OperationClass::ElkLayout.as_str(), "elk_layout");
        assert_eq!(OperationClass::Render.as_str(), "reactflow_render");
        assert_eq!(
            OperationClass::ApplicationEvent.as_str(),
            "application_event"
        );
        assert_eq!(
            OperationClass::RenderConfigUpdate.as_str(),
            "render_config_update"
        );
    }

    #[test]
    fn container_events_outrank_search_outranks_config() {
        assert!(
            ApplicationEventKind::ContainerExpand.priority()
                > ApplicationEventKind::Search.priority()
        );
        assert!(
            ApplicationEventKind::Search.priority()
                > ApplicationEventKind::LayoutConfigChange.priority()
        );
    }

    #[test]
    fn timeout_error_message_contains_timed_out() {
        let err = OperationError::Timeout {
            id: "op_1".into(),
            after_ms: 100,
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.is_timeout());
    }
}
