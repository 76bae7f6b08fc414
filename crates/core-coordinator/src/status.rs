//! Queue and per-class status snapshots.
//!
//! Everything here is a serializable DTO so diagnostics can be dumped as
//! JSON. Snapshots are cheap copies of the coordinator's accounting; they
//! never expose live queue internals.

use std::time::Duration;

use serde::Serialize;

use crate::operation::{ApplicationEventKind, OperationClass};

/// Completed/failed operation record kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    pub id: String,
    pub class: OperationClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ApplicationEventKind>,
    /// Time spent pending between enqueue and first attempt.
    pub queued_ms: u64,
    /// Wall time from first attempt to terminal outcome, retries included.
    pub duration_ms: u64,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentOperation {
    pub id: String,
    pub class: OperationClass,
}

/// Whole-queue snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    /// 0 or 1 — the queue is strictly serial.
    pub processing: u8,
    pub completed: usize,
    pub failed: usize,
    pub total_processed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_operation: Option<CurrentOperation>,
    /// Mean over the rolling window of recent completions.
    pub average_processing_time_ms: f64,
    pub min_processing_time_ms: u64,
    pub max_processing_time_ms: u64,
    /// Failure messages, oldest first.
    pub errors: Vec<String>,
}

/// Snapshot filtered to one operation class (or the container subset).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatus {
    pub queued: usize,
    pub processing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<OperationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failed: Option<OperationRecord>,
}

pub(crate) fn summarize_timings(timings: &std::collections::VecDeque<Duration>) -> (f64, u64, u64) {
    if timings.is_empty() {
        return (0.0, 0, 0);
    }
    let total: Duration = timings.iter().sum();
    let avg = total.as_secs_f64() * 1000.0 / timings.len() as f64;
    let min = timings.iter().min().map(|d| d.as_millis() as u64).unwrap_or(0);
    let max = timings.iter().max().map(|d| d.as_millis() as u64).unwrap_or(0);
    (avg, min, max)
}
