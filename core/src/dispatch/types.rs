use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::JobError;

/// Task lifecycle states. Transitions are one-directional:
/// Pending → Running → Success | Failure, or Pending → Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failure,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Cancelled)
    }
}

/// Failure payload stored verbatim on the task record.
#[derive(Debug, Clone, Serialize)]
pub struct TaskError {
    /// Stable kind string, e.g. "THROTTLED" or "EXECUTION_ERROR".
    pub kind: String,
    pub message: String,
}

impl From<JobError> for TaskError {
    fn from(err: JobError) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
        }
    }
}

/// Internal task record, owned exclusively by the registry.
///
/// Wall-clock timestamps are kept for display; monotonic instants drive
/// elapsed/duration arithmetic and retention.
pub(crate) struct TaskRecord {
    pub label: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub created_mono: Instant,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_mono: Option<Instant>,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskError>,
}

impl TaskRecord {
    pub fn new(label: String) -> Self {
        Self {
            label,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            created_mono: Instant::now(),
            started_at: None,
            completed_at: None,
            completed_mono: None,
            result: None,
            error: None,
        }
    }
}

/// Poll response for one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: Uuid,
    pub status: TaskStatus,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds since submission, for non-terminal tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    /// Submission-to-completion seconds, for terminal tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

/// One row in the task listing.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub status: TaskStatus,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub age_secs: f64,
}

/// Registry-level statistics.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStats {
    pub total_tasks: usize,
    pub by_status: HashMap<&'static str, usize>,
    pub active_workers: usize,
    pub max_workers: usize,
}
