use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, FailureKind};

use super::types::{DispatchStats, TaskError, TaskRecord, TaskStatus, TaskSummary, TaskView};

/// Bounded-pool task registry.
///
/// `submit` never blocks: it records a Pending task, spawns a worker that
/// first waits for one of `max_workers` slots, and returns the task id
/// immediately. Callers poll `status` until a terminal state. Terminal views
/// are immutable; re-reads return the identical payload.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    tasks: Mutex<HashMap<Uuid, TaskRecord>>,
    slots: Arc<Semaphore>,
    max_workers: usize,
    retention: Duration,
    accepting: AtomicBool,
}

impl TaskRegistry {
    /// Create the registry and start its background sweep. Must be called
    /// from within a tokio runtime.
    pub fn new(cfg: &DispatchConfig) -> Self {
        let inner = Arc::new(RegistryInner {
            tasks: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(cfg.max_workers.max(1))),
            max_workers: cfg.max_workers.max(1),
            retention: Duration::from_secs(cfg.retention_secs),
            accepting: AtomicBool::new(true),
        });

        let sweep_interval = Duration::from_secs(cfg.sweep_interval_secs.max(1));
        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.accepting.load(Ordering::Relaxed) {
                    break;
                }
                let removed = Self::sweep(&inner);
                if removed > 0 {
                    tracing::debug!(removed, "swept old completed tasks");
                }
            }
        });

        tracing::info!(max_workers = cfg.max_workers, "task registry initialized");
        Self { inner }
    }

    /// Submit a unit of work. Returns its id without waiting for a worker
    /// slot.
    pub fn submit<F>(&self, label: &str, work: F) -> Result<Uuid, DispatchError>
    where
        F: Future<Output = Result<serde_json::Value, TaskError>> + Send + 'static,
    {
        if !self.inner.accepting.load(Ordering::Relaxed) {
            return Err(DispatchError::ShuttingDown);
        }

        let id = Uuid::new_v4();
        {
            let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.insert(id, TaskRecord::new(label.to_string()));
        }
        tracing::debug!(task_id = %id, label, "task submitted");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _permit = match inner.slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            // Claim the slot only if the task was not cancelled (or swept)
            // while it waited.
            {
                let mut tasks = inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
                match tasks.get_mut(&id) {
                    Some(record) if record.status == TaskStatus::Pending => {
                        record.status = TaskStatus::Running;
                        record.started_at = Some(Utc::now());
                    }
                    _ => return,
                }
            }

            let outcome = std::panic::AssertUnwindSafe(work).catch_unwind().await;

            let mut tasks = inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
            let Some(record) = tasks.get_mut(&id) else {
                return;
            };
            record.completed_at = Some(Utc::now());
            record.completed_mono = Some(Instant::now());
            match outcome {
                Ok(Ok(value)) => {
                    record.status = TaskStatus::Success;
                    record.result = Some(value);
                    tracing::debug!(task_id = %id, "task succeeded");
                }
                Ok(Err(error)) => {
                    tracing::warn!(task_id = %id, kind = %error.kind, "task failed: {}", error.message);
                    record.status = TaskStatus::Failure;
                    record.error = Some(error);
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(task_id = %id, "task panicked: {message}");
                    record.status = TaskStatus::Failure;
                    record.error = Some(TaskError {
                        kind: FailureKind::Execution.as_str().to_string(),
                        message: format!("job panicked: {message}"),
                    });
                }
            }
        });

        Ok(id)
    }

    /// Poll one task.
    pub fn status(&self, id: Uuid) -> Result<TaskView, DispatchError> {
        let tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let record = tasks.get(&id).ok_or(DispatchError::TaskNotFound(id))?;

        let view = if record.status.is_terminal() {
            TaskView {
                id,
                status: record.status,
                label: record.label.clone(),
                started_at: record.started_at,
                completed_at: record.completed_at,
                elapsed_secs: None,
                duration_secs: record
                    .completed_mono
                    .map(|done| done.duration_since(record.created_mono).as_secs_f64()),
                result: record.result.clone(),
                error: record.error.clone(),
            }
        } else {
            TaskView {
                id,
                status: record.status,
                label: record.label.clone(),
                started_at: record.started_at,
                completed_at: None,
                elapsed_secs: Some(record.created_mono.elapsed().as_secs_f64()),
                duration_secs: None,
                result: None,
                error: None,
            }
        };
        Ok(view)
    }

    /// Attempt cooperative cancellation. Succeeds only while the task is
    /// still Pending; a running task proceeds to its natural outcome.
    pub fn cancel(&self, id: Uuid) -> bool {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        match tasks.get_mut(&id) {
            Some(record) if record.status == TaskStatus::Pending => {
                record.status = TaskStatus::Cancelled;
                record.completed_at = Some(Utc::now());
                record.completed_mono = Some(Instant::now());
                tracing::debug!(task_id = %id, "task cancelled");
                true
            }
            _ => false,
        }
    }

    /// Status of all tracked tasks.
    pub fn list(&self) -> Vec<TaskSummary> {
        let tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks
            .iter()
            .map(|(id, record)| TaskSummary {
                id: *id,
                status: record.status,
                label: record.label.clone(),
                created_at: record.created_at,
                age_secs: record.created_mono.elapsed().as_secs_f64(),
            })
            .collect()
    }

    pub fn stats(&self) -> DispatchStats {
        let tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut by_status: HashMap<&'static str, usize> = HashMap::new();
        for record in tasks.values() {
            *by_status.entry(record.status.as_str()).or_insert(0) += 1;
        }
        DispatchStats {
            total_tasks: tasks.len(),
            by_status,
            active_workers: self.inner.max_workers - self.inner.slots.available_permits(),
            max_workers: self.inner.max_workers,
        }
    }

    /// Drop terminal tasks past the retention window (Cancelled ones
    /// immediately). Returns the number removed. The background sweep calls
    /// this on its interval; it is public for operational use.
    pub fn remove_expired(&self) -> usize {
        Self::sweep(&self.inner)
    }

    /// Stop accepting new submissions and halt the sweeper. In-flight tasks
    /// run to completion and stay pollable.
    pub fn shutdown(&self) {
        self.inner.accepting.store(false, Ordering::Relaxed);
        tracing::info!("task registry shutting down");
    }

    fn sweep(inner: &RegistryInner) -> usize {
        let now = Instant::now();
        let retention = inner.retention;
        let mut tasks = inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let before = tasks.len();
        tasks.retain(|_, record| match record.status {
            TaskStatus::Cancelled => false,
            TaskStatus::Success | TaskStatus::Failure => record
                .completed_mono
                .map(|done| now.duration_since(done) < retention)
                .unwrap_or(true),
            _ => true,
        });
        before - tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    fn test_cfg(max_workers: usize) -> DispatchConfig {
        DispatchConfig {
            max_workers,
            sweep_interval_secs: 300,
            retention_secs: 3600,
        }
    }

    async fn wait_for_terminal(registry: &TaskRegistry, id: Uuid) -> TaskView {
        loop {
            let view = registry.status(id).expect("task known");
            if view.status.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn submit_runs_to_success_with_result() {
        let registry = TaskRegistry::new(&test_cfg(2));
        let id = registry
            .submit("analyze_section", async {
                Ok(serde_json::json!({"feedback_count": 3}))
            })
            .expect("submit");

        let view = wait_for_terminal(&registry, id).await;
        assert_eq!(view.status, TaskStatus::Success);
        assert_eq!(view.label, "analyze_section");
        assert_eq!(view.result, Some(serde_json::json!({"feedback_count": 3})));
        assert!(view.duration_secs.is_some());
    }

    #[tokio::test]
    async fn failure_keeps_error_kind_and_message() {
        let registry = TaskRegistry::new(&test_cfg(2));
        let id = registry
            .submit("analyze_section", async {
                Err(TaskError {
                    kind: "THROTTLED".to_string(),
                    message: "upstream throttled".to_string(),
                })
            })
            .expect("submit");

        let view = wait_for_terminal(&registry, id).await;
        assert_eq!(view.status, TaskStatus::Failure);
        let error = view.error.expect("error stored");
        assert_eq!(error.kind, "THROTTLED");
        assert_eq!(error.message, "upstream throttled");
    }

    #[tokio::test]
    async fn panicking_job_is_captured_as_failure() {
        let registry = TaskRegistry::new(&test_cfg(2));
        let id = registry
            .submit("explode", async {
                panic!("boom");
            })
            .expect("submit");

        let view = wait_for_terminal(&registry, id).await;
        assert_eq!(view.status, TaskStatus::Failure);
        let error = view.error.expect("error stored");
        assert_eq!(error.kind, "EXECUTION_ERROR");
        assert!(error.message.contains("boom"));
    }

    #[tokio::test]
    async fn terminal_views_are_idempotent() {
        let registry = TaskRegistry::new(&test_cfg(2));
        let id = registry
            .submit("stable", async { Ok(serde_json::json!("done")) })
            .expect("submit");

        let first = wait_for_terminal(&registry, id).await;
        for _ in 0..100 {
            let again = registry.status(id).expect("still known");
            assert_eq!(again.status, first.status);
            assert_eq!(again.result, first.result);
            assert_eq!(again.duration_secs, first.duration_secs);
            assert_eq!(again.completed_at, first.completed_at);
        }
    }

    #[tokio::test]
    async fn cancel_before_start_wins_after_start_loses() {
        // One worker slot: the second task stays Pending while the first
        // holds the slot.
        let registry = TaskRegistry::new(&test_cfg(1));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let running = registry
            .submit("holder", async move {
                let _ = release_rx.await;
                Ok(serde_json::json!(null))
            })
            .expect("submit");
        // Let the holder claim the slot.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!registry.cancel(running), "running task must not cancel");

        let queued = registry
            .submit("queued", async { Ok(serde_json::json!(null)) })
            .expect("submit");
        assert!(registry.cancel(queued), "pending task should cancel");
        let view = registry.status(queued).expect("known");
        assert_eq!(view.status, TaskStatus::Cancelled);

        release_tx.send(()).ok();
        let view = wait_for_terminal(&registry, running).await;
        assert_eq!(view.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn worker_pool_is_bounded() {
        let registry = TaskRegistry::new(&test_cfg(2));
        let peak = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));

        let mut ids = Vec::new();
        for _ in 0..6 {
            let peak = peak.clone();
            let live = live.clone();
            let id = registry
                .submit("bounded", async move {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    live.fetch_sub(1, Ordering::SeqCst);
                    Ok(serde_json::json!(null))
                })
                .expect("submit");
            ids.push(id);
        }

        for id in ids {
            wait_for_terminal(&registry, id).await;
        }
        assert!(peak.load(Ordering::SeqCst) <= 2, "pool exceeded its bound");
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_old_terminal_tasks() {
        // Long sweep interval keeps the background sweeper out of the way so
        // the test drives expiry itself.
        let registry = TaskRegistry::new(&DispatchConfig {
            max_workers: 2,
            sweep_interval_secs: 100_000,
            retention_secs: 3600,
        });
        let id = registry
            .submit("old", async { Ok(serde_json::json!(null)) })
            .expect("submit");
        let view = wait_for_terminal(&registry, id).await;
        assert_eq!(view.status, TaskStatus::Success);

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert_eq!(registry.remove_expired(), 0, "inside retention");

        tokio::time::advance(Duration::from_secs(1801)).await;
        assert_eq!(registry.remove_expired(), 1);
        assert!(
            matches!(registry.status(id), Err(DispatchError::TaskNotFound(_))),
            "swept task polls as not found"
        );
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let registry = TaskRegistry::new(&test_cfg(4));
        let a = registry
            .submit("a", async { Ok(serde_json::json!(null)) })
            .expect("submit");
        let b = registry
            .submit("b", async {
                Err(TaskError {
                    kind: "EXECUTION_ERROR".to_string(),
                    message: "nope".to_string(),
                })
            })
            .expect("submit");
        wait_for_terminal(&registry, a).await;
        wait_for_terminal(&registry, b).await;

        let stats = registry.stats();
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.by_status.get("SUCCESS"), Some(&1));
        assert_eq!(stats.by_status.get("FAILURE"), Some(&1));
        assert_eq!(stats.max_workers, 4);
        assert_eq!(stats.active_workers, 0);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_submissions() {
        let registry = TaskRegistry::new(&test_cfg(2));
        registry.shutdown();
        let err = registry
            .submit("late", async { Ok(serde_json::json!(null)) })
            .expect_err("should be rejected");
        assert_eq!(err, DispatchError::ShuttingDown);
    }
}
