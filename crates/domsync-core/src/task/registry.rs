//! Task registry
//!
//! Thin, typed front for a [`TaskStore`]: single-task reads that fail on a
//! missing id, seeding, running-flag acquisition through [`RunLease`], and
//! completion timing.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::task::{Task, TaskId};
use crate::traits::{Completion, TaskStore};
use crate::{Error, Result};

/// Render a run duration: `Xm Ys` when there is at least one minute, else `Ys`
pub fn format_duration(seconds: u64) -> String {
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Registry of recurring tasks
#[derive(Clone)]
pub struct TaskRegistry {
    store: Arc<dyn TaskStore>,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Get a task by id; a missing task is an error
    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Task {}", id)))
    }

    /// All tasks in display/execution order
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_tasks().await
    }

    /// Insert the known task set, leaving existing rows untouched
    ///
    /// Returns the number of tasks inserted.
    pub async fn seed(&self, tasks: &[Task]) -> Result<usize> {
        let mut inserted = 0;
        for task in tasks {
            if self.store.insert_task(task).await? {
                debug!("Seeded task {} ({})", task.id, task.name);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Set the running flag
    ///
    /// Returns `false` if the task was already running; the flag is left set
    /// either way.
    pub async fn mark_running(&self, id: TaskId) -> Result<bool> {
        self.store.try_mark_running(id).await
    }

    /// Clear the running flag (idempotent)
    pub async fn mark_finished(&self, id: TaskId) -> Result<()> {
        self.store.mark_finished(id).await
    }

    /// Acquire the running flag as a lease
    ///
    /// - `Ok(Some(lease))`: This caller owns the run until the lease is released
    /// - `Ok(None)`: Another run holds the flag
    pub async fn acquire(&self, id: TaskId) -> Result<Option<RunLease>> {
        if self.store.try_mark_running(id).await? {
            Ok(Some(RunLease {
                store: Arc::clone(&self.store),
                id,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    /// Record a finished run
    ///
    /// "Now" is captured as the completion time; `last_run` becomes now and
    /// `last_duration` becomes `now - started_at`.
    pub async fn record_completion(
        &self,
        id: TaskId,
        started_at: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<Completion> {
        let completed_at = Utc::now();
        let duration_secs = u64::try_from(completed_at.signed_duration_since(started_at).num_seconds())
            .unwrap_or(0);

        let completion = Completion {
            completed_at,
            duration_secs,
            next_run,
        };
        self.store.record_completion(id, completion).await?;
        Ok(completion)
    }

    /// Set the `active` flag
    pub async fn set_active(&self, id: TaskId, active: bool) -> Result<()> {
        self.store.set_active(id, active).await
    }

    /// Flush the underlying store
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}

/// Ownership of a task's running flag
///
/// Call [`release`](RunLease::release) on every exit path. If a lease is
/// dropped unreleased (panic, cancelled future) the flag is cleared from a
/// spawned task on the current runtime.
pub struct RunLease {
    store: Arc<dyn TaskStore>,
    id: TaskId,
    released: bool,
}

impl RunLease {
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Clear the running flag
    ///
    /// The lease only counts as released once the store confirms; on error
    /// the drop path retries.
    pub async fn release(mut self) -> Result<()> {
        self.store.mark_finished(self.id).await?;
        self.released = true;
        Ok(())
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = Arc::clone(&self.store);
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Run lease for task {} dropped unreleased, clearing flag", id);
                handle.spawn(async move {
                    if let Err(e) = store.mark_finished(id).await {
                        tracing::error!("Failed to clear running flag for task {}: {}", id, e);
                    }
                });
            }
            Err(_) => {
                tracing::error!("Run lease for task {} dropped outside a runtime; flag left set", id);
            }
        }
    }
}
