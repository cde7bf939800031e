// # Task Store Trait
//
// Defines the interface for durable task state (the `scheduler` table).
//
// ## Purpose
//
// The task store tracks, per task:
// - schedule identity (name, interval class, cron expression, sort order)
// - last run, last duration, next run
// - the `active` switch and the `is_running` mutual-exclusion flag
//
// ## Implementations
//
// - In-memory: `MemoryTaskStore`
// - JSON file: `FileTaskStore`
// - SQLite: `SqliteTaskStore` (feature `sqlite`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::task::{Task, TaskId};

/// Timing written when a run completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Completion time, becomes `last_run`
    pub completed_at: DateTime<Utc>,
    /// Seconds the run took, becomes `last_duration`
    pub duration_secs: u64,
    /// Next fire time; `None` leaves the task unscheduled
    pub next_run: Option<DateTime<Utc>>,
}

/// Trait for task store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Mutual Exclusion
///
/// [`try_mark_running`](TaskStore::try_mark_running) is the only way to set
/// `is_running`. It must be a single atomic conditional update
/// (`SET is_running = 1 WHERE id = ? AND is_running = 0`), never a read
/// followed by a write, so two concurrent triggers cannot both start the
/// same task.
///
/// # Implementation Guidelines
///
/// - **No business logic**: due-ness and scheduling belong to `Scheduler`
/// - **Ordering**: `list_tasks` returns tasks by `sort_order`, then id
/// - **Never delete**: tasks are seeded and mutated, not removed
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Get a task by id
    ///
    /// - `Ok(Some(Task))`: The task
    /// - `Ok(None)`: No such task
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, crate::Error>;

    /// All tasks ordered by `sort_order`
    async fn list_tasks(&self) -> Result<Vec<Task>, crate::Error>;

    /// Insert a task unless one with the same id exists
    ///
    /// Returns `true` if the task was inserted.
    async fn insert_task(&self, task: &Task) -> Result<bool, crate::Error>;

    /// Atomically flip `is_running` from false to true
    ///
    /// - `Ok(true)`: This caller now owns the run
    /// - `Ok(false)`: The task was already running
    /// - `Err(NotFound)`: No such task
    async fn try_mark_running(&self, id: TaskId) -> Result<bool, crate::Error>;

    /// Clear `is_running` (idempotent)
    async fn mark_finished(&self, id: TaskId) -> Result<(), crate::Error>;

    /// Persist `last_run`, `last_duration` and `next_run`
    async fn record_completion(&self, id: TaskId, completion: Completion) -> Result<(), crate::Error>;

    /// Set the `active` flag without touching anything else
    async fn set_active(&self, id: TaskId, active: bool) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing task stores from configuration
#[async_trait]
pub trait TaskStoreFactory: Send + Sync {
    /// Create a TaskStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::TaskStoreConfig,
    ) -> Result<Box<dyn TaskStore>, crate::Error>;
}
