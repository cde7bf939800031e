// # Memory Task Store
//
// In-memory implementation of TaskStore.
//
// ## Purpose
//
// Provides a fast task store that doesn't persist across restarts.
// Useful for testing and for embedding the scheduler in a process that
// re-seeds its tasks on start.
//
// ## Crash Behavior
//
// - All task state is lost on restart/crash
// - First tick after restart treats every active task as due
// - A crash mid-run cannot leave a stale running flag behind

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::TaskStoreConfig;
use crate::task::{Task, TaskId};
use crate::traits::task_store::{Completion, TaskStore, TaskStoreFactory};

/// In-memory task store implementation
///
/// All tasks live in a map protected by a RwLock; the running-flag
/// compare-and-swap happens under the write lock.
///
/// # Example
///
/// ```rust,no_run
/// use domsync_core::state::MemoryTaskStore;
/// use domsync_core::task::{Interval, Task, TaskId};
/// use domsync_core::traits::TaskStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTaskStore::new();
///     store.insert_task(&Task::new(1, "Domain sync", Interval::Daily)).await?;
///
///     assert!(store.try_mark_running(TaskId(1)).await?);
///     assert!(!store.try_mark_running(TaskId(1)).await?);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStore {
    inner: Arc<RwLock<BTreeMap<TaskId, Task>>>,
}

impl MemoryTaskStore {
    /// Create a new empty memory task store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with tasks
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id, t)).collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Get the number of tasks in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Sort tasks the way the task list shows them
pub(crate) fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| (t.sort_order, t.id));
}

/// Apply `f` to the task with `id`, or fail with NotFound
pub(crate) fn with_task<T>(
    tasks: &mut BTreeMap<TaskId, Task>,
    id: TaskId,
    f: impl FnOnce(&mut Task) -> T,
) -> Result<T, Error> {
    tasks
        .get_mut(&id)
        .map(f)
        .ok_or_else(|| Error::not_found(format!("Task {}", id)))
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, Error> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, Error> {
        let mut tasks: Vec<Task> = self.inner.read().await.values().cloned().collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn insert_task(&self, task: &Task) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(&task.id) {
            return Ok(false);
        }
        guard.insert(task.id, task.clone());
        Ok(true)
    }

    async fn try_mark_running(&self, id: TaskId) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        with_task(&mut guard, id, |task| {
            if task.is_running {
                false
            } else {
                task.is_running = true;
                true
            }
        })
    }

    async fn mark_finished(&self, id: TaskId) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        with_task(&mut guard, id, |task| task.is_running = false)
    }

    async fn record_completion(&self, id: TaskId, completion: Completion) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        with_task(&mut guard, id, |task| {
            task.last_run = Some(completion.completed_at);
            task.last_duration_secs = Some(completion.duration_secs);
            task.next_run = completion.next_run;
        })
    }

    async fn set_active(&self, id: TaskId, active: bool) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        with_task(&mut guard, id, |task| task.active = active)
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for creating MemoryTaskStore instances
pub struct MemoryTaskStoreFactory;

#[async_trait]
impl TaskStoreFactory for MemoryTaskStoreFactory {
    async fn create(&self, config: &TaskStoreConfig) -> Result<Box<dyn TaskStore>, Error> {
        match config {
            TaskStoreConfig::Memory => Ok(Box::new(MemoryTaskStore::new())),
            _ => Err(Error::config("Invalid config for MemoryTaskStoreFactory")),
        }
    }
}
