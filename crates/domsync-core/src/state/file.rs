// # File Task Store
//
// File-based implementation of TaskStore with crash recovery.
//
// ## Purpose
//
// Keeps the task table across daemon restarts without a database. Every
// mutation is written through immediately, so the running flag survives a
// crash the same way a database row would.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// Timestamps use the legacy column format, so a never-run task carries the
// sentinel rather than null.
//
// ```json
// {
//   "version": "1.0",
//   "tasks": [
//     {
//       "id": 1,
//       "name": "Domain sync",
//       "interval": "daily",
//       "expression": "0 0 * * *",
//       "last_run": "1978-01-23 00:00:00",
//       "next_run": "1978-01-23 00:00:00",
//       "active": true,
//       "is_running": false,
//       ...
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::TaskStoreConfig;
use crate::state::memory::{sort_tasks, with_task};
use crate::task::{Task, TaskId};
use crate::traits::task_store::{Completion, TaskStore, TaskStoreFactory};

/// Task file format version
const TASK_FILE_VERSION: &str = "1.0";

/// File-based task store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use domsync_core::state::FileTaskStore;
/// use domsync_core::task::{Interval, Task, TaskId};
/// use domsync_core::traits::TaskStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileTaskStore::new("/var/lib/domsync/tasks.json").await?;
///     store.insert_task(&Task::new(1, "Domain sync", Interval::Daily)).await?;
///
///     // Written to disk before returning
///     store.set_active(TaskId(1), false).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileTaskStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    tasks: BTreeMap<TaskId, Task>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TaskFileFormat {
    version: String,
    tasks: Vec<Task>,
}

impl FileTaskStore {
    /// Create or load a file task store
    ///
    /// This will:
    /// 1. Try to load the existing task file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with an empty table
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create task directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tasks = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                tasks: tasks.into_iter().map(|t| (t.id, t)).collect(),
            })),
        })
    }

    /// Load tasks with automatic recovery
    ///
    /// Only a parse failure triggers recovery; I/O errors are returned.
    async fn load_with_recovery(path: &Path) -> Result<Vec<Task>, Error> {
        let e = match Self::load(path).await {
            Ok(tasks) => {
                tracing::debug!("Loaded task file: {} tasks", tasks.len());
                return Ok(tasks);
            }
            Err(e @ Error::Parse(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!("Task file appears corrupted: {}. Attempting recovery from backup.", e);

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty task table.");
            return Ok(Vec::new());
        }

        match Self::load(&backup_path).await {
            Ok(tasks) => {
                tracing::info!("Recovered task file from backup: {} tasks", tasks.len());
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore task file from backup: {}", restore_err);
                }
                Ok(tasks)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty task table.",
                    backup_err
                );
                Ok(Vec::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<Vec<Task>, Error> {
        if !path.exists() {
            tracing::debug!("Task file does not exist: {}", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::task_store(format!("Failed to read task file {}: {}", path.display(), e))
        })?;

        let file: TaskFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::parse(format!("Failed to parse task file {}: {}", path.display(), e))
        })?;

        if file.version != TASK_FILE_VERSION {
            tracing::warn!(
                "Task file version mismatch: expected {}, got {}. Attempting to load anyway.",
                TASK_FILE_VERSION,
                file.version
            );
        }

        Ok(file.tasks)
    }

    /// Write the current table to disk atomically
    async fn write_state(&self) -> Result<(), Error> {
        let state_guard = self.state.write().await;
        self.persist(&state_guard.tasks).await
    }

    /// Write `tasks` with write-then-rename
    ///
    /// Callers hold the state lock so concurrent writes land in order.
    async fn persist(&self, tasks: &BTreeMap<TaskId, Task>) -> Result<(), Error> {
        let mut tasks: Vec<Task> = tasks.values().cloned().collect();
        sort_tasks(&mut tasks);
        let file = TaskFileFormat {
            version: TASK_FILE_VERSION.to_string(),
            tasks,
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::task_store(format!("Failed to serialize tasks: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut f = fs::File::create(&temp_path).await.map_err(|e| {
                Error::task_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            f.write_all(json.as_bytes()).await.map_err(|e| {
                Error::task_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            f.flush().await.map_err(|e| {
                Error::task_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::task_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Task file written: {}", self.path.display());
        Ok(())
    }

    /// Mutate one task and write through
    ///
    /// The change is applied to a copy and only becomes visible once the
    /// copy is on disk, so a failed write leaves the table untouched.
    async fn update<T>(&self, id: TaskId, f: impl FnOnce(&mut Task) -> T) -> Result<T, Error> {
        let mut state_guard = self.state.write().await;
        let mut tasks = state_guard.tasks.clone();
        let result = with_task(&mut tasks, id, f)?;
        self.persist(&tasks).await?;
        state_guard.tasks = tasks;
        Ok(result)
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Force immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        self.write_state().await
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, Error> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, Error> {
        let mut tasks: Vec<Task> = self.state.read().await.tasks.values().cloned().collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn insert_task(&self, task: &Task) -> Result<bool, Error> {
        let mut state_guard = self.state.write().await;
        if state_guard.tasks.contains_key(&task.id) {
            return Ok(false);
        }
        let mut tasks = state_guard.tasks.clone();
        tasks.insert(task.id, task.clone());
        self.persist(&tasks).await?;
        state_guard.tasks = tasks;
        Ok(true)
    }

    async fn try_mark_running(&self, id: TaskId) -> Result<bool, Error> {
        let already_running = {
            let state_guard = self.state.read().await;
            state_guard
                .tasks
                .get(&id)
                .map(|task| task.is_running)
                .ok_or_else(|| Error::not_found(format!("Task {}", id)))?
        };
        if already_running {
            return Ok(false);
        }

        self.update(id, |task| {
            if task.is_running {
                false
            } else {
                task.is_running = true;
                true
            }
        })
        .await
    }

    async fn mark_finished(&self, id: TaskId) -> Result<(), Error> {
        self.update(id, |task| task.is_running = false).await
    }

    async fn record_completion(&self, id: TaskId, completion: Completion) -> Result<(), Error> {
        self.update(id, |task| {
            task.last_run = Some(completion.completed_at);
            task.last_duration_secs = Some(completion.duration_secs);
            task.next_run = completion.next_run;
        })
        .await
    }

    async fn set_active(&self, id: TaskId, active: bool) -> Result<(), Error> {
        self.update(id, |task| task.active = active).await
    }

    async fn flush(&self) -> Result<(), Error> {
        self.write_state().await
    }
}

/// Factory for creating FileTaskStore instances
pub struct FileTaskStoreFactory;

#[async_trait]
impl TaskStoreFactory for FileTaskStoreFactory {
    async fn create(&self, config: &TaskStoreConfig) -> Result<Box<dyn TaskStore>, Error> {
        match config {
            TaskStoreConfig::File { path } => Ok(Box::new(FileTaskStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for FileTaskStoreFactory")),
        }
    }
}
