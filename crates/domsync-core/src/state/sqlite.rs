//! SQLite-backed task store
//!
//! Rows live in the `scheduler` table with the legacy column formats:
//! timestamps are `YYYY-MM-DD HH:MM:SS` text with the sentinel for "never",
//! flags are `0`/`1` integers. The running flag is acquired with a single
//! conditional `UPDATE`, which makes the compare-and-swap atomic across
//! processes sharing the database file.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;
use tracing::info;

use crate::config::TaskStoreConfig;
use crate::legacy;
use crate::task::{Interval, Task, TaskId};
use crate::traits::task_store::{Completion, TaskStore, TaskStoreFactory};
use crate::{Error, Result};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scheduler (
    id            INTEGER PRIMARY KEY,
    name          TEXT    NOT NULL,
    description   TEXT    NOT NULL DEFAULT '',
    interval      TEXT    NOT NULL,
    expression    TEXT    NOT NULL,
    last_run      TEXT    NOT NULL DEFAULT '1978-01-23 00:00:00',
    last_duration INTEGER,
    next_run      TEXT    NOT NULL DEFAULT '1978-01-23 00:00:00',
    sort_order    INTEGER NOT NULL DEFAULT 0,
    is_running    INTEGER NOT NULL DEFAULT 0,
    active        INTEGER NOT NULL DEFAULT 1
)
"#;

const SELECT_COLUMNS: &str = "SELECT id, name, description, interval, expression, last_run, \
     last_duration, next_run, sort_order, is_running, active FROM scheduler";

fn db_err(e: sqlx::Error) -> Error {
    Error::task_store(format!("SQLite error: {}", e))
}

/// Task store over a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Connect to `url` and create the `scheduler` table if missing
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to task database: {}", url);

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::config(format!("Invalid SQLite URL '{}': {}", url, e)))?
            .create_if_missing(true);

        // Every connection to `:memory:` is its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(db_err)?;

        Ok(Self { pool })
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn task_from_row(row: &SqliteRow) -> Result<Task> {
        let get_str = |col: &str| -> Result<String> { row.try_get::<String, _>(col).map_err(db_err) };

        let id: i64 = row.try_get("id").map_err(db_err)?;
        let id = u32::try_from(id).map_err(|_| Error::parse(format!("Task id out of range: {}", id)))?;
        let last_duration: Option<i64> = row.try_get("last_duration").map_err(db_err)?;

        Ok(Task {
            id: TaskId(id),
            name: get_str("name")?,
            description: get_str("description")?,
            interval: Interval::from_str(&get_str("interval")?)?,
            expression: get_str("expression")?,
            last_run: legacy::decode_timestamp(&get_str("last_run")?)?,
            last_duration_secs: last_duration.and_then(|d| u64::try_from(d).ok()),
            next_run: legacy::decode_timestamp(&get_str("next_run")?)?,
            sort_order: row.try_get::<i32, _>("sort_order").map_err(db_err)?,
            is_running: row.try_get::<i64, _>("is_running").map_err(db_err)? != 0,
            active: row.try_get::<i64, _>("active").map_err(db_err)? != 0,
        })
    }

    /// Fail with NotFound when no row was touched
    fn ensure_affected(id: TaskId, rows_affected: u64) -> Result<()> {
        if rows_affected == 0 {
            return Err(Error::not_found(format!("Task {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(i64::from(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::task_from_row).transpose()
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!("{} ORDER BY sort_order, id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(Self::task_from_row).collect()
    }

    async fn insert_task(&self, task: &Task) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO scheduler
                (id, name, description, interval, expression, last_run, last_duration,
                 next_run, sort_order, is_running, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(i64::from(task.id.0))
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.interval.as_str())
        .bind(&task.expression)
        .bind(legacy::encode_timestamp(task.last_run))
        .bind(task.last_duration_secs.and_then(|d| i64::try_from(d).ok()))
        .bind(legacy::encode_timestamp(task.next_run))
        .bind(task.sort_order)
        .bind(i64::from(task.is_running))
        .bind(i64::from(task.active))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_mark_running(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("UPDATE scheduler SET is_running = 1 WHERE id = ? AND is_running = 0")
            .bind(i64::from(id.0))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish "already running" from "no such task"
        match self.get_task(id).await? {
            Some(_) => Ok(false),
            None => Err(Error::not_found(format!("Task {}", id))),
        }
    }

    async fn mark_finished(&self, id: TaskId) -> Result<()> {
        let result = sqlx::query("UPDATE scheduler SET is_running = 0 WHERE id = ?")
            .bind(i64::from(id.0))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Self::ensure_affected(id, result.rows_affected())
    }

    async fn record_completion(&self, id: TaskId, completion: Completion) -> Result<()> {
        let result = sqlx::query(
            "UPDATE scheduler SET last_run = ?, last_duration = ?, next_run = ? WHERE id = ?",
        )
        .bind(legacy::encode_timestamp(Some(completion.completed_at)))
        .bind(i64::try_from(completion.duration_secs).unwrap_or(i64::MAX))
        .bind(legacy::encode_timestamp(completion.next_run))
        .bind(i64::from(id.0))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Self::ensure_affected(id, result.rows_affected())
    }

    async fn set_active(&self, id: TaskId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE scheduler SET active = ? WHERE id = ?")
            .bind(i64::from(active))
            .bind(i64::from(id.0))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Self::ensure_affected(id, result.rows_affected())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating SqliteTaskStore instances
pub struct SqliteTaskStoreFactory;

#[async_trait]
impl TaskStoreFactory for SqliteTaskStoreFactory {
    async fn create(&self, config: &TaskStoreConfig) -> Result<Box<dyn TaskStore>> {
        match config {
            TaskStoreConfig::Sqlite { url } => Ok(Box::new(SqliteTaskStore::connect(url).await?)),
            _ => Err(Error::config("Invalid config for SqliteTaskStoreFactory")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        let task = Task::new(1, "Domain sync", Interval::Daily)
            .with_description("Refresh registrar data")
            .with_sort_order(10);

        assert!(store.insert_task(&task).await.unwrap());
        assert!(!store.insert_task(&task).await.unwrap());

        assert_eq!(store.get_task(TaskId(1)).await.unwrap(), Some(task));
        assert_eq!(store.get_task(TaskId(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conditional_update_is_exclusive() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        store
            .insert_task(&Task::new(1, "Domain sync", Interval::Daily))
            .await
            .unwrap();

        assert!(store.try_mark_running(TaskId(1)).await.unwrap());
        assert!(!store.try_mark_running(TaskId(1)).await.unwrap());
        store.mark_finished(TaskId(1)).await.unwrap();
        assert!(store.try_mark_running(TaskId(1)).await.unwrap());

        assert!(matches!(
            store.try_mark_running(TaskId(9)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_and_toggle() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        store
            .insert_task(&Task::new(1, "Domain sync", Interval::Daily))
            .await
            .unwrap();

        let completed_at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let next_run = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap();
        store
            .record_completion(
                TaskId(1),
                Completion {
                    completed_at,
                    duration_secs: 75,
                    next_run: Some(next_run),
                },
            )
            .await
            .unwrap();
        store.set_active(TaskId(1), false).await.unwrap();

        let task = store.get_task(TaskId(1)).await.unwrap().unwrap();
        assert_eq!(task.last_run, Some(completed_at));
        assert_eq!(task.next_run, Some(next_run));
        assert_eq!(task.last_duration_display().as_deref(), Some("1m 15s"));
        assert!(!task.active);

        let raw: String = sqlx::query("SELECT last_run FROM scheduler WHERE id = 1")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("last_run");
        assert_eq!(raw, "2024-03-15 10:00:00");
    }

    #[tokio::test]
    async fn test_list_order_and_missing_rows() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        store
            .insert_task(&Task::new(1, "second", Interval::Hourly).with_sort_order(20))
            .await
            .unwrap();
        store
            .insert_task(&Task::new(2, "first", Interval::Weekly).with_sort_order(10))
            .await
            .unwrap();

        let names: Vec<String> = store.list_tasks().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["first", "second"]);

        assert!(matches!(store.set_active(TaskId(3), true).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_database_shared_between_pools() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tasks.db").display());

        let first = SqliteTaskStore::connect(&url).await.unwrap();
        first
            .insert_task(&Task::new(1, "Domain sync", Interval::Daily))
            .await
            .unwrap();
        let second = SqliteTaskStore::connect(&url).await.unwrap();

        assert!(first.try_mark_running(TaskId(1)).await.unwrap());
        assert!(!second.try_mark_running(TaskId(1)).await.unwrap());
    }
}
