//! Configuration types for the domsync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::task::{Interval, Task, TaskId};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tasks to seed and run
    pub tasks: Vec<TaskConfig>,

    /// Task store configuration
    #[serde(default)]
    pub store: TaskStoreConfig,

    /// Optional scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tasks.is_empty() {
            return Err(crate::Error::config("No tasks configured"));
        }

        let mut seen = std::collections::HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id) {
                return Err(crate::Error::config(format!("Duplicate task id {}", task.id)));
            }
            task.validate()?;
        }

        self.store.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }

    /// The task rows this configuration seeds
    pub fn seed_tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(TaskConfig::to_task).collect()
    }
}

/// One configured task and the provider it syncs from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub interval: Interval,
    /// Cron expression; the interval's default when absent
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: i32,
    pub provider: ProviderConfig,
}

impl TaskConfig {
    /// Validate the task configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config(format!("Task {} has an empty name", self.id)));
        }
        if let Some(expression) = &self.expression {
            crate::task::parse_cron(expression).map_err(|e| {
                crate::Error::config(format!("Task {}: {}", self.id, e))
            })?;
        }
        self.provider.validate()
    }

    /// Initial task row, as seeded
    pub fn to_task(&self) -> Task {
        let mut task = Task::new(self.id, self.name.clone(), self.interval)
            .with_description(self.description.clone())
            .with_active(self.active)
            .with_sort_order(self.sort_order);
        if let Some(expression) = &self.expression {
            task = task.with_expression(expression.clone());
        }
        task
    }
}

fn default_active() -> bool {
    true
}

/// Registrar adapter configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// EuroDNS XML API
    Eurodns {
        /// API key (account identifier)
        api_key: String,
        /// API secret
        api_secret: String,
        /// Override the API endpoint
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// DirectNIC CSV export
    Directnic {
        /// Path to the exported CSV
        csv_path: PathBuf,
    },

    /// Custom adapter
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Eurodns {
                api_key,
                api_secret,
                ..
            } => {
                if api_key.is_empty() || api_secret.is_empty() {
                    return Err(crate::Error::config(
                        "EuroDNS API key and secret cannot be empty",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Directnic { csv_path } => {
                if csv_path.as_os_str().is_empty() {
                    return Err(crate::Error::config("DirectNIC CSV path cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom adapter factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom adapter config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the adapter type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Eurodns { .. } => "eurodns",
            ProviderConfig::Directnic { .. } => "directnic",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Eurodns {
                api_key, endpoint, ..
            } => f
                .debug_struct("Eurodns")
                .field("api_key", &crate::traits::obfuscate(api_key))
                .field("api_secret", &"<REDACTED>")
                .field("endpoint", endpoint)
                .finish(),
            ProviderConfig::Directnic { csv_path } => f
                .debug_struct("Directnic")
                .field("csv_path", csv_path)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// Task store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskStoreConfig {
    /// In-memory task store (not persistent)
    #[default]
    Memory,

    /// JSON file task store
    File {
        /// Path to the task file
        path: PathBuf,
    },

    /// SQLite task store
    Sqlite {
        /// Connection URL, e.g. `sqlite:///var/lib/domsync/tasks.db`
        url: String,
    },
}

impl TaskStoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TaskStoreConfig::File { path } if path.as_os_str().is_empty() => {
                Err(crate::Error::config("Task file path cannot be empty"))
            }
            TaskStoreConfig::Sqlite { url } if url.is_empty() => {
                Err(crate::Error::config("SQLite URL cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskStoreConfig::Memory => "memory",
            TaskStoreConfig::File { .. } => "file",
            TaskStoreConfig::Sqlite { .. } => "sqlite",
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-task checks
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Timeout applied to every provider HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tick_interval_secs == 0 {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurodns_task(id: u32) -> TaskConfig {
        TaskConfig {
            id: TaskId(id),
            name: "EuroDNS sync".to_string(),
            description: String::new(),
            interval: Interval::Daily,
            expression: None,
            active: true,
            sort_order: 0,
            provider: ProviderConfig::Eurodns {
                api_key: "reseller-account".to_string(),
                api_secret: "s3cret-value".to_string(),
                endpoint: None,
            },
        }
    }

    #[test]
    fn parses_from_json() {
        let config: SyncConfig = serde_json::from_value(serde_json::json!({
            "tasks": [{
                "id": 2,
                "name": "DirectNIC import",
                "interval": "hourly",
                "expression": "15 * * * *",
                "provider": { "type": "directnic", "csv_path": "/docs/DirectNIC-Import.csv" }
            }],
            "store": { "type": "sqlite", "url": "sqlite::memory:" }
        }))
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.tasks[0].provider.type_name(), "directnic");

        let task = &config.seed_tasks()[0];
        assert_eq!(task.expression, "15 * * * *");
        assert!(task.active);
    }

    #[test]
    fn validation_rejects_bad_configs() {
        assert!(SyncConfig::new().validate().is_err());

        let mut config = SyncConfig {
            tasks: vec![eurodns_task(1), eurodns_task(1)],
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        config.tasks = vec![eurodns_task(1)];
        assert!(config.validate().is_ok());

        config.tasks[0].expression = Some("not a cron".to_string());
        assert!(config.validate().is_err());

        config.tasks[0].expression = None;
        config.scheduler.tick_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn seeded_task_uses_interval_default() {
        let task = eurodns_task(3).to_task();
        assert_eq!(task.expression, "0 0 * * *");
        assert_eq!(task.next_run, None);
    }

    #[test]
    fn provider_debug_is_redacted() {
        let debug_str = format!("{:?}", eurodns_task(1).provider);
        assert!(!debug_str.contains("s3cret-value"));
        assert!(!debug_str.contains("reseller-account"));
    }
}
