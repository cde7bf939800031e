//! Task scheduler
//!
//! The Scheduler is responsible for:
//! - Deciding which tasks are due
//! - Gating every run on the task's running flag
//! - Invoking the adapter bound to the task
//! - Handing normalized records to the domain sink
//! - Releasing the flag and recording completion on every exit path
//!
//! ## Architecture
//!
//! ```text
//!  tick / run-now
//!        │
//!        ▼
//! ┌──────────────┐   acquire / release   ┌──────────────┐
//! │  Scheduler   │──────────────────────▶│ TaskRegistry │
//! └──────────────┘   record_completion   └──────────────┘
//!        │
//!        ├──────────────────────┬───────────────────────┐
//!        ▼                      ▼                       ▼
//! ┌─────────────────┐   ┌──────────────┐        ┌─────────────┐
//! │ ProviderAdapter │   │  DomainSink  │        │   Events    │
//! │ (list, details) │   │  (persist)   │        │  (notify)   │
//! └─────────────────┘   └──────────────┘        └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Acquire the running flag (skip if another run holds it)
//! 2. List the account's domains, then fetch each one's details
//! 3. Persist the records through the sink
//! 4. Release the flag
//! 5. Record `last_run`, `last_duration` and the next cron fire time
//!
//! Adapter work runs on its own tokio task; a panic there is a failed run,
//! never a stuck flag.

pub mod view;

pub use view::{HourOption, StatusBadge, ToggleAction, render_hour_options, render_status_badge};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::task::{Task, TaskId, TaskRegistry};
use crate::traits::{Completion, Credentials, DomainRecord, DomainSink, ProviderAdapter, TaskStore};

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A run acquired the flag and started
    RunStarted { task_id: TaskId, provider: String },

    /// A trigger found the task already running, or had no adapter to call
    RunSkipped { task_id: TaskId, reason: SkipReason },

    /// A run completed and its records were persisted
    RunFinished {
        task_id: TaskId,
        domains: usize,
        duration_secs: u64,
    },

    /// A run failed; the flag was still released and completion recorded
    RunFailed { task_id: TaskId, error: String },

    /// The `active` flag changed
    TaskToggled { task_id: TaskId, active: bool },

    /// Tick loop stopped
    Stopped { reason: String },
}

/// Why a trigger did not start a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    NoAdapter,
}

/// Result of one `run_task` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Records were fetched and persisted
    Completed { domains: usize, completion: Completion },
    /// The adapter or the sink failed; completion was still recorded
    Failed { error: String, completion: Completion },
    /// Another run holds the flag; nothing was touched
    AlreadyRunning,
}

impl RunOutcome {
    pub fn completion(&self) -> Option<&Completion> {
        match self {
            Self::Completed { completion, .. } | Self::Failed { completion, .. } => Some(completion),
            Self::AlreadyRunning => None,
        }
    }
}

/// A task is due when it is active and its next run is unset or not in the future
pub fn is_due(task: &Task, now: DateTime<Utc>) -> bool {
    task.active && task.next_run.is_none_or(|next| next <= now)
}

#[derive(Clone)]
struct Binding {
    adapter: Arc<dyn ProviderAdapter>,
    credentials: Credentials,
}

/// Task scheduler
///
/// Cheap to clone; clones share bindings, store and event channel.
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`]
/// 2. [`bind`](Scheduler::bind) an adapter to each task
/// 3. Either drive it with [`run_with_shutdown`](Scheduler::run_with_shutdown)
///    or call [`run_now`](Scheduler::run_now) / [`run_due`](Scheduler::run_due)
///    from an external trigger
#[derive(Clone)]
pub struct Scheduler {
    registry: TaskRegistry,
    sink: Arc<dyn DomainSink>,
    bindings: Arc<RwLock<HashMap<TaskId, Binding>>>,
    tick_interval: Duration,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn DomainSink>,
        config: &SchedulerConfig,
    ) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let scheduler = Self {
            registry: TaskRegistry::new(store),
            sink,
            bindings: Arc::new(RwLock::new(HashMap::new())),
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
            event_tx: tx,
        };

        (scheduler, rx)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Bind the adapter and credentials a task runs with
    pub async fn bind(&self, task_id: TaskId, adapter: Arc<dyn ProviderAdapter>, credentials: Credentials) {
        debug!("Binding task {} to {}", task_id, adapter.provider_name());
        self.bindings
            .write()
            .await
            .insert(task_id, Binding { adapter, credentials });
    }

    pub async fn is_bound(&self, task_id: TaskId) -> bool {
        self.bindings.read().await.contains_key(&task_id)
    }

    /// Whether a task is due now
    pub fn is_due(&self, task: &Task) -> bool {
        is_due(task, Utc::now())
    }

    /// Run one task to completion with the given adapter
    ///
    /// The running flag is released and completion is recorded whether the
    /// adapter succeeds, fails or panics.
    ///
    /// # Errors
    ///
    /// Only task-store failures are returned; adapter and sink failures
    /// produce [`RunOutcome::Failed`].
    pub async fn run_task(
        &self,
        task_id: TaskId,
        adapter: Arc<dyn ProviderAdapter>,
        credentials: Credentials,
    ) -> Result<RunOutcome> {
        let task = self.registry.get_task(task_id).await?;

        let Some(lease) = self.registry.acquire(task_id).await? else {
            info!("Task {} ({}) is already running, skipping", task.id, task.name);
            self.emit_event(SchedulerEvent::RunSkipped {
                task_id,
                reason: SkipReason::AlreadyRunning,
            });
            return Ok(RunOutcome::AlreadyRunning);
        };

        let provider = adapter.provider_name();
        let started_at = Utc::now();
        info!("Running task {} ({}) with {}", task.id, task.name, provider);
        self.emit_event(SchedulerEvent::RunStarted {
            task_id,
            provider: provider.to_string(),
        });

        let result = self.execute(task_id, adapter, credentials).await;

        if let Err(e) = lease.release().await {
            error!("Failed to clear running flag for task {}: {}", task_id, e);
        }

        let next_run = task.next_run_after(Utc::now());
        let completion = self
            .registry
            .record_completion(task_id, started_at, next_run)
            .await?;

        match result {
            Ok(domains) => {
                info!(
                    "Task {} finished: {} domain(s) in {}",
                    task_id,
                    domains,
                    crate::task::format_duration(completion.duration_secs)
                );
                self.emit_event(SchedulerEvent::RunFinished {
                    task_id,
                    domains,
                    duration_secs: completion.duration_secs,
                });
                Ok(RunOutcome::Completed { domains, completion })
            }
            Err(e) => {
                error!("Task {} failed: {}", task_id, e);
                self.emit_event(SchedulerEvent::RunFailed {
                    task_id,
                    error: e.to_string(),
                });
                Ok(RunOutcome::Failed {
                    error: e.to_string(),
                    completion,
                })
            }
        }
    }

    /// Fetch and persist; returns the number of records persisted
    async fn execute(
        &self,
        task_id: TaskId,
        adapter: Arc<dyn ProviderAdapter>,
        credentials: Credentials,
    ) -> Result<usize> {
        let provider = adapter.provider_name();

        let fetch = tokio::spawn(async move { collect_records(adapter.as_ref(), &credentials).await });
        let records = fetch
            .await
            .map_err(|e| Error::Other(format!("{} adapter task aborted: {}", provider, e)))?;

        if records.is_empty() {
            warn!("Task {}: {} returned no domains", task_id, provider);
            return Ok(0);
        }

        self.sink.persist(task_id, provider, &records).await?;
        Ok(records.len())
    }

    /// Run a task with its bound adapter
    pub async fn run_now(&self, task_id: TaskId) -> Result<RunOutcome> {
        let binding = self.bindings.read().await.get(&task_id).cloned();
        let Some(binding) = binding else {
            self.emit_event(SchedulerEvent::RunSkipped {
                task_id,
                reason: SkipReason::NoAdapter,
            });
            return Err(Error::config(format!("No adapter bound to task {}", task_id)));
        };

        self.run_task(task_id, binding.adapter, binding.credentials).await
    }

    /// Run every bound task that is due at `now`
    ///
    /// Independent tasks run concurrently. Unbound due tasks are skipped
    /// with a warning.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<Vec<(TaskId, RunOutcome)>> {
        let due: Vec<Task> = self
            .registry
            .list_tasks()
            .await?
            .into_iter()
            .filter(|task| is_due(task, now))
            .collect();

        if due.is_empty() {
            debug!("No tasks due");
            return Ok(Vec::new());
        }

        let mut runs = JoinSet::new();
        for task in due {
            if !self.is_bound(task.id).await {
                warn!("Task {} ({}) is due but has no adapter bound", task.id, task.name);
                self.emit_event(SchedulerEvent::RunSkipped {
                    task_id: task.id,
                    reason: SkipReason::NoAdapter,
                });
                continue;
            }

            let scheduler = self.clone();
            runs.spawn(async move { (task.id, scheduler.run_now(task.id).await) });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok((task_id, Ok(outcome))) => outcomes.push((task_id, outcome)),
                Ok((task_id, Err(e))) => error!("Task {} could not be run: {}", task_id, e),
                Err(e) => error!("Scheduled run aborted: {}", e),
            }
        }
        outcomes.sort_by_key(|(task_id, _)| *task_id);
        Ok(outcomes)
    }

    /// Enable or disable a task
    ///
    /// Never touches the running flag or the timestamps.
    pub async fn toggle_active(&self, task_id: TaskId, enable: bool) -> Result<()> {
        self.registry.set_active(task_id, enable).await?;
        info!(
            "Task {} {}",
            task_id,
            if enable { "enabled" } else { "disabled" }
        );
        self.emit_event(SchedulerEvent::TaskToggled {
            task_id,
            active: enable,
        });
        Ok(())
    }

    /// Run the tick loop until SIGINT/SIGTERM
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run the tick loop until `shutdown_rx` fires (or Ctrl-C when `None`)
    ///
    /// The first tick fires immediately.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!("Scheduler started, checking due tasks every {:?}", self.tick_interval);

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_due(Utc::now()).await {
                        error!("Failed to check due tasks: {}", e);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(SchedulerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.registry.flush().await?;
        info!("Task store flushed, scheduler stopped");
        Ok(())
    }

    fn emit_event(&self, event: SchedulerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// List, then fetch details for each listed domain
async fn collect_records(adapter: &dyn ProviderAdapter, credentials: &Credentials) -> Vec<DomainRecord> {
    let list = adapter.list_domains(credentials).await;
    let mut records = Vec::with_capacity(list.count);
    for name in &list.names {
        records.push(adapter.get_domain_details(credentials, name).await);
    }
    records
}
