// # domsyncd - Registrar Sync Daemon
//
// This is a thin integration layer. All scheduling, adapter and task-state
// logic lives in domsync-core and the provider crates; the daemon only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Registers the built-in adapters
// 4. Seeds tasks, binds adapters and runs the requested command
//
// ## Commands
//
// - `domsyncd` / `domsyncd run`: tick loop until SIGTERM/SIGINT
// - `domsyncd list`: print the task list
// - `domsyncd run-now <id>`: run one task immediately, ignoring its schedule
// - `domsyncd enable <id>` / `domsyncd disable <id>`: toggle a task
// - `domsyncd clear <id>`: clear a running flag left behind by a crash
//
// ## Configuration
//
// A JSON task file can be given with `DOMSYNC_CONFIG_FILE`; it holds a full
// `SyncConfig` (tasks, store, scheduler) and takes precedence over the
// single-task variables below.
//
// ### Task
// - `DOMSYNC_TASK_ID`: Task id (default 1)
// - `DOMSYNC_TASK_NAME`: Task name (default "Registrar sync")
// - `DOMSYNC_TASK_INTERVAL`: every_five_minutes, hourly, daily, weekly, monthly (default daily)
// - `DOMSYNC_TASK_EXPRESSION`: Cron expression (optional)
//
// ### Provider
// - `DOMSYNC_PROVIDER_TYPE`: eurodns or directnic
// - `DOMSYNC_EURODNS_API_KEY` / `DOMSYNC_EURODNS_API_SECRET`: Reseller credentials
// - `DOMSYNC_EURODNS_ENDPOINT`: Endpoint override (optional)
// - `DOMSYNC_DIRECTNIC_CSV_PATH`: Export path (default docs/DirectNIC-Import.csv)
//
// ### Task Store
// - `DOMSYNC_STORE_TYPE`: memory, file or sqlite (default file)
// - `DOMSYNC_STORE_PATH`: JSON file (default /var/lib/domsync/tasks.json)
// - `DOMSYNC_STORE_URL`: SQLite URL (default sqlite:///var/lib/domsync/tasks.db)
//
// ### Scheduler
// - `DOMSYNC_TICK_INTERVAL_SECS`: Seconds between due checks (default 60)
// - `DOMSYNC_HTTP_TIMEOUT_SECS`: Adapter HTTP timeout (default 30)
// - `DOMSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DOMSYNC_PROVIDER_TYPE=eurodns
// export DOMSYNC_EURODNS_API_KEY=reseller-id
// export DOMSYNC_EURODNS_API_SECRET=your_secret
// export DOMSYNC_STORE_TYPE=sqlite
// export DOMSYNC_STORE_URL=sqlite:///var/lib/domsync/tasks.db
//
// domsyncd
// ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use domsync_core::scheduler::render_status_badge;
use domsync_core::traits::TaskStore;
use domsync_core::{
    AdapterRegistry, DomainRecord, DomainSink, Interval, ProviderConfig, RunOutcome, Scheduler,
    SchedulerConfig, SchedulerEvent, SyncConfig, TaskConfig, TaskId, TaskStoreConfig,
    format_duration, format_next_run,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_STORE_PATH: &str = "/var/lib/domsync/tasks.json";
const DEFAULT_STORE_URL: &str = "sqlite:///var/lib/domsync/tasks.db";
const DEFAULT_DIRECTNIC_CSV: &str = "docs/DirectNIC-Import.csv";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DomsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DomsyncExitCode> for ExitCode {
    fn from(code: DomsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Registrar sync daemon
#[derive(Debug, Parser)]
#[command(name = "domsyncd", version, about = "Registrar sync daemon", long_about = None)]
struct Cli {
    /// What to do; the tick loop runs when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the tick loop until SIGTERM/SIGINT
    Run,
    /// Print the task list
    List,
    /// Run one task immediately, ignoring its schedule
    RunNow {
        /// Task id
        id: u32,
    },
    /// Activate a task
    Enable {
        /// Task id
        id: u32,
    },
    /// Deactivate a task
    Disable {
        /// Task id
        id: u32,
    },
    /// Clear a running flag left behind by a crash
    Clear {
        /// Task id
        id: u32,
    },
}

impl Cli {
    fn selected(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

/// Application configuration
struct Config {
    sync: SyncConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let log_level = env::var("DOMSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let sync = match env::var("DOMSYNC_CONFIG_FILE") {
            Ok(path) => {
                let data = std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read DOMSYNC_CONFIG_FILE {}", path))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("invalid task file {}", path))?
            }
            Err(_) => SyncConfig {
                tasks: vec![task_from_env()?],
                store: store_from_env()?,
                scheduler: scheduler_from_env()?,
            },
        };

        Ok(Self { sync, log_level })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        for task in &self.sync.tasks {
            let supported = match task.provider.type_name() {
                "eurodns" => cfg!(feature = "eurodns"),
                "directnic" => cfg!(feature = "directnic"),
                _ => false,
            };
            if !supported {
                anyhow::bail!(
                    "Task {}: provider '{}' is not built into this daemon",
                    task.id,
                    task.provider.type_name()
                );
            }
        }

        if let TaskStoreConfig::File { path } = &self.sync.store
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "DOMSYNC_STORE_PATH parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DOMSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn task_from_env() -> Result<TaskConfig> {
    let provider = match env::var("DOMSYNC_PROVIDER_TYPE")
        .unwrap_or_else(|_| "eurodns".to_string())
        .as_str()
    {
        "eurodns" => ProviderConfig::Eurodns {
            api_key: env::var("DOMSYNC_EURODNS_API_KEY").context(
                "DOMSYNC_EURODNS_API_KEY is required. \
                Set it via: export DOMSYNC_EURODNS_API_KEY=your_reseller_id",
            )?,
            api_secret: env::var("DOMSYNC_EURODNS_API_SECRET").context(
                "DOMSYNC_EURODNS_API_SECRET is required. \
                Set it via: export DOMSYNC_EURODNS_API_SECRET=your_secret",
            )?,
            endpoint: env::var("DOMSYNC_EURODNS_ENDPOINT").ok(),
        },
        "directnic" => ProviderConfig::Directnic {
            csv_path: env::var("DOMSYNC_DIRECTNIC_CSV_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DIRECTNIC_CSV)),
        },
        other => anyhow::bail!(
            "DOMSYNC_PROVIDER_TYPE '{}' is not supported. \
            Supported providers: eurodns, directnic",
            other
        ),
    };

    Ok(TaskConfig {
        id: TaskId(env_or("DOMSYNC_TASK_ID", 1)?),
        name: env::var("DOMSYNC_TASK_NAME").unwrap_or_else(|_| "Registrar sync".to_string()),
        description: format!("Synchronize {} domains", provider.type_name()),
        interval: env_or("DOMSYNC_TASK_INTERVAL", Interval::Daily)?,
        expression: env::var("DOMSYNC_TASK_EXPRESSION").ok(),
        active: true,
        sort_order: 0,
        provider,
    })
}

fn store_from_env() -> Result<TaskStoreConfig> {
    match env::var("DOMSYNC_STORE_TYPE")
        .unwrap_or_else(|_| "file".to_string())
        .as_str()
    {
        "memory" => Ok(TaskStoreConfig::Memory),
        "file" => Ok(TaskStoreConfig::File {
            path: env::var("DOMSYNC_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH)),
        }),
        "sqlite" => Ok(TaskStoreConfig::Sqlite {
            url: env::var("DOMSYNC_STORE_URL").unwrap_or_else(|_| DEFAULT_STORE_URL.to_string()),
        }),
        other => anyhow::bail!(
            "DOMSYNC_STORE_TYPE '{}' is not supported. \
            Supported types: memory, file, sqlite",
            other
        ),
    }
}

fn scheduler_from_env() -> Result<SchedulerConfig> {
    let defaults = SchedulerConfig::default();
    Ok(SchedulerConfig {
        tick_interval_secs: env_or("DOMSYNC_TICK_INTERVAL_SECS", defaults.tick_interval_secs)?,
        http_timeout_secs: env_or("DOMSYNC_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        event_channel_capacity: defaults.event_channel_capacity,
    })
}

/// Sink that writes each record to the log in the domain-table encoding
struct LoggingDomainSink;

#[async_trait]
impl DomainSink for LoggingDomainSink {
    async fn persist(
        &self,
        task_id: TaskId,
        provider: &str,
        records: &[DomainRecord],
    ) -> domsync_core::Result<()> {
        for record in records {
            let fields = record.to_legacy();
            info!(
                task = %task_id,
                provider,
                domain = %fields.domain,
                expiry_date = %fields.expiry_date,
                dns_servers = %fields.dns_servers.join(","),
                privacy = fields.privacy,
                autorenew = fields.autorenew,
                "domain synchronized"
            );
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let command = match Cli::try_parse() {
        Ok(cli) => cli.selected(),
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                DomsyncExitCode::ConfigError
            } else {
                DomsyncExitCode::CleanShutdown
            }
            .into();
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DomsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DomsyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DomsyncExitCode::ConfigError.into();
    }

    info!("Starting domsyncd ({:?})", command);
    info!("Configuration loaded: {} task(s)", config.sync.tasks.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DomsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_command(config, command).await {
            error!("Daemon error: {:#}", e);
            DomsyncExitCode::RuntimeError
        } else {
            DomsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the scheduler: task store, seeded tasks and adapter bindings
async fn build_scheduler(config: &SyncConfig) -> Result<(Scheduler, mpsc::Receiver<SchedulerEvent>)> {
    let registry = AdapterRegistry::with_builtin_stores();

    #[cfg(feature = "eurodns")]
    {
        info!("Registering EuroDNS adapter");
        domsync_provider_eurodns::register(&registry);
    }

    #[cfg(feature = "directnic")]
    {
        info!("Registering DirectNIC adapter");
        domsync_provider_directnic::register(&registry);
    }

    info!("Task store type: {}", config.store.type_name());
    let store: Arc<dyn TaskStore> = Arc::from(registry.create_task_store(&config.store).await?);

    let (scheduler, events) = Scheduler::new(store, Arc::new(LoggingDomainSink), &config.scheduler);

    let inserted = scheduler.registry().seed(&config.seed_tasks()).await?;
    if inserted > 0 {
        info!("Seeded {} new task(s)", inserted);
    }

    for task in &config.tasks {
        let (adapter, credentials) = registry.create_adapter(&task.provider, &config.scheduler)?;
        info!(
            "Task {} ({}) bound to {} as {}",
            task.id,
            task.name,
            adapter.provider_name(),
            credentials.account_label()
        );
        scheduler.bind(task.id, adapter, credentials).await;
    }

    Ok((scheduler, events))
}

/// Log scheduler events until the channel closes
fn spawn_event_logger(events: mpsc::Receiver<SchedulerEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = ReceiverStream::new(events);
        while let Some(event) = events.next().await {
            match event {
                SchedulerEvent::RunStarted { task_id, provider } => {
                    info!("Task {} started ({})", task_id, provider)
                }
                SchedulerEvent::RunSkipped { task_id, reason } => {
                    warn!("Task {} skipped: {:?}", task_id, reason)
                }
                SchedulerEvent::RunFinished {
                    task_id,
                    domains,
                    duration_secs,
                } => info!(
                    "Task {} finished: {} domain(s) in {}",
                    task_id,
                    domains,
                    format_duration(duration_secs)
                ),
                SchedulerEvent::RunFailed { task_id, error } => {
                    error!("Task {} failed: {}", task_id, error)
                }
                SchedulerEvent::TaskToggled { task_id, active } => {
                    info!("Task {} is now {}", task_id, if active { "active" } else { "inactive" })
                }
                SchedulerEvent::Stopped { reason } => info!("Scheduler stopped: {}", reason),
            }
        }
    })
}

async fn run_command(config: Config, command: Command) -> Result<()> {
    let (scheduler, events) = build_scheduler(&config.sync).await?;
    let logger = spawn_event_logger(events);

    match command {
        Command::Run => run_daemon(&scheduler).await?,
        Command::List => print_tasks(&scheduler).await?,
        Command::RunNow { id } => match scheduler.run_now(TaskId(id)).await? {
            RunOutcome::Completed { domains, completion } => info!(
                "Task {} synchronized {} domain(s), next run {}",
                id,
                domains,
                format_next_run(completion.next_run)
            ),
            RunOutcome::Failed { error, .. } => anyhow::bail!("Task {} failed: {}", id, error),
            RunOutcome::AlreadyRunning => warn!("Task {} is already running", id),
        },
        Command::Enable { id } => scheduler.toggle_active(TaskId(id), true).await?,
        Command::Disable { id } => scheduler.toggle_active(TaskId(id), false).await?,
        Command::Clear { id } => {
            scheduler.registry().get_task(TaskId(id)).await?;
            scheduler.registry().mark_finished(TaskId(id)).await?;
            info!("Task {} running flag cleared", id);
        }
    }

    if !matches!(command, Command::Run) {
        scheduler.registry().flush().await?;
    }

    // Dropping the scheduler closes the event channel and ends the logger
    drop(scheduler);
    if let Err(e) = logger.await {
        error!("Event logger task failed: {}", e);
    }
    Ok(())
}

async fn print_tasks(scheduler: &Scheduler) -> Result<()> {
    println!(
        "{:>4}  {:<28} {:<18} {:<9} {:<20} {:<10} {:<20}",
        "ID", "NAME", "INTERVAL", "STATUS", "LAST RUN", "DURATION", "NEXT RUN"
    );
    for task in scheduler.registry().list_tasks().await? {
        let badge = render_status_badge(&task);
        println!(
            "{:>4}  {:<28} {:<18} {:<9} {:<20} {:<10} {:<20}{}",
            task.id,
            task.name,
            task.interval.label(),
            badge.label,
            format_next_run(task.last_run),
            task.last_duration_display().unwrap_or_else(|| "-".to_string()),
            format_next_run(task.next_run),
            if task.is_running { "  (running)" } else { "" }
        );
    }
    Ok(())
}

/// Run the tick loop until a shutdown signal arrives
async fn run_daemon(scheduler: &Scheduler) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Daemon initialized successfully");
    scheduler.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
