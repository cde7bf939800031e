//! Minimal embedding example for domsync-core
//!
//! This example demonstrates using domsync-core as a library in a custom
//! application. The scheduler lifecycle is fully managed by the application.

use chrono::NaiveDate;
use domsync_core::traits::{Credentials, DomainRecord, DomainSink, ProviderAdapter};
use domsync_core::{
    Interval, MemoryTaskStore, Result, Scheduler, SchedulerConfig, Task, TaskId, format_next_run,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-app adapter serving a fixed portfolio
struct EmbeddedAdapter {
    portfolio: Vec<DomainRecord>,
}

impl EmbeddedAdapter {
    fn new() -> Self {
        let record = |domain: &str, expires: Option<NaiveDate>, privacy: bool| DomainRecord {
            domain: domain.to_string(),
            expiration: expires,
            dns_servers: vec!["ns1.example.net".to_string(), "ns2.example.net".to_string()],
            privacy: Some(privacy),
            auto_renew: Some(true),
        };

        Self {
            portfolio: vec![
                record("example.com", NaiveDate::from_ymd_opt(2027, 4, 1), true),
                record("example.org", NaiveDate::from_ymd_opt(2026, 12, 31), false),
                record("example.net", None, false),
            ],
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for EmbeddedAdapter {
    async fn fetch_domain_list(&self, _credentials: &Credentials) -> Result<Vec<String>> {
        Ok(self.portfolio.iter().map(|r| r.domain.clone()).collect())
    }

    async fn fetch_domain_details(&self, _credentials: &Credentials, domain: &str) -> Result<DomainRecord> {
        Ok(self
            .portfolio
            .iter()
            .find(|r| r.domain == domain)
            .cloned()
            .unwrap_or_else(|| DomainRecord::unknown(domain)))
    }

    fn provider_name(&self) -> &'static str {
        "embedded"
    }
}

/// Sink that keeps the latest legacy row per domain, like a domains table
#[derive(Default)]
struct TableSink {
    rows: Mutex<HashMap<String, serde_json::Value>>,
}

#[async_trait::async_trait]
impl DomainSink for TableSink {
    async fn persist(&self, _task_id: TaskId, _provider: &str, records: &[DomainRecord]) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| domsync_core::Error::domain_sink("table lock poisoned"))?;
        for record in records {
            rows.insert(record.domain.clone(), serde_json::to_value(record.to_legacy())?);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Embedded domsync-core Example ===\n");

    // Create custom components
    let store = Arc::new(MemoryTaskStore::with_tasks([
        Task::new(1, "Embedded sync", Interval::EveryFiveMinutes),
        Task::new(2, "Paused sync", Interval::Daily).with_active(false),
    ]));
    let sink = Arc::new(TableSink::default());

    let config = SchedulerConfig {
        tick_interval_secs: 1,
        http_timeout_secs: 5,
        event_channel_capacity: 100,
    };

    println!("1. Creating scheduler...");
    let (scheduler, mut event_rx) = Scheduler::new(store, sink.clone(), &config);
    let adapter: Arc<dyn ProviderAdapter> = Arc::new(EmbeddedAdapter::new());
    scheduler.bind(TaskId(1), adapter.clone(), Credentials::None).await;
    scheduler.bind(TaskId(2), adapter, Credentials::None).await;

    let event_listener = tokio::spawn(async move {
        println!("2. Event listener started");
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
        println!("Event listener stopped");
    });

    println!("3. Starting tick loop in background...");
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let runner = scheduler.clone();
    let loop_handle = tokio::spawn(async move { runner.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    println!("\n4. Paused task still runs on demand");
    scheduler.run_now(TaskId(2)).await?;

    println!("\n5. Stopping tick loop...");
    let _ = shutdown_tx.send(());
    if let Ok(result) = loop_handle.await {
        result?;
    }

    for task in scheduler.registry().list_tasks().await? {
        println!(
            "   task {} '{}': active={} last={} next={}",
            task.id,
            task.name,
            task.active,
            format_next_run(task.last_run),
            format_next_run(task.next_run)
        );
    }

    drop(scheduler);
    let _ = tokio::time::timeout(tokio::time::Duration::from_millis(100), event_listener).await;

    println!("\n6. Domains table:");
    if let Ok(rows) = sink.rows.lock() {
        let mut domains: Vec<_> = rows.iter().collect();
        domains.sort_by(|a, b| a.0.cmp(b.0));
        for (domain, row) in domains {
            println!("   {} {}", domain, row);
        }
    }

    println!("\n=== Embedding Successful ===");
    Ok(())
}
