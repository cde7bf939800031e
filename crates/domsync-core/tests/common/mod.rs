//! Test doubles and common utilities for scheduler contract tests
//!
//! This module provides minimal test doubles that verify the run-lifecycle
//! guarantees without talking to a real registrar.

#![allow(dead_code)]

use async_trait::async_trait;
use domsync_core::error::{Error, Result};
use domsync_core::state::MemoryTaskStore;
use domsync_core::traits::{
    Completion, Credentials, DomainRecord, DomainSink, MemoryDomainSink, ProviderAdapter, TaskStore,
};
use domsync_core::{Scheduler, SchedulerConfig, SchedulerEvent, Task, TaskId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};

/// What a [`ScriptedAdapter`] does when called
#[derive(Clone)]
pub enum Behavior {
    /// List the records' domains and return each record on lookup
    Domains(Vec<DomainRecord>),
    /// Fail the list call as if the upstream were unreachable
    ListFails,
    /// Panic inside the list call
    Panics,
    /// Block the list call until notified, then behave like `Domains`
    Gated(Arc<Notify>, Vec<DomainRecord>),
}

/// An adapter whose behavior is fixed by the test
pub struct ScriptedAdapter {
    behavior: Behavior,
    list_calls: Arc<AtomicUsize>,
    detail_calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            list_calls: Arc::new(AtomicUsize::new(0)),
            detail_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_call_count(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    fn records(&self) -> &[DomainRecord] {
        match &self.behavior {
            Behavior::Domains(records) | Behavior::Gated(_, records) => records,
            Behavior::ListFails | Behavior::Panics => &[],
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn fetch_domain_list(&self, _credentials: &Credentials) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::ListFails => Err(Error::unavailable("scripted", "connection refused")),
            Behavior::Panics => panic!("scripted adapter panicked"),
            Behavior::Gated(gate, _) => {
                gate.notified().await;
                Ok(self.records().iter().map(|r| r.domain.clone()).collect())
            }
            Behavior::Domains(records) => Ok(records.iter().map(|r| r.domain.clone()).collect()),
        }
    }

    async fn fetch_domain_details(&self, _credentials: &Credentials, domain: &str) -> Result<DomainRecord> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records()
            .iter()
            .find(|r| r.domain == domain)
            .cloned()
            .unwrap_or_else(|| DomainRecord::unknown(domain)))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// A record with every field known
pub fn record(domain: &str) -> DomainRecord {
    DomainRecord {
        domain: domain.to_string(),
        expiration: chrono::NaiveDate::from_ymd_opt(2025, 6, 1),
        dns_servers: vec!["ns1.example.net".to_string(), "ns2.example.net".to_string()],
        privacy: Some(true),
        auto_renew: Some(false),
    }
}

/// A sink that always fails
pub struct FailingSink;

#[async_trait]
impl DomainSink for FailingSink {
    async fn persist(&self, _task_id: TaskId, _provider: &str, _records: &[DomainRecord]) -> Result<()> {
        Err(Error::domain_sink("domains table is read-only"))
    }
}

/// A memory store that counts flushes
#[derive(Clone)]
pub struct CountingStore {
    inner: MemoryTaskStore,
    flush_calls: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            inner: MemoryTaskStore::with_tasks(tasks),
            flush_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStore for CountingStore {
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.inner.list_tasks().await
    }

    async fn insert_task(&self, task: &Task) -> Result<bool> {
        self.inner.insert_task(task).await
    }

    async fn try_mark_running(&self, id: TaskId) -> Result<bool> {
        self.inner.try_mark_running(id).await
    }

    async fn mark_finished(&self, id: TaskId) -> Result<()> {
        self.inner.mark_finished(id).await
    }

    async fn record_completion(&self, id: TaskId, completion: Completion) -> Result<()> {
        self.inner.record_completion(id, completion).await
    }

    async fn set_active(&self, id: TaskId, active: bool) -> Result<()> {
        self.inner.set_active(id, active).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// Scheduler over a memory store holding `tasks` and a memory sink
pub fn scheduler_with(
    tasks: impl IntoIterator<Item = Task>,
) -> (Scheduler, MemoryDomainSink, mpsc::Receiver<SchedulerEvent>) {
    let sink = MemoryDomainSink::new();
    let store = Arc::new(MemoryTaskStore::with_tasks(tasks));
    let (scheduler, events) = Scheduler::new(store, Arc::new(sink.clone()), &test_config());
    (scheduler, sink, events)
}

pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        tick_interval_secs: 1,
        http_timeout_secs: 5,
        event_channel_capacity: 100,
    }
}

/// Drain every event currently buffered
pub fn drain(events: &mut mpsc::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn credentials() -> Credentials {
    Credentials::api("reseller-account-1", "api-secret-value")
}
