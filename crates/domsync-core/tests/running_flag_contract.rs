//! Contract Test: Running Flag
//!
//! No run may leave a task marked running, and every run that acquired the
//! flag records a completion.
//!
//! Constraints verified:
//! - The flag is cleared after success, adapter failure, adapter panic and sink failure
//! - `last_run` and `next_run` are updated on every one of those paths
//! - A second trigger while a run is in flight is skipped without side effects
//!
//! If this test fails, someone has added an early return between acquiring
//! and releasing the flag, or a read-then-write on `is_running`.

mod common;

use common::*;
use domsync_core::traits::ProviderAdapter;
use domsync_core::{Interval, MemoryTaskStore, RunOutcome, Scheduler, SchedulerEvent, SkipReason, Task, TaskId};
use std::sync::Arc;
use tokio::sync::Notify;

fn daily(id: u32) -> Task {
    Task::new(id, "Registrar sync", Interval::Daily)
}

#[tokio::test]
async fn successful_run_persists_and_clears_flag() {
    let (scheduler, sink, mut events) = scheduler_with([daily(1)]);
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Domains(vec![
        record("alpha.com"),
        record("beta.org"),
    ])));

    let outcome = scheduler
        .run_task(TaskId(1), adapter.clone(), credentials())
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { domains: 2, .. }));
    assert_eq!(adapter.list_call_count(), 1);
    assert_eq!(adapter.detail_call_count(), 2);
    assert_eq!(sink.batch_count().await, 1);
    assert_eq!(sink.records().await, vec![record("alpha.com"), record("beta.org")]);

    let task = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    assert!(!task.is_running);
    assert!(task.last_run.is_some());
    assert!(task.next_run.unwrap() > task.last_run.unwrap());

    let events = drain(&mut events);
    assert!(matches!(events.first(), Some(SchedulerEvent::RunStarted { .. })));
    assert!(matches!(events.last(), Some(SchedulerEvent::RunFinished { domains: 2, .. })));
}

#[tokio::test]
async fn unreachable_provider_still_records_completion() {
    let (scheduler, sink, _events) = scheduler_with([daily(1)]);
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::ListFails));

    let outcome = scheduler.run_task(TaskId(1), adapter, credentials()).await.unwrap();

    // The adapter reports (0, []) rather than an error
    assert!(matches!(outcome, RunOutcome::Completed { domains: 0, .. }));
    assert_eq!(sink.batch_count().await, 0);

    let task = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    assert!(!task.is_running);
    assert!(task.last_run.is_some());
    assert!(task.next_run.is_some());
}

#[tokio::test]
async fn panicking_adapter_is_a_failed_run() {
    let (scheduler, sink, mut events) = scheduler_with([daily(1)]);
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Panics));

    let outcome = scheduler.run_task(TaskId(1), adapter, credentials()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(outcome.completion().is_some());
    assert_eq!(sink.batch_count().await, 0);

    let task = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    assert!(!task.is_running, "panic must not leave the task running");
    assert!(task.last_run.is_some());
    assert!(task.next_run.is_some());

    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, SchedulerEvent::RunFailed { task_id: TaskId(1), .. }))
    );
}

#[tokio::test]
async fn sink_failure_is_a_failed_run() {
    let store = Arc::new(MemoryTaskStore::with_tasks([daily(1)]));
    let (scheduler, _events) = Scheduler::new(store, Arc::new(FailingSink), &test_config());
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Domains(vec![record("alpha.com")])));

    let outcome = scheduler.run_task(TaskId(1), adapter, credentials()).await.unwrap();

    match outcome {
        RunOutcome::Failed { error, .. } => assert!(error.contains("read-only")),
        other => panic!("expected failure, got {:?}", other),
    }
    let task = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    assert!(!task.is_running);
    assert!(task.last_run.is_some());
}

#[tokio::test]
async fn concurrent_trigger_is_skipped() {
    let (scheduler, sink, mut events) = scheduler_with([daily(1)]);
    let gate = Arc::new(Notify::new());
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Gated(
        gate.clone(),
        vec![record("alpha.com")],
    )));

    let first = {
        let scheduler = scheduler.clone();
        let adapter: Arc<dyn ProviderAdapter> = adapter.clone();
        tokio::spawn(async move { scheduler.run_task(TaskId(1), adapter, credentials()).await })
    };

    // Wait until the first run is inside the adapter
    while adapter.list_call_count() == 0 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(scheduler.registry().get_task(TaskId(1)).await.unwrap().is_running);

    let second = scheduler
        .run_task(TaskId(1), adapter.clone(), credentials())
        .await
        .unwrap();
    assert_eq!(second, RunOutcome::AlreadyRunning);
    assert_eq!(adapter.list_call_count(), 1, "second trigger must not call the adapter");

    gate.notify_one();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, RunOutcome::Completed { domains: 1, .. }));
    assert_eq!(sink.batch_count().await, 1);
    assert!(!scheduler.registry().get_task(TaskId(1)).await.unwrap().is_running);

    assert!(drain(&mut events).contains(&SchedulerEvent::RunSkipped {
        task_id: TaskId(1),
        reason: SkipReason::AlreadyRunning,
    }));
}

#[tokio::test]
async fn unknown_task_is_an_error() {
    let (scheduler, _sink, _events) = scheduler_with([]);
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Domains(Vec::new())));

    assert!(scheduler.run_task(TaskId(42), adapter.clone(), credentials()).await.is_err());
    assert_eq!(adapter.list_call_count(), 0);
}
