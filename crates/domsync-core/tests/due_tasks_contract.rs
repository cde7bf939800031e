//! Contract Test: Due Tasks
//!
//! The tick path only runs what is due, and a run reschedules its task.
//!
//! Constraints verified:
//! - Inactive tasks never run, whatever their `next_run`
//! - Never-scheduled active tasks run on the first tick
//! - After a run, `next_run` moves into the future and the task is not due again
//! - Due tasks without a bound adapter are skipped, not failed
//! - Toggling `active` leaves the running flag and timestamps alone

mod common;

use chrono::Utc;
use common::*;
use domsync_core::{Interval, SchedulerEvent, SkipReason, Task, TaskId};
use std::sync::Arc;

#[tokio::test]
async fn only_active_due_tasks_run() {
    let future = Utc::now() + chrono::Duration::hours(6);
    let mut scheduled_later = Task::new(3, "Later", Interval::Daily);
    scheduled_later.next_run = Some(future);

    let (scheduler, sink, _events) = scheduler_with([
        Task::new(1, "Never run", Interval::Hourly),
        Task::new(2, "Disabled", Interval::Hourly).with_active(false),
        scheduled_later,
    ]);

    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Domains(vec![record("alpha.com")])));
    for id in 1..=3 {
        scheduler.bind(TaskId(id), adapter.clone(), credentials()).await;
    }

    let outcomes = scheduler.run_due(Utc::now()).await.unwrap();
    let ran: Vec<TaskId> = outcomes.iter().map(|(id, _)| *id).collect();
    assert_eq!(ran, [TaskId(1)]);
    assert_eq!(sink.batch_count().await, 1);

    let disabled = scheduler.registry().get_task(TaskId(2)).await.unwrap();
    assert_eq!(disabled.last_run, None);
    let later = scheduler.registry().get_task(TaskId(3)).await.unwrap();
    assert_eq!(later.next_run, Some(future));
}

#[tokio::test]
async fn run_reschedules_task() {
    let (scheduler, _sink, _events) = scheduler_with([Task::new(1, "Sync", Interval::EveryFiveMinutes)]);
    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Domains(Vec::new())));
    scheduler.bind(TaskId(1), adapter.clone(), credentials()).await;

    let now = Utc::now();
    assert_eq!(scheduler.run_due(now).await.unwrap().len(), 1);

    let task = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    let next = task.next_run.expect("rescheduled");
    assert!(next > now);
    assert!(next <= now + chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
    assert!(!scheduler.is_due(&task));

    assert!(scheduler.run_due(now).await.unwrap().is_empty());
    assert_eq!(adapter.list_call_count(), 1);
}

#[tokio::test]
async fn unbound_due_task_is_skipped() {
    let (scheduler, _sink, mut events) = scheduler_with([Task::new(1, "Sync", Interval::Daily)]);

    assert!(scheduler.run_due(Utc::now()).await.unwrap().is_empty());
    assert!(scheduler.run_now(TaskId(1)).await.is_err());

    let task = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    assert!(!task.is_running);
    assert_eq!(task.last_run, None);

    assert!(drain(&mut events).contains(&SchedulerEvent::RunSkipped {
        task_id: TaskId(1),
        reason: SkipReason::NoAdapter,
    }));
}

#[tokio::test]
async fn run_now_ignores_schedule_and_active_flag() {
    let mut task = Task::new(1, "Sync", Interval::Monthly).with_active(false);
    task.next_run = Some(Utc::now() + chrono::Duration::days(20));
    let (scheduler, sink, _events) = scheduler_with([task]);

    let adapter = Arc::new(ScriptedAdapter::new(Behavior::Domains(vec![record("alpha.com")])));
    scheduler.bind(TaskId(1), adapter, credentials()).await;

    scheduler.run_now(TaskId(1)).await.unwrap();
    assert_eq!(sink.batch_count().await, 1);
    assert!(scheduler.registry().get_task(TaskId(1)).await.unwrap().last_run.is_some());
}

#[tokio::test]
async fn toggle_leaves_flag_and_timestamps() {
    let mut task = Task::new(1, "Sync", Interval::Daily);
    let last_run = Utc::now() - chrono::Duration::hours(2);
    task.last_run = Some(last_run);
    task.next_run = Some(last_run + chrono::Duration::days(1));
    let (scheduler, _sink, mut events) = scheduler_with([task.clone()]);

    assert!(scheduler.registry().mark_running(TaskId(1)).await.unwrap());
    scheduler.toggle_active(TaskId(1), false).await.unwrap();

    let toggled = scheduler.registry().get_task(TaskId(1)).await.unwrap();
    assert!(!toggled.active);
    assert!(toggled.is_running);
    assert_eq!(toggled.last_run, task.last_run);
    assert_eq!(toggled.next_run, task.next_run);
    assert!(!scheduler.is_due(&toggled));

    scheduler.toggle_active(TaskId(1), true).await.unwrap();
    assert!(scheduler.registry().get_task(TaskId(1)).await.unwrap().active);

    assert_eq!(
        drain(&mut events),
        vec![
            SchedulerEvent::TaskToggled { task_id: TaskId(1), active: false },
            SchedulerEvent::TaskToggled { task_id: TaskId(1), active: true },
        ]
    );

    assert!(scheduler.toggle_active(TaskId(9), true).await.is_err());
}
