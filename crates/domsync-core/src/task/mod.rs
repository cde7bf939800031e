//! Recurring synchronization tasks
//!
//! A [`Task`] is one row of the `scheduler` table. Tasks are created by
//! seeding, mutated on every run and on enable/disable, and never deleted
//! through normal operation.

pub mod registry;

pub use registry::{RunLease, TaskRegistry, format_duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

/// Task primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaskId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Interval class of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    EveryFiveMinutes,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Stable storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EveryFiveMinutes => "every_five_minutes",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Human-readable label for the task list
    pub fn label(&self) -> &'static str {
        match self {
            Self::EveryFiveMinutes => "Every 5 Minutes",
            Self::Hourly => "Hourly",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }

    /// Cron expression used when a task has none, or an invalid one
    pub fn default_expression(&self) -> &'static str {
        match self {
            Self::EveryFiveMinutes => "*/5 * * * *",
            Self::Hourly => "0 * * * *",
            Self::Daily => "0 0 * * *",
            Self::Weekly => "0 0 * * Sun",
            Self::Monthly => "0 0 1 * *",
        }
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "every_five_minutes" => Ok(Self::EveryFiveMinutes),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(Error::parse(format!("Unknown interval: {}", other))),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A recurring job definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub interval: Interval,
    /// Five-field cron expression (`min hour dom month dow`)
    pub expression: String,
    /// `None` = never run
    #[serde(with = "crate::legacy::timestamp")]
    pub last_run: Option<DateTime<Utc>>,
    /// Seconds between the start and the completion of the last run
    #[serde(default)]
    pub last_duration_secs: Option<u64>,
    /// `None` = not scheduled, which makes an active task due immediately
    #[serde(with = "crate::legacy::timestamp")]
    pub next_run: Option<DateTime<Utc>>,
    pub active: bool,
    pub is_running: bool,
    pub sort_order: i32,
}

impl Task {
    /// Create a never-run, active task using the interval's default expression
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            interval,
            expression: interval.default_expression().to_string(),
            last_run: None,
            last_duration_secs: None,
            next_run: None,
            active: true,
            is_running: false,
            sort_order: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Duration of the last run as shown in the task list
    pub fn last_duration_display(&self) -> Option<String> {
        self.last_duration_secs.map(format_duration)
    }

    /// Next fire time strictly after `after`
    ///
    /// Falls back to the interval's default expression when the task's own
    /// expression does not parse.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let schedule = match parse_cron(&self.expression) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(
                    "Task {} has invalid expression '{}' ({}), using {} default",
                    self.id,
                    self.expression,
                    e,
                    self.interval.label()
                );
                parse_cron(self.interval.default_expression()).ok()?
            }
        };
        schedule.after(&after).next()
    }
}

/// Parse a cron expression
///
/// Five-field expressions use crontab numbering (day of week 0-7, Sunday as
/// 0 or 7); they get a seconds field and their weekdays are renumbered for the
/// `cron` crate, which counts Sunday as 1. Six- and seven-field expressions
/// are passed through in that crate's own syntax.
pub fn parse_cron(expression: &str) -> Result<cron::Schedule> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = match fields.len() {
        5 => format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            crontab_weekdays(fields[4])?
        ),
        6 | 7 => fields.join(" "),
        n => {
            return Err(Error::parse(format!(
                "Cron expression '{}' has {} fields, expected 5",
                expression, n
            )));
        }
    };

    cron::Schedule::from_str(&normalized)
        .map_err(|e| Error::parse(format!("Invalid cron expression '{}': {}", expression, e)))
}

/// Renumber a crontab day-of-week field to Sunday = 1 .. Saturday = 7
///
/// Numeric values, ranges and steps are expanded to an explicit list.
/// Wildcards and day names mean the same thing in both numberings and are
/// kept as written.
fn crontab_weekdays(field: &str) -> Result<String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        if item.starts_with('*')
            || item.starts_with('?')
            || item.chars().any(|c| c.is_ascii_alphabetic())
        {
            items.push(item.to_string());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| Error::parse(format!("Invalid day-of-week step '{}'", item)))?;
                (range, step)
            }
            None => (item, 1),
        };
        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (weekday_number(start)?, weekday_number(end)?),
            None if step > 1 => (weekday_number(range)?, 7),
            None => {
                let day = weekday_number(range)?;
                (day, day)
            }
        };
        if start > end {
            return Err(Error::parse(format!("Invalid day-of-week range '{}'", item)));
        }

        let mut days: Vec<u32> = (start..=end).step_by(step).map(|d| d % 7 + 1).collect();
        days.sort_unstable();
        days.dedup();
        items.extend(days.iter().map(u32::to_string));
    }
    Ok(items.join(","))
}

fn weekday_number(value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .ok()
        .filter(|d| *d <= 7)
        .ok_or_else(|| Error::parse(format!("Invalid day of week '{}'", value)))
}

/// Render `next_run` for the task list; never-scheduled shows `n/a`
pub fn format_next_run(next_run: Option<DateTime<Utc>>) -> String {
    match next_run {
        Some(ts) => ts.format(crate::legacy::TIMESTAMP_FORMAT).to_string(),
        None => "n/a".to_string(),
    }
}
