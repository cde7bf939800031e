//! Task list affordances, rendered as data
//!
//! The front end decides markup; these helpers only decide what to show.

use serde::Serialize;

use crate::task::{Task, TaskId};

/// Enable/disable action offered next to a task's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Enable,
    Disable,
}

impl ToggleAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }

    /// The `active` value this action sets
    pub fn target_state(&self) -> bool {
        matches!(self, Self::Enable)
    }
}

/// Status cell of the task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub task_id: TaskId,
    /// `Active` or `Inactive`
    pub label: &'static str,
    pub toggle: ToggleAction,
    /// "Run now" is offered whether or not the task is active
    pub run_now: bool,
}

/// Status badge keyed by the `active` flag
pub fn render_status_badge(task: &Task) -> StatusBadge {
    let (label, toggle) = if task.active {
        ("Active", ToggleAction::Disable)
    } else {
        ("Inactive", ToggleAction::Enable)
    };

    StatusBadge {
        task_id: task.id,
        label,
        toggle,
        run_now: true,
    }
}

/// One entry of the hour picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourOption {
    /// `00`..`23`
    pub value: String,
    /// `00:00`..`23:00`
    pub label: String,
    pub selected: bool,
}

/// The fixed 24-hour option set, with `selected` marked
pub fn render_hour_options(selected: Option<u8>) -> Vec<HourOption> {
    (0u8..24)
        .map(|hour| HourOption {
            value: format!("{:02}", hour),
            label: format!("{:02}:00", hour),
            selected: selected == Some(hour),
        })
        .collect()
}
