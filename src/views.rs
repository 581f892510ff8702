//! The task lists shown to the user, one per time frame.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::buckets::{classify, schedule_order, Buckets};
use crate::error::ParseEnumError;
use crate::models::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFrame {
    Today,
    #[default]
    Scheduled,
    Completed,
    All,
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeFrame::Today => "today",
            TimeFrame::Scheduled => "scheduled",
            TimeFrame::Completed => "completed",
            TimeFrame::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for TimeFrame {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(TimeFrame::Today),
            "scheduled" => Ok(TimeFrame::Scheduled),
            "completed" | "done" => Ok(TimeFrame::Completed),
            "all" => Ok(TimeFrame::All),
            _ => Err(ParseEnumError {
                kind: "time frame",
                value: s.to_string(),
                expected: "today, scheduled, completed, all",
            }),
        }
    }
}

/// Incomplete tasks due today or earlier, overdue ones first.
pub fn today_view(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.done && t.date.is_some_and(|d| d <= today))
        .cloned()
        .collect();
    out.sort_by(schedule_order);
    out
}

/// Incomplete dated tasks grouped into buckets.
pub fn scheduled_view(tasks: &[Task], today: NaiveDate) -> Buckets {
    classify(tasks.iter().filter(|t| !t.done), today)
}

/// Completed tasks, most recently completed first.
pub fn completed_view(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.iter().filter(|t| t.done).cloned().collect();
    out.sort_by_key(|t| Reverse(t.completed_at));
    out
}

/// Incomplete undated tasks, highest priority first.
pub fn unscheduled(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.done && t.date.is_none())
        .cloned()
        .collect();
    out.sort_by_key(|t| (Reverse(t.priority), t.id));
    out
}

/// Everything: open dated tasks in schedule order, then open undated ones,
/// then completed ones.
pub fn all_view(tasks: &[Task]) -> Vec<Task> {
    let mut dated: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.done && t.date.is_some())
        .cloned()
        .collect();
    dated.sort_by(schedule_order);
    dated.extend(unscheduled(tasks));
    dated.extend(completed_view(tasks));
    dated
}
