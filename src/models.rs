use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{ParseEnumError, ValidationError};

/// How often a task comes back after its notification fires.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    #[default]
    None,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Repeat {
    pub fn is_repeating(self) -> bool {
        self != Repeat::None
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Repeat::None => "none",
            Repeat::Hourly => "hourly",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
            Repeat::Monthly => "monthly",
            Repeat::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

impl FromStr for Repeat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "no" | "none" | "never" => Ok(Repeat::None),
            "hourly" => Ok(Repeat::Hourly),
            "daily" => Ok(Repeat::Daily),
            "weekly" => Ok(Repeat::Weekly),
            "monthly" => Ok(Repeat::Monthly),
            "yearly" | "annually" => Ok(Repeat::Yearly),
            _ => Err(ParseEnumError {
                kind: "repeat",
                value: s.to_string(),
                expected: "none, hourly, daily, weekly, monthly, yearly",
            }),
        }
    }
}

/// User-assigned importance. Ordered from `None` (lowest) to `High`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "no" | "none" => Ok(Priority::None),
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
                expected: "none, low, medium, high",
            }),
        }
    }
}

/// A single reminder as persisted by the task store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique identifier, assigned by the store.
    pub id: u64,
    /// What the reminder is about. Never blank.
    pub title: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Calendar date of the current occurrence.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Time of day of the current occurrence.
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub done: bool,
    /// Set exactly when `done` is true.
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
    /// Whether the notification for the current occurrence already fired.
    #[serde(default)]
    pub notified: bool,
    pub created_at: DateTime<Local>,
}

impl Task {
    /// Local date-time of the current occurrence. A missing time means start of day.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        self.date
            .map(|d| d.and_time(self.time.unwrap_or(NaiveTime::MIN)))
    }

    /// Flips the done flag, keeping `completed_at` in step with it.
    pub fn set_done(&mut self, done: bool, now: DateTime<Local>) {
        self.done = done;
        self.completed_at = if done { Some(now) } else { None };
    }

    /// Checks the fields a user can edit.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_fields(&self.title, self.date, self.time, self.repeat)
    }

    /// True when `other` describes a different occurrence than `self`.
    pub fn schedule_differs(&self, other: &Task) -> bool {
        self.date != other.date || self.time != other.time || self.repeat != other.repeat
    }
}

/// A task as submitted by the user, before the store assigns an id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub repeat: Repeat,
    pub priority: Priority,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn repeating(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_fields(&self.title, self.date, self.time, self.repeat)
    }

    /// Builds the stored record. The title is trimmed; callers validate first.
    pub fn into_task(self, id: u64, created_at: DateTime<Local>) -> Task {
        Task {
            id,
            title: self.title.trim().to_string(),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            date: self.date,
            time: self.time,
            repeat: self.repeat,
            priority: self.priority,
            done: false,
            completed_at: None,
            notified: false,
            created_at,
        }
    }
}

fn check_fields(
    title: &str,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    repeat: Repeat,
) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::BlankTitle);
    }
    if repeat.is_repeating() && date.is_none() {
        return Err(ValidationError::RepeatWithoutDate);
    }
    if repeat == Repeat::Hourly && time.is_none() {
        return Err(ValidationError::HourlyWithoutTime);
    }
    Ok(())
}
