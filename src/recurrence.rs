use chrono::{Duration, Months, NaiveDate, NaiveTime};
use tracing::{debug, warn};

use crate::models::{Repeat, Task};

/// Moves a task to its next occurrence after its notification fired.
///
/// A non-repeating task keeps its date and time and is only marked as
/// notified. Any real advance clears `notified` so the new occurrence can
/// fire again. See [`next_occurrence`] for the calendar rules.
pub fn advance(mut task: Task) -> Task {
    if task.repeat.is_repeating() && task.date.is_none() {
        warn!(id = task.id, repeat = %task.repeat, "repeating task has no date; leaving schedule as is");
    }

    match task
        .date
        .and_then(|date| next_occurrence(task.repeat, date, task.time))
    {
        Some((date, time)) => {
            task.date = Some(date);
            task.time = time;
            task.notified = false;
            debug!(id = task.id, repeat = %task.repeat, %date, ?time, "advanced to next occurrence");
        }
        None => task.notified = true,
    }
    task
}

/// The occurrence following (`date`, `time`) under `repeat`, or `None` when
/// the task does not repeat.
///
/// - **Hourly**: one hour later, rolling the date over at midnight.
/// - **Daily** / **Weekly**: one / seven days later, same time.
/// - **Monthly** / **Yearly**: same day next month / year, clamped to the
///   last day of a shorter month (Jan 31 -> Feb 28/29, Feb 29 -> Feb 28).
pub fn next_occurrence(
    repeat: Repeat,
    date: NaiveDate,
    time: Option<NaiveTime>,
) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let next = match repeat {
        Repeat::None => return None,
        Repeat::Hourly => {
            let from = time.unwrap_or_else(|| {
                warn!("hourly occurrence without a time; counting from midnight");
                NaiveTime::MIN
            });
            let (next_time, overflow) = from.overflowing_add_signed(Duration::hours(1));
            return Some((date + Duration::seconds(overflow), Some(next_time)));
        }
        Repeat::Daily => date + Duration::days(1),
        Repeat::Weekly => date + Duration::weeks(1),
        Repeat::Monthly => add_months(date, 1),
        Repeat::Yearly => add_months(date, 12),
    };
    Some((next, time))
}

/// Calendar-month addition. chrono clamps the day to the target month's length.
fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}
