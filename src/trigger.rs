use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};
use tracing::debug;

use crate::models::{Repeat, Task};

/// Computes the instant at which the alarm scheduler should wake up for `task`.
///
/// Returns `None` when the task has no date, or when a one-shot task already
/// fired or lies strictly before `now`. A missing time counts as start of day.
///
/// Repeating tasks always get their current occurrence back, even when it is
/// already in the past. Skipping ahead to a future occurrence is left to the
/// caller.
pub fn next_trigger<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let local = task.scheduled_at()?;
    let one_shot = task.repeat == Repeat::None;
    if one_shot && task.notified {
        debug!(id = task.id, "one-shot task already notified");
        return None;
    }

    let at = resolve_local(&now.timezone(), local);
    if one_shot && at < *now {
        debug!(id = task.id, %local, "one-shot task is stale");
        return None;
    }
    Some(at)
}

/// Maps a wall-clock time onto `tz`.
///
/// Ambiguous times (clocks turned back) take the earlier instant. Times that
/// do not exist (clocks turned forward) move one hour later.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}
