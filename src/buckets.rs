use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::models::Task;

/// One of the time-relative groups of the scheduled view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    PastDue,
    Today,
    Tomorrow,
    ThisWeek,
    Upcoming,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::PastDue,
        Bucket::Today,
        Bucket::Tomorrow,
        Bucket::ThisWeek,
        Bucket::Upcoming,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::PastDue => "Past due",
            Bucket::Today => "Today",
            Bucket::Tomorrow => "Tomorrow",
            Bucket::ThisWeek => "This week",
            Bucket::Upcoming => "Upcoming",
        }
    }
}

/// Dated tasks partitioned by [`Bucket`], each group in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub past_due: Vec<Task>,
    pub today: Vec<Task>,
    pub tomorrow: Vec<Task>,
    pub this_week: Vec<Task>,
    pub upcoming: Vec<Task>,
}

impl Buckets {
    pub fn get(&self, bucket: Bucket) -> &[Task] {
        match bucket {
            Bucket::PastDue => &self.past_due,
            Bucket::Today => &self.today,
            Bucket::Tomorrow => &self.tomorrow,
            Bucket::ThisWeek => &self.this_week,
            Bucket::Upcoming => &self.upcoming,
        }
    }

    fn get_mut(&mut self, bucket: Bucket) -> &mut Vec<Task> {
        match bucket {
            Bucket::PastDue => &mut self.past_due,
            Bucket::Today => &mut self.today,
            Bucket::Tomorrow => &mut self.tomorrow,
            Bucket::ThisWeek => &mut self.this_week,
            Bucket::Upcoming => &mut self.upcoming,
        }
    }

    /// Non-empty buckets in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[Task])> {
        Bucket::ALL
            .into_iter()
            .map(move |b| (b, self.get(b)))
            .filter(|(_, tasks)| !tasks.is_empty())
    }

    pub fn len(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.get(*b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Last day (Sunday) of the ISO week containing `today`.
pub fn end_of_week(today: NaiveDate) -> NaiveDate {
    let weekday = today.weekday().number_from_monday() as i64;
    today + Duration::days(7 - weekday)
}

/// Bucket for a single date relative to `today`.
///
/// Week ends on Sunday, so when `today` is a Sunday nothing is "this week"
/// and the day after tomorrow is already upcoming.
pub fn bucket_for(date: NaiveDate, today: NaiveDate) -> Bucket {
    let days = (date - today).num_days();
    match days {
        d if d < 0 => Bucket::PastDue,
        0 => Bucket::Today,
        1 => Bucket::Tomorrow,
        _ if date <= end_of_week(today) => Bucket::ThisWeek,
        _ => Bucket::Upcoming,
    }
}

/// Display order for dated tasks: by date, then time, untimed last.
pub fn schedule_order(a: &Task, b: &Task) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| match (a.time, b.time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Partitions incomplete, dated tasks into buckets relative to `today`.
///
/// Bucketing looks at the date only. Tasks without a date are skipped; they
/// belong to the unscheduled list. Must be recomputed when the task set
/// changes or the local date rolls over.
pub fn classify<'a, I>(tasks: I, today: NaiveDate) -> Buckets
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut buckets = Buckets::default();
    for task in tasks {
        let Some(date) = task.date else {
            continue;
        };
        buckets.get_mut(bucket_for(date, today)).push(task.clone());
    }
    for bucket in Bucket::ALL {
        buckets.get_mut(bucket).sort_by(schedule_order);
    }
    debug!(today = %today, total = buckets.len(), "classified tasks");
    buckets
}
