//! Keeps the alarm scheduler in step with the task store.
//!
//! The service asks [`next_trigger`] for a wake-up whenever a task is
//! created, edited, toggled or rescanned, and runs [`advance`] when a
//! wake-up is delivered.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::alarm::{Alarm, AlarmScheduler};
use crate::error::{StoreError, StoreResult};
use crate::models::{NewTask, Task};
use crate::recurrence::advance;
use crate::storage::TaskStore;
use crate::trigger::{next_trigger, resolve_local};

/// Shows a notification to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, task: &Task);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, task: &Task) {
        (**self).notify(task)
    }
}

/// Prints notifications on stdout.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, task: &Task) {
        info!(id = task.id, title = %task.title, "notification delivered");
        match &task.notes {
            Some(notes) => println!("Reminder: {} ({})", task.title, notes),
            None => println!("Reminder: {}", task.title),
        }
    }
}

/// Outcome of one [`ReminderService::deliver_due`] pass.
///
/// Failed alarms stay pending and are retried on the next pass.
#[derive(Debug, Default)]
pub struct Delivery {
    pub delivered: Vec<Task>,
    pub failed: Vec<(u64, StoreError)>,
}

pub struct ReminderService<S, A, N> {
    store: S,
    alarms: A,
    notifier: N,
}

impl<S, A, N> ReminderService<S, A, N>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    pub fn new(store: S, alarms: A, notifier: N) -> Self {
        ReminderService {
            store,
            alarms,
            notifier,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn alarms(&self) -> &A {
        &self.alarms
    }

    /// Registers or cancels the wake-up for one stored task.
    pub fn sync(&self, id: u64, now: DateTime<Local>) -> StoreResult<Option<DateTime<Local>>> {
        let task = self.store.get(id)?;
        self.sync_task(&task, now)
    }

    fn sync_task(&self, task: &Task, now: DateTime<Local>) -> StoreResult<Option<DateTime<Local>>> {
        let trigger = if task.done {
            None
        } else {
            next_trigger(task, &now)
        };
        match trigger {
            Some(at) => self.alarms.schedule(task.id, at)?,
            None => self.alarms.cancel(task.id)?,
        }
        Ok(trigger)
    }

    pub fn create(&self, new_task: NewTask, now: DateTime<Local>) -> StoreResult<Task> {
        let task = self.store.insert(new_task)?;
        self.sync_task(&task, now)?;
        Ok(task)
    }

    /// Replaces a task with an edited copy.
    ///
    /// Moving the schedule starts a fresh occurrence, so `notified` is cleared.
    pub fn edit(&self, mut task: Task, now: DateTime<Local>) -> StoreResult<Task> {
        task.validate()?;
        task.title = task.title.trim().to_string();
        if task.done != task.completed_at.is_some() {
            task.set_done(task.done, now);
        }
        let stored = self.store.modify(task.id, &mut |current: &mut Task| {
            let moved = current.schedule_differs(&task);
            *current = task.clone();
            if moved {
                current.notified = false;
            }
        })?;
        self.sync_task(&stored, now)?;
        Ok(stored)
    }

    /// Marks a task done, or reopens it.
    pub fn toggle_done(&self, id: u64, now: DateTime<Local>) -> StoreResult<Task> {
        let task = self
            .store
            .modify(id, &mut |task: &mut Task| task.set_done(!task.done, now))?;
        self.sync_task(&task, now)?;
        Ok(task)
    }

    pub fn delete(&self, id: u64) -> StoreResult<()> {
        self.store.delete(id)?;
        self.alarms.cancel(id)
    }

    pub fn delete_completed(&self) -> StoreResult<Vec<u64>> {
        let removed = self.store.delete_completed()?;
        for id in &removed {
            self.alarms.cancel(*id)?;
        }
        Ok(removed)
    }

    /// Re-registers every wake-up, as after a device reboot.
    ///
    /// Returns the number of alarms now pending.
    pub fn rescan(&self, now: DateTime<Local>) -> StoreResult<usize> {
        let tasks = self.store.list_all()?;
        for alarm in self.alarms.pending()? {
            if !tasks.iter().any(|t| t.id == alarm.task_id) {
                debug!(task_id = alarm.task_id, "dropping alarm for missing task");
                self.alarms.cancel(alarm.task_id)?;
            }
        }
        let mut scheduled = 0;
        for task in &tasks {
            if self.sync_task(task, now)?.is_some() {
                scheduled += 1;
            }
        }
        info!(tasks = tasks.len(), scheduled, "rescan finished");
        Ok(scheduled)
    }

    /// Handles a delivered wake-up: notify, advance, persist, reschedule.
    ///
    /// The advance runs inside the store's read-modify-write against the
    /// current record. If the schedule was edited while the notification
    /// was showing, the edit stands and only the wake-up is re-registered.
    ///
    /// Returns the stored task, or `None` when the task is gone or done.
    pub fn deliver(&self, id: u64, now: DateTime<Local>) -> StoreResult<Option<Task>> {
        let fired = match self.store.get(id) {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => {
                warn!(task_id = id, "wake-up for a deleted task");
                self.alarms.cancel(id)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if fired.done {
            warn!(task_id = id, "wake-up for a completed task");
            self.alarms.cancel(id)?;
            return Ok(None);
        }

        self.notifier.notify(&fired);
        let stored = self.store.modify(id, &mut |current: &mut Task| {
            if current.done || current.schedule_differs(&fired) {
                debug!(task_id = id, "task changed during delivery, not advancing");
                return;
            }
            *current = advance(current.clone());
        });
        let stored = match stored {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => {
                warn!(task_id = id, "task deleted during delivery");
                self.alarms.cancel(id)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        self.sync_task(&stored, now)?;
        Ok(Some(stored))
    }

    /// Delivers every alarm due at or before `now`, earliest first.
    ///
    /// An alarm is only consumed by a successful delivery. A failure is
    /// logged and recorded, and the pass moves on to the next alarm.
    pub fn deliver_due(&self, now: DateTime<Local>) -> StoreResult<Delivery> {
        let due: Vec<Alarm> = self
            .alarms
            .pending()?
            .into_iter()
            .filter(|a| a.at <= now)
            .collect();
        debug!(count = due.len(), "delivering due alarms");

        let mut report = Delivery::default();
        for alarm in due {
            match self.deliver_alarm(&alarm, now) {
                Ok(Some(task)) => report.delivered.push(task),
                Ok(None) => {}
                Err(e) => {
                    warn!(task_id = alarm.task_id, error = %e, "delivery failed, alarm kept");
                    report.failed.push((alarm.task_id, e));
                }
            }
        }
        Ok(report)
    }

    /// Delivers `alarm` if it still marks the task's current occurrence.
    /// An alarm left over from an earlier occurrence is re-synced instead.
    fn deliver_alarm(&self, alarm: &Alarm, now: DateTime<Local>) -> StoreResult<Option<Task>> {
        let task = match self.store.get(alarm.task_id) {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => return self.deliver(alarm.task_id, now),
            Err(e) => return Err(e),
        };
        let occurrence = task
            .scheduled_at()
            .map(|local| resolve_local(&now.timezone(), local));
        if !task.done && occurrence != Some(alarm.at) {
            debug!(task_id = task.id, at = %alarm.at, "stale alarm");
            self.sync_task(&task, now)?;
            return Ok(None);
        }
        self.deliver(alarm.task_id, now)
    }
}
