use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use remindust::alarm::{AlarmBook, AlarmScheduler};
use remindust::error::{StoreError, StoreResult};
use remindust::models::{NewTask, Repeat, Task};
use remindust::reminders::{Notifier, ReminderService};
use remindust::storage::{MemoryTaskStore, TaskStore};
use remindust::subscription::{Listener, Subscription};

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<u64>>,
}

impl Notifier for Recorder {
    fn notify(&self, task: &Task) {
        self.seen.lock().unwrap().push(task.id);
    }
}

impl Recorder {
    fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }
}

/// Changes the task it is shown, the way a user acting on the
/// notification would, before delivery finishes.
struct EditingNotifier {
    store: Arc<MemoryTaskStore>,
    edit: fn(&mut Task),
}

impl Notifier for EditingNotifier {
    fn notify(&self, task: &Task) {
        let mut current = self.store.get(task.id).unwrap();
        (self.edit)(&mut current);
        self.store.update(&current).unwrap();
    }
}

/// Memory store whose writes to one task always fail.
struct FlakyStore {
    inner: MemoryTaskStore,
    broken: u64,
}

impl FlakyStore {
    fn check(&self, id: u64) -> StoreResult<()> {
        if id == self.broken {
            return Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
        }
        Ok(())
    }
}

impl TaskStore for FlakyStore {
    fn list_all(&self) -> StoreResult<Vec<Task>> {
        self.inner.list_all()
    }

    fn insert(&self, new_task: NewTask) -> StoreResult<Task> {
        self.inner.insert(new_task)
    }

    fn update(&self, task: &Task) -> StoreResult<()> {
        self.check(task.id)?;
        self.inner.update(task)
    }

    fn modify(&self, id: u64, f: &mut dyn FnMut(&mut Task)) -> StoreResult<Task> {
        self.check(id)?;
        self.inner.modify(id, f)
    }

    fn delete(&self, id: u64) -> StoreResult<()> {
        self.inner.delete(id)
    }

    fn delete_completed(&self) -> StoreResult<Vec<u64>> {
        self.inner.delete_completed()
    }

    fn subscribe(&self, listener: Listener) -> StoreResult<Subscription> {
        self.inner.subscribe(listener)
    }
}

type Service = ReminderService<MemoryTaskStore, AlarmBook, Arc<Recorder>>;

fn service() -> (Service, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let svc = ReminderService::new(MemoryTaskStore::new(), AlarmBook::in_memory(), recorder.clone());
    (svc, recorder)
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn local(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
}

fn alarm_for(svc: &Service, id: u64) -> Option<DateTime<Local>> {
    svc.alarms()
        .pending()
        .unwrap()
        .into_iter()
        .find(|a| a.task_id == id)
        .map(|a| a.at)
}

#[test]
fn test_create_schedules_future_reminder() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc
        .create(NewTask::new("Call mom").on(d(2030, 1, 11)).at(hm(9, 0)), now)
        .unwrap();

    assert_eq!(alarm_for(&svc, t.id), Some(local(2030, 1, 11, 9, 0)));
}

#[test]
fn test_create_without_date_schedules_nothing() {
    let (svc, _) = service();
    svc.create(NewTask::new("Someday"), local(2030, 1, 10, 12, 0)).unwrap();
    assert!(svc.alarms().pending().unwrap().is_empty());
}

#[test]
fn test_create_stale_one_shot_schedules_nothing() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    svc.create(NewTask::new("Missed").on(d(2030, 1, 9)).at(hm(9, 0)), now).unwrap();
    assert!(svc.alarms().pending().unwrap().is_empty());
}

#[test]
fn test_deliver_one_shot_marks_notified_and_clears_alarm() {
    let (svc, recorder) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc
        .create(NewTask::new("Dentist").on(d(2030, 1, 10)).at(hm(14, 0)), now)
        .unwrap();

    let fired_at = local(2030, 1, 10, 14, 0);
    let report = svc.deliver_due(fired_at).unwrap();
    assert_eq!(report.delivered.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(recorder.seen(), vec![t.id]);

    let stored = svc.store().get(t.id).unwrap();
    assert!(stored.notified);
    assert_eq!(stored.date, Some(d(2030, 1, 10)));
    assert_eq!(alarm_for(&svc, t.id), None);

    // a rescan must not bring it back
    svc.rescan(fired_at).unwrap();
    assert_eq!(alarm_for(&svc, t.id), None);
}

#[test]
fn test_deliver_daily_advances_and_reschedules() {
    let (svc, recorder) = service();
    let now = local(2030, 1, 10, 6, 0);
    let t = svc
        .create(
            NewTask::new("Pills").on(d(2030, 1, 10)).at(hm(8, 0)).repeating(Repeat::Daily),
            now,
        )
        .unwrap();

    let advanced = svc.deliver(t.id, local(2030, 1, 10, 8, 0)).unwrap().unwrap();
    assert_eq!(advanced.date, Some(d(2030, 1, 11)));
    assert!(!advanced.notified);
    assert_eq!(svc.store().get(t.id).unwrap(), advanced);
    assert_eq!(alarm_for(&svc, t.id), Some(local(2030, 1, 11, 8, 0)));
    assert_eq!(recorder.seen(), vec![t.id]);
}

#[test]
fn test_deliver_due_leaves_future_alarms() {
    let (svc, recorder) = service();
    let now = local(2030, 1, 10, 6, 0);
    let soon = svc.create(NewTask::new("Soon").on(d(2030, 1, 10)).at(hm(7, 0)), now).unwrap();
    let later = svc.create(NewTask::new("Later").on(d(2030, 1, 12)).at(hm(7, 0)), now).unwrap();

    svc.deliver_due(local(2030, 1, 10, 7, 30)).unwrap();
    assert_eq!(recorder.seen(), vec![soon.id]);
    assert_eq!(alarm_for(&svc, later.id), Some(local(2030, 1, 12, 7, 0)));
}

#[test]
fn test_stale_recurring_task_advances_one_step_per_delivery() {
    let (svc, recorder) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc
        .create(
            NewTask::new("Standup").on(d(2030, 1, 7)).at(hm(9, 0)).repeating(Repeat::Daily),
            now,
        )
        .unwrap();
    // the past occurrence is scheduled as-is
    assert_eq!(alarm_for(&svc, t.id), Some(local(2030, 1, 7, 9, 0)));

    svc.deliver_due(now).unwrap();
    assert_eq!(svc.store().get(t.id).unwrap().date, Some(d(2030, 1, 8)));
    svc.deliver_due(now).unwrap();
    assert_eq!(svc.store().get(t.id).unwrap().date, Some(d(2030, 1, 9)));
    assert_eq!(recorder.seen().len(), 2);
}

#[test]
fn test_deliver_for_deleted_task_is_a_no_op() {
    let (svc, recorder) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc.create(NewTask::new("Gone").on(d(2030, 1, 11)), now).unwrap();
    svc.store().delete(t.id).unwrap();

    assert_eq!(svc.deliver(t.id, now).unwrap(), None);
    assert!(recorder.seen().is_empty());
    assert_eq!(alarm_for(&svc, t.id), None);
}

#[test]
fn test_delete_cancels_alarm() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc.create(NewTask::new("Cancel me").on(d(2030, 1, 11)), now).unwrap();
    assert!(alarm_for(&svc, t.id).is_some());

    svc.delete(t.id).unwrap();
    assert_eq!(alarm_for(&svc, t.id), None);
    assert!(svc.store().list_all().unwrap().is_empty());
}

#[test]
fn test_toggle_done_cancels_and_reopen_reschedules() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc.create(NewTask::new("Report").on(d(2030, 1, 15)).at(hm(17, 0)), now).unwrap();

    let done = svc.toggle_done(t.id, now).unwrap();
    assert!(done.done);
    assert_eq!(done.completed_at, Some(now));
    assert_eq!(alarm_for(&svc, t.id), None);

    let reopened = svc.toggle_done(t.id, now).unwrap();
    assert!(!reopened.done);
    assert_eq!(reopened.completed_at, None);
    assert_eq!(alarm_for(&svc, t.id), Some(local(2030, 1, 15, 17, 0)));
}

#[test]
fn test_delete_completed_cancels_their_alarms() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let a = svc.create(NewTask::new("A").on(d(2030, 1, 11)), now).unwrap();
    let b = svc.create(NewTask::new("B").on(d(2030, 1, 12)), now).unwrap();
    svc.toggle_done(a.id, now).unwrap();

    assert_eq!(svc.delete_completed().unwrap(), vec![a.id]);
    assert_eq!(alarm_for(&svc, a.id), None);
    assert!(alarm_for(&svc, b.id).is_some());
}

#[test]
fn test_edit_moving_schedule_resets_notified() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc.create(NewTask::new("Once").on(d(2030, 1, 10)).at(hm(13, 0)), now).unwrap();
    svc.deliver(t.id, local(2030, 1, 10, 13, 0)).unwrap();
    let mut fired = svc.store().get(t.id).unwrap();
    assert!(fired.notified);

    fired.date = Some(d(2030, 1, 20));
    let edited = svc.edit(fired, now).unwrap();
    assert!(!edited.notified);
    assert_eq!(alarm_for(&svc, t.id), Some(local(2030, 1, 20, 13, 0)));
}

#[test]
fn test_edit_title_only_keeps_notified() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let t = svc.create(NewTask::new("Once").on(d(2030, 1, 10)).at(hm(13, 0)), now).unwrap();
    svc.deliver(t.id, local(2030, 1, 10, 13, 0)).unwrap();

    let mut fired = svc.store().get(t.id).unwrap();
    fired.title = "  Renamed ".into();
    let edited = svc.edit(fired, now).unwrap();
    assert!(edited.notified);
    assert_eq!(edited.title, "Renamed");
    assert_eq!(alarm_for(&svc, t.id), None);
}

#[test]
fn test_edit_rejects_blank_title() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    let mut t = svc.create(NewTask::new("Keep"), now).unwrap();
    t.title = " ".into();

    assert!(svc.edit(t, now).is_err());
    assert_eq!(svc.store().get(1).unwrap().title, "Keep");
}

#[test]
fn test_rescan_registers_tasks_and_drops_orphans() {
    let (svc, _) = service();
    let now = local(2030, 1, 10, 12, 0);
    // written straight to the store, as if alarms were lost on reboot
    let a = svc.store().insert(NewTask::new("A").on(d(2030, 1, 11)).at(hm(9, 0))).unwrap();
    svc.store().insert(NewTask::new("Undated")).unwrap();
    svc.alarms().schedule(99, local(2030, 1, 11, 9, 0)).unwrap();

    assert_eq!(svc.rescan(now).unwrap(), 1);
    let pending = svc.alarms().pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].task_id, a.id);
}

fn editing_service(
    edit: fn(&mut Task),
) -> (ReminderService<Arc<MemoryTaskStore>, AlarmBook, EditingNotifier>, Arc<MemoryTaskStore>) {
    let store = Arc::new(MemoryTaskStore::new());
    let notifier = EditingNotifier {
        store: store.clone(),
        edit,
    };
    let svc = ReminderService::new(store.clone(), AlarmBook::in_memory(), notifier);
    (svc, store)
}

fn pills() -> NewTask {
    NewTask::new("Pills").on(d(2030, 1, 10)).at(hm(8, 0)).repeating(Repeat::Daily)
}

#[test]
fn test_deliver_keeps_schedule_edit_made_during_notification() {
    let (svc, store) = editing_service(|t| {
        t.title = "edited by user".into();
        t.date = Some(d(2030, 3, 1));
    });
    let t = svc.create(pills(), local(2030, 1, 10, 6, 0)).unwrap();

    let stored = svc.deliver(t.id, local(2030, 1, 10, 8, 0)).unwrap().unwrap();
    assert_eq!(stored.title, "edited by user");
    assert_eq!(stored.date, Some(d(2030, 3, 1)));
    assert_eq!(store.get(t.id).unwrap(), stored);

    let pending = svc.alarms().pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].at, local(2030, 3, 1, 8, 0));
}

#[test]
fn test_deliver_advances_on_top_of_title_edit() {
    let (svc, store) = editing_service(|t| t.title = "Vitamins".into());
    let t = svc.create(pills(), local(2030, 1, 10, 6, 0)).unwrap();

    let stored = svc.deliver(t.id, local(2030, 1, 10, 8, 0)).unwrap().unwrap();
    assert_eq!(stored.title, "Vitamins");
    assert_eq!(stored.date, Some(d(2030, 1, 11)));
    assert_eq!(store.get(t.id).unwrap(), stored);
}

#[test]
fn test_deliver_skips_advance_when_completed_during_notification() {
    let (svc, store) = editing_service(|t| t.set_done(true, local(2030, 1, 10, 8, 1)));
    let t = svc.create(pills(), local(2030, 1, 10, 6, 0)).unwrap();

    let stored = svc.deliver(t.id, local(2030, 1, 10, 8, 0)).unwrap().unwrap();
    assert!(stored.done);
    assert_eq!(store.get(t.id).unwrap().date, Some(d(2030, 1, 10)));
    assert!(svc.alarms().pending().unwrap().is_empty());
}

#[test]
fn test_deliver_due_continues_past_a_failed_task() {
    let recorder = Arc::new(Recorder::default());
    let store = FlakyStore {
        inner: MemoryTaskStore::new(),
        broken: 1,
    };
    let svc = ReminderService::new(store, AlarmBook::in_memory(), recorder.clone());
    let now = local(2030, 1, 10, 6, 0);
    for title in ["First", "Second"] {
        svc.create(
            NewTask::new(title).on(d(2030, 1, 10)).at(hm(7, 0)).repeating(Repeat::Daily),
            now,
        )
        .unwrap();
    }

    let report = svc.deliver_due(local(2030, 1, 10, 7, 0)).unwrap();
    let delivered: Vec<u64> = report.delivered.iter().map(|t| t.id).collect();
    assert_eq!(delivered, vec![2]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 1);
    assert!(matches!(report.failed[0].1, StoreError::Io(_)));

    // the failed task keeps its alarm for the next pass
    let pending = svc.alarms().pending().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].task_id, 1);
    assert_eq!(pending[0].at, local(2030, 1, 10, 7, 0));
    assert_eq!(pending[1].task_id, 2);
    assert_eq!(pending[1].at, local(2030, 1, 11, 7, 0));
    assert_eq!(svc.store().get(1).unwrap().date, Some(d(2030, 1, 10)));
    assert_eq!(recorder.seen(), vec![1, 2]);
}

#[test]
fn test_stale_alarm_is_resynced_not_delivered() {
    let (svc, recorder) = service();
    let t = svc.create(pills(), local(2030, 1, 10, 6, 0)).unwrap();

    // the task moved on but the alarm for its old occurrence is still pending
    let mut moved = svc.store().get(t.id).unwrap();
    moved.date = Some(d(2030, 1, 11));
    svc.store().update(&moved).unwrap();

    let report = svc.deliver_due(local(2030, 1, 10, 8, 0)).unwrap();
    assert!(report.delivered.is_empty());
    assert!(recorder.seen().is_empty());
    assert_eq!(svc.store().get(t.id).unwrap().date, Some(d(2030, 1, 11)));
    assert_eq!(alarm_for(&svc, t.id), Some(local(2030, 1, 11, 8, 0)));
}
