use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::alarm::{AlarmBook, AlarmScheduler};
use crate::buckets::Bucket;
use crate::config::Config;
use crate::error::CommandError;
use crate::models::{NewTask, Priority, Repeat, Task};
use crate::reminders::{ConsoleNotifier, Notifier, ReminderService};
use crate::storage::{JsonTaskStore, TaskStore};
use crate::views::{all_view, completed_view, scheduled_view, today_view, unscheduled, TimeFrame};

/// The service as wired by the binary: JSON files and console notifications.
pub type HostService = ReminderService<JsonTaskStore, AlarmBook, ConsoleNotifier>;

pub fn open_service(config: &Config) -> Result<HostService, CommandError> {
    let store = JsonTaskStore::open(&config.tasks_path)?;
    let alarms = AlarmBook::open(&config.alarms_path)?;
    Ok(ReminderService::new(store, alarms, ConsoleNotifier))
}

/// Fields of a task being added, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub title: String,
    pub notes: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub repeat: Option<Repeat>,
    pub priority: Option<Priority>,
}

/// Changes to an existing task. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub repeat: Option<Repeat>,
    pub priority: Option<Priority>,
    pub clear_date: bool,
    pub clear_time: bool,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| CommandError::BadInput {
        field: "date",
        value: s.to_string(),
        format: "YYYY-MM-DD",
    })
}

pub fn parse_time(s: &str) -> Result<NaiveTime, CommandError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| CommandError::BadInput {
            field: "time",
            value: s.to_string(),
            format: "HH:MM",
        })
}

/// Adds a new task and registers its reminder.
pub fn cmd_add<S, A, N>(
    svc: &ReminderService<S, A, N>,
    input: TaskInput,
    now: DateTime<Local>,
) -> Result<Task, CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let new_task = NewTask {
        title: input.title,
        notes: input.notes,
        date: input.date.as_deref().map(parse_date).transpose()?,
        time: input.time.as_deref().map(parse_time).transpose()?,
        repeat: input.repeat.unwrap_or_default(),
        priority: input.priority.unwrap_or_default(),
    };
    new_task.validate()?;

    let task = svc.create(new_task, now)?;
    println!("Task added (id = {})", task.id);
    report_reminder(svc, task.id)?;
    Ok(task)
}

/// Edits an existing task's details.
pub fn cmd_edit<S, A, N>(
    svc: &ReminderService<S, A, N>,
    id: u64,
    edit: TaskEdit,
    now: DateTime<Local>,
) -> Result<Task, CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let mut t = svc.store().get(id)?;
    if let Some(title) = edit.title { t.title = title; }
    if let Some(notes) = edit.notes {
        t.notes = if notes.trim().is_empty() { None } else { Some(notes) };
    }
    if let Some(r) = edit.repeat { t.repeat = r; }
    if let Some(p) = edit.priority { t.priority = p; }
    if edit.clear_date { t.date = None; }
    if edit.clear_time { t.time = None; }
    if let Some(d) = edit.date { t.date = Some(parse_date(&d)?); }
    if let Some(tm) = edit.time { t.time = Some(parse_time(&tm)?); }
    t.validate()?;

    let task = svc.edit(t, now)?;
    println!("Task {} updated.", id);
    report_reminder(svc, id)?;
    Ok(task)
}

/// Toggles a task between done and open.
pub fn cmd_done<S, A, N>(
    svc: &ReminderService<S, A, N>,
    id: u64,
    now: DateTime<Local>,
) -> Result<Task, CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let task = svc.toggle_done(id, now)?;
    if task.done {
        println!("Task {} marked as complete.", id);
    } else {
        println!("Task {} reopened.", id);
        report_reminder(svc, id)?;
    }
    Ok(task)
}

/// Removes a task and its pending reminder.
pub fn cmd_remove<S, A, N>(svc: &ReminderService<S, A, N>, id: u64) -> Result<(), CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    svc.delete(id)?;
    println!("Task {} removed.", id);
    Ok(())
}

/// Deletes all completed tasks.
pub fn cmd_clear_completed<S, A, N>(svc: &ReminderService<S, A, N>) -> Result<Vec<u64>, CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let removed = svc.delete_completed()?;
    println!("{} completed task(s) removed.", removed.len());
    Ok(removed)
}

/// Re-registers every reminder, as the platform does after a reboot.
pub fn cmd_rescan<S, A, N>(
    svc: &ReminderService<S, A, N>,
    now: DateTime<Local>,
) -> Result<usize, CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let scheduled = svc.rescan(now)?;
    println!("{} reminder(s) scheduled.", scheduled);
    Ok(scheduled)
}

/// Fires every reminder that is due.
pub fn cmd_tick<S, A, N>(
    svc: &ReminderService<S, A, N>,
    now: DateTime<Local>,
) -> Result<Vec<Task>, CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let report = svc.deliver_due(now)?;
    for t in &report.delivered {
        if t.repeat.is_repeating() {
            println!("Task {} next due {}", t.id, describe_schedule(t));
        }
    }
    for (id, e) in &report.failed {
        eprintln!("Reminder for task {} not delivered: {}", id, e);
    }
    if !report.failed.is_empty() {
        return Err(CommandError::Undelivered(report.failed.len()));
    }
    if report.delivered.is_empty() {
        println!("No reminders due.");
    }
    Ok(report.delivered)
}

/// Lists tasks for one time frame.
pub fn cmd_list<S, A, N>(
    svc: &ReminderService<S, A, N>,
    frame: TimeFrame,
    today: NaiveDate,
) -> Result<(), CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    let tasks = svc.store().list_all()?;
    match frame {
        TimeFrame::Today => print_tasks(&today_view(&tasks, today), today),
        TimeFrame::Completed => print_tasks(&completed_view(&tasks), today),
        TimeFrame::All => print_tasks(&all_view(&tasks), today),
        TimeFrame::Scheduled => {
            let buckets = scheduled_view(&tasks, today);
            let undated = unscheduled(&tasks);
            if buckets.is_empty() && undated.is_empty() {
                println!("No tasks found.");
                return Ok(());
            }
            for (bucket, group) in buckets.iter() {
                print_heading(bucket.label(), bucket == Bucket::PastDue);
                println!("{}", task_table(group, today));
            }
            if !undated.is_empty() {
                print_heading("Unscheduled", false);
                println!("{}", task_table(&undated, today));
            }
        }
    }
    Ok(())
}

fn report_reminder<S, A, N>(svc: &ReminderService<S, A, N>, id: u64) -> Result<(), CommandError>
where
    S: TaskStore,
    A: AlarmScheduler,
    N: Notifier,
{
    if let Some(alarm) = svc.alarms().pending()?.into_iter().find(|a| a.task_id == id) {
        println!("Reminder set for {}", alarm.at.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn describe_schedule(t: &Task) -> String {
    match (t.date, t.time) {
        (Some(d), Some(tm)) => format!("{} {}", d, tm.format("%H:%M")),
        (Some(d), None) => d.to_string(),
        _ => "-".to_string(),
    }
}

fn print_heading(label: &str, alert: bool) {
    if alert {
        println!("\n{} (!)", label);
    } else {
        println!("\n{}", label);
    }
}

fn print_tasks(tasks: &[Task], today: NaiveDate) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    println!("{}", task_table(tasks, today));
}

fn task_table(tasks: &[Task], today: NaiveDate) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Repeat").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let overdue = !t.done && t.date.is_some_and(|d| d < today);
        let priority_color = match t.priority {
            Priority::High => Color::Red,
            Priority::Medium => Color::Yellow,
            Priority::Low => Color::Green,
            Priority::None => Color::Reset,
        };
        let status = if t.done { "Done" } else { "Pending" };
        let status_color = if t.done { Color::Green } else { Color::Yellow };

        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.title),
            Cell::new(t.date.map(|d| d.to_string()).unwrap_or_default())
                .fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(t.time.map(|tm| tm.format("%H:%M").to_string()).unwrap_or_default()),
            Cell::new(t.repeat),
            Cell::new(t.priority).fg(priority_color),
            Cell::new(status).fg(status_color),
        ]);
    }
    table
}
