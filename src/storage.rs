use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::models::{NewTask, Task};
use crate::subscription::{Listener, Subscribers, Subscription};

/// Persistent owner of all task records.
///
/// Every mutation is a single read-modify-write under the store's lock, so a
/// recurrence advance and a manual edit of the same task never interleave.
/// Subscribers see the full list after each successful mutation.
pub trait TaskStore: Send + Sync {
    /// All tasks in id order.
    fn list_all(&self) -> StoreResult<Vec<Task>>;

    fn list_incomplete(&self) -> StoreResult<Vec<Task>> {
        Ok(self.list_all()?.into_iter().filter(|t| !t.done).collect())
    }

    fn list_completed(&self) -> StoreResult<Vec<Task>> {
        Ok(self.list_all()?.into_iter().filter(|t| t.done).collect())
    }

    /// Incomplete tasks dated within `start..=end`.
    fn list_between(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<Task>> {
        Ok(self
            .list_incomplete()?
            .into_iter()
            .filter(|t| t.date.is_some_and(|d| start <= d && d <= end))
            .collect())
    }

    fn get(&self, id: u64) -> StoreResult<Task> {
        self.list_all()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Validates and stores a new task, assigning the next free id.
    fn insert(&self, new_task: NewTask) -> StoreResult<Task>;

    /// Replaces the stored record with the same id.
    fn update(&self, task: &Task) -> StoreResult<()>;

    /// Applies `f` to the stored record for `id` under the store's lock and
    /// returns the result. Nothing is written if the result fails validation.
    fn modify(&self, id: u64, f: &mut dyn FnMut(&mut Task)) -> StoreResult<Task>;

    fn delete(&self, id: u64) -> StoreResult<()>;

    /// Removes every completed task and returns their ids.
    fn delete_completed(&self) -> StoreResult<Vec<u64>>;

    /// Calls `listener` now and after every change until the handle is dropped.
    fn subscribe(&self, listener: Listener) -> StoreResult<Subscription>;
}

fn insert_into(tasks: &mut Vec<Task>, new_task: NewTask) -> StoreResult<Task> {
    new_task.validate()?;
    let next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
    let task = new_task.into_task(next_id, Local::now());
    tasks.push(task.clone());
    Ok(task)
}

fn replace_in(tasks: &mut [Task], task: &Task) -> StoreResult<()> {
    let slot = tasks
        .iter_mut()
        .find(|t| t.id == task.id)
        .ok_or(StoreError::NotFound(task.id))?;
    *slot = task.clone();
    Ok(())
}

fn modify_in(tasks: &mut [Task], id: u64, f: &mut dyn FnMut(&mut Task)) -> StoreResult<Task> {
    let slot = tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(StoreError::NotFound(id))?;
    let mut task = slot.clone();
    f(&mut task);
    task.validate()?;
    *slot = task.clone();
    Ok(task)
}

fn remove_from(tasks: &mut Vec<Task>, id: u64) -> StoreResult<()> {
    let len_before = tasks.len();
    tasks.retain(|t| t.id != id);
    if tasks.len() == len_before {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

fn remove_completed(tasks: &mut Vec<Task>) -> Vec<u64> {
    let removed: Vec<u64> = tasks.iter().filter(|t| t.done).map(|t| t.id).collect();
    tasks.retain(|t| !t.done);
    removed
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reads a JSON document, treating a missing file as `T::default()`.
pub(crate) fn read_json<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let mut f = OpenOptions::new().read(true).open(path)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    if s.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&s)?)
}

/// Replaces `path` with the pretty-printed JSON of `value`.
///
/// The document goes to a temp file in the same directory first and is then
/// renamed over `path`, so readers see either the old file or the new one.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(s.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Task store backed by a single JSON file (`tasks.json`).
pub struct JsonTaskStore {
    path: PathBuf,
    lock: Mutex<()>,
    subscribers: Subscribers,
}

impl JsonTaskStore {
    /// Opens the store at `path`, creating its directory if needed.
    /// The file itself is written on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        debug!(path = %path.display(), "opened task store");
        Ok(JsonTaskStore {
            path,
            lock: Mutex::new(()),
            subscribers: Subscribers::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Vec<Task>> {
        read_json(&self.path)
    }

    /// Loads, applies `f`, saves, then notifies subscribers outside the lock.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Task>) -> StoreResult<R>) -> StoreResult<R> {
        let (result, snapshot) = {
            let _guard = guard(&self.lock);
            let mut tasks = self.load()?;
            let result = f(&mut tasks)?;
            write_json(&self.path, &tasks)?;
            (result, tasks)
        };
        self.subscribers.emit(&snapshot);
        Ok(result)
    }
}

impl TaskStore for JsonTaskStore {
    fn list_all(&self) -> StoreResult<Vec<Task>> {
        let _guard = guard(&self.lock);
        self.load()
    }

    fn insert(&self, new_task: NewTask) -> StoreResult<Task> {
        let task = self.mutate(|tasks| insert_into(tasks, new_task))?;
        info!(id = task.id, title = %task.title, "task added");
        Ok(task)
    }

    fn update(&self, task: &Task) -> StoreResult<()> {
        self.mutate(|tasks| replace_in(tasks, task))?;
        info!(id = task.id, "task updated");
        Ok(())
    }

    fn modify(&self, id: u64, f: &mut dyn FnMut(&mut Task)) -> StoreResult<Task> {
        let task = self.mutate(|tasks| modify_in(tasks, id, f))?;
        info!(id, "task updated");
        Ok(task)
    }

    fn delete(&self, id: u64) -> StoreResult<()> {
        self.mutate(|tasks| remove_from(tasks, id))?;
        info!(id, "task deleted");
        Ok(())
    }

    fn delete_completed(&self) -> StoreResult<Vec<u64>> {
        let removed = self.mutate(|tasks| Ok(remove_completed(tasks)))?;
        info!(count = removed.len(), "completed tasks deleted");
        Ok(removed)
    }

    fn subscribe(&self, listener: Listener) -> StoreResult<Subscription> {
        let snapshot = self.list_all()?;
        Ok(self.subscribers.add(listener, &snapshot))
    }
}

/// Task store kept entirely in memory.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    subscribers: Subscribers,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Task>) -> StoreResult<R>) -> StoreResult<R> {
        let (result, snapshot) = {
            let mut tasks = guard(&self.tasks);
            let result = f(&mut *tasks)?;
            (result, tasks.clone())
        };
        self.subscribers.emit(&snapshot);
        Ok(result)
    }
}

impl TaskStore for MemoryTaskStore {
    fn list_all(&self) -> StoreResult<Vec<Task>> {
        Ok(guard(&self.tasks).clone())
    }

    fn insert(&self, new_task: NewTask) -> StoreResult<Task> {
        self.mutate(|tasks| insert_into(tasks, new_task))
    }

    fn update(&self, task: &Task) -> StoreResult<()> {
        self.mutate(|tasks| replace_in(tasks, task))
    }

    fn modify(&self, id: u64, f: &mut dyn FnMut(&mut Task)) -> StoreResult<Task> {
        self.mutate(|tasks| modify_in(tasks, id, f))
    }

    fn delete(&self, id: u64) -> StoreResult<()> {
        self.mutate(|tasks| remove_from(tasks, id))
    }

    fn delete_completed(&self) -> StoreResult<Vec<u64>> {
        self.mutate(|tasks| Ok(remove_completed(tasks)))
    }

    fn subscribe(&self, listener: Listener) -> StoreResult<Subscription> {
        let snapshot = self.list_all()?;
        Ok(self.subscribers.add(listener, &snapshot))
    }
}

impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    fn list_all(&self) -> StoreResult<Vec<Task>> {
        (**self).list_all()
    }

    fn list_incomplete(&self) -> StoreResult<Vec<Task>> {
        (**self).list_incomplete()
    }

    fn list_completed(&self) -> StoreResult<Vec<Task>> {
        (**self).list_completed()
    }

    fn list_between(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<Task>> {
        (**self).list_between(start, end)
    }

    fn get(&self, id: u64) -> StoreResult<Task> {
        (**self).get(id)
    }

    fn insert(&self, new_task: NewTask) -> StoreResult<Task> {
        (**self).insert(new_task)
    }

    fn update(&self, task: &Task) -> StoreResult<()> {
        (**self).update(task)
    }

    fn modify(&self, id: u64, f: &mut dyn FnMut(&mut Task)) -> StoreResult<Task> {
        (**self).modify(id, f)
    }

    fn delete(&self, id: u64) -> StoreResult<()> {
        (**self).delete(id)
    }

    fn delete_completed(&self) -> StoreResult<Vec<u64>> {
        (**self).delete_completed()
    }

    fn subscribe(&self, listener: Listener) -> StoreResult<Subscription> {
        (**self).subscribe(listener)
    }
}
