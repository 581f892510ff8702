use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::storage::{read_json, write_json};

/// A pending one-shot wake-up for a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub task_id: u64,
    pub at: DateTime<Local>,
}

/// The platform's one-shot wake-up service.
///
/// Holds at most one pending alarm per task; scheduling again replaces it.
pub trait AlarmScheduler: Send + Sync {
    fn schedule(&self, task_id: u64, at: DateTime<Local>) -> StoreResult<()>;

    /// Drops the pending alarm for `task_id`, if any.
    fn cancel(&self, task_id: u64) -> StoreResult<()>;

    /// Pending alarms, earliest first.
    fn pending(&self) -> StoreResult<Vec<Alarm>>;
}

/// Alarm table kept in memory and optionally mirrored to `alarms.json`.
pub struct AlarmBook {
    path: Option<PathBuf>,
    alarms: Mutex<BTreeMap<u64, DateTime<Local>>>,
}

impl AlarmBook {
    pub fn in_memory() -> Self {
        AlarmBook {
            path: None,
            alarms: Mutex::new(BTreeMap::new()),
        }
    }

    /// Loads the alarm table from `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let stored: Vec<Alarm> = read_json(&path)?;
        debug!(path = %path.display(), pending = stored.len(), "opened alarm book");
        Ok(AlarmBook {
            path: Some(path),
            alarms: Mutex::new(stored.into_iter().map(|a| (a.task_id, a.at)).collect()),
        })
    }

    /// Applies `f` to a copy of the table, saves it, then swaps it in.
    /// A failed save leaves the table as it was.
    fn with_alarms<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<u64, DateTime<Local>>) -> R,
    ) -> StoreResult<R> {
        let mut alarms = self
            .alarms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = alarms.clone();
        let result = f(&mut next);
        if let Some(path) = &self.path {
            write_json(path, &sorted(&next))?;
        }
        *alarms = next;
        Ok(result)
    }
}

fn sorted(alarms: &BTreeMap<u64, DateTime<Local>>) -> Vec<Alarm> {
    let mut out: Vec<Alarm> = alarms
        .iter()
        .map(|(&task_id, &at)| Alarm { task_id, at })
        .collect();
    out.sort_by_key(|a| (a.at, a.task_id));
    out
}

impl AlarmScheduler for AlarmBook {
    fn schedule(&self, task_id: u64, at: DateTime<Local>) -> StoreResult<()> {
        self.with_alarms(|alarms| alarms.insert(task_id, at))?;
        info!(task_id, %at, "alarm scheduled");
        Ok(())
    }

    fn cancel(&self, task_id: u64) -> StoreResult<()> {
        if self.with_alarms(|alarms| alarms.remove(&task_id))?.is_some() {
            info!(task_id, "alarm cancelled");
        }
        Ok(())
    }

    fn pending(&self) -> StoreResult<Vec<Alarm>> {
        let alarms = self
            .alarms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(sorted(&alarms))
    }
}
