use std::path::PathBuf;

/// Where data lives and how loud logging is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path of the task database (`tasks.json`).
    pub tasks_path: PathBuf,
    /// Path of the pending-alarm table (`alarms.json`).
    pub alarms_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Config {
    /// Resolves the configuration from the environment.
    ///
    /// The task database path is determined in the following order:
    /// 1. `TASKS_DB` environment variable.
    /// 2. `~/.local/share/remindust/tasks.json` (on Linux).
    /// 3. `./tasks.json` (fallback).
    ///
    /// The alarm table sits next to it. The log filter comes from
    /// `REMINDUST_LOG`, then `RUST_LOG`, and defaults to `warn`.
    pub fn from_env() -> Config {
        let tasks_path = std::env::var("TASKS_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir().join("tasks.json"));
        let log_filter = std::env::var("REMINDUST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "warn".to_string());
        Config::with_tasks_path(tasks_path, log_filter)
    }

    pub fn with_tasks_path(tasks_path: impl Into<PathBuf>, log_filter: impl Into<String>) -> Config {
        let tasks_path = tasks_path.into();
        let mut alarms_path = tasks_path.clone();
        alarms_path.set_file_name("alarms.json");
        Config {
            tasks_path,
            alarms_path,
            log_filter: log_filter.into(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("remindust"))
        .unwrap_or_else(|| PathBuf::from("."))
}
