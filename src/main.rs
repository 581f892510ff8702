//! # Remindust
//!
//! A personal reminder manager. Tasks carry an optional date, time, repeat
//! cycle and priority; they are listed by time frame (today, scheduled,
//! completed, all) and a reminder fires at the scheduled time.
//!
//! ## Usage
//!
//! ```bash
//! # One-off reminder
//! remindust add "Dentist" --date 2025-12-01 --time 09:30 --priority high
//!
//! # Recurring reminder
//! remindust add "Water plants" --date 2025-12-01 --time 08:00 --repeat weekly
//!
//! # Scheduled view (past due / today / tomorrow / this week / upcoming)
//! remindust list
//! remindust list --frame completed
//!
//! # Deliver due reminders (run from cron or a systemd timer)
//! remindust tick
//!
//! # Re-register every reminder after a reboot
//! remindust rescan
//! ```
//!
//! ## Data Storage
//!
//! Tasks are saved in your local data directory:
//! *   Linux: `~/.local/share/remindust/tasks.json`
//! *   macOS: `~/Library/Application Support/remindust/tasks.json`
//! *   Windows: `%APPDATA%\remindust\tasks.json`
//!
//! Pending reminders live next to it in `alarms.json`. Override the location
//! with the `TASKS_DB` environment variable and the log level with
//! `REMINDUST_LOG`.

use std::io;
use std::process::ExitCode;

use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use remindust::commands::*;
use remindust::config::Config;
use remindust::error::CommandError;
use remindust::logging;
use remindust::models::{Priority, Repeat};
use remindust::views::TimeFrame;

#[derive(Parser)]
#[command(name = "remindust")]
#[command(about = "Personal reminders with dates, repeats and priorities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Date in YYYY-MM-DD
        #[arg(short, long)]
        date: Option<String>,
        /// Time of day in HH:MM
        #[arg(short, long)]
        time: Option<String>,
        /// Repeat cycle (none, hourly, daily, weekly, monthly, yearly)
        #[arg(short, long)]
        repeat: Option<Repeat>,
        /// Priority (none, low, medium, high)
        #[arg(short, long)]
        priority: Option<Priority>,
    },
    /// List tasks for a time frame
    List {
        /// today, scheduled, completed or all
        #[arg(short, long, default_value_t = TimeFrame::Scheduled)]
        frame: TimeFrame,
    },
    /// Edit a task
    Edit {
        id: u64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New notes (empty string clears them)
        #[arg(short, long)]
        notes: Option<String>,
        /// New date
        #[arg(short, long)]
        date: Option<String>,
        /// New time of day
        #[arg(short, long)]
        time: Option<String>,
        /// New repeat cycle
        #[arg(short, long)]
        repeat: Option<Repeat>,
        /// New priority
        #[arg(short, long)]
        priority: Option<Priority>,
        /// Remove the date
        #[arg(long)]
        clear_date: bool,
        /// Remove the time
        #[arg(long)]
        clear_time: bool,
    },
    /// Toggle a task between done and open
    Done {
        id: u64,
    },
    /// Remove a task
    Remove {
        id: u64,
    },
    /// Delete every completed task
    ClearCompleted,
    /// Re-register all reminders
    Rescan,
    /// Deliver reminders that are due now
    Tick,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

fn run(command: Commands, config: &Config) -> Result<(), CommandError> {
    if let Commands::Completions { shell } = &command {
        let shell_enum = match shell.as_str() {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            "powershell" => Shell::PowerShell,
            "elvish" => Shell::Elvish,
            _ => return Err(CommandError::UnsupportedShell(shell.clone())),
        };
        let mut cmd = Cli::command();
        generate(shell_enum, &mut cmd, "remindust", &mut io::stdout());
        return Ok(());
    }

    let svc = open_service(config)?;
    let now = Local::now();
    match command {
        Commands::Add { title, notes, date, time, repeat, priority } => {
            cmd_add(&svc, TaskInput { title, notes, date, time, repeat, priority }, now)?;
        }
        Commands::List { frame } => cmd_list(&svc, frame, now.date_naive())?,
        Commands::Edit { id, title, notes, date, time, repeat, priority, clear_date, clear_time } => {
            let edit = TaskEdit { title, notes, date, time, repeat, priority, clear_date, clear_time };
            cmd_edit(&svc, id, edit, now)?;
        }
        Commands::Done { id } => {
            cmd_done(&svc, id, now)?;
        }
        Commands::Remove { id } => cmd_remove(&svc, id)?,
        Commands::ClearCompleted => {
            cmd_clear_completed(&svc)?;
        }
        Commands::Rescan => {
            cmd_rescan(&svc, now)?;
        }
        Commands::Tick => {
            cmd_tick(&svc, now)?;
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();
    logging::init(&config.log_filter);

    let command = cli.command.unwrap_or(Commands::List { frame: TimeFrame::Scheduled });
    match run(command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
