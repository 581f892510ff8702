use thiserror::Error;

/// Rejections raised at the input boundary, before a task reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task title must not be blank")]
    BlankTitle,
    #[error("hourly repeat needs a time of day")]
    HourlyWithoutTime,
    #[error("a repeating task needs a date")]
    RepeatWithoutDate,
}

/// Failures of the task store and the alarm book.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// An unrecognised value for one of the task enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Everything the host shell can report back to the user.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("invalid {field} '{value}': use {format}")]
    BadInput {
        field: &'static str,
        value: String,
        format: &'static str,
    },

    #[error("{0} reminder(s) could not be delivered and stay pending")]
    Undelivered(usize),

    #[error("unsupported shell: {0}")]
    UnsupportedShell(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
