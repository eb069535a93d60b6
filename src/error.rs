use chrono::NaiveDate;
use thiserror::Error;

use crate::gym::EnvStatus;

pub type FolioResult<T> = Result<T, FolioError>;

#[derive(Debug, Error)]
pub enum FolioError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Reward(#[from] RewardError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Errors occurring within Agent logic or execution.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid input to agent: {0}")]
    InvalidInput(String),
}

/// Errors related to historical tables, the calendar and date lookups.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    /// A row for `symbol` on `date` does not exist. Recoverable by forward-fill.
    #[error("No row for '{symbol}' on {date}")]
    Missing { symbol: String, date: NaiveDate },

    /// Forward-fill failed because the table has no row on or before `date`.
    #[error("No history for '{symbol}' on or before {date}")]
    NoHistory { symbol: String, date: NaiveDate },

    #[error("Need {needed} trading days up to {date}, calendar only has {available}")]
    InsufficientHistory {
        date: NaiveDate,
        needed: usize,
        available: usize,
    },

    #[error("No trading day after {0}")]
    EndOfCalendar(NaiveDate),

    #[error("Empty calendar")]
    EmptyCalendar,

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors related to the environment configuration and its execution loop.
#[derive(Debug, Error)]
pub enum EnvError {
    /// `step` was called outside of the `Running` state.
    #[error("Sequence violation on {date:?} (status {status:?}): {msg}")]
    SequenceViolation {
        status: EnvStatus,
        date: Option<NaiveDate>,
        msg: String,
    },

    #[error("Invalid action on {date:?}: {msg} (action = {action:?})")]
    InvalidAction {
        date: Option<NaiveDate>,
        action: Vec<f64>,
        msg: String,
    },

    /// A reward transform left its domain while stepping into `date`.
    #[error("Reward evaluation failed on {date}: {source}")]
    Reward {
        date: NaiveDate,
        #[source]
        source: RewardError,
    },

    #[error("Invalid environment configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid risk metrics config: {0}")]
    InvalidRiskMetricsConfig(String),

    #[error("Failed to encode EnvConfig")]
    Encoding(#[from] postcard::Error),

    #[error("Progress bar error")]
    ProgressBar(#[from] indicatif::style::TemplateError),
}

/// Errors raised by the reward transforms.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum RewardError {
    /// The logarithm argument of the target transform is not strictly positive.
    #[error("Target reward undefined for x = {x} (target = {target}, w = {w})")]
    Domain { x: f64, target: f64, w: f64 },

    #[error("Target multiple must be > 1, got {0}")]
    InvalidTarget(f64),

    #[error("Non-positive portfolio value: {0}")]
    NonPositiveValue(f64),
}

/// Errors related to (de)serialization.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),
}

/// Errors related to internal invariants.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
