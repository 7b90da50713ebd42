//! Error types of the tracker core. Application plumbing uses [anyhow] on top of these.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("Malformed duration {0:?}, expected H:MM:SS")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger is not a valid table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Ledger header has no {0:?} column")]
    MissingDateColumn(&'static str),

    #[error("Could not lock {path:?} within {waited:?}")]
    LockTimeout {
        path: PathBuf,
        waited: Duration,
        #[source]
        last_error: Option<std::io::Error>,
    },
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("A session title is required to save")]
    MissingTitle,

    #[error("{0:?} is reserved for the date column and can't be used as a title")]
    ReservedTitle(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
