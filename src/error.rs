//! Error types for study-gate

use thiserror::Error;

/// Failures raised by the SQLite store and the artifact directory.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A UNIQUE or PRIMARY KEY constraint rejected the write
    #[error("Uniqueness violation: {0}")]
    UniqueViolation(String),

    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StoreError::UniqueViolation(
                    msg.clone().unwrap_or_else(|| "constraint failed".to_string()),
                )
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

/// Domain errors surfaced by enrollment, the gate and the ledger.
#[derive(Error, Debug)]
pub enum StudyError {
    /// Malformed input, rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Participant not found: {0}")]
    NotFound(String),

    /// A submission already exists for the participant and day
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Day {requested} is not open (current: {current})")]
    DayNotOpen { requested: u8, current: String },

    #[error("Could not issue a unique credential after {0} attempts")]
    CredentialExhausted(u32),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type StudyResult<T> = Result<T, StudyError>;
