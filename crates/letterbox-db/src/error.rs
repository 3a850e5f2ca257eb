use thiserror::Error;

/// Failures surfaced by the storage layer.
///
/// The domain variants carry enough context for the API layer to pick a
/// status code; `Sqlite` and `LockPoisoned` are always internal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("user does not exist: {0}")]
    UnknownUser(String),

    #[error("message not found: {0}")]
    MessageNotFound(i64),

    #[error("message already read: {0}")]
    AlreadyRead(i64),

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// True when the error came from a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
        match err {
            rusqlite::Error::SqliteFailure(e, _) => matches!(
                e.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            ),
            _ => false,
        }
    }
}
