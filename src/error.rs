use thiserror::Error;

/// Every failure surfaced by the client layer.
///
/// Driver faults pass through unchanged in the transparent variants; the rest
/// are raised by this crate (setup, lifecycle, and cursor misuse).
#[derive(Debug, Error)]
pub enum SqlClientError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown provider type: {0}")]
    UnknownProvider(String),

    #[error("{kind} '{name}' is already registered")]
    DuplicateRegistration { kind: &'static str, name: String },

    #[error("Cannot access a disposed object: {0}")]
    ObjectDisposed(&'static str),

    #[error("The cursor has been closed")]
    CursorClosed,

    #[error("The operation was cancelled")]
    Cancelled,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Other database error: {0}")]
    Other(String),
}
