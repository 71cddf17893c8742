use thiserror::Error;

/// Error taxonomy for the engine.
///
/// `Validation` means the caller must fix its input; `Conflict` means a
/// uniqueness race was lost and a re-read did not resolve it; the two
/// precondition variants (`IncompleteEvidence`, `InsufficientSignal`) are
/// retryable once the upstream stage completes; `Model` is an external
/// scoring function failing for one strategy or horizon; `Constraint` is a
/// broken foreign key and fatal to the batch.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("incomplete evidence: {0}")]
    IncompleteEvidence(String),

    #[error("insufficient signal: {0}")]
    InsufficientSignal(String),

    #[error("model failure: {0}")]
    Model(String),

    #[error("integrity violation: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(tokio_rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors that resolve on their own once the upstream stage
    /// catches up; callers own the retry cadence.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_)
                | AppError::IncompleteEvidence(_)
                | AppError::InsufficientSignal(_)
        )
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        // Constraint failures carry semantics: a broken foreign key is an
        // upstream ordering bug, a unique collision is a lost race.
        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            let detail = message.clone().unwrap_or_else(|| err.to_string());
            match code.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return AppError::Constraint(detail);
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return AppError::Conflict(detail);
                }
                _ => {}
            }
        }
        AppError::Database(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<tokio_rusqlite::Error> for AppError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(inner) => inner.into(),
            other => AppError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
