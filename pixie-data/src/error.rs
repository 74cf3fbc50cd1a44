/// Errors from the metadata store. Row-not-found on trash/restore/purge is a
/// typed error here, never silently treated as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    NotFound(String),
    Conflict(String),
    Database(String),
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "not found: {msg}"),
            DataError::Conflict(msg) => write!(f, "conflict: {msg}"),
            DataError::Database(msg) => write!(f, "database error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("row not found".into()),
            other => DataError::Database(other.to_string()),
        }
    }
}

impl From<DataError> for pixie_core::AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => pixie_core::AppError::NotFound(msg),
            DataError::Conflict(msg) => pixie_core::AppError::Conflict(msg),
            DataError::Database(msg) => pixie_core::AppError::Internal(msg),
        }
    }
}

impl From<DataError> for pixie_security::SecurityError {
    fn from(err: DataError) -> Self {
        pixie_security::SecurityError::Invalid(err.to_string())
    }
}
