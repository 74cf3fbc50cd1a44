use pixie_core::AppError;

/// Auth-specific errors. Converted to [`AppError`] only at the HTTP boundary —
/// callers below it match on these variants directly (e.g. to decide whether
/// a plugin-driven fan-out attempt should be skipped vs. escalated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    MissingAuthHeader,
    InvalidAuthScheme,
    Expired,
    Invalid(String),
    Revoked,
    RateLimited,
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::MissingAuthHeader => write!(f, "missing Authorization header"),
            SecurityError::InvalidAuthScheme => write!(f, "invalid authorization scheme"),
            SecurityError::Expired => write!(f, "token expired"),
            SecurityError::Invalid(msg) => write!(f, "invalid token: {msg}"),
            SecurityError::Revoked => write!(f, "token revoked"),
            SecurityError::RateLimited => write!(f, "rate limited"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::RateLimited => AppError::RateLimited,
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}
