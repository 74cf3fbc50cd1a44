use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

/// The error taxonomy shared by every adapter and the HTTP boundary.
///
/// Variants name *kinds*, not causes — adapters wrap their own error enums
/// and convert into one of these at the boundary via `From`.
#[derive(Debug)]
pub enum AppError {
    BadInput(String),
    Unauthenticated(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    RateLimited,
    Transient(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message sent to the client. 5xx variants never leak their detail;
    /// that detail goes to `tracing::error!` at the call site instead.
    fn public_message(&self) -> String {
        match self {
            AppError::BadInput(msg) => msg.clone(),
            AppError::Unauthenticated(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::RateLimited => "rate limited".to_string(),
            AppError::Transient(_) => "temporarily unavailable".to_string(),
            AppError::Internal(_) => "internal error".to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadInput(msg) => write!(f, "bad input: {msg}"),
            AppError::Unauthenticated(msg) => write!(f, "unauthenticated: {msg}"),
            AppError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AppError::RateLimited => write!(f, "rate limited"),
            AppError::Transient(msg) => write!(f, "transient: {msg}"),
            AppError::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Generate `From<E> for AppError` impls that map an adapter error type to a
/// single `AppError` variant.
///
/// ```ignore
/// map_error! {
///     sqlx::Error => Internal,
/// }
/// ```
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::error::AppError {
                fn from(err: $err_ty) -> Self {
                    $crate::error::AppError::$variant(err.to_string())
                }
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let (status, body) = parts(AppError::NotFound("photo missing".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "photo missing");
    }

    #[tokio::test]
    async fn conflict_maps_to_409() {
        let (status, _) = parts(AppError::Conflict("already trashed".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rate_limited_maps_to_429() {
        let (status, body) = parts(AppError::RateLimited).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "rate limited");
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let (status, body) = parts(AppError::Internal("leaked connection string".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal error");
    }
}
