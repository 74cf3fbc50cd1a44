use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};
use uuid::Uuid;

use pixie_core::error::AppError;

use crate::error::SecurityError;
use crate::jwt::{CUSTOM_CLAIM_ROLE, CUSTOM_CLAIM_USERNAME};
use crate::AuthCore;

const BEARER_PREFIX: &str = "Bearer ";
const DOWNSTREAM_USER_HEADER: &str = "x-user-id";

/// The authenticated principal, attached as a request extension once
/// admission succeeds. Downstream handlers extract it with `Extension<Identity>`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: Uuid,
    pub custom: Map<String, Value>,
}

impl Identity {
    pub fn role(&self) -> Option<&str> {
        self.custom.get(CUSTOM_CLAIM_ROLE).and_then(Value::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.custom.get(CUSTOM_CLAIM_USERNAME).and_then(Value::as_str)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some("admin")
    }
}

/// Extracts a bearer token from the `Authorization` header, falling back to
/// a `?token=` query parameter (for clients, such as `<img>` tags, that
/// cannot set headers). Header takes precedence when both are present.
///
/// Exposed beyond this crate so the plugin-driven auth alternate path (which
/// lives in the host binary, since it depends on the plugin registry) can
/// reuse the same extraction rule rather than duplicating it.
pub fn extract_token(req: &Request<Body>) -> Result<String, SecurityError> {
    if let Some(header) = req.headers().get(axum::http::header::AUTHORIZATION) {
        let header = header.to_str().map_err(|_| SecurityError::InvalidAuthScheme)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(SecurityError::InvalidAuthScheme)?;
        return Ok(token.to_string());
    }

    if let Some(query) = req.uri().query() {
        if let Some((_, token)) = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
        {
            return Ok(token.into_owned());
        }
    }

    Err(SecurityError::MissingAuthHeader)
}

/// Validates the request's bearer token (header or `?token=` query param)
/// and attaches the resulting [`Identity`] to the request extensions. Also
/// sets `X-User-Id` on the downstream request so handlers (and plugins,
/// once forwarded) can read the subject without re-parsing the token.
pub async fn require_auth(
    State(auth): State<Arc<AuthCore>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&req)?;
    let identity = auth.validate_token(&token)?;

    if let Ok(value) = HeaderValue::from_str(&identity.subject.to_string()) {
        req.headers_mut().insert(DOWNSTREAM_USER_HEADER, value);
    }
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Rejects the request unless the previously-attached [`Identity`] carries
/// the `admin` role. Must run after [`require_auth`] in the middleware stack.
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| AppError::Internal("require_admin used without require_auth".into()))?;

    if !identity.is_admin() {
        return Err(AppError::Forbidden("admin role required".into()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body as AxumBody;
    use axum::http::Request as HttpRequest;

    fn request_with_header(value: &str) -> Request<Body> {
        HttpRequest::builder()
            .uri("/photos")
            .header(axum::http::header::AUTHORIZATION, value)
            .body(AxumBody::empty())
            .unwrap()
    }

    fn request_with_query(query: &str) -> Request<Body> {
        HttpRequest::builder()
            .uri(format!("/photos?{query}"))
            .body(AxumBody::empty())
            .unwrap()
    }

    #[test]
    fn extracts_bearer_header() {
        let req = request_with_header("Bearer abc.def.ghi");
        assert_eq!(extract_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn extracts_token_query_param() {
        let req = request_with_query("size=512&token=abc.def.ghi");
        assert_eq!(extract_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_both_is_rejected() {
        let req = HttpRequest::builder().uri("/photos").body(AxumBody::empty()).unwrap();
        assert_eq!(extract_token(&req), Err(SecurityError::MissingAuthHeader));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let req = request_with_header("Basic abc");
        assert_eq!(extract_token(&req), Err(SecurityError::InvalidAuthScheme));
    }
}
