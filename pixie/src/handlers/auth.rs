use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use uuid::Uuid;

use pixie_core::types::{Role, User};
use pixie_core::AppError;
use pixie_security::login::login;

use crate::state::AppContext;

const RECREATE_ADMIN_USERNAME: &str = "admin";
const RECREATE_ADMIN_PASSWORD_LEN: usize = 20;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    match ctx.metadata.count_active_admins().await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    }
}

#[derive(Deserialize)]
pub struct TokenRequest {
    subject: Uuid,
    #[serde(default)]
    custom_claims: Map<String, serde_json::Value>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    token: String,
}

pub async fn issue_token(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = ctx.auth.generate_token(req.subject, req.custom_claims)?;
    Ok(Json(TokenResponse { token }))
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    token: String,
}

pub async fn revoke_token(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<RevokeRequest>,
) -> StatusCode {
    ctx.auth.revoke_token(&req.token);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    user: User,
}

pub async fn login_handler(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = login(&ctx.auth, ctx.users.as_ref(), &req.username, &req.password)
        .await
        .map_err(|_| AppError::Unauthenticated("invalid username or password".into()))?;

    let user = ctx
        .metadata
        .get_user_by_username(&req.username)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("invalid username or password".into()))?;

    Ok(Json(LoginResponse { token, user }))
}

#[derive(Serialize)]
pub struct RecreateAdminResponse {
    username: String,
    password: String,
}

/// Break-glass recovery endpoint, gated by `RECREATE_ADMIN_ENABLED`
/// (default off). Authenticated only by network position — deliberately so.
pub async fn recreate_admin(State(ctx): State<Arc<AppContext>>) -> Result<Json<RecreateAdminResponse>, AppError> {
    if !ctx.config.recreate_admin_enabled {
        return Err(AppError::NotFound("recreate-admin is disabled".into()));
    }

    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RECREATE_ADMIN_PASSWORD_LEN)
        .map(char::from)
        .collect();
    let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("hashing recreate-admin password: {e}")))?;

    let existing = ctx.metadata.get_user_by_username(RECREATE_ADMIN_USERNAME).await?;
    let user = User {
        id: existing.as_ref().map(|u| u.id).unwrap_or_else(Uuid::new_v4),
        username: RECREATE_ADMIN_USERNAME.to_string(),
        password_hash,
        email: existing.as_ref().and_then(|u| u.email.clone()),
        full_name: existing.as_ref().and_then(|u| u.full_name.clone()),
        role: Role::Admin,
        created_at: existing.map(|u| u.created_at).unwrap_or_else(chrono::Utc::now),
        last_login: None,
        active: true,
    };
    ctx.metadata.save_user(&user).await?;

    tracing::warn!(username = %user.username, "admin row recreated via break-glass endpoint");

    Ok(Json(RecreateAdminResponse {
        username: user.username,
        password,
    }))
}
