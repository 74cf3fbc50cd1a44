use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pixie_core::types::{Role, User};
use pixie_core::AppError;

use crate::state::AppContext;

#[derive(Serialize)]
pub struct UserListResponse {
    users: Vec<User>,
}

pub async fn list_users(State(ctx): State<Arc<AppContext>>) -> Result<Json<UserListResponse>, AppError> {
    let users = ctx.metadata.list_users().await?;
    Ok(Json(UserListResponse { users }))
}

pub async fn get_user(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<User>, AppError> {
    let user = ctx
        .metadata
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    username: String,
    password: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Role,
}

pub async fn create_user(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if ctx.metadata.get_user_by_username(&req.username).await?.is_some() {
        return Err(AppError::Conflict(format!("username `{}` already exists", req.username)));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("hashing password: {e}")))?;

    let user = User {
        id: Uuid::new_v4(),
        username: req.username,
        password_hash,
        email: req.email,
        full_name: req.full_name,
        role: req.role,
        created_at: chrono::Utc::now(),
        last_login: None,
        active: true,
    };
    ctx.metadata.save_user(&user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    active: Option<bool>,
}

pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let mut user = ctx
        .metadata
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    // Demoting or deactivating the last admin would leave the instance
    // without anyone who can manage it; reject before writing.
    let losing_admin = matches!(req.role, Some(Role::User)) && user.role.is_admin()
        || matches!(req.active, Some(false)) && user.role.is_admin() && user.active;
    if losing_admin {
        ensure_not_last_admin(&ctx).await?;
    }

    if let Some(password) = req.password {
        user.password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("hashing password: {e}")))?;
    }
    if let Some(email) = req.email {
        user.email = Some(email);
    }
    if let Some(full_name) = req.full_name {
        user.full_name = Some(full_name);
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(active) = req.active {
        user.active = active;
    }

    ctx.metadata.save_user(&user).await?;
    Ok(Json(user))
}

pub async fn delete_user(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    let user = ctx
        .metadata
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if user.role.is_admin() && user.active {
        ensure_not_last_admin(&ctx).await?;
    }

    ctx.metadata.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rejects the request unless more than one active admin currently exists.
/// The caller is always one of those admins, so this is really "at least
/// one other admin remains" phrased without needing to exclude an id.
async fn ensure_not_last_admin(ctx: &AppContext) -> Result<(), AppError> {
    if ctx.metadata.count_active_admins().await? <= 1 {
        return Err(AppError::BadInput(
            "cannot remove the last active admin".into(),
        ));
    }
    Ok(())
}
