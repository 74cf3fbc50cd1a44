use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pixie_core::types::Photo;
use pixie_core::AppError;

use crate::orchestrator;
use crate::state::AppContext;

const DEFAULT_MIME: &str = "application/octet-stream";
const MULTIPART_FIELD: &str = "file";
const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Serialize)]
pub struct PhotoListResponse {
    photos: Vec<Photo>,
}

pub async fn list_photos(State(ctx): State<Arc<AppContext>>) -> Result<Json<PhotoListResponse>, AppError> {
    let photos = orchestrator::list_active_photos(&ctx).await?;
    Ok(Json(PhotoListResponse { photos }))
}

pub async fn list_trashed(State(ctx): State<Arc<AppContext>>) -> Result<Json<PhotoListResponse>, AppError> {
    let photos = orchestrator::list_trashed_photos(&ctx).await?;
    Ok(Json(PhotoListResponse { photos }))
}

#[derive(Serialize)]
pub struct UploadResponse {
    id: Uuid,
}

/// `POST /api/upload`: multipart field `file`. The 32 MiB in-memory
/// threshold is enforced by the `DefaultBodyLimit` layer on this route in
/// `routes.rs`, not by `Multipart` itself (axum's request body default is
/// only 2 MiB).
pub async fn upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadInput(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(MULTIPART_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let mime = field.content_type().unwrap_or(DEFAULT_MIME).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadInput(format!("reading upload body: {e}")))?;

        let id = orchestrator::upload_photo(&ctx, filename, mime, bytes).await?;
        return Ok((StatusCode::CREATED, Json(UploadResponse { id })));
    }

    Err(AppError::BadInput(format!("missing multipart field `{MULTIPART_FIELD}`")))
}

#[derive(Deserialize)]
pub struct ReadQuery {
    thumbnail: Option<String>,
}

/// `GET /api/photo/{id}`. A `?token=` query parameter may also be present
/// (consumed by the admission middleware before this handler runs) but
/// doesn't need to be declared here — unrecognized query keys are ignored.
pub async fn read_photo(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, AppError> {
    let blob = orchestrator::read_photo(&ctx, id, query.thumbnail.as_deref()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, blob.mime),
            (header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL.to_string()),
        ],
        blob.bytes,
    )
        .into_response())
}

#[derive(Serialize)]
pub struct ActionResponse {
    message: &'static str,
    id: Uuid,
}

pub async fn trash(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<ActionResponse>, AppError> {
    orchestrator::trash_photo(&ctx, id).await?;
    Ok(Json(ActionResponse { message: "trashed", id }))
}

pub async fn restore(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<Json<ActionResponse>, AppError> {
    orchestrator::restore_photo(&ctx, id).await?;
    Ok(Json(ActionResponse { message: "restored", id }))
}

pub async fn purge_one(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    orchestrator::purge_photo(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct PurgeAllResponse {
    message: &'static str,
    count: u64,
}

pub async fn purge_all(State(ctx): State<Arc<AppContext>>) -> Result<Json<PurgeAllResponse>, AppError> {
    let count = orchestrator::purge_all_trashed(&ctx).await?;
    Ok(Json(PurgeAllResponse {
        message: "trash emptied",
        count,
    }))
}

/// `DELETE /api/photo/{id}`: legacy hard-delete, retained for back-compat.
pub async fn legacy_delete(State(ctx): State<Arc<AppContext>>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    orchestrator::legacy_delete_photo(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
