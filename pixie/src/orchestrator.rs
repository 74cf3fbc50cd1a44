//! Dual-writes between the object store and the metadata store. Ordering
//! and failure policy here are normative, not incidental: blob before row on
//! write, row before bulk blob cleanup on purge-all, event publish only
//! after both writes are durable.

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use pixie_core::types::{Photo, PhotoDeletedEvent, PhotoMeta, PhotoStatus, PhotoUploadedEvent};
use pixie_core::AppError;

use crate::state::AppContext;

const PRIMARY_KEY_PREFIX: &str = "photos";

pub fn primary_key(id: Uuid) -> String {
    format!("{PRIMARY_KEY_PREFIX}/{id}")
}

/// Upload: write the blob, insert the row, fire-and-forget publish. A
/// publish failure is logged, not escalated — the dual-write already
/// succeeded by that point.
pub async fn upload_photo(
    ctx: &AppContext,
    filename: String,
    mime: String,
    bytes: Bytes,
) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();
    let key = primary_key(id);

    ctx.objects.put(&key, bytes, &mime).await?;

    let photo = Photo {
        id,
        filename: filename.clone(),
        mime: mime.clone(),
        s3_key: key.clone(),
        created_at: Utc::now(),
        status: PhotoStatus::Active,
        deleted_at: None,
        meta: PhotoMeta::default(),
    };
    ctx.metadata.save_photo(&photo).await?;

    let event = PhotoUploadedEvent {
        id,
        filename,
        mime,
        s3_key: key,
        created_at: photo.created_at,
    };
    if let Err(err) = pixie_events::publish_photo_uploaded(ctx.events.as_ref(), &event).await {
        tracing::warn!(photo_id = %id, error = %err, "photo.uploaded publish failed");
    }

    Ok(id)
}

pub struct PhotoBlob {
    pub bytes: Bytes,
    pub mime: String,
}

/// Resolves which blob key and MIME to stream for a read, honoring the
/// optional `thumbnail` size token.
pub async fn read_photo(ctx: &AppContext, id: Uuid, thumbnail: Option<&str>) -> Result<PhotoBlob, AppError> {
    let photo = ctx.metadata.get_photo(id).await?;

    let (key, mime) = match thumbnail.and_then(|size| photo.thumbnail_key(size).map(str::to_string)) {
        Some(thumb_key) => (thumb_key, "image/jpeg".to_string()),
        None => (photo.s3_key.clone(), photo.mime.clone()),
    };

    let (bytes, _stored_content_type) = ctx.objects.get(&key).await?;
    Ok(PhotoBlob { bytes, mime })
}

pub async fn list_active_photos(ctx: &AppContext) -> Result<Vec<Photo>, AppError> {
    Ok(ctx.metadata.list_active_photos().await?)
}

pub async fn list_trashed_photos(ctx: &AppContext) -> Result<Vec<Photo>, AppError> {
    Ok(ctx.metadata.list_trashed_photos().await?)
}

pub async fn trash_photo(ctx: &AppContext, id: Uuid) -> Result<(), AppError> {
    Ok(ctx.metadata.trash_photo(id).await?)
}

pub async fn restore_photo(ctx: &AppContext, id: Uuid) -> Result<(), AppError> {
    Ok(ctx.metadata.restore_photo(id).await?)
}

/// Purge a single trashed photo: primary blob, then every thumbnail blob
/// (best-effort — a failed thumbnail delete never blocks row deletion since
/// thumbnails are reconstructable), then the row.
pub async fn purge_photo(ctx: &AppContext, id: Uuid) -> Result<(), AppError> {
    let photo = ctx.metadata.get_photo(id).await?;
    if photo.status != PhotoStatus::Trashed {
        return Err(AppError::Conflict(format!("photo {id} is not trashed")));
    }

    if let Err(err) = ctx.objects.delete(&photo.s3_key).await {
        tracing::warn!(photo_id = %id, error = %err, "failed to delete primary blob during purge");
    }
    for thumb_key in photo.meta.thumbnails.values() {
        if let Err(err) = ctx.objects.delete(thumb_key).await {
            tracing::warn!(photo_id = %id, key = %thumb_key, error = %err, "failed to delete thumbnail blob during purge");
        }
    }

    ctx.metadata.permanently_delete_photo(id).await?;
    Ok(())
}

/// Purge every trashed photo: best-effort blob cleanup for each, then a bulk
/// row delete. Returns the number of rows actually deleted.
pub async fn purge_all_trashed(ctx: &AppContext) -> Result<u64, AppError> {
    let trashed = ctx.metadata.list_trashed_photos().await?;
    for photo in &trashed {
        if let Err(err) = ctx.objects.delete(&photo.s3_key).await {
            tracing::warn!(photo_id = %photo.id, error = %err, "failed to delete primary blob during purge-all");
        }
        for thumb_key in photo.meta.thumbnails.values() {
            if let Err(err) = ctx.objects.delete(thumb_key).await {
                tracing::warn!(photo_id = %photo.id, key = %thumb_key, error = %err, "failed to delete thumbnail blob during purge-all");
            }
        }
    }
    Ok(ctx.metadata.empty_trash().await?)
}

/// Legacy hard-delete, retained for back-compat: unconditional blob-then-row
/// delete, publishing `photo.deleted`.
pub async fn legacy_delete_photo(ctx: &AppContext, id: Uuid) -> Result<(), AppError> {
    let photo = ctx.metadata.get_photo(id).await?;
    ctx.objects.delete(&photo.s3_key).await?;
    ctx.metadata.delete_photo(id).await?;

    let event = PhotoDeletedEvent {
        id,
        deleted_at: Utc::now(),
    };
    if let Err(err) = pixie_events::publish_photo_deleted(ctx.events.as_ref(), &event).await {
        tracing::warn!(photo_id = %id, error = %err, "photo.deleted publish failed");
    }

    Ok(())
}
