//! Schema bootstrap and schema-tolerant reads. The column-presence probe and
//! the "missing column -> default" substitution live in one pure function,
//! [`photo_from_row`], so the tolerant-read logic has no branches inside the
//! query functions that call it.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use pixie_core::types::{Photo, PhotoMeta, PhotoStatus};

use crate::error::DataError;

/// Which optional `photos` columns this deployment's schema already has.
/// Probed once at startup via [`probe_column_presence`].
#[derive(Debug, Clone, Copy)]
pub struct ColumnPresence {
    pub has_status: bool,
    pub has_deleted_at: bool,
}

/// Create `photos`/`users` if absent, then add `status`/`deleted_at` to
/// `photos` when an older deployment's schema lacks them. Called once at
/// bootstrap.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<ColumnPresence, DataError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photos (
            id UUID PRIMARY KEY,
            filename TEXT NOT NULL,
            mime TEXT NOT NULL,
            s3_key TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            status TEXT NOT NULL DEFAULT 'active',
            deleted_at TIMESTAMPTZ,
            meta JSONB NOT NULL DEFAULT '{}'::jsonb
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            email TEXT,
            full_name TEXT,
            role TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_login TIMESTAMPTZ,
            active BOOLEAN NOT NULL DEFAULT true
        )
        "#,
    )
    .execute(pool)
    .await?;

    let presence = probe_column_presence(pool).await?;

    if !presence.has_status {
        sqlx::query("ALTER TABLE photos ADD COLUMN IF NOT EXISTS status TEXT NOT NULL DEFAULT 'active'")
            .execute(pool)
            .await?;
    }
    if !presence.has_deleted_at {
        sqlx::query("ALTER TABLE photos ADD COLUMN IF NOT EXISTS deleted_at TIMESTAMPTZ")
            .execute(pool)
            .await?;
    }

    Ok(ColumnPresence {
        has_status: true,
        has_deleted_at: true,
    })
}

async fn probe_column_presence(pool: &PgPool) -> Result<ColumnPresence, DataError> {
    let rows = sqlx::query(
        r#"
        SELECT column_name FROM information_schema.columns
        WHERE table_name = 'photos' AND column_name IN ('status', 'deleted_at')
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut has_status = false;
    let mut has_deleted_at = false;
    for row in rows {
        match row.try_get::<String, _>("column_name")?.as_str() {
            "status" => has_status = true,
            "deleted_at" => has_deleted_at = true,
            _ => {}
        }
    }

    Ok(ColumnPresence {
        has_status,
        has_deleted_at,
    })
}

/// Build a [`Photo`] from a `photos` row, substituting defaults for columns
/// the probe found absent rather than branching inside every query.
pub fn photo_from_row(row: &PgRow, presence: ColumnPresence) -> Result<Photo, DataError> {
    let id: Uuid = row.try_get("id")?;
    let filename: String = row.try_get("filename")?;
    let mime: String = row.try_get("mime")?;
    let s3_key: String = row.try_get("s3_key")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let meta_json: serde_json::Value = row.try_get("meta")?;

    let status = if presence.has_status {
        match row.try_get::<String, _>("status")?.as_str() {
            "trashed" => PhotoStatus::Trashed,
            _ => PhotoStatus::Active,
        }
    } else {
        PhotoStatus::Active
    };

    let deleted_at: Option<DateTime<Utc>> = if presence.has_deleted_at {
        row.try_get("deleted_at")?
    } else {
        None
    };

    let meta: PhotoMeta = serde_json::from_value(meta_json).unwrap_or_default();

    Ok(Photo {
        id,
        filename,
        mime,
        s3_key,
        created_at,
        status,
        deleted_at,
        meta,
    })
}

