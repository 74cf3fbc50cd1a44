use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use pixie_core::types::{Photo, Role, User};
use pixie_security::login::UserLookup;
use pixie_security::SecurityError;

use crate::error::DataError;
use crate::schema::{bootstrap_schema, photo_from_row, ColumnPresence};
use crate::MetadataStore;

pub struct PgMetadataStore {
    pool: PgPool,
    presence: ColumnPresence,
}

impl PgMetadataStore {
    /// Connects and runs schema bootstrap. Call once at startup.
    pub async fn connect(database_url: &str) -> Result<Self, DataError> {
        let pool = PgPool::connect(database_url).await?;
        let presence = bootstrap_schema(&pool).await?;
        Ok(Self { pool, presence })
    }

    async fn update_photo_status(
        &self,
        id: Uuid,
        from_status: &str,
        to_status: &str,
        clear_deleted_at: bool,
    ) -> Result<(), DataError> {
        let row = if clear_deleted_at {
            sqlx::query("UPDATE photos SET status = $2, deleted_at = NULL WHERE id = $1 AND status = $3 RETURNING id")
                .bind(id)
                .bind(to_status)
                .bind(from_status)
                .fetch_optional(&self.pool)
                .await?
        } else {
            sqlx::query("UPDATE photos SET status = $2, deleted_at = now() WHERE id = $1 AND status = $3 RETURNING id")
                .bind(id)
                .bind(to_status)
                .bind(from_status)
                .fetch_optional(&self.pool)
                .await?
        };

        if row.is_some() {
            return Ok(());
        }

        match self.get_photo(id).await {
            Ok(_) => Err(DataError::Conflict(format!("photo {id} is not {from_status}"))),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn save_photo(&self, photo: &Photo) -> Result<(), DataError> {
        let meta = serde_json::to_value(&photo.meta).map_err(|e| DataError::Database(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO photos (id, filename, mime, s3_key, created_at, status, deleted_at, meta)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                filename = EXCLUDED.filename,
                mime = EXCLUDED.mime,
                s3_key = EXCLUDED.s3_key,
                status = EXCLUDED.status,
                deleted_at = EXCLUDED.deleted_at,
                meta = EXCLUDED.meta
            "#,
        )
        .bind(photo.id)
        .bind(&photo.filename)
        .bind(&photo.mime)
        .bind(&photo.s3_key)
        .bind(photo.created_at)
        .bind(photo.status.as_str())
        .bind(photo.deleted_at)
        .bind(meta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_photo(&self, id: Uuid) -> Result<Photo, DataError> {
        let row = sqlx::query("SELECT * FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))?;
        photo_from_row(&row, self.presence)
    }

    async fn delete_photo(&self, id: Uuid) -> Result<(), DataError> {
        let row = sqlx::query("DELETE FROM photos WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|_| ()).ok_or_else(|| DataError::NotFound(format!("photo {id}")))
    }

    async fn list_active_photos(&self) -> Result<Vec<Photo>, DataError> {
        let rows = sqlx::query("SELECT * FROM photos WHERE status = 'active' ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| photo_from_row(row, self.presence)).collect()
    }

    async fn list_trashed_photos(&self) -> Result<Vec<Photo>, DataError> {
        let rows = sqlx::query("SELECT * FROM photos WHERE status = 'trashed' ORDER BY deleted_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| photo_from_row(row, self.presence)).collect()
    }

    async fn trash_photo(&self, id: Uuid) -> Result<(), DataError> {
        self.update_photo_status(id, "active", "trashed", false).await
    }

    async fn restore_photo(&self, id: Uuid) -> Result<(), DataError> {
        self.update_photo_status(id, "trashed", "active", true).await
    }

    async fn empty_trash(&self) -> Result<u64, DataError> {
        let result = sqlx::query("DELETE FROM photos WHERE status = 'trashed'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn permanently_delete_photo(&self, id: Uuid) -> Result<(), DataError> {
        let row = sqlx::query("DELETE FROM photos WHERE id = $1 AND status = 'trashed' RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_some() {
            return Ok(());
        }

        match self.get_photo(id).await {
            Ok(_) => Err(DataError::Conflict(format!("photo {id} is not trashed"))),
            Err(e) => Err(e),
        }
    }

    async fn merge_thumbnail(&self, id: Uuid, size_token: &str, key: &str) -> Result<(), DataError> {
        let row = sqlx::query(
            r#"
            UPDATE photos
            SET meta = jsonb_set(
                jsonb_set(coalesce(meta, '{}'::jsonb), '{thumbnails}', coalesce(meta->'thumbnails', '{}'::jsonb), true),
                ARRAY['thumbnails', $2],
                to_jsonb($3::text),
                true
            )
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(size_token)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|_| ()).ok_or_else(|| DataError::NotFound(format!("photo {id}")))
    }

    async fn list_users(&self) -> Result<Vec<User>, DataError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DataError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, DataError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn save_user(&self, user: &User) -> Result<(), DataError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, email, full_name, role, created_at, last_login, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                password_hash = EXCLUDED.password_hash,
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                role = EXCLUDED.role,
                last_login = EXCLUDED.last_login,
                active = EXCLUDED.active
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.last_login)
        .bind(user.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), DataError> {
        let row = sqlx::query("DELETE FROM users WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|_| ()).ok_or_else(|| DataError::NotFound(format!("user {id}")))
    }

    async fn count_active_admins(&self) -> Result<u64, DataError> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users WHERE role = 'admin' AND active = true")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), DataError> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserLookup for PgMetadataStore {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, SecurityError> {
        MetadataStore::get_user_by_username(self, username)
            .await
            .map_err(SecurityError::from)
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), SecurityError> {
        MetadataStore::update_last_login(self, user_id)
            .await
            .map_err(SecurityError::from)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    email: Option<String>,
    full_name: Option<String>,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
    last_login: Option<chrono::DateTime<chrono::Utc>>,
    active: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            full_name: row.full_name,
            role: if row.role == "admin" { Role::Admin } else { Role::User },
            created_at: row.created_at,
            last_login: row.last_login,
            active: row.active,
        }
    }
}
