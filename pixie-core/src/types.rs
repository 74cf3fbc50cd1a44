use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a [`Photo`]. `status = Trashed` must always agree with
/// `deleted_at.is_some()` — the invariant is enforced by the store adapter,
/// never by callers poking both fields independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Active,
    Trashed,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Active => "active",
            PhotoStatus::Trashed => "trashed",
        }
    }
}

/// Free-form metadata attached to a photo. The only well-known subkey is
/// `thumbnails`, a map from size token (e.g. `"512"`) to blob key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thumbnails: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub filename: String,
    pub mime: String,
    pub s3_key: String,
    pub created_at: DateTime<Utc>,
    pub status: PhotoStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub meta: PhotoMeta,
}

impl Photo {
    pub fn primary_key(&self) -> &str {
        &self.s3_key
    }

    pub fn thumbnail_key(&self, size: &str) -> Option<&str> {
        self.meta.thumbnails.get(size).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Event payload for `photo.uploaded`, bit-exact per the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUploadedEvent {
    pub id: Uuid,
    pub filename: String,
    pub mime: String,
    pub s3_key: String,
    pub created_at: DateTime<Utc>,
}

/// Event payload for `photo.deleted`, bit-exact per the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoDeletedEvent {
    pub id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

pub const SUBJECT_PHOTO_UPLOADED: &str = "photo.uploaded";
pub const SUBJECT_PHOTO_DELETED: &str = "photo.deleted";
