use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use pixie_core::types::{Photo, PhotoStatus, Role, User};
use pixie_security::login::UserLookup;
use pixie_security::SecurityError;

use crate::error::DataError;
use crate::MetadataStore;

/// Backs the lifecycle-orchestrator and thumbnail-worker tests without a
/// real Postgres connection. Not reachable in production wiring.
#[derive(Default)]
pub struct MemoryMetadataStore {
    photos: DashMap<Uuid, Photo>,
    users: DashMap<Uuid, User>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save_photo(&self, photo: &Photo) -> Result<(), DataError> {
        self.photos.insert(photo.id, photo.clone());
        Ok(())
    }

    async fn get_photo(&self, id: Uuid) -> Result<Photo, DataError> {
        self.photos
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))
    }

    async fn delete_photo(&self, id: Uuid) -> Result<(), DataError> {
        self.photos
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))
    }

    async fn list_active_photos(&self) -> Result<Vec<Photo>, DataError> {
        Ok(self
            .photos
            .iter()
            .filter(|entry| entry.value().status == PhotoStatus::Active)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list_trashed_photos(&self) -> Result<Vec<Photo>, DataError> {
        Ok(self
            .photos
            .iter()
            .filter(|entry| entry.value().status == PhotoStatus::Trashed)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn trash_photo(&self, id: Uuid) -> Result<(), DataError> {
        let mut photo = self
            .photos
            .get_mut(&id)
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))?;
        if photo.status != PhotoStatus::Active {
            return Err(DataError::Conflict(format!("photo {id} is not active")));
        }
        photo.status = PhotoStatus::Trashed;
        photo.deleted_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn restore_photo(&self, id: Uuid) -> Result<(), DataError> {
        let mut photo = self
            .photos
            .get_mut(&id)
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))?;
        if photo.status != PhotoStatus::Trashed {
            return Err(DataError::Conflict(format!("photo {id} is not trashed")));
        }
        photo.status = PhotoStatus::Active;
        photo.deleted_at = None;
        Ok(())
    }

    async fn empty_trash(&self) -> Result<u64, DataError> {
        let trashed: Vec<Uuid> = self
            .photos
            .iter()
            .filter(|entry| entry.value().status == PhotoStatus::Trashed)
            .map(|entry| *entry.key())
            .collect();
        for id in &trashed {
            self.photos.remove(id);
        }
        Ok(trashed.len() as u64)
    }

    async fn permanently_delete_photo(&self, id: Uuid) -> Result<(), DataError> {
        let is_trashed = self
            .photos
            .get(&id)
            .map(|entry| entry.value().status == PhotoStatus::Trashed)
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))?;
        if !is_trashed {
            return Err(DataError::Conflict(format!("photo {id} is not trashed")));
        }
        self.photos.remove(&id);
        Ok(())
    }

    async fn merge_thumbnail(&self, id: Uuid, size_token: &str, key: &str) -> Result<(), DataError> {
        let mut photo = self
            .photos
            .get_mut(&id)
            .ok_or_else(|| DataError::NotFound(format!("photo {id}")))?;
        photo.meta.thumbnails.insert(size_token.to_string(), key.to_string());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, DataError> {
        Ok(self.users.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DataError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, DataError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save_user(&self, user: &User) -> Result<(), DataError> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), DataError> {
        self.users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DataError::NotFound(format!("user {id}")))
    }

    async fn count_active_admins(&self) -> Result<u64, DataError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| entry.value().role == Role::Admin && entry.value().active)
            .count() as u64)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), DataError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| DataError::NotFound(format!("user {id}")))?;
        user.last_login = Some(chrono::Utc::now());
        Ok(())
    }
}

#[async_trait]
impl UserLookup for MemoryMetadataStore {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pixie_core::types::PhotoMeta;

    fn photo(status: PhotoStatus) -> Photo {
        Photo {
            id: Uuid::new_v4(),
            filename: "a.jpg".into(),
            mime: "image/jpeg".into(),
            s3_key: "photos/a".into(),
            created_at: chrono::Utc::now(),
            status,
            deleted_at: None,
            meta: PhotoMeta::default(),
        }
    }

    #[tokio::test]
    async fn trash_then_restore_round_trips_status() {
        let store = MemoryMetadataStore::new();
        let photo = photo(PhotoStatus::Active);
        store.save_photo(&photo).await.unwrap();

        store.trash_photo(photo.id).await.unwrap();
        let trashed = store.get_photo(photo.id).await.unwrap();
        assert_eq!(trashed.status, PhotoStatus::Trashed);
        assert!(trashed.deleted_at.is_some());

        store.restore_photo(photo.id).await.unwrap();
        let restored = store.get_photo(photo.id).await.unwrap();
        assert_eq!(restored.status, PhotoStatus::Active);
        assert!(restored.deleted_at.is_none());
    }

    #[tokio::test]
    async fn trashing_an_already_trashed_photo_is_a_conflict() {
        let store = MemoryMetadataStore::new();
        let photo = photo(PhotoStatus::Trashed);
        store.save_photo(&photo).await.unwrap();

        assert_eq!(
            store.trash_photo(photo.id).await,
            Err(DataError::Conflict(format!("photo {} is not active", photo.id)))
        );
    }

    #[tokio::test]
    async fn trashing_a_missing_photo_is_not_found() {
        let store = MemoryMetadataStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.trash_photo(id).await, Err(DataError::NotFound(format!("photo {id}"))));
    }

    #[tokio::test]
    async fn empty_trash_deletes_only_trashed_rows_and_returns_count() {
        let store = MemoryMetadataStore::new();
        store.save_photo(&photo(PhotoStatus::Active)).await.unwrap();
        store.save_photo(&photo(PhotoStatus::Trashed)).await.unwrap();
        store.save_photo(&photo(PhotoStatus::Trashed)).await.unwrap();

        let deleted = store.empty_trash().await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.list_active_photos().await.unwrap().len(), 1);
        assert!(store.list_trashed_photos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_thumbnail_adds_to_metadata_map() {
        let store = MemoryMetadataStore::new();
        let photo = photo(PhotoStatus::Active);
        store.save_photo(&photo).await.unwrap();

        store.merge_thumbnail(photo.id, "512", "photos/a/thumb-512").await.unwrap();
        let updated = store.get_photo(photo.id).await.unwrap();
        assert_eq!(updated.meta.thumbnails.get("512").unwrap(), "photos/a/thumb-512");
    }

    #[tokio::test]
    async fn count_active_admins_excludes_disabled_and_user_role() {
        let store = MemoryMetadataStore::new();
        let mut admin = user(Role::Admin);
        admin.active = true;
        let mut disabled_admin = user(Role::Admin);
        disabled_admin.active = false;
        let mut regular = user(Role::User);
        regular.active = true;

        store.save_user(&admin).await.unwrap();
        store.save_user(&disabled_admin).await.unwrap();
        store.save_user(&regular).await.unwrap();

        assert_eq!(store.count_active_admins().await.unwrap(), 1);
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("user-{}", Uuid::new_v4()),
            password_hash: "hash".into(),
            email: None,
            full_name: None,
            role,
            created_at: chrono::Utc::now(),
            last_login: None,
            active: true,
        }
    }
}
