pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::DataError;
pub use memory::MemoryMetadataStore;
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use uuid::Uuid;

use pixie_core::types::{Photo, User};

/// `savePhoto`/`getPhoto`/.../`mergeThumbnail` from the adapter spec, plus
/// the minimal user-table surface the login endpoint and the admin-invariant
/// check need. Every write below is a single statement — no multi-statement
/// transactions are exposed outward.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_photo(&self, photo: &Photo) -> Result<(), DataError>;
    async fn get_photo(&self, id: Uuid) -> Result<Photo, DataError>;
    async fn delete_photo(&self, id: Uuid) -> Result<(), DataError>;
    async fn list_active_photos(&self) -> Result<Vec<Photo>, DataError>;
    async fn list_trashed_photos(&self) -> Result<Vec<Photo>, DataError>;
    async fn trash_photo(&self, id: Uuid) -> Result<(), DataError>;
    async fn restore_photo(&self, id: Uuid) -> Result<(), DataError>;
    async fn empty_trash(&self) -> Result<u64, DataError>;
    async fn permanently_delete_photo(&self, id: Uuid) -> Result<(), DataError>;
    async fn merge_thumbnail(&self, id: Uuid, size_token: &str, key: &str) -> Result<(), DataError>;

    async fn list_users(&self) -> Result<Vec<User>, DataError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DataError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, DataError>;
    async fn save_user(&self, user: &User) -> Result<(), DataError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), DataError>;
    async fn count_active_admins(&self) -> Result<u64, DataError>;
    async fn update_last_login(&self, id: Uuid) -> Result<(), DataError>;
}
