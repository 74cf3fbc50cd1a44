//! Blob storage adapter: overwrite-semantics `put`, `NotFound`-on-absence
//! `get`, `delete`, and the `ensure_bucket`/`exists` operations the purge
//! path and tests need.

pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreError {
    NotFound(String),
    Transport(String),
    Auth(String),
    Other(String),
}

impl std::fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectStoreError::NotFound(key) => write!(f, "object not found: {key}"),
            ObjectStoreError::Transport(msg) => write!(f, "object store transport error: {msg}"),
            ObjectStoreError::Auth(msg) => write!(f, "object store auth error: {msg}"),
            ObjectStoreError::Other(msg) => write!(f, "object store error: {msg}"),
        }
    }
}

impl std::error::Error for ObjectStoreError {}

impl From<ObjectStoreError> for pixie_core::AppError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound(key) => pixie_core::AppError::NotFound(format!("blob {key}")),
            ObjectStoreError::Auth(msg) => pixie_core::AppError::Internal(msg),
            ObjectStoreError::Transport(msg) => pixie_core::AppError::Transient(msg),
            ObjectStoreError::Other(msg) => pixie_core::AppError::Internal(msg),
        }
    }
}

/// `put`/`get`/`delete`/`ensureBucket` from the adapter spec, plus `exists`
/// for the purge path's best-effort thumbnail cleanup and for tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError>;
}
