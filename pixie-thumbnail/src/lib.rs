//! Turns `photo.uploaded` deliveries into JPEG thumbnails. One bounded
//! worker pool backs the queue-group subscription; the delivery callback
//! blocks on acquiring a slot, so backpressure flows from the pool to the
//! broker.

use std::sync::Arc;

use image::imageops::FilterType;
use image::ImageFormat;
use tokio::sync::Semaphore;
use uuid::Uuid;

use pixie_core::deadlines::{THUMBNAIL_MAX_ADDITIONAL_ATTEMPTS, THUMBNAIL_RETRY_BASE_DELAY};
use pixie_core::types::PhotoUploadedEvent;
use pixie_data::MetadataStore;
use pixie_events::{EventBus, IncomingMessage, SubscribeOptions};
use pixie_objectstore::ObjectStore;

const QUEUE_GROUP: &str = "thumbnail-workers";
const JPEG_QUALITY: u8 = 85;

/// Errors from processing a single upload. Distinct from `EventBusError` or
/// `ObjectStoreError` — the worker maps every adapter error into this one
/// taxonomy before deciding ack vs retry vs nak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    Decode(String),
    Store(String),
    Metadata(String),
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThumbnailError::Decode(msg) => write!(f, "image decode failed: {msg}"),
            ThumbnailError::Store(msg) => write!(f, "object store error: {msg}"),
            ThumbnailError::Metadata(msg) => write!(f, "metadata store error: {msg}"),
        }
    }
}

impl std::error::Error for ThumbnailError {}

/// A bounded pool of workers consuming `photo.uploaded` and writing
/// thumbnails for every configured size.
pub struct ThumbnailWorkerPool {
    object_store: Arc<dyn ObjectStore>,
    metadata_store: Arc<dyn MetadataStore>,
    semaphore: Arc<Semaphore>,
    sizes: Vec<u32>,
}

impl ThumbnailWorkerPool {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        metadata_store: Arc<dyn MetadataStore>,
        worker_count: usize,
        sizes: Vec<u32>,
    ) -> Arc<Self> {
        Arc::new(Self {
            object_store,
            metadata_store,
            semaphore: Arc::new(Semaphore::new(worker_count.max(1))),
            sizes,
        })
    }

    /// Subscribes the pool to `photo.uploaded` with manual-ack, explicit-ack,
    /// deliver-new semantics. Every delivery acquires a permit before the
    /// handler body runs — the `subscribe` callback itself blocks on
    /// `acquire_owned`, which is how backpressure reaches the broker.
    pub async fn subscribe(self: &Arc<Self>, bus: &dyn EventBus) -> Result<(), pixie_events::EventBusError> {
        let pool = self.clone();
        let handler: pixie_events::Handler = Arc::new(move |msg: IncomingMessage| {
            let pool = pool.clone();
            Box::pin(async move {
                let permit = pool
                    .semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("thumbnail worker semaphore closed");
                pool.handle_delivery(msg).await;
                drop(permit);
            })
        });

        bus.subscribe(
            pixie_core::types::SUBJECT_PHOTO_UPLOADED,
            QUEUE_GROUP,
            SubscribeOptions::default(),
            handler,
        )
        .await
    }

    async fn handle_delivery(&self, msg: IncomingMessage) {
        let event: PhotoUploadedEvent = match serde_json::from_value(msg.payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, "photo.uploaded payload did not parse, acking to drop it");
                msg.ack().await;
                return;
            }
        };

        if !event.mime.starts_with("image/") {
            msg.ack().await;
            return;
        }

        let mut attempt = 0u32;
        loop {
            match self.process(&event).await {
                Ok(()) => {
                    msg.ack().await;
                    return;
                }
                Err(err) => {
                    if attempt >= THUMBNAIL_MAX_ADDITIONAL_ATTEMPTS {
                        tracing::error!(photo_id = %event.id, error = %err, attempt, "thumbnail processing exhausted retries, nak-ing");
                        msg.nak().await;
                        return;
                    }
                    let backoff = THUMBNAIL_RETRY_BASE_DELAY * 2u32.pow(attempt);
                    tracing::warn!(photo_id = %event.id, error = %err, attempt, backoff = ?backoff, "thumbnail attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn process(&self, event: &PhotoUploadedEvent) -> Result<(), ThumbnailError> {
        let (bytes, _content_type) = self
            .object_store
            .get(&event.s3_key)
            .await
            .map_err(|e| ThumbnailError::Store(e.to_string()))?;

        let image = image::load_from_memory(&bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;

        for size in &self.sizes {
            let thumbnail = resize_to_fit(&image, *size);
            let jpeg_bytes = encode_jpeg(&thumbnail)?;

            let key = thumbnail_key(event.id, *size);
            self.object_store
                .put(&key, jpeg_bytes.into(), "image/jpeg")
                .await
                .map_err(|e| ThumbnailError::Store(e.to_string()))?;

            self.metadata_store
                .merge_thumbnail(event.id, &size.to_string(), &key)
                .await
                .map_err(|e| ThumbnailError::Metadata(e.to_string()))?;
        }

        Ok(())
    }
}

fn resize_to_fit(image: &image::DynamicImage, longest_side: u32) -> image::DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width.max(height) <= longest_side {
        return image.clone();
    }
    let (new_width, new_height) = if width >= height {
        (longest_side, (height as f64 * longest_side as f64 / width as f64).round() as u32)
    } else {
        ((width as f64 * longest_side as f64 / height as f64).round() as u32, longest_side)
    };
    image.resize(new_width.max(1), new_height.max(1), FilterType::Lanczos3)
}

fn encode_jpeg(image: &image::DynamicImage) -> Result<Vec<u8>, ThumbnailError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn thumbnail_key(photo_id: Uuid, size: u32) -> String {
    format!("thumb/{size}/{photo_id}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;
    use dashmap::DashMap;
    use pixie_core::types::{Photo, PhotoMeta, PhotoStatus, Role, User};
    use pixie_data::DataError;
    use pixie_objectstore::ObjectStoreError;

    #[derive(Default)]
    struct FakeObjectStore {
        objects: DashMap<String, (Bytes, String)>,
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
            self.objects.insert(key.to_string(), (bytes, content_type.to_string()));
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError> {
            self.objects
                .get(key)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
            self.objects.remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
            Ok(self.objects.contains_key(key))
        }

        async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeMetadataStore {
        photos: DashMap<Uuid, Photo>,
    }

    #[async_trait]
    impl MetadataStore for FakeMetadataStore {
        async fn save_photo(&self, photo: &Photo) -> Result<(), DataError> {
            self.photos.insert(photo.id, photo.clone());
            Ok(())
        }
        async fn get_photo(&self, id: Uuid) -> Result<Photo, DataError> {
            self.photos.get(&id).map(|e| e.value().clone()).ok_or_else(|| DataError::NotFound(id.to_string()))
        }
        async fn delete_photo(&self, _id: Uuid) -> Result<(), DataError> {
            Ok(())
        }
        async fn list_active_photos(&self) -> Result<Vec<Photo>, DataError> {
            Ok(vec![])
        }
        async fn list_trashed_photos(&self) -> Result<Vec<Photo>, DataError> {
            Ok(vec![])
        }
        async fn trash_photo(&self, _id: Uuid) -> Result<(), DataError> {
            Ok(())
        }
        async fn restore_photo(&self, _id: Uuid) -> Result<(), DataError> {
            Ok(())
        }
        async fn empty_trash(&self) -> Result<u64, DataError> {
            Ok(0)
        }
        async fn permanently_delete_photo(&self, _id: Uuid) -> Result<(), DataError> {
            Ok(())
        }
        async fn merge_thumbnail(&self, id: Uuid, size_token: &str, key: &str) -> Result<(), DataError> {
            let mut photo = self.photos.get_mut(&id).ok_or_else(|| DataError::NotFound(id.to_string()))?;
            photo.meta.thumbnails.insert(size_token.to_string(), key.to_string());
            Ok(())
        }
        async fn list_users(&self) -> Result<Vec<User>, DataError> {
            Ok(vec![])
        }
        async fn get_user_by_username(&self, _username: &str) -> Result<Option<User>, DataError> {
            Ok(None)
        }
        async fn get_user_by_id(&self, _id: Uuid) -> Result<Option<User>, DataError> {
            Ok(None)
        }
        async fn save_user(&self, _user: &User) -> Result<(), DataError> {
            Ok(())
        }
        async fn delete_user(&self, _id: Uuid) -> Result<(), DataError> {
            Ok(())
        }
        async fn count_active_admins(&self) -> Result<u64, DataError> {
            Ok(0)
        }
        async fn update_last_login(&self, _id: Uuid) -> Result<(), DataError> {
            Ok(())
        }
    }

    fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn processes_upload_and_merges_thumbnail_metadata() {
        let object_store: Arc<dyn ObjectStore> = Arc::new(FakeObjectStore::default());
        let metadata_store: Arc<dyn MetadataStore> = Arc::new(FakeMetadataStore::default());

        let photo_id = Uuid::new_v4();
        let photo = Photo {
            id: photo_id,
            filename: "a.jpg".into(),
            mime: "image/jpeg".into(),
            s3_key: format!("photos/{photo_id}"),
            created_at: Utc::now(),
            status: PhotoStatus::Active,
            deleted_at: None,
            meta: PhotoMeta::default(),
        };
        metadata_store.save_photo(&photo).await.unwrap();
        object_store.put(&photo.s3_key, solid_jpeg(1024, 512).into(), "image/jpeg").await.unwrap();

        let pool = ThumbnailWorkerPool::new(object_store.clone(), metadata_store.clone(), 2, vec![512]);
        let event = PhotoUploadedEvent {
            id: photo_id,
            filename: photo.filename.clone(),
            mime: photo.mime.clone(),
            s3_key: photo.s3_key.clone(),
            created_at: photo.created_at,
        };

        pool.process(&event).await.unwrap();

        let stored = metadata_store.get_photo(photo_id).await.unwrap();
        let key = stored.meta.thumbnails.get("512").unwrap();
        assert_eq!(key, &thumbnail_key(photo_id, 512));

        let (bytes, content_type) = object_store.get(key).await.unwrap();
        assert_eq!(content_type, "image/jpeg");
        assert!(!bytes.is_empty());

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 512);
        assert_eq!(decoded.height(), 256);
    }

    #[tokio::test]
    async fn decode_failure_is_terminal_for_the_message() {
        let object_store: Arc<dyn ObjectStore> = Arc::new(FakeObjectStore::default());
        let metadata_store: Arc<dyn MetadataStore> = Arc::new(FakeMetadataStore::default());

        let photo_id = Uuid::new_v4();
        object_store.put(&format!("photos/{photo_id}"), Bytes::from_static(b"not an image"), "image/jpeg").await.unwrap();

        let pool = ThumbnailWorkerPool::new(object_store, metadata_store, 1, vec![512]);
        let event = PhotoUploadedEvent {
            id: photo_id,
            filename: "a.jpg".into(),
            mime: "image/jpeg".into(),
            s3_key: format!("photos/{photo_id}"),
            created_at: Utc::now(),
        };

        let result = pool.process(&event).await;
        assert!(matches!(result, Err(ThumbnailError::Decode(_))));
    }
}
