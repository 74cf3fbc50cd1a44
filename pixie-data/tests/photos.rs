//! Requires a local Postgres instance and `DATABASE_URL` pointing at it.
//! Run with `cargo test -p pixie-data --features integration -- --ignored`.
#![cfg(feature = "integration")]

use chrono::Utc;
use uuid::Uuid;

use pixie_core::types::{Photo, PhotoMeta, PhotoStatus};
use pixie_data::{MetadataStore, PgMetadataStore};

async fn store() -> PgMetadataStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    PgMetadataStore::connect(&url).await.expect("connect to postgres")
}

fn sample_photo() -> Photo {
    Photo {
        id: Uuid::new_v4(),
        filename: "cat.png".to_string(),
        mime: "image/png".to_string(),
        s3_key: format!("photos/{}", Uuid::new_v4()),
        created_at: Utc::now(),
        status: PhotoStatus::Active,
        deleted_at: None,
        meta: PhotoMeta::default(),
    }
}

#[tokio::test]
#[ignore]
async fn save_then_get_round_trips() {
    let store = store().await;
    let photo = sample_photo();

    store.save_photo(&photo).await.expect("save photo");
    let fetched = store.get_photo(photo.id).await.expect("get photo");

    assert_eq!(fetched.id, photo.id);
    assert_eq!(fetched.filename, photo.filename);
    assert_eq!(fetched.status, PhotoStatus::Active);

    store.permanently_delete_photo(photo.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn trash_then_restore_round_trips_status() {
    let store = store().await;
    let photo = sample_photo();
    store.save_photo(&photo).await.expect("save photo");

    store.trash_photo(photo.id).await.expect("trash photo");
    let trashed = store.get_photo(photo.id).await.expect("get photo");
    assert_eq!(trashed.status, PhotoStatus::Trashed);
    assert!(trashed.deleted_at.is_some());

    store.restore_photo(photo.id).await.expect("restore photo");
    let restored = store.get_photo(photo.id).await.expect("get photo");
    assert_eq!(restored.status, PhotoStatus::Active);
    assert!(restored.deleted_at.is_none());

    store.permanently_delete_photo(photo.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn purge_all_empties_trash_and_returns_count() {
    let store = store().await;
    let a = sample_photo();
    let b = sample_photo();
    store.save_photo(&a).await.expect("save a");
    store.save_photo(&b).await.expect("save b");
    store.trash_photo(a.id).await.expect("trash a");
    store.trash_photo(b.id).await.expect("trash b");

    let before = store.list_trashed_photos().await.expect("list trashed");
    assert!(before.iter().any(|p| p.id == a.id));
    assert!(before.iter().any(|p| p.id == b.id));

    let deleted = store.empty_trash().await.expect("empty trash");
    assert!(deleted >= 2);

    let after = store.list_trashed_photos().await.expect("list trashed");
    assert!(!after.iter().any(|p| p.id == a.id));
    assert!(!after.iter().any(|p| p.id == b.id));
}
