//! Startup and shutdown ordering for the whole process. Both are written out
//! as a flat sequence rather than hook lists — there's exactly one of each
//! here, unlike the plugin-driven controller framework this crate grew out
//! of.

use std::path::Path;
use std::sync::Arc;

use pixie_core::{AppError, Config};
use pixie_data::{MetadataStore, PgMetadataStore};
use pixie_events::memory::MemoryEventBus;
use pixie_events::EventBus;
use pixie_events_nats::NatsEventBus;
use pixie_grpc::PluginRegistry;
use pixie_objectstore::{ObjectStore, S3ObjectStore};
use pixie_security::login::UserLookup;
use pixie_security::{AuthCore, SweeperHandle};
use pixie_thumbnail::ThumbnailWorkerPool;

use crate::state::AppContext;

pub struct Application {
    pub ctx: Arc<AppContext>,
    sweeper: SweeperHandle,
}

impl Application {
    /// Connects every adapter, launches plugins, and starts the thumbnail
    /// worker pool, in the order the concurrency & resource model requires:
    /// metadata store, object store, event bus, auth core (and its
    /// revocation sweeper), plugin supervisor, thumbnail workers.
    pub async fn bootstrap(config: Config) -> Result<Self, AppError> {
        // One store, coerced into the two trait objects handlers need —
        // `MetadataStore` for photo/user CRUD, `UserLookup` for the login
        // path — rather than two separate connections to the same database.
        let store = Arc::new(
            PgMetadataStore::connect(&config.database_url)
                .await
                .map_err(|e| AppError::Internal(format!("connecting to metadata store: {e}")))?,
        );
        let metadata: Arc<dyn MetadataStore> = store.clone();
        let users: Arc<dyn UserLookup> = store;

        let object_store = S3ObjectStore::new(
            &config.s3_endpoint,
            &config.s3_access_key,
            &config.s3_secret_key,
            &config.s3_bucket,
        );
        object_store
            .ensure_bucket()
            .await
            .map_err(|e| AppError::Internal(format!("ensuring bucket: {e}")))?;
        let objects: Arc<dyn ObjectStore> = Arc::new(object_store);

        let events: Arc<dyn EventBus> = match &config.nats_url {
            Some(url) => {
                let bus = NatsEventBus::connect(url)
                    .await
                    .map_err(|e| AppError::Internal(format!("connecting to NATS: {e}")))?;
                bus.ensure_stream()
                    .await
                    .map_err(|e| AppError::Internal(format!("ensuring event stream: {e}")))?;
                Arc::new(bus)
            }
            None => {
                tracing::warn!("NATS_URL not set, falling back to in-process event bus");
                Arc::new(MemoryEventBus::new())
            }
        };

        let auth = Arc::new(
            AuthCore::from_config(&config)
                .map_err(|e| AppError::Internal(format!("initializing auth core: {e}")))?,
        );
        let sweeper = auth.start_revocation_sweeper();

        let plugins = Arc::new(PluginRegistry::new());
        pixie_grpc::bootstrap(Path::new(&config.plugins_dir), &plugins).await;

        let thumbnails = ThumbnailWorkerPool::new(
            objects.clone(),
            metadata.clone(),
            config.thumb_workers,
            config.thumb_sizes.clone(),
        );
        thumbnails
            .subscribe(events.as_ref())
            .await
            .map_err(|e| AppError::Internal(format!("subscribing thumbnail workers: {e}")))?;

        let ctx = Arc::new(AppContext {
            config,
            auth,
            metadata,
            users,
            objects,
            events,
            plugins,
        });

        Ok(Self { ctx, sweeper })
    }

    /// Reverse order: plugin children terminated before the revocation
    /// sweeper is cancelled, since plugin shutdown can take up to the grace
    /// period and the sweeper costs nothing left running a little longer.
    /// The thumbnail subscription has no cancellation handle (the event bus
    /// trait doesn't expose one) — it's torn down implicitly by process
    /// exit, not explicitly here.
    pub async fn shutdown(self) {
        pixie_grpc::shutdown(&self.ctx.plugins).await;
        self.sweeper.stop().await;
    }
}
