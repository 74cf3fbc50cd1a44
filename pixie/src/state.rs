use std::sync::Arc;

use pixie_core::Config;
use pixie_data::MetadataStore;
use pixie_events::EventBus;
use pixie_grpc::PluginRegistry;
use pixie_objectstore::ObjectStore;
use pixie_security::login::UserLookup;
use pixie_security::AuthCore;

/// Everything a handler needs, threaded through `axum::extract::State` as a
/// single `Arc`. Never a process-wide global.
pub struct AppContext {
    pub config: Config,
    pub auth: Arc<AuthCore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub users: Arc<dyn UserLookup>,
    pub objects: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventBus>,
    pub plugins: Arc<PluginRegistry>,
}
