use std::path::Path;
use std::time::Duration;

use crate::discovery::discover_plugin_paths;
use crate::error::PluginError;
use crate::launch::launch_plugin;
use crate::proto::plugin_client::PluginClient;
use crate::registry::{probe_capabilities, PluginHandle, PluginRegistry};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Discovers, launches, health-checks, and registers every candidate
/// executable under `plugins_dir`. A plugin that fails to launch is logged
/// and skipped; one bad plugin never blocks the others.
pub async fn bootstrap(plugins_dir: &Path, registry: &PluginRegistry) {
    let candidates = match discover_plugin_paths(plugins_dir) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::warn!(dir = %plugins_dir.display(), error = %err, "plugin discovery failed");
            return;
        }
    };

    for path in candidates {
        match load_one(&path, registry).await {
            Ok(handle) => {
                tracing::info!(plugin = %handle.name, endpoint = %handle.endpoint, capabilities = ?handle.capabilities, "plugin loaded");
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "plugin failed to load");
            }
        }
    }
}

async fn load_one(path: &Path, registry: &PluginRegistry) -> Result<std::sync::Arc<PluginHandle>, PluginError> {
    let launched = launch_plugin(path).await?;
    let mut probe_client = PluginClient::new(launched.channel.clone());
    let capabilities = probe_capabilities(&mut probe_client).await;
    Ok(registry.register(launched, capabilities).await)
}

/// Sends termination signals to every spawned child, waits the standard
/// grace period, then force-kills survivors. Called once from the host's
/// shutdown path.
pub async fn shutdown(registry: &PluginRegistry) {
    registry.shutdown_all(SHUTDOWN_GRACE_PERIOD).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_against_missing_directory_leaves_registry_empty() {
        let registry = PluginRegistry::new();
        bootstrap(Path::new("/nonexistent/pixie-plugins-dir"), &registry).await;
        assert!(registry.is_empty().await);
    }
}
