use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tonic::transport::Channel;
use tonic::Code;

use pixie_core::deadlines::PLUGIN_VALIDATE_TOKEN_DEADLINE;

use crate::error::PluginError;
use crate::launch::LaunchedPlugin;
use crate::proto::plugin_client::PluginClient;
use crate::proto::{Photo, SearchRequest, SearchResult, ValidateTokenRequest, ValidateTokenResponse};

/// Which of the three optional methods a plugin actually implements, probed
/// once at registration. The registry never calls a method whose bit is
/// unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub process_photo: bool,
    pub search: bool,
    pub validate_token: bool,
}

pub struct PluginHandle {
    pub name: String,
    pub endpoint: String,
    pub capabilities: Capabilities,
    client: tokio::sync::Mutex<PluginClient<Channel>>,
    launched: tokio::sync::Mutex<LaunchedPlugin>,
}

impl PluginHandle {
    pub async fn process_photo(&self, photo: Photo) -> Result<(), PluginError> {
        if !self.capabilities.process_photo {
            return Err(PluginError::Rpc(format!("{}: ProcessPhoto not supported", self.name)));
        }
        self.client
            .lock()
            .await
            .process_photo(tonic::Request::new(photo))
            .await
            .map(|_| ())
            .map_err(|e| PluginError::Rpc(format!("{}: {e}", self.name)))
    }

    pub async fn search(&self, query: &str) -> Result<SearchResult, PluginError> {
        if !self.capabilities.search {
            return Err(PluginError::Rpc(format!("{}: Search not supported", self.name)));
        }
        self.client
            .lock()
            .await
            .search(tonic::Request::new(SearchRequest { query: query.to_string() }))
            .await
            .map(|resp| resp.into_inner())
            .map_err(|e| PluginError::Rpc(format!("{}: {e}", self.name)))
    }

    pub async fn validate_token(&self, token: &str) -> Result<ValidateTokenResponse, PluginError> {
        if !self.capabilities.validate_token {
            return Err(PluginError::Rpc(format!("{}: ValidateToken not supported", self.name)));
        }
        let mut request = tonic::Request::new(ValidateTokenRequest { token: token.to_string() });
        request.set_timeout(PLUGIN_VALIDATE_TOKEN_DEADLINE);
        self.client
            .lock()
            .await
            .validate_token(request)
            .await
            .map(|resp| resp.into_inner())
            .map_err(|e| PluginError::Rpc(format!("{}: {e}", self.name)))
    }

    pub async fn terminate(&self) {
        self.launched.lock().await.terminate();
    }

    pub async fn force_kill(&self) {
        let _ = self.launched.lock().await.start_kill();
    }

    pub async fn wait(&self) -> std::io::Result<std::process::ExitStatus> {
        self.launched.lock().await.wait().await
    }
}

/// Probes each of the three optional methods with a degenerate request and a
/// short deadline. `Unimplemented` clears the bit; any other response
/// (including a business error) sets it.
pub async fn probe_capabilities(client: &mut PluginClient<Channel>) -> Capabilities {
    let process_photo = probe(client.process_photo(tonic::Request::new(Photo {
        id: String::new(),
        s3_key: String::new(),
        mime: String::new(),
    })))
    .await;
    let search = probe(client.search(tonic::Request::new(SearchRequest { query: String::new() }))).await;
    let validate_token = probe(client.validate_token(tonic::Request::new(ValidateTokenRequest {
        token: String::new(),
    })))
    .await;

    Capabilities {
        process_photo,
        search,
        validate_token,
    }
}

async fn probe<T>(call: impl Future<Output = Result<tonic::Response<T>, tonic::Status>>) -> bool {
    match call.await {
        Ok(_) => true,
        Err(status) if status.code() == Code::Unimplemented => false,
        Err(_) => true,
    }
}

/// An ordered, concurrency-safe collection of launched plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<Vec<Arc<PluginHandle>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        launched: LaunchedPlugin,
        capabilities: Capabilities,
    ) -> Arc<PluginHandle> {
        let client = PluginClient::new(launched.channel.clone());
        let handle = Arc::new(PluginHandle {
            name: launched.name.clone(),
            endpoint: launched.endpoint.clone(),
            capabilities,
            client: tokio::sync::Mutex::new(client),
            launched: tokio::sync::Mutex::new(launched),
        });
        self.plugins.write().await.push(handle.clone());
        handle
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<Arc<PluginHandle>> {
        self.plugins.read().await.clone()
    }

    /// Applies `f` to every plugin in registration order, stopping at the
    /// first error. The basis for fan-out authorisation and any future
    /// processing pipeline.
    pub async fn for_each<F, Fut>(&self, f: F) -> Result<(), PluginError>
    where
        F: Fn(Arc<PluginHandle>) -> Fut,
        Fut: Future<Output = Result<(), PluginError>>,
    {
        for plugin in self.snapshot().await {
            f(plugin).await?;
        }
        Ok(())
    }

    /// Plugin-driven auth alternate path: iterate the registry invoking
    /// `ValidateToken` with a per-call 200ms deadline, stopping at the first
    /// plugin that returns `ok=true`. An empty registry is degraded
    /// pass-through, logged by the caller.
    pub async fn validate_token(&self, token: &str) -> Option<ValidateTokenResponse> {
        for plugin in self.snapshot().await {
            if !plugin.capabilities.validate_token {
                continue;
            }
            match plugin.validate_token(token).await {
                Ok(resp) if resp.ok => return Some(resp),
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(plugin = %plugin.name, error = %err, "plugin ValidateToken call failed");
                    continue;
                }
            }
        }
        None
    }

    /// Sends termination signals to every child, waits a bounded time for
    /// graceful exit, then force-kills survivors.
    pub async fn shutdown_all(&self, grace_period: std::time::Duration) {
        let plugins = self.snapshot().await;
        for plugin in &plugins {
            plugin.terminate().await;
        }

        let deadline = tokio::time::Instant::now() + grace_period;
        for plugin in &plugins {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let exited = tokio::time::timeout(remaining, plugin.wait()).await;
            if exited.is_err() {
                tracing::warn!(plugin = %plugin.name, "plugin did not exit gracefully, force-killing");
                plugin.force_kill().await;
            }
        }
    }
}
