/// Errors from plugin discovery, launch, and invocation. Never silently
/// treated as success by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    Io(String),
    LaunchTimeout(String),
    Dial(String),
    HealthCheckFailed(String),
    Rpc(String),
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginError::Io(msg) => write!(f, "plugin io error: {msg}"),
            PluginError::LaunchTimeout(msg) => write!(f, "plugin launch timed out: {msg}"),
            PluginError::Dial(msg) => write!(f, "plugin dial failed: {msg}"),
            PluginError::HealthCheckFailed(msg) => write!(f, "plugin health check failed: {msg}"),
            PluginError::Rpc(msg) => write!(f, "plugin rpc failed: {msg}"),
        }
    }
}

impl std::error::Error for PluginError {}

impl From<PluginError> for pixie_core::AppError {
    fn from(err: PluginError) -> Self {
        pixie_core::AppError::Internal(err.to_string())
    }
}
