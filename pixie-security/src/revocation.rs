use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::jwt::JwtIssuer;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_REVOCATION_TTL: Duration = Duration::from_secs(24 * 3600);

/// The process-local blacklist of revoked token strings, each mapped to its
/// own eviction deadline (the token's `exp`, or a default if unparseable).
#[derive(Clone, Default)]
pub struct RevocationSet {
    entries: Arc<DashMap<String, DateTime<Utc>>>,
}

impl RevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `revokeToken`: blacklist `token` until its own `exp`, defaulting to a
    /// 24h deadline when the token can't be parsed at all.
    pub fn revoke(&self, token: &str) {
        let deadline = JwtIssuer::peek_expiry_unverified(token)
            .unwrap_or_else(|| Utc::now() + chrono::Duration::from_std(DEFAULT_REVOCATION_TTL).unwrap());
        self.entries.insert(token.to_string(), deadline);
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, expiry| *expiry > now);
        before - self.entries.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// An explicit handle for a background sweeper task, so shutdown can cancel
/// it deterministically rather than leaving a detached `tokio::spawn` with no
/// owner.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Start the hourly revocation-set sweeper. Returns a handle the caller must
/// keep and eventually `.stop()` during graceful shutdown.
pub fn start_sweeper(revocation_set: RevocationSet) -> SweeperHandle {
    start_sweeper_with_interval(revocation_set, SWEEP_INTERVAL)
}

fn start_sweeper_with_interval(revocation_set: RevocationSet, interval: Duration) -> SweeperHandle {
    let cancel = CancellationToken::new();
    let cancel_for_task = cancel.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel_for_task.cancelled() => {
                    tracing::debug!("revocation sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = revocation_set.sweep();
                    if evicted > 0 {
                        tracing::debug!(evicted, "swept expired revocation entries");
                    }
                }
            }
        }
    });
    SweeperHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoke_then_check() {
        let set = RevocationSet::new();
        assert!(!set.is_revoked("abc"));
        set.revoke("abc");
        assert!(set.is_revoked("abc"));
    }

    #[tokio::test]
    async fn sweeper_evicts_expired_entries() {
        let set = RevocationSet::new();
        set.entries.insert("expired".into(), Utc::now() - chrono::Duration::seconds(1));
        set.entries.insert("fresh".into(), Utc::now() + chrono::Duration::hours(1));

        let handle = start_sweeper_with_interval(set.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        assert!(!set.is_revoked("expired"));
        assert!(set.is_revoked("fresh"));
        assert_eq!(set.len(), 1);
    }
}
