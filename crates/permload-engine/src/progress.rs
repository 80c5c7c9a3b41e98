//! Periodic progress reporting.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::governor::CancelSignal;
use crate::provisioner::Provisioner;

/// Remote resource totals at one point in time. A count that could not be
/// fetched is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub orgs: Option<usize>,
    pub spaces: Option<usize>,
    pub users: Option<usize>,
}

/// Query the platform's totals once and log them.
///
/// Counts retry under the run's policy. A count that still fails is logged
/// and skipped, and never fails the run.
pub async fn report_progress(provisioner: &Provisioner) -> ProgressSnapshot {
    let (orgs, spaces, users) = tokio::join!(
        provisioner.count_orgs(),
        provisioner.count_spaces(),
        provisioner.count_users()
    );

    let snapshot = ProgressSnapshot {
        orgs: orgs.map_err(|e| warn!("Failed to count orgs: {}", e)).ok(),
        spaces: spaces.map_err(|e| warn!("Failed to count spaces: {}", e)).ok(),
        users: users.map_err(|e| warn!("Failed to count users: {}", e)).ok(),
    };

    info!(
        orgs = ?snapshot.orgs,
        spaces = ?snapshot.spaces,
        users = ?snapshot.users,
        retries = provisioner.retry_events(),
        "Progress"
    );
    snapshot
}

/// Report progress every `interval` until `stop` fires.
pub fn spawn_progress_reporter(
    provisioner: Provisioner,
    interval: Duration,
    stop: CancelSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    report_progress(&provisioner).await;
                }
                _ = stop.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ops, InMemoryPlatform};
    use crate::retry::RetryPolicy;
    use permload_core::ApiError;
    use std::sync::Arc;

    fn provisioner(platform: Arc<InMemoryPlatform>) -> Provisioner {
        Provisioner::new(platform, RetryPolicy::fixed(Duration::from_millis(1), Some(1)))
    }

    #[tokio::test]
    async fn test_transient_count_failure_retried() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_next(ops::COUNT, 2, ApiError::Transport("reset".into()));
        let provisioner = Provisioner::new(
            platform.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), Some(3)),
        );

        let snapshot = report_progress(&provisioner).await;
        assert_eq!(
            snapshot,
            ProgressSnapshot {
                orgs: Some(0),
                spaces: Some(0),
                users: Some(0)
            }
        );
        assert_eq!(provisioner.retry_events(), 2);
        assert_eq!(platform.calls(), 5);
    }

    #[tokio::test]
    async fn test_report_counts() {
        let platform = Arc::new(InMemoryPlatform::new());
        let provisioner = provisioner(platform.clone());
        let org = provisioner.create_org_if_absent("o").await.unwrap();
        provisioner.create_space_if_absent("s", &org.id).await.unwrap();

        let snapshot = report_progress(&provisioner).await;
        assert_eq!(snapshot.orgs, Some(1));
        assert_eq!(snapshot.spaces, Some(1));
        assert_eq!(snapshot.users, Some(0));
    }

    #[tokio::test]
    async fn test_failed_count_is_skipped() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_next(ops::COUNT, 1, ApiError::Transport("down".into()));
        let snapshot = report_progress(&provisioner(platform.clone())).await;

        let missing = [snapshot.orgs, snapshot.spaces, snapshot.users]
            .iter()
            .filter(|c| c.is_none())
            .count();
        assert_eq!(missing, 1);
        assert_eq!(platform.calls(), 3);
    }

    #[tokio::test]
    async fn test_reporter_stops() {
        let platform = Arc::new(InMemoryPlatform::new());
        let stop = CancelSignal::new();
        let handle = spawn_progress_reporter(
            provisioner(platform.clone()),
            Duration::from_millis(5),
            stop.clone(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(platform.calls() >= 3);
    }
}
