use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::auth::orchestrator::AuthorizationOrchestrator;

/// Background task that keeps linked advertiser tokens ahead of expiry.
///
/// Every `interval` (+ 5-10s jitter) it refreshes each credential expiring
/// within `window`. Failures are logged and retried on the next pass.
pub fn spawn_token_refresh(
    orchestrator: Arc<AuthorizationOrchestrator>,
    interval: Duration,
    window: chrono::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            // jitter is drawn before the await so the future stays Send
            let jitter = {
                use rand::Rng;
                rand::thread_rng().gen_range(5..10)
            };
            sleep(interval + Duration::from_secs(jitter)).await;

            run_once(&orchestrator, window).await;
        }
    })
}

pub async fn run_once(orchestrator: &AuthorizationOrchestrator, window: chrono::Duration) {
    match orchestrator.refresh_expiring(window).await {
        Ok(summary) if summary.scanned == 0 => debug!("no advertiser tokens due for refresh"),
        Ok(summary) => info!(
            scanned = summary.scanned,
            refreshed = summary.refreshed,
            revoked = summary.revoked,
            failed = summary.failed,
            "advertiser token refresh pass finished"
        ),
        Err(err) => warn!(error = %err, "advertiser token refresh pass failed (will retry)"),
    }
}
