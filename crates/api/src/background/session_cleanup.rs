//! Periodic sweep of dead sessions and stale rate-limit windows.
//!
//! Runs on a fixed interval using `tokio::time::interval`, independently of
//! request handling. It only deletes sessions that are already expired or
//! inactive, so it never races a request holding a usable session.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::auth::session_store::SessionStore;
use crate::middleware::rate_limit::RateLimiters;

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(
    store: SessionStore,
    limiters: Arc<RateLimiters>,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Session cleanup job started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = interval.tick() => sweep(&store, &limiters).await,
        }
    }
}

/// One pass: delete dead sessions, then drop stale limiter windows.
pub async fn sweep(store: &SessionStore, limiters: &RateLimiters) {
    match store.cleanup_expired().await {
        Ok(0) => tracing::debug!("Session cleanup: no rows to purge"),
        Ok(deleted) => tracing::info!(deleted, "Session cleanup: purged dead sessions"),
        Err(e) => tracing::error!(error = %e, "Session cleanup: sweep failed"),
    }

    let purged = limiters.purge_expired();
    if purged > 0 {
        tracing::debug!(purged, "Session cleanup: dropped stale rate-limit windows");
    }
}
