//! Periodic triggers for the update pipeline.
//!
//! Two independent jobs: the full library scan and the existence-cache
//! refresh. Each interval is floored at 15 minutes to bound remote-call
//! volume. After a short startup grace delay every job runs once
//! immediately, so the system is warm without waiting out the first
//! interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::context::AppContext;
use crate::pipeline;

/// Lower bound on both scheduled intervals.
const INTERVAL_FLOOR_MINS: u64 = 15;

/// Delay before the first run, giving the host server time to come up when
/// both start together.
const STARTUP_GRACE: Duration = Duration::from_secs(60);

/// Clamp a configured interval to the enforced floor.
fn clamp_interval(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(INTERVAL_FLOOR_MINS) * 60)
}

/// Spawn the scheduler tasks. Each runs until the process exits.
pub fn spawn(ctx: &Arc<AppContext>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if ctx.config.themes.enabled {
        let scan_ctx = ctx.clone();
        let period = clamp_interval(ctx.config.themes.update_interval_mins);
        info!(
            "Scheduling library scans every {} minutes",
            period.as_secs() / 60
        );
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(STARTUP_GRACE).await;
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = pipeline::scan_library(&scan_ctx).await {
                    error!("Scheduled library scan failed: {e:#}");
                }
            }
        }));
    } else {
        info!("Scheduled library scans are disabled");
    }

    let cache_ctx = ctx.clone();
    let period = clamp_interval(ctx.config.themes.cache_interval_mins);
    info!(
        "Scheduling cache refreshes every {} minutes",
        period.as_secs() / 60
    );
    handles.push(tokio::spawn(async move {
        tokio::time::sleep(STARTUP_GRACE).await;
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            // degenerates to a no-op while the last refresh is still fresh
            cache_ctx.cache.refresh().await;
        }
    }));

    handles
}
