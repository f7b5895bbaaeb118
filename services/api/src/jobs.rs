//! services/api/src/jobs.rs
//!
//! Background jobs driving the engine's batch operations: the periodic
//! trend-score recompute and the daily analytics rollup. Both operations
//! are idempotent, so an overlapping or repeated run is harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pressroom_core::engine::Engine;

use crate::config::Config;

/// Spawns the recurring engine jobs. They run until `shutdown` is
/// cancelled.
pub fn spawn_engine_jobs(
    engine: Arc<Engine>,
    config: &Config,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(trend_loop(
            engine.clone(),
            Duration::from_secs(config.trend_interval_secs),
            shutdown.clone(),
        )),
        tokio::spawn(rollup_loop(
            engine,
            Duration::from_secs(config.rollup_interval_secs),
            shutdown,
        )),
    ]
}

/// Re-scores all published articles on an interval so stale trends decay
/// even when no new votes arrive.
async fn trend_loop(engine: Arc<Engine>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Trend score job shutting down.");
                return;
            }
            _ = interval.tick() => {
                match engine.recompute_trend_scores().await {
                    Ok(count) => info!("Recomputed trend scores for {} articles", count),
                    Err(e) => error!("Trend score recompute failed: {:?}", e),
                }
            }
        }
    }
}

/// Rolls up yesterday and today on an interval. Today's row converges as
/// the day progresses; the first run after midnight lands the final row
/// for the previous day.
async fn rollup_loop(engine: Arc<Engine>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Daily rollup job shutting down.");
                return;
            }
            _ = interval.tick() => {
                let today = Utc::now().date_naive();
                let yesterday = today - Days::new(1);
                for date in [yesterday, today] {
                    match engine.rollup_day(date).await {
                        Ok(count) => info!("Rolled up {} article-days for {}", count, date),
                        Err(e) => error!("Daily rollup for {} failed: {:?}", date, e),
                    }
                }
            }
        }
    }
}
