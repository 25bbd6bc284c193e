//! Background offer expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::AllocationEngine;

/// Spawn a background task that expires stale offers every
/// `expiry_sweep_interval`.
pub fn spawn_expiry_task(engine: Arc<AllocationEngine>) -> tokio::task::JoinHandle<()> {
    // `interval` panics on a zero period; unvalidated configs get a 1ms floor
    let period = engine
        .config()
        .expiry_sweep_interval
        .max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match engine.sweep_expired_offers().await {
                Ok(report) if report.expired > 0 => info!(
                    expired = report.expired,
                    reallocations = report.reallocations,
                    "Offer sweep finished"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Offer sweep failed"),
            }
        }
    })
}
