use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::services::job_store::JobStore;

/// Periodically evict finished jobs nobody came back for.
///
/// Downloads do not evict, so a client may fetch a result more than once
/// until `ttl` has passed since the job finished. Jobs still running are
/// never touched.
pub fn spawn_sweeper(store: Arc<dyn JobStore>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let evicted = sweep_once(store.as_ref(), ttl).await;
            if evicted > 0 {
                tracing::info!(evicted, "Evicted expired translation jobs");
            } else {
                tracing::trace!("No expired translation jobs");
            }
        }
    })
}

/// One eviction pass. Returns how many jobs were removed.
pub async fn sweep_once(store: &dyn JobStore, ttl: Duration) -> usize {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(ttl)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

    let evicted = store.sweep(cutoff).await;
    metrics::counter!("translation_jobs_evicted_total").increment(evicted as u64);
    metrics::gauge!("translation_jobs_in_store").set(store.len().await as f64);
    evicted
}
