//! Fixed-rate tick driver

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::Coordinator;

/// Step the coordinator every `period`, forever.
///
/// Without a host the driver idles instead of stopping, so a reconnecting
/// host resumes the game. Late ticks are skipped, never caught up.
pub async fn run(coordinator: Arc<Coordinator>, period: Duration) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;

        let started = Instant::now();
        let Some(result) = coordinator.step() else {
            continue;
        };

        let elapsed = started.elapsed();
        if elapsed > period {
            warn!(elapsed_us = elapsed.as_micros() as u64, "Tick overran its period");
        }
        if !result.ate.is_empty() {
            debug!(eaten = result.ate.len(), "Fruit eaten");
        }
    }
}

/// Run the tick driver, restarting it if a step panics
pub async fn supervise(coordinator: Arc<Coordinator>, period: Duration) {
    info!(period_ms = period.as_millis() as u64, "Tick driver started");
    restart_on_panic(move || run(coordinator.clone(), period)).await;
}

/// Spawn a fresh driver from `start` every time the previous one panics
async fn restart_on_panic<F, Fut>(mut start: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let handle = tokio::spawn(start());
        match handle.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                error!(error = %e, "Tick driver panicked, restarting");
            }
            Err(e) => {
                info!(error = %e, "Tick driver cancelled");
                break;
            }
        }
    }
}
