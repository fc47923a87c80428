//! Background flushing: one delayed flush after start, then a fixed interval.

use super::service::{FlushOutcome, SyncService};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, warn};

fn log_outcome(what: &str, outcome: &FlushOutcome) {
    if outcome.is_success() {
        debug!(?outcome, "{}", what);
    } else {
        warn!(?outcome, "{} did not complete", what);
    }
}

/// Owns the timer task.
///
/// `shutdown` stops it between flushes, so a batch already at the remote is
/// finished. Dropping the scheduler aborts the task outright.
pub struct SyncScheduler {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl SyncScheduler {
    pub fn spawn(service: Arc<SyncService>) -> Self {
        let delay = service.config().initial_delay();
        let period = service.config().interval();
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {}
                _ = stopped.changed() => return,
            }
            if let Some(outcome) = service.flush_if_pending().await {
                log_outcome("Initial flush", &outcome);
            }

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped.changed() => break,
                }
                match service.flush_if_pending().await {
                    Some(outcome) => log_outcome("Periodic flush", &outcome),
                    None => debug!("Periodic flush skipped; nothing pending"),
                }
            }
            debug!("Sync scheduler stopped");
        });

        Self { handle, stop }
    }

    /// Stop the timer, letting a flush that is already running complete.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        let _ = (&mut self.handle).await;
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::remote::testing::MockRemote;
    use crate::storage::testing::MemoryStore;
    use crate::sync::queue::fixtures::loop_result;
    use crate::sync::{SyncRecord, ToggleOutcome};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    async fn service(remote: Arc<MockRemote>) -> Arc<SyncService> {
        let service = SyncService::new(
            SyncConfig::default(),
            remote,
            Box::new(MemoryStore::new(1024 * 1024)),
        );
        assert!(matches!(
            service.toggle_remote(true, &[]).await,
            ToggleOutcome::Enabled { .. }
        ));
        Arc::new(service)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delayed_flush_then_interval() {
        let remote = Arc::new(MockRemote::configured());
        let service = service(remote.clone()).await;
        service.enqueue(SyncRecord::Loop(loop_result("l0"))).await;

        let scheduler = SyncScheduler::spawn(service.clone());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.calls(), 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.calls(), 1);
        assert_eq!(service.status().await.pending.total(), 0);

        // empty ticks do not reach the remote
        sleep(Duration::from_secs(125)).await;
        assert_eq!(remote.calls(), 1);

        service.enqueue(SyncRecord::Loop(loop_result("l1"))).await;
        sleep(Duration::from_secs(120)).await;
        assert_eq!(remote.calls(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_stops_timer() {
        let remote = Arc::new(MockRemote::configured());
        let service = service(remote.clone()).await;

        let scheduler = SyncScheduler::spawn(service.clone());
        drop(scheduler);

        service.enqueue(SyncRecord::Loop(loop_result("l0"))).await;
        sleep(Duration::from_secs(600)).await;
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_running_flush_finish() {
        let gate = Arc::new(Semaphore::new(0));
        let remote = Arc::new(MockRemote::gated(gate.clone()));
        let service = service(remote.clone()).await;
        service.enqueue(SyncRecord::Loop(loop_result("l0"))).await;

        let scheduler = SyncScheduler::spawn(service.clone());
        sleep(Duration::from_secs(6)).await;
        assert_eq!(remote.calls(), 1);

        // the initial flush is waiting on the remote
        let stopping = tokio::spawn(scheduler.shutdown());
        tokio::task::yield_now().await;
        gate.add_permits(1);
        stopping.await.unwrap();

        assert_eq!(service.status().await.pending.total(), 0);
        assert_eq!(service.flush().await, FlushOutcome::Empty);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(remote.calls(), 1);
    }
}
