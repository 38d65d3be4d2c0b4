//! Periodic reaper trigger
//!
//! Runs one sweep per interval on a background task. A sweep is never
//! started twice concurrently: the next tick waits for the current sweep.

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use common::error::{Error, Result};
use common::utils::format_duration;

use crate::reaper::IdleReaper;

/// Background task handle and its stop signal
struct Running {
    /// Stop signal
    cancellation_token: CancellationToken,
    /// Loop task
    handle: JoinHandle<()>,
}

/// Drives an [`IdleReaper`] on a fixed interval
pub struct ReaperScheduler {
    /// Reaper run on every tick
    reaper: Arc<IdleReaper>,

    /// Time between ticks
    interval: Duration,

    /// Loop task while started
    running: Mutex<Option<Running>>,
}

impl ReaperScheduler {
    /// Creates a new scheduler; nothing runs until [`start`](Self::start)
    pub fn new(reaper: Arc<IdleReaper>, interval: Duration) -> Self {
        Self {
            reaper,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Returns true while the loop task is running
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Starts the loop; the first sweep happens one interval from now
    pub fn start(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Config("Reaper interval must be positive".to_string()));
        }

        let mut running = self.running.lock();
        if running.is_some() {
            debug!("Reaper scheduler already running");
            return Ok(());
        }

        info!("Starting reaper scheduler, interval {}", format_duration(self.interval));

        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let reaper = self.reaper.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick: u64 = 0;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tick += 1;
                        let span = info_span!("reaper_tick", tick);
                        async {
                            if let Err(e) = reaper.reap().await {
                                error!("Reaper sweep failed: {}", e);
                            }
                        }
                        .instrument(span)
                        .await;
                    }
                }
            }

            debug!("Reaper loop exited after {} ticks", tick);
        });

        *running = Some(Running {
            cancellation_token,
            handle,
        });

        Ok(())
    }

    /// Stops the loop, letting an in-flight sweep finish first
    pub async fn stop(&self) -> Result<()> {
        let running = self.running.lock().take();

        if let Some(Running {
            cancellation_token,
            handle,
        }) = running
        {
            info!("Stopping reaper scheduler");
            cancellation_token.cancel();
            handle
                .await
                .map_err(|e| Error::Internal(format!("Reaper task failed: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::models::DeleteOutcome;
    use model_manager::Deprovision;
    use platform_adapter::InMemoryPlatform;
    use settings::ManagerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use common::models::TimeoutPolicy;
    use storage_adapter::{InMemoryPolicyStore, PolicyStore};

    struct NoopDeprovisioner;

    #[async_trait]
    impl Deprovision for NoopDeprovisioner {
        async fn deprovision(&self, _name: &str) -> Result<DeleteOutcome> {
            Ok(DeleteOutcome::NothingToDelete)
        }
    }

    /// Policy store counting scans, one per sweep
    struct CountingStore {
        inner: InMemoryPolicyStore,
        scans: AtomicUsize,
    }

    #[async_trait]
    impl PolicyStore for CountingStore {
        async fn put(&self, policy: TimeoutPolicy) -> Result<()> {
            self.inner.put(policy).await
        }

        async fn get(&self, name: &str) -> Result<Option<TimeoutPolicy>> {
            self.inner.get(name).await
        }

        async fn scan(&self) -> Result<Vec<TimeoutPolicy>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.inner.scan().await
        }

        async fn delete(&self, name: &str) -> Result<bool> {
            self.inner.delete(name).await
        }
    }

    fn scheduler(store: Arc<CountingStore>, interval: Duration) -> ReaperScheduler {
        let platform = Arc::new(InMemoryPlatform::new());
        let config = ManagerConfig::default();
        let reaper = IdleReaper::new(
            platform.clone(),
            platform,
            store,
            Arc::new(NoopDeprovisioner),
            config.naming,
            config.reaper,
        );
        ReaperScheduler::new(Arc::new(reaper), interval)
    }

    fn counting_store() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: InMemoryPolicyStore::new(),
            scans: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_scheduler_ticks_until_stopped() {
        let store = counting_store();
        let scheduler = scheduler(store.clone(), Duration::from_millis(20));

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        let ticks = store.scans.load(Ordering::SeqCst);
        assert!(ticks >= 2, "only {} ticks", ticks);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.scans.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test]
    async fn test_first_tick_waits_one_interval() {
        let store = counting_store();
        let scheduler = scheduler(store.clone(), Duration::from_secs(3600));

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(store.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let scheduler = scheduler(counting_store(), Duration::ZERO);
        assert!(scheduler.start().is_err());
        assert!(!scheduler.is_running());
    }
}
