//! SweepLoop - ephemeral store の定期的な掃除
//!
//! # フロー
//! 1. 次の tick を待つ（取りこぼした tick はまとめて実行せずスキップ）
//! 2. `EphemeralStore::sweep()` で期限切れを削除し、サイズ上限を適用
//! 3. handle から停止シグナルが来るまで繰り返す
//!
//! 最初の tick は spawn から 1 interval 後。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::impls::EphemeralStore;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// SweepLoop は期限切れの画像とサイズ超過分を定期的に削除
pub struct SweepLoop {
    store: Arc<EphemeralStore>,
    every: Duration,
}

/// Owner of a running sweep task.
///
/// Dropping the handle without calling `shutdown` also stops the task at its
/// next wake-up, because the watch sender goes away.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SweepLoop {
    pub fn new(store: Arc<EphemeralStore>, every: Duration) -> Self {
        Self { store, every }
    }

    pub fn spawn(self) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SweepHandle { shutdown_tx, task }
    }

    /// Runs until shutdown; returns the number of completed passes.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.every, self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut passes = 0u64;

        info!(interval_ms = self.every.as_millis() as u64, "Image sweep started");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let report = self.store.sweep().await;
                    passes += 1;
                    if report.removed() > 0 {
                        info!(
                            expired = report.expired,
                            evicted = report.evicted,
                            remaining = report.remaining,
                            "Cleaned up image cache"
                        );
                    } else {
                        debug!(remaining = report.remaining, "Cleaning up image cache");
                    }
                }
            }
        }

        info!(passes, "Image sweep stopped");
        passes
    }
}

impl SweepHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn shutdown(self) -> u64 {
        // Err only means the task already exited.
        let _ = self.shutdown_tx.send(true);
        match self.task.await {
            Ok(passes) => passes,
            Err(err) => {
                warn!(error = %err, "Image sweep task ended abnormally");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::image_format::fixtures;
    use crate::impls::{EphemeralConfig, EphemeralStore};
    use crate::ports::{ArtifactStore, FixedClock};
    use chrono::{TimeDelta, TimeZone, Utc};

    fn store_with_clock() -> (Arc<EphemeralStore>, FixedClock) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store = EphemeralStore::new(EphemeralConfig {
            ttl: Duration::from_secs(60),
            max_bytes: None,
        })
        .with_clock(Arc::new(clock.clone()));
        (Arc::new(store), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn loop_sweeps_on_each_tick() {
        let (store, clock) = store_with_clock();
        store.put(fixtures::png(), None).await.unwrap();
        clock.advance(TimeDelta::seconds(61));

        let handle = SweepLoop::new(store.clone(), Duration::from_secs(10)).spawn();
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert!(store.is_empty().await);
        let passes = handle.shutdown().await;
        assert_eq!(passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_tick_runs_no_pass() {
        let (store, _clock) = store_with_clock();
        let handle = SweepLoop::new(store, Duration::from_secs(60)).spawn();
        assert_eq!(handle.shutdown().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_loop() {
        let (store, _clock) = store_with_clock();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(SweepLoop::new(store, Duration::from_secs(1)).run(rx));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        drop(tx);
        assert_eq!(task.await.unwrap(), 3);
    }
}
