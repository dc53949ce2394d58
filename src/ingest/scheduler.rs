// src/ingest/scheduler.rs
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::FetchError;
use crate::pipeline::FeedSource;
use crate::snapshot::SnapshotSlot;

/// Run one refresh cycle and publish on success.
///
/// The cycle runs in its own task so a panic inside fetch or scoring is
/// contained and reported as `FetchError::Aborted`. Returns whether a new
/// snapshot was published.
pub async fn run_cycle<S: FeedSource>(source: &Arc<S>, slot: &SnapshotSlot<S::Snapshot>) -> bool {
    super::ensure_metrics_described();
    let feed = source.feed().as_str();
    slot.record_attempt(Utc::now());
    counter!("refresh_runs_total", "feed" => feed).increment(1);
    tracing::debug!(target: "refresh", feed, "fetching");

    let t0 = Instant::now();
    let src = Arc::clone(source);
    let outcome = match tokio::spawn(async move { src.refresh().await }).await {
        Ok(res) => res,
        Err(join) if join.is_panic() => Err(FetchError::Aborted("refresh panicked".into())),
        Err(join) => Err(FetchError::Aborted(join.to_string())),
    };
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("refresh_duration_ms", "feed" => feed).record(ms);

    match outcome {
        Ok(snapshot) => {
            slot.publish(snapshot);
            let at = Utc::now();
            slot.record_success(at);
            gauge!("refresh_last_success_ts", "feed" => feed).set(at.timestamp() as f64);
            tracing::info!(target: "refresh", feed, ms, "snapshot published");
            true
        }
        Err(err) => {
            counter!("refresh_failures_total", "feed" => feed).increment(1);
            tracing::warn!(
                target: "refresh",
                feed,
                ms,
                error = %err,
                transient = err.is_transient(),
                "refresh failed, keeping previous snapshot"
            );
            slot.record_failure(err.to_string());
            false
        }
    }
}

/// Refresh loop for one feed. The first tick fires immediately; missed ticks
/// are delayed, never replayed. Stops once shutdown is signalled, after the
/// in-flight cycle completes.
pub async fn refresh_loop<S: FeedSource>(
    source: Arc<S>,
    slot: Arc<SnapshotSlot<S::Snapshot>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let feed = source.feed();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(target: "refresh", feed = feed.as_str(), period_secs = period.as_secs(), "refresh loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }
        run_cycle(&source, &slot).await;
    }

    tracing::info!(target: "refresh", feed = feed.as_str(), "refresh loop stopped");
}

/// Owns the shutdown signal and the handles of every background loop.
#[derive(Debug)]
pub struct RefreshRuntime {
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for RefreshRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshRuntime {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Spawn the refresh loop of one feed.
    pub fn spawn_feed<S: FeedSource>(&self, source: Arc<S>, slot: Arc<SnapshotSlot<S::Snapshot>>, period: Duration) {
        let rx = self.subscribe();
        self.track(tokio::spawn(refresh_loop(source, slot, period, rx)));
    }

    /// Register another background task to be awaited on shutdown.
    pub fn track(&self, handle: JoinHandle<()>) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Signal every loop and wait for in-flight cycles to finish.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for h in handles {
            if let Err(e) = h.await {
                tracing::warn!(target: "refresh", error = %e, "background task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feed;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FeedSource for Scripted {
        type Snapshot = usize;

        fn feed(&self) -> Feed {
            Feed::Quotes
        }

        async fn refresh(&self) -> Result<usize, FetchError> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(1),
                1 => Err(FetchError::Status(503)),
                2 => panic!("scoring blew up"),
                n => Ok(n),
            }
        }
    }

    #[tokio::test]
    async fn failures_and_panics_keep_previous_snapshot() {
        let src = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
        });
        let slot = SnapshotSlot::new(Feed::Quotes);

        assert!(run_cycle(&src, &slot).await);
        assert_eq!(*slot.read().unwrap(), 1);

        assert!(!run_cycle(&src, &slot).await);
        assert_eq!(*slot.read().unwrap(), 1);
        assert_eq!(slot.health().consecutive_failures, 1);

        assert!(!run_cycle(&src, &slot).await);
        assert_eq!(*slot.read().unwrap(), 1);
        let h = slot.health();
        assert_eq!(h.consecutive_failures, 2);
        assert!(h.last_error.unwrap().contains("panicked"));

        assert!(run_cycle(&src, &slot).await);
        assert_eq!(*slot.read().unwrap(), 3);
        assert_eq!(slot.health().consecutive_failures, 0);
        assert_eq!(slot.health().total_runs, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_and_stops_on_shutdown() {
        let src = Arc::new(Scripted {
            calls: AtomicUsize::new(3),
        });
        let slot = Arc::new(SnapshotSlot::new(Feed::Quotes));
        let rt = RefreshRuntime::new();
        rt.spawn_feed(src.clone(), slot.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        rt.shutdown().await;
        let runs = src.calls.load(Ordering::SeqCst) - 3;
        assert_eq!(runs, 3, "ticks at 0s, 10s, 20s");
        assert!(slot.is_ready());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(src.calls.load(Ordering::SeqCst) - 3, runs);
    }
}
