//! # Snapshot Cache
//! One slot per feed holding the latest published snapshot.
//!
//! `publish` swaps a freshly built `Arc<T>` in under a short write lock and
//! `read` clones the `Arc` under a read lock, so a reader sees either the whole
//! previous snapshot or the whole new one. Locks are never held across `.await`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::NotYetAvailable;
use crate::model::{Feed, QuoteSnapshot, RiskSnapshot, Timestamped, VenueSnapshot};

/// Refresh bookkeeping for one feed, written only by its scheduler.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedHealth {
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub total_runs: u64,
}

#[derive(Debug)]
pub struct SnapshotSlot<T> {
    feed: Feed,
    current: RwLock<Option<Arc<T>>>,
    health: Mutex<FeedHealth>,
}

impl<T> SnapshotSlot<T> {
    /// Create an empty slot (pre-first-refresh).
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            current: RwLock::new(None),
            health: Mutex::new(FeedHealth::default()),
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Atomically replace the live snapshot. Returns the published handle.
    ///
    /// The slot only ever holds whole values, so a poisoned lock still guards a
    /// consistent snapshot and is recovered instead of propagated.
    pub fn publish(&self, snapshot: T) -> Arc<T> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::clone(&next));
        next
    }

    /// Latest snapshot, or `NotYetAvailable` before the first publish.
    pub fn read(&self) -> Result<Arc<T>, NotYetAvailable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(Arc::clone)
            .ok_or(NotYetAvailable { feed: self.feed })
    }

    pub fn is_ready(&self) -> bool {
        self.read().is_ok()
    }

    pub fn health(&self) -> FeedHealth {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_attempt(&self, at: DateTime<Utc>) {
        let mut h = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        h.last_attempt = Some(at);
        h.total_runs = h.total_runs.saturating_add(1);
    }

    pub(crate) fn record_success(&self, at: DateTime<Utc>) {
        let mut h = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        h.last_success = Some(at);
        h.last_error = None;
        h.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&self, error: String) {
        let mut h = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        h.last_error = Some(error);
        h.consecutive_failures = h.consecutive_failures.saturating_add(1);
    }
}

impl<T: Timestamped> SnapshotSlot<T> {
    /// Computation time of the live snapshot, if any.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.read().ok().map(|s| s.timestamp())
    }
}

/// Snapshot of any feed, as served by the read interface.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FeedSnapshot {
    Quotes(Arc<QuoteSnapshot>),
    Risk(Arc<RiskSnapshot>),
    Venues(Arc<VenueSnapshot>),
}

/// Per-feed status row for `/health/feeds`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    pub feed: Feed,
    pub ready: bool,
    pub snapshot_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub health: FeedHealth,
}

/// Read interface: the three slots, shared by the schedulers (writers) and
/// the HTTP handlers (readers).
#[derive(Debug, Clone)]
pub struct FeedCache {
    pub quotes: Arc<SnapshotSlot<QuoteSnapshot>>,
    pub risk: Arc<SnapshotSlot<RiskSnapshot>>,
    pub venues: Arc<SnapshotSlot<VenueSnapshot>>,
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedCache {
    pub fn new() -> Self {
        Self {
            quotes: Arc::new(SnapshotSlot::new(Feed::Quotes)),
            risk: Arc::new(SnapshotSlot::new(Feed::Risk)),
            venues: Arc::new(SnapshotSlot::new(Feed::Venues)),
        }
    }

    pub fn get(&self, feed: Feed) -> Result<FeedSnapshot, NotYetAvailable> {
        match feed {
            Feed::Quotes => self.quotes.read().map(FeedSnapshot::Quotes),
            Feed::Risk => self.risk.read().map(FeedSnapshot::Risk),
            Feed::Venues => self.venues.read().map(FeedSnapshot::Venues),
        }
    }

    pub fn status(&self) -> Vec<FeedStatus> {
        vec![
            FeedStatus {
                feed: self.quotes.feed(),
                ready: self.quotes.is_ready(),
                snapshot_timestamp: self.quotes.timestamp(),
                health: self.quotes.health(),
            },
            FeedStatus {
                feed: self.risk.feed(),
                ready: self.risk.is_ready(),
                snapshot_timestamp: self.risk.timestamp(),
                health: self.risk.health(),
            },
            FeedStatus {
                feed: self.venues.feed(),
                ready: self.venues.is_ready(),
                snapshot_timestamp: self.venues.timestamp(),
                health: self.venues.health(),
            },
        ]
    }
}
