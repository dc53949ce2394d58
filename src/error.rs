// src/error.rs
//! Error taxonomy shared by fetchers, the snapshot cache and the document store.

use std::time::Duration;

use thiserror::Error;

use crate::model::Feed;

/// Errors raised while talking to an upstream provider.
///
/// A `FetchError` attached to a whole fetch means the tick is aborted for that
/// feed. Attached to a single item it only degrades that item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credential env var is unset or empty.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Connection, TLS or body read failure.
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The call exceeded its bounded timeout.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx HTTP status.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Upstream answered 2xx but reported an error in the payload.
    #[error("upstream reported error: {0}")]
    Upstream(String),

    /// Payload could not be decoded into the expected shape.
    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    /// Every independent call of a batch failed.
    #[error("all {attempted} upstream calls failed, last error: {last}")]
    AllFailed { attempted: usize, last: String },

    /// The refresh cycle panicked or was cancelled.
    #[error("refresh cycle aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Map a reqwest error, keeping timeouts distinguishable.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }

    /// Transient errors are retried by the next scheduled tick only.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Transport(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Failures of the external document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(String),

    #[error("store returned HTTP {0}")]
    Status(u16),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store payload error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store is not configured: {0}")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StoreError::Status(status.as_u16()),
            None => StoreError::Transport(err.to_string()),
        }
    }
}

/// Returned by reads before the first successful publish of a feed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{feed} data is not available yet, service warming up")]
pub struct NotYetAvailable {
    pub feed: Feed,
}
