// src/ingest/providers/mod.rs
//! HTTP providers for the three upstreams. Each takes a configurable base
//! URL so tests can point it at a local mock server.

pub mod newsapi;
pub mod popular_times;
pub mod yahoo;

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::FetchError;

pub use newsapi::NewsApiProvider;
pub use popular_times::PopularTimesProvider;
pub use yahoo::YahooChartProvider;

pub(crate) const USER_AGENT: &str = concat!("doomsday-monitor/", env!("CARGO_PKG_VERSION"));

/// Shared client builder: bounded timeout, fixed UA.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))
}

/// Send a request and decode a 2xx JSON body. Non-2xx maps to `Status`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    req: reqwest::RequestBuilder,
    timeout: Duration,
    provider: &'static str,
) -> Result<T, FetchError> {
    let t0 = Instant::now();
    let resp = req
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;
    histogram!("ingest_fetch_ms", "provider" => provider).record(t0.elapsed().as_secs_f64() * 1_000.0);

    serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Decode list elements one by one. Elements that do not fit `T` are skipped
/// and counted against `feed`; the rest of the batch survives.
pub(crate) fn decode_items<T: DeserializeOwned>(
    values: Vec<serde_json::Value>,
    feed: &'static str,
    provider: &'static str,
) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<T>(v) {
            Ok(item) => Some(item),
            Err(e) => {
                counter!("ingest_item_errors_total", "feed" => feed).increment(1);
                warn!(provider, error = %e, "skipping malformed item");
                None
            }
        })
        .collect()
}

pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}
