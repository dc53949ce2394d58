// src/ingest/quotes.rs
use metrics::counter;

use crate::error::FetchError;
use crate::ingest::types::{Fetched, QuoteProvider};
use crate::model::RawQuote;

/// Fetch each ticker independently. A failing ticker degrades to a failed
/// record; only when every ticker failed is the fetch reported as systemic.
pub async fn fetch_quotes(provider: &dyn QuoteProvider, tickers: &[String]) -> Fetched<RawQuote> {
    super::ensure_metrics_described();

    let mut items = Vec::with_capacity(tickers.len());
    let mut failures = 0usize;
    let mut last_error: Option<FetchError> = None;

    for ticker in tickers {
        match provider.fetch_quote(ticker).await {
            Ok(q) => {
                if q.current.is_none() || q.previous.is_none() {
                    tracing::debug!(target: "ingest", ticker = %ticker, "price field missing");
                }
                items.push(q);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", ticker = %ticker, error = %e, provider = provider.name(), "quote fetch failed");
                counter!("ingest_item_errors_total", "feed" => "stocks").increment(1);
                failures += 1;
                items.push(RawQuote::failed(ticker.as_str(), e.to_string()));
                last_error = Some(e);
            }
        }
    }

    counter!("ingest_items_total", "feed" => "stocks").increment((items.len() - failures) as u64);

    if !tickers.is_empty() && failures == tickers.len() {
        let last = last_error.map(|e| e.to_string()).unwrap_or_default();
        return Fetched {
            items,
            failure: Some(FetchError::AllFailed {
                attempted: tickers.len(),
                last,
            }),
        };
    }
    Fetched::ok(items)
}
