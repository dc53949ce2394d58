// src/ingest/providers/yahoo.rs
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{http_client, send_json, trim_base};
use crate::config::QuotesConfig;
use crate::error::FetchError;
use crate::ingest::types::QuoteProvider;
use crate::model::RawQuote;

/// Quote provider backed by the Yahoo Finance chart endpoint.
pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl YahooChartProvider {
    pub fn new(cfg: &QuotesConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(&cfg.base_url).to_string(),
            timeout,
        })
    }
}

/// Pull current and previous close out of a chart response.
/// Missing price fields are fine; a missing `result` is malformed.
pub fn parse_chart(ticker: &str, body: &Value) -> Result<RawQuote, FetchError> {
    let chart = body
        .get("chart")
        .ok_or_else(|| FetchError::Malformed("missing chart".into()))?;

    if let Some(err) = chart.get("error").filter(|e| !e.is_null()) {
        let msg = err
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown chart error");
        return Err(FetchError::Upstream(msg.to_string()));
    }

    let meta = chart
        .get("result")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("meta"))
        .ok_or_else(|| FetchError::Malformed(format!("no chart result for {ticker}")))?;

    let price = |k: &str| meta.get(k).and_then(Value::as_f64).filter(|v| v.is_finite());
    let current = price("regularMarketPrice");
    let previous = price("previousClose").or_else(|| price("chartPreviousClose"));

    Ok(RawQuote::new(ticker, current, previous))
}

#[async_trait]
impl QuoteProvider for YahooChartProvider {
    async fn fetch_quote(&self, ticker: &str) -> Result<RawQuote, FetchError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let req = self
            .client
            .get(url)
            .query(&[("interval", "1d"), ("range", "5d")]);
        let body: Value = send_json(req, self.timeout, self.name()).await?;
        parse_chart(ticker, &body)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
