// src/analyze/quotes.rs
//! Quote scoring: percent change, status and market-wide statistics.

use chrono::{DateTime, Utc};

use super::scoring::{mean, round2};
use crate::model::{
    MarketSummary, MarketTrend, Quote, QuoteSnapshot, QuoteStatistics, QuoteStatus, RawQuote,
};

/// `(current - previous) / previous * 100`, rounded to 2 decimals.
/// `None` when either price is missing, not finite, or previous is zero.
pub fn percent_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let (cur, prev) = (current?, previous?);
    if !cur.is_finite() || !prev.is_finite() || prev == 0.0 {
        return None;
    }
    Some(round2((cur - prev) / prev * 100.0))
}

pub fn quote_status(change_percent: Option<f64>) -> QuoteStatus {
    match change_percent {
        Some(p) if p > 0.0 => QuoteStatus::Increasing,
        Some(p) if p < 0.0 => QuoteStatus::Decreasing,
        Some(_) => QuoteStatus::Stable,
        None => QuoteStatus::Unknown,
    }
}

/// Score one ticker; a failed fetch becomes an `error` record.
pub fn score_quote(raw: &RawQuote) -> Quote {
    if raw.error.is_some() {
        return error_quote(&raw.ticker);
    }
    let change_percent = percent_change(raw.current, raw.previous);
    Quote {
        ticker: raw.ticker.clone(),
        current_price: raw.current,
        previous_close: raw.previous,
        change_percent,
        status: quote_status(change_percent),
    }
}

/// Degraded record for a ticker whose fetch failed.
pub fn error_quote(ticker: &str) -> Quote {
    Quote {
        ticker: ticker.to_string(),
        current_price: None,
        previous_close: None,
        change_percent: None,
        status: QuoteStatus::Error,
    }
}

pub fn summarize(quotes: &[Quote]) -> (QuoteStatistics, MarketSummary) {
    let valid: Vec<f64> = quotes.iter().filter_map(|q| q.change_percent).collect();
    let avg = mean(&valid);
    let max = valid.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let min = valid.iter().copied().reduce(f64::min).unwrap_or(0.0);

    let stats = QuoteStatistics {
        average_change_percent: round2(avg),
        max_change_percent: round2(max),
        min_change_percent: round2(min),
        stocks_analyzed: quotes.len(),
        valid_data_points: valid.len(),
    };
    let summary = MarketSummary {
        overall_trend: if avg > 0.0 {
            MarketTrend::Bullish
        } else {
            MarketTrend::Bearish
        },
        volatility: round2((max - min).abs()),
    };
    (stats, summary)
}

pub fn build_snapshot(stocks: Vec<Quote>, now: DateTime<Utc>) -> QuoteSnapshot {
    let (statistics, market_summary) = summarize(&stocks);
    QuoteSnapshot {
        timestamp: now,
        stocks,
        statistics,
        market_summary,
    }
}
