// src/ingest/mod.rs
//! Fetchers: pull raw data from each upstream, clean it and isolate per-item
//! failures. Scoring happens in `analyze`.

pub mod headline_cache;
pub mod headlines;
pub mod providers;
pub mod quotes;
pub mod scheduler;
pub mod types;
pub mod venues;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

pub use types::{Fetched, HeadlineProvider, PlacesProvider, QuoteProvider, SearchArea};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items accepted from upstream fetches.");
        describe_counter!(
            "ingest_item_errors_total",
            "Per-item upstream failures isolated into degraded records."
        );
        describe_counter!(
            "ingest_dropped_total",
            "Items dropped as invalid, duplicate or over the cap."
        );
        describe_counter!("refresh_runs_total", "Refresh cycles started per feed.");
        describe_counter!("refresh_failures_total", "Refresh cycles aborted per feed.");
        describe_histogram!("refresh_duration_ms", "Refresh cycle time in milliseconds.");
        describe_histogram!("ingest_fetch_ms", "Upstream request time in milliseconds.");
        describe_gauge!(
            "refresh_last_success_ts",
            "Unix ts of the last successful publish per feed."
        );
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize upstream text: decode entities, strip tags, ASCII quotes,
/// collapse whitespace, cap at 1500 chars.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();
    let stripped = RE_TAGS.replace_all(&decoded, "");
    let quoted = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let mut out = RE_WS.replace_all(&quoted, " ").trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  Senate&nbsp;&nbsp;passes <b>defense</b> bill\n  \u{201C}today\u{201D} ";
        assert_eq!(normalize_text(s), "Senate passes defense bill \"today\"");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "x".repeat(2000);
        assert_eq!(normalize_text(&long).len(), 1500);
    }
}
