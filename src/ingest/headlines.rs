// src/ingest/headlines.rs
use std::collections::HashSet;

use metrics::counter;

use crate::ingest::normalize_text;
use crate::ingest::types::{Fetched, HeadlineProvider, RawArticle};
use crate::model::Headline;

/// Clean a page of raw articles, preserving upstream order:
/// drop items without link or title, dedup by link, cap at `max`.
/// Returns (kept, dropped_count).
pub fn clean_articles(raw: Vec<RawArticle>, max: usize) -> (Vec<Headline>, usize) {
    let total = raw.len();
    let mut seen_links: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(max.min(total));

    for a in raw {
        if out.len() >= max {
            break;
        }
        let link = a.url.as_deref().map(str::trim).unwrap_or_default();
        let title = a.title.as_deref().map(normalize_text).unwrap_or_default();
        if link.is_empty() || title.is_empty() {
            continue;
        }
        if !seen_links.insert(link.to_string()) {
            continue;
        }
        out.push(Headline {
            title,
            summary: a.description.as_deref().map(normalize_text).unwrap_or_default(),
            link: link.to_string(),
            published: a.published_at.unwrap_or_default(),
            source: a
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
        });
    }

    let dropped = total - out.len();
    (out, dropped)
}

/// Fetch one page of headlines and clean it. Provider errors are systemic.
pub async fn fetch_headlines(
    provider: &dyn HeadlineProvider,
    page_size: usize,
    max: usize,
) -> Fetched<Headline> {
    super::ensure_metrics_described();

    let raw = match provider.top_headlines(page_size).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, provider = provider.name(), "headline fetch failed");
            return Fetched::failed(e);
        }
    };

    let fetched = raw.len();
    let (kept, dropped) = clean_articles(raw, max);
    counter!("ingest_items_total", "feed" => "news").increment(kept.len() as u64);
    counter!("ingest_dropped_total", "feed" => "news").increment(dropped as u64);
    tracing::info!(target: "ingest", fetched, kept = kept.len(), dropped, "headlines fetched");

    Fetched::ok(kept)
}
