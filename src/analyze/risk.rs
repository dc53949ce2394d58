// src/analyze/risk.rs
//! Risk scoring: per-headline severity via the classifier, then the
//! doomsday probability, its interpretation band and the severity spread.

use chrono::{DateTime, Utc};

use super::ai_adapter::Classifier;
use super::scoring::{mean, round2};
use crate::model::{
    Assessment, Headline, RiskItem, RiskSnapshot, SeverityCounts, SeverityDistribution,
    SeverityPercentages,
};

pub const NO_ARTICLES: &str = "Unable to assess - no news articles found";
pub const ANALYSIS_ERROR: &str = "Error in analysis";

/// Interpretation bands, half-open and ascending: `[lower, next lower)`.
const BANDS: [(f64, &str); 5] = [
    (0.0, "Business as usual - no significant global threats detected"),
    (20.0, "Some concerning developments, but nothing civilization-threatening"),
    (40.0, "Multiple serious global challenges present"),
    (60.0, "High level of global instability - multiple severe threats active"),
    (80.0, "EXTREME ALERT: Multiple potential civilization-threatening events detected"),
];

pub fn interpret_probability(probability: f64) -> &'static str {
    BANDS
        .iter()
        .rev()
        .find(|(lower, _)| probability >= *lower)
        .map(|(_, text)| *text)
        .unwrap_or(BANDS[0].1)
}

/// Assessment used when the classifier fails; keeps the item in the aggregate.
pub fn fallback_assessment() -> Assessment {
    Assessment {
        severity: 0.0,
        explanation: ANALYSIS_ERROR.to_string(),
    }
}

/// Classify each headline in order. Items with no text are skipped, classifier
/// failures degrade to severity 0.
pub async fn assess_headlines(classifier: &dyn Classifier, headlines: Vec<Headline>) -> Vec<RiskItem> {
    let total = headlines.len();
    let mut out = Vec::with_capacity(total);
    for (i, h) in headlines.into_iter().enumerate() {
        let text = format!("{} {}", h.title, h.summary).trim().to_string();
        if text.is_empty() {
            continue;
        }
        let analysis = match classifier.classify(&text).await {
            Some(a) => a,
            None => {
                tracing::warn!(
                    target: "refresh",
                    item = i + 1,
                    total,
                    provider = classifier.provider_name(),
                    "classification failed, using fallback severity"
                );
                fallback_assessment()
            }
        };
        tracing::debug!(target: "refresh", item = i + 1, total, severity = analysis.severity, "headline scored");
        out.push(RiskItem {
            title: h.title,
            summary: h.summary,
            source: h.source,
            published: h.published,
            link: h.link,
            analysis,
        });
    }
    out
}

/// `round(mean(severity) * 100, 2)`, 0 for no items.
pub fn doomsday_probability(items: &[RiskItem]) -> f64 {
    let severities: Vec<f64> = items.iter().map(|i| i.analysis.severity).collect();
    round2(mean(&severities) * 100.0)
}

/// Counts per band (low <= 0.25 < medium <= 0.5 < high <= 0.75 < critical)
/// and their share in percent.
pub fn severity_distribution(items: &[RiskItem]) -> SeverityDistribution {
    let mut counts = SeverityCounts::default();
    for it in items {
        let s = it.analysis.severity;
        if s <= 0.25 {
            counts.low += 1;
        } else if s <= 0.5 {
            counts.medium += 1;
        } else if s <= 0.75 {
            counts.high += 1;
        } else {
            counts.critical += 1;
        }
    }
    let total = items.len();
    let pct = |n: usize| {
        if total == 0 {
            0.0
        } else {
            round2(n as f64 / total as f64 * 100.0)
        }
    };
    let percentages = SeverityPercentages {
        low: pct(counts.low),
        medium: pct(counts.medium),
        high: pct(counts.high),
        critical: pct(counts.critical),
    };
    SeverityDistribution {
        counts,
        percentages,
    }
}

pub fn build_snapshot(items: Vec<RiskItem>, now: DateTime<Utc>) -> RiskSnapshot {
    let doomsday_probability = doomsday_probability(&items);
    let interpretation = if items.is_empty() {
        NO_ARTICLES
    } else {
        interpret_probability(doomsday_probability)
    };
    RiskSnapshot {
        timestamp: now,
        doomsday_probability,
        analysis_basis: items.len(),
        interpretation: interpretation.to_string(),
        severity_distribution: severity_distribution(&items),
        detailed_results: items,
    }
}
