// src/report.rs
//! Composite analysis document combining the three live snapshots.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NotYetAvailable;
use crate::model::{
    MarketSummary, Quote, QuoteSnapshot, QuoteStatistics, RiskSnapshot, SeverityDistribution, StatusDistribution,
    VenueMetadata, VenueRecord, VenueSnapshot,
};
use crate::snapshot::FeedCache;

pub const UNUSUALLY_BUSY_THRESHOLD: f64 = 20.0;
pub const UNUSUALLY_QUIET_THRESHOLD: f64 = -20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub defense_stocks_analysis: StocksSection,
    pub news_analysis: NewsSection,
    pub local_pizza_analysis: PizzaSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub data_sources: Vec<String>,
    pub analysis_time: String,
    /// Computation time of each snapshot the report was composed from.
    pub snapshot_times: SnapshotTimes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTimes {
    pub stocks: DateTime<Utc>,
    pub news: DateTime<Utc>,
    pub pizza: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StocksSection {
    pub statistics: QuoteStatistics,
    pub market_summary: MarketSummary,
    pub detailed_stocks_data: Vec<Quote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoomsdayMetrics {
    pub probability: f64,
    pub analysis_basis: usize,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleVerdict {
    pub title: String,
    pub published: String,
    pub source: String,
    pub severity: f64,
    pub explanation: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedNews {
    pub articles_analyzed: usize,
    pub articles: Vec<ArticleVerdict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSection {
    pub doomsday_metrics: DoomsdayMetrics,
    pub detailed_news_analysis: DetailedNews,
    pub severity_distribution: SeverityDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PizzaSummary {
    pub total_places: usize,
    pub places_with_live_data: usize,
    pub location: String,
    pub radius_miles: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusynessMetrics {
    pub unusually_busy_threshold: f64,
    pub unusually_quiet_threshold: f64,
    pub places_by_status: StatusDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PizzaSection {
    pub metadata: VenueMetadata,
    pub summary: PizzaSummary,
    pub busyness_metrics: BusynessMetrics,
    pub detailed_places: Vec<VenueRecord>,
}

impl AnalysisReport {
    pub fn compose(quotes: &QuoteSnapshot, risk: &RiskSnapshot, venues: &VenueSnapshot, now: DateTime<Utc>) -> Self {
        let ts = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        Self {
            metadata: ReportMetadata {
                timestamp: ts.clone(),
                data_sources: vec![
                    "defense_stocks".to_string(),
                    "news_analysis".to_string(),
                    "local_pizza_analysis".to_string(),
                ],
                analysis_time: ts,
                snapshot_times: SnapshotTimes {
                    stocks: quotes.timestamp,
                    news: risk.timestamp,
                    pizza: venues.timestamp,
                },
            },
            defense_stocks_analysis: StocksSection {
                statistics: quotes.statistics.clone(),
                market_summary: quotes.market_summary.clone(),
                detailed_stocks_data: quotes.stocks.clone(),
            },
            news_analysis: NewsSection {
                doomsday_metrics: DoomsdayMetrics {
                    probability: risk.doomsday_probability,
                    analysis_basis: risk.analysis_basis,
                    interpretation: risk.interpretation.clone(),
                },
                detailed_news_analysis: DetailedNews {
                    articles_analyzed: risk.detailed_results.len(),
                    articles: risk
                        .detailed_results
                        .iter()
                        .map(|it| ArticleVerdict {
                            title: it.title.clone(),
                            published: it.published.clone(),
                            source: it.source.clone(),
                            severity: it.analysis.severity,
                            explanation: it.analysis.explanation.clone(),
                            link: it.link.clone(),
                        })
                        .collect(),
                },
                severity_distribution: risk.severity_distribution.clone(),
            },
            local_pizza_analysis: PizzaSection {
                summary: PizzaSummary {
                    total_places: venues.metadata.total_pizza_places_found,
                    places_with_live_data: venues.metadata.places_with_current_data,
                    location: venues.metadata.location.clone(),
                    radius_miles: venues.metadata.radius_miles,
                },
                metadata: venues.metadata.clone(),
                busyness_metrics: BusynessMetrics {
                    unusually_busy_threshold: UNUSUALLY_BUSY_THRESHOLD,
                    unusually_quiet_threshold: UNUSUALLY_QUIET_THRESHOLD,
                    places_by_status: venues.places_by_status.clone(),
                },
                detailed_places: venues.pizza_places.clone(),
            },
        }
    }

    /// Compose from whatever is live in the cache. Every feed must be ready.
    pub fn from_cache(cache: &FeedCache, now: DateTime<Utc>) -> Result<Self, NotYetAvailable> {
        let quotes = cache.quotes.read()?;
        let risk = cache.risk.read()?;
        let venues = cache.venues.read()?;
        Ok(Self::compose(&quotes, &risk, &venues, now))
    }

    /// Document id: the report timestamp with ':' replaced by '-'.
    pub fn document_id(&self) -> String {
        self.metadata.timestamp.replace(':', "-")
    }
}
