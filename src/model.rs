// src/model.rs
//! Domain records and per-feed snapshots.
//!
//! Snapshots are built fresh on every refresh cycle and never mutated after
//! they are published; see `snapshot::SnapshotSlot`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three independently refreshed feeds. Serialized with the same label
/// `as_str` gives, so health rows, 503 bodies and metrics agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feed {
    #[serde(rename = "stocks")]
    Quotes,
    #[serde(rename = "news")]
    Risk,
    #[serde(rename = "pizza")]
    Venues,
}

impl Feed {
    /// Stable label used in logs, metrics and routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Quotes => "stocks",
            Feed::Risk => "news",
            Feed::Venues => "pizza",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ----------------------------
Quotes
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Increasing,
    Decreasing,
    Stable,
    Unknown,
    Error,
}

/// Raw prices for one ticker as delivered by the quote provider.
/// `error` is set when the ticker's own fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub ticker: String,
    pub current: Option<f64>,
    pub previous: Option<f64>,
    pub error: Option<String>,
}

impl RawQuote {
    pub fn new(ticker: impl Into<String>, current: Option<f64>, previous: Option<f64>) -> Self {
        Self {
            ticker: ticker.into(),
            current,
            previous,
            error: None,
        }
    }

    pub fn failed(ticker: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            current: None,
            previous: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub change_percent: Option<f64>,
    pub status: QuoteStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteStatistics {
    pub average_change_percent: f64,
    pub max_change_percent: f64,
    pub min_change_percent: f64,
    pub stocks_analyzed: usize,
    pub valid_data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub overall_trend: MarketTrend,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub timestamp: DateTime<Utc>,
    pub stocks: Vec<Quote>,
    pub statistics: QuoteStatistics,
    pub market_summary: MarketSummary,
}

/* ----------------------------
Risk items
---------------------------- */

/// Cleaned headline, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: String,
    pub source: String,
}

/// Classifier verdict for one headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub severity: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub published: String,
    pub link: String,
    pub analysis: Assessment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityPercentages {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityDistribution {
    pub counts: SeverityCounts,
    pub percentages: SeverityPercentages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub timestamp: DateTime<Utc>,
    pub doomsday_probability: f64,
    pub analysis_basis: usize,
    pub interpretation: String,
    pub detailed_results: Vec<RiskItem>,
    pub severity_distribution: SeverityDistribution,
}

/* ----------------------------
Venues
---------------------------- */

/// One day of a popular-times table as delivered upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularDay {
    pub name: String,
    #[serde(default)]
    pub data: Vec<u32>,
}

/// A venue in the upstream popular-times schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlace {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub coordinates: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_n: Option<u64>,
    #[serde(default)]
    pub current_popularity: Option<u32>,
    #[serde(default)]
    pub populartimes: Vec<PopularDay>,
    #[serde(default)]
    pub time_wait: Option<serde_json::Value>,
    #[serde(default)]
    pub time_spent: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusynessStatus {
    VeryBusy,
    Busy,
    Typical,
    Quiet,
    VeryQuiet,
}

impl BusynessStatus {
    pub const ALL: [BusynessStatus; 5] = [
        BusynessStatus::VeryBusy,
        BusynessStatus::Busy,
        BusynessStatus::Typical,
        BusynessStatus::Quiet,
        BusynessStatus::VeryQuiet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusynessStatus::VeryBusy => "very_busy",
            BusynessStatus::Busy => "busy",
            BusynessStatus::Typical => "typical",
            BusynessStatus::Quiet => "quiet",
            BusynessStatus::VeryQuiet => "very_quiet",
        }
    }
}

/// Whether the typical-popularity baseline existed for the current hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    Available,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStatus {
    pub current_popularity: u32,
    pub typical_popularity: u32,
    pub busyness_ratio: f64,
    pub percent_difference: f64,
    pub status: BusynessStatus,
    pub baseline: Baseline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub google_rating: Option<f64>,
    pub number_of_ratings: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyPeak {
    pub hourly_data: Vec<u32>,
    pub peak_hour: usize,
    pub peak_popularity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRecord {
    pub name: String,
    pub address: String,
    pub coordinates: serde_json::Map<String, serde_json::Value>,
    pub current_status: CurrentStatus,
    pub ratings: Ratings,
    pub place_types: Vec<String>,
    pub weekly_popularity: BTreeMap<String, WeeklyPeak>,
    pub wait_time_minutes: Option<serde_json::Value>,
    pub time_spent_minutes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueMetadata {
    pub location: String,
    pub radius_miles: f64,
    pub search_type: String,
    pub current_time: String,
    pub current_day: String,
    pub total_pizza_places_found: usize,
    pub places_with_current_data: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total_unusually_busy: usize,
    pub total_unusually_quiet: usize,
    pub total_typical: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDistribution {
    pub counts: BTreeMap<String, usize>,
    pub places: BTreeMap<String, Vec<String>>,
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueSnapshot {
    pub timestamp: DateTime<Utc>,
    pub metadata: VenueMetadata,
    pub pizza_places: Vec<VenueRecord>,
    pub places_by_status: StatusDistribution,
}

/// Common accessor used by the scheduler and health reporting.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for QuoteSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for RiskSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for VenueSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
