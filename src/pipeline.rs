// src/pipeline.rs
//! One `FeedSource` per feed: fetch from its upstream, score, and hand a
//! complete snapshot back to the scheduler. Nothing here touches the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::analyze::venues::AreaLabel;
use crate::analyze::{self, DynClassifier, ScoringClock};
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::ingest::headline_cache::CachedHeadlineProvider;
use crate::ingest::providers::{NewsApiProvider, PopularTimesProvider, YahooChartProvider};
use crate::ingest::{headlines, quotes, venues};
use crate::ingest::{HeadlineProvider, PlacesProvider, QuoteProvider, SearchArea};
use crate::model::{Feed, QuoteSnapshot, RiskSnapshot, VenueSnapshot};

#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;

    fn feed(&self) -> Feed;

    /// Run fetch and scoring once. `Err` means the tick is aborted and the
    /// previous snapshot stays live.
    async fn refresh(&self) -> Result<Self::Snapshot, FetchError>;
}

/* ----------------------------
Quotes
---------------------------- */

pub struct QuoteFeed {
    provider: Arc<dyn QuoteProvider>,
    tickers: Vec<String>,
}

impl QuoteFeed {
    pub fn new(provider: Arc<dyn QuoteProvider>, tickers: Vec<String>) -> Self {
        Self { provider, tickers }
    }
}

#[async_trait]
impl FeedSource for QuoteFeed {
    type Snapshot = QuoteSnapshot;

    fn feed(&self) -> Feed {
        Feed::Quotes
    }

    async fn refresh(&self) -> Result<QuoteSnapshot, FetchError> {
        let raw = quotes::fetch_quotes(self.provider.as_ref(), &self.tickers)
            .await
            .into_result()?;
        let stocks = raw.iter().map(analyze::quotes::score_quote).collect();
        Ok(analyze::quotes::build_snapshot(stocks, Utc::now()))
    }
}

/* ----------------------------
Risk
---------------------------- */

pub struct RiskFeed {
    provider: Arc<dyn HeadlineProvider>,
    classifier: DynClassifier,
    page_size: usize,
    max_articles: usize,
}

impl RiskFeed {
    pub fn new(
        provider: Arc<dyn HeadlineProvider>,
        classifier: DynClassifier,
        page_size: usize,
        max_articles: usize,
    ) -> Self {
        Self {
            provider,
            classifier,
            page_size,
            max_articles,
        }
    }
}

#[async_trait]
impl FeedSource for RiskFeed {
    type Snapshot = RiskSnapshot;

    fn feed(&self) -> Feed {
        Feed::Risk
    }

    async fn refresh(&self) -> Result<RiskSnapshot, FetchError> {
        let cleaned = headlines::fetch_headlines(self.provider.as_ref(), self.page_size, self.max_articles)
            .await
            .into_result()?;
        let items = analyze::risk::assess_headlines(self.classifier.as_ref(), cleaned).await;
        Ok(analyze::risk::build_snapshot(items, Utc::now()))
    }
}

/* ----------------------------
Venues
---------------------------- */

pub struct VenueFeed {
    provider: Arc<dyn PlacesProvider>,
    area: SearchArea,
    label: AreaLabel,
    place_types: Vec<String>,
    keyword: String,
    max_places: Option<usize>,
    clock: fn() -> ScoringClock,
}

impl VenueFeed {
    pub fn new(
        provider: Arc<dyn PlacesProvider>,
        area: SearchArea,
        label: AreaLabel,
        place_types: Vec<String>,
        keyword: String,
        max_places: Option<usize>,
    ) -> Self {
        Self {
            provider,
            area,
            label,
            place_types,
            keyword,
            max_places,
            clock: ScoringClock::now_local,
        }
    }

    /// Override the weekday/hour source used for scoring.
    pub fn with_clock(mut self, clock: fn() -> ScoringClock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl FeedSource for VenueFeed {
    type Snapshot = VenueSnapshot;

    fn feed(&self) -> Feed {
        Feed::Venues
    }

    async fn refresh(&self) -> Result<VenueSnapshot, FetchError> {
        let places = venues::fetch_venues(self.provider.as_ref(), &self.area, &self.place_types, &self.keyword)
            .await
            .into_result()?;
        let clock = (self.clock)();
        Ok(analyze::venues::build_snapshot(
            &places,
            &clock,
            &self.label,
            self.max_places,
            Utc::now(),
        ))
    }
}

/* ----------------------------
Wiring
---------------------------- */

/// The three production feeds built from configuration.
pub struct Feeds {
    pub quotes: QuoteFeed,
    pub risk: RiskFeed,
    pub venues: VenueFeed,
}

impl Feeds {
    pub fn from_config(cfg: &AppConfig, classifier: DynClassifier) -> Result<Self, FetchError> {
        let quotes = QuoteFeed::new(
            Arc::new(YahooChartProvider::new(&cfg.quotes)?),
            cfg.quotes.tickers.clone(),
        );

        let news_api = NewsApiProvider::new(&cfg.news)?;
        let headlines: Arc<dyn HeadlineProvider> = match cfg.news.cache_path.as_deref() {
            Some(path) if cfg.news.cache_ttl_secs > 0 => Arc::new(CachedHeadlineProvider::new(
                news_api,
                path,
                Duration::from_secs(cfg.news.cache_ttl_secs),
            )),
            _ => Arc::new(news_api),
        };
        let risk = RiskFeed::new(headlines, classifier, cfg.news.page_size, cfg.news.max_articles);

        let v = &cfg.venues;
        let venues = VenueFeed::new(
            Arc::new(PopularTimesProvider::new(v)?),
            SearchArea::around(v.center_lat, v.center_lng, v.radius_miles, v.degrees_per_mile, v.search_radius_m),
            AreaLabel {
                location: v.location_label.clone(),
                radius_miles: v.radius_miles,
                search_type: v.search_label.clone(),
            },
            v.place_types.clone(),
            v.keyword.clone(),
            v.max_places,
        );

        Ok(Self { quotes, risk, venues })
    }
}
