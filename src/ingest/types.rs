// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::model::{RawPlace, RawQuote};

/// Result of one fetch: the items that could be produced plus an optional
/// systemic failure. A systemic failure aborts the tick for that feed.
#[derive(Debug)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub failure: Option<FetchError>,
}

impl<T> Fetched<T> {
    pub fn ok(items: Vec<T>) -> Self {
        Self {
            items,
            failure: None,
        }
    }

    pub fn failed(err: FetchError) -> Self {
        Self {
            items: Vec::new(),
            failure: Some(err),
        }
    }

    pub fn into_result(self) -> Result<Vec<T>, FetchError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

/// Headline in the NewsAPI `articles[]` shape; every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    #[serde(default)]
    pub source: Option<ArticleSource>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Rectangle plus radius handed to the places provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    pub center: (f64, f64),
    /// South-west corner (lat, lng).
    pub lower: (f64, f64),
    /// North-east corner (lat, lng).
    pub upper: (f64, f64),
    pub radius_m: u32,
}

impl SearchArea {
    /// Box whose half-width in each axis is `radius_miles * degrees_per_mile`.
    pub fn around(lat: f64, lng: f64, radius_miles: f64, degrees_per_mile: f64, radius_m: u32) -> Self {
        let offset = degrees_per_mile * radius_miles;
        Self {
            center: (lat, lng),
            lower: (lat - offset, lng - offset),
            upper: (lat + offset, lng + offset),
            radius_m,
        }
    }
}

#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, ticker: &str) -> Result<RawQuote, FetchError>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait HeadlineProvider: Send + Sync {
    async fn top_headlines(&self, page_size: usize) -> Result<Vec<RawArticle>, FetchError>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn search(&self, place_type: &str, area: &SearchArea) -> Result<Vec<RawPlace>, FetchError>;
    fn name(&self) -> &'static str;
}
