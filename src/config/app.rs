// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::ai::ClassifierConfig;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

/// Upper bounds the headline fetch must respect.
pub const MAX_PAGE_SIZE: usize = 100;
pub const MAX_ARTICLES: usize = 20;

pub const DEFENSE_TICKERS: [&str; 10] = [
    "LMT", "RTX", "BA", "GD", "NOC", "HII", "LHX", "BAESY", "LDOS", "AXON",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub quotes: QuotesConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    pub interval_secs: u64,
    pub tickers: Vec<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            tickers: DEFENSE_TICKERS.iter().map(|t| t.to_string()).collect(),
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub interval_secs: u64,
    pub base_url: String,
    pub page_size: usize,
    pub max_articles: usize,
    pub country: String,
    pub language: String,
    pub timeout_secs: u64,
    /// Headline cache file; `None` disables the cache.
    pub cache_path: Option<String>,
    /// 0 disables the cache as well.
    pub cache_ttl_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            base_url: "https://newsapi.org/v2".to_string(),
            page_size: MAX_PAGE_SIZE,
            max_articles: MAX_ARTICLES,
            country: "us".to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
            cache_path: Some("cache/headlines_cache.json".to_string()),
            cache_ttl_secs: 12 * 3600,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VenuesConfig {
    pub interval_secs: u64,
    /// Popular-times service base URL.
    pub base_url: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_miles: f64,
    /// Degrees of latitude/longitude per mile near the reference point.
    pub degrees_per_mile: f64,
    pub search_radius_m: u32,
    pub place_types: Vec<String>,
    pub keyword: String,
    pub location_label: String,
    pub search_label: String,
    pub max_places: Option<usize>,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1200,
            base_url: "http://127.0.0.1:8090".to_string(),
            center_lat: 38.8719,
            center_lng: -77.0563,
            radius_miles: 5.0,
            degrees_per_mile: 0.0145,
            search_radius_m: 8047,
            place_types: vec!["restaurant".to_string(), "meal_takeaway".to_string()],
            keyword: "pizza".to_string(),
            location_label: "Pentagon Area".to_string(),
            search_label: "Pizza Places".to_string(),
            max_places: None,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    File,
    Firebase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory for the `file` backend.
    pub path: String,
    pub collection: String,
    /// Realtime Database URL for the `firebase` backend (or `FIREBASE_DB_URL`).
    pub firebase_url: Option<String>,
    /// Compose and persist the report on this cadence; `None` disables.
    pub persist_interval_secs: Option<u64>,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub firebase_auth: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: "data".to_string(),
            collection: "analyses".to_string(),
            firebase_url: None,
            persist_interval_secs: None,
            timeout_secs: 10,
            firebase_auth: None,
        }
    }
}

impl AppConfig {
    /// Load from an explicit TOML path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::parse(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH (must exist)
    /// 2) config/monitor.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Credentials and cadence overrides from the environment.
    pub fn apply_env(&mut self) {
        self.news.api_key = env_secret("NEWSAPI_KEY");
        self.venues.api_key = env_secret("GOOGLE_MAPS_API_KEY");
        self.store.firebase_auth = env_secret("FIREBASE_AUTH");
        if let Some(url) = env_secret("FIREBASE_DB_URL") {
            self.store.firebase_url = Some(url);
        }
        self.classifier.apply_env();

        if let Some(v) = env_u64("QUOTES_INTERVAL_SECS") {
            self.quotes.interval_secs = v;
        }
        if let Some(v) = env_u64("NEWS_INTERVAL_SECS") {
            self.news.interval_secs = v;
        }
        if let Some(v) = env_u64("VENUES_INTERVAL_SECS") {
            self.venues.interval_secs = v;
        }
    }

    /// Clamp values into the ranges the fetchers rely on.
    pub fn sanitize(&mut self) {
        self.quotes.interval_secs = self.quotes.interval_secs.max(1);
        self.news.interval_secs = self.news.interval_secs.max(1);
        self.venues.interval_secs = self.venues.interval_secs.max(1);
        self.news.page_size = self.news.page_size.clamp(1, MAX_PAGE_SIZE);
        self.news.max_articles = self.news.max_articles.clamp(1, MAX_ARTICLES);

        let mut seen = std::collections::BTreeSet::new();
        self.quotes.tickers = std::mem::take(&mut self.quotes.tickers)
            .into_iter()
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
    }
}

impl QuotesConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl NewsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl VenuesConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn env_secret(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::parse(
            r#"
            [quotes]
            interval_secs = 30
            tickers = ["lmt", " NOC ", "LMT", ""]

            [news]
            page_size = 500

            [store]
            backend = "file"
            "#,
        )
        .unwrap();
        let mut cfg = cfg;
        cfg.sanitize();
        assert_eq!(cfg.quotes.interval_secs, 30);
        assert_eq!(cfg.quotes.tickers, vec!["LMT".to_string(), "NOC".to_string()]);
        assert_eq!(cfg.news.page_size, MAX_PAGE_SIZE);
        assert_eq!(cfg.news.max_articles, MAX_ARTICLES);
        assert_eq!(cfg.venues.search_radius_m, 8047);
        assert_eq!(cfg.store.backend, StoreBackend::File);
        assert_eq!(cfg.store.collection, "analyses");
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // No file in temp CWD -> defaults.
        let v = AppConfig::load_default().unwrap();
        assert_eq!(v.news.interval_secs, 3600);

        // Env path wins.
        let p = tmp.path().join("monitor.toml");
        fs::write(&p, "[venues]\ninterval_secs = 99\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let v2 = AppConfig::load_default().unwrap();
        assert_eq!(v2.venues.interval_secs, 99);

        // Missing env path is an error.
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
        assert!(AppConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn cadence_and_credentials_come_from_env() {
        env::set_var("QUOTES_INTERVAL_SECS", "5");
        env::set_var("NEWSAPI_KEY", " abc ");
        let mut cfg = AppConfig::default();
        cfg.apply_env();
        assert_eq!(cfg.quotes.interval_secs, 5);
        assert_eq!(cfg.news.api_key.as_deref(), Some("abc"));
        env::remove_var("QUOTES_INTERVAL_SECS");
        env::remove_var("NEWSAPI_KEY");
    }
}
