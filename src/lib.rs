// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::snapshot::FeedCache;

use crate::ingest::scheduler::RefreshRuntime;
use crate::metrics::Metrics;
use crate::pipeline::Feeds;

/// A running service: shared state plus the metrics exporter, if installed.
pub struct App {
    pub state: AppState,
    pub metrics: Option<Metrics>,
}

impl App {
    /// Build providers, classifier and store from `cfg`, then spawn one
    /// refresh loop per feed (and the periodic persist loop when configured).
    /// Must be called inside a tokio runtime.
    pub fn start(cfg: AppConfig) -> anyhow::Result<Self> {
        let classifier = analyze::build_classifier(&cfg.classifier);
        let feeds = Feeds::from_config(&cfg, classifier).context("building feed providers")?;
        let store = store::build_store(&cfg.store).context("building document store")?;

        let metrics = match Metrics::init(&cfg) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %e, "prometheus recorder unavailable, /metrics disabled");
                None
            }
        };

        let cache = FeedCache::new();
        let runtime = Arc::new(RefreshRuntime::new());
        runtime.spawn_feed(Arc::new(feeds.quotes), cache.quotes.clone(), cfg.quotes.interval());
        runtime.spawn_feed(Arc::new(feeds.risk), cache.risk.clone(), cfg.news.interval());
        runtime.spawn_feed(Arc::new(feeds.venues), cache.venues.clone(), cfg.venues.interval());

        if let Some(secs) = cfg.store.persist_interval_secs.filter(|s| *s > 0) {
            runtime.track(tokio::spawn(store::persist_loop(
                cache.clone(),
                store.clone(),
                cfg.store.collection.clone(),
                Duration::from_secs(secs),
                runtime.subscribe(),
            )));
        }

        tracing::info!(
            tickers = cfg.quotes.tickers.len(),
            classifier = cfg.classifier.provider.as_str(),
            store = store.name(),
            "monitor started"
        );

        Ok(Self {
            state: AppState {
                cache,
                store,
                collection: cfg.store.collection,
                runtime,
            },
            metrics,
        })
    }

    pub fn router(&self) -> Router {
        let api = api::router(self.state.clone());
        match &self.metrics {
            Some(m) => api.merge(m.router()),
            None => api,
        }
    }

    /// Stop every background loop after in-flight cycles finish.
    pub async fn shutdown(&self) {
        self.state.runtime.shutdown().await;
    }
}

/// Build the full router from the default config location.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    Ok(App::start(cfg)?.router())
}
