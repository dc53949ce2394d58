// src/ingest/headline_cache.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::ingest::types::{HeadlineProvider, RawArticle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// UTC date the entry was fetched on (YYYY-MM-DD).
    pub date: String,
    pub fetched_at: DateTime<Utc>,
    pub page_size: usize,
    pub articles: Vec<RawArticle>,
}

impl CacheEntry {
    /// Valid for the same UTC date and within `ttl`, and large enough for the request.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration, page_size: usize) -> bool {
        if self.date != now.format("%Y-%m-%d").to_string() || self.page_size < page_size {
            return false;
        }
        let age = now.signed_duration_since(self.fetched_at);
        age >= chrono::Duration::zero() && age.to_std().map(|a| a < ttl).unwrap_or(false)
    }
}

/// Wraps a headline provider with a small on-disk cache so repeated ticks
/// within the TTL do not spend upstream quota. A zero TTL disables it.
pub struct CachedHeadlineProvider<P> {
    inner: P,
    path: PathBuf,
    ttl: Duration,
}

impl<P: HeadlineProvider> CachedHeadlineProvider<P> {
    pub fn new(inner: P, path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            inner,
            path: path.into(),
            ttl,
        }
    }

    async fn load(&self) -> Option<CacheEntry> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::debug!(target: "ingest", path = %self.path.display(), error = %e, "ignoring unreadable headline cache");
                None
            }
        }
    }

    async fn save(&self, entry: &CacheEntry) {
        if let Err(e) = write_atomic(&self.path, entry).await {
            tracing::warn!(target: "ingest", path = %self.path.display(), error = %e, "headline cache write failed");
        }
    }
}

async fn write_atomic(path: &Path, entry: &CacheEntry) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
    tokio::fs::write(&tmp, serde_json::to_vec(entry)?).await?;
    tokio::fs::rename(tmp, path).await
}

#[async_trait]
impl<P: HeadlineProvider> HeadlineProvider for CachedHeadlineProvider<P> {
    async fn top_headlines(&self, page_size: usize) -> Result<Vec<RawArticle>, FetchError> {
        if self.ttl.is_zero() {
            return self.inner.top_headlines(page_size).await;
        }

        let now = Utc::now();
        if let Some(entry) = self.load().await.filter(|e| e.is_fresh(now, self.ttl, page_size)) {
            tracing::debug!(target: "ingest", articles = entry.articles.len(), "headline cache hit");
            return Ok(entry.articles);
        }

        let articles = self.inner.top_headlines(page_size).await?;
        self.save(&CacheEntry {
            date: now.format("%Y-%m-%d").to_string(),
            fetched_at: now,
            page_size,
            articles: articles.clone(),
        })
        .await;
        Ok(articles)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
