// src/store.rs
//! Document store for composed analysis reports.
//!
//! Each report is written twice: under its timestamp id and under `latest`.
//! Store failures are returned to the caller and never touch the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::report::AnalysisReport;
use crate::snapshot::FeedCache;

pub const LATEST_ID: &str = "latest";

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;
    fn name(&self) -> &'static str;
}

pub type DynStore = Arc<dyn SnapshotStore>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("store_writes_total", "Documents written to the store.");
        describe_counter!("store_errors_total", "Failed store operations.");
    });
}

/* ----------------------------
Memory
---------------------------- */

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), id.to_string()), doc.clone());
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/* ----------------------------
Local directory
---------------------------- */

/// One JSON file per document under `<root>/<collection>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root.join(safe_segment(collection)).join(format!("{}.json", safe_segment(id)))
    }
}

/// Keep path segments inside the store root.
fn safe_segment(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    // Unique temp name per write so concurrent puts to one id never share it.
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        write_atomic(&self.doc_path(collection, id), bytes).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        match tokio::fs::read(self.doc_path(collection, id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/* ----------------------------
Firebase Realtime Database (REST)
---------------------------- */

pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl FirebaseStore {
    pub fn new(base_url: &str, auth: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, firebase_key(collection), firebase_key(id))
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.as_deref() {
            Some(token) => req.query(&[("auth", token)]),
            None => req,
        }
    }
}

/// RTDB keys may not contain `. $ # [ ] /`.
pub fn firebase_key(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '.' | '$' | '#' | '[' | ']' | '/') { '_' } else { c })
        .collect()
}

#[async_trait]
impl SnapshotStore for FirebaseStore {
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        let resp = self
            .with_auth(self.client.put(self.url(collection, id)))
            .json(doc)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StoreError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let resp = self
            .with_auth(self.client.get(self.url(collection, id)))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StoreError::Status(resp.status().as_u16()));
        }
        // Missing paths come back as `null`.
        let v: Value = resp.json().await?;
        Ok(if v.is_null() { None } else { Some(v) })
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}

pub fn build_store(cfg: &StoreConfig) -> Result<DynStore, StoreError> {
    let store: DynStore = match cfg.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::new(&cfg.path)),
        StoreBackend::Firebase => {
            let url = cfg
                .firebase_url
                .as_deref()
                .ok_or(StoreError::NotConfigured("FIREBASE_DB_URL"))?;
            Arc::new(FirebaseStore::new(
                url,
                cfg.firebase_auth.clone(),
                Duration::from_secs(cfg.timeout_secs.max(1)),
            )?)
        }
    };
    Ok(store)
}

/* ----------------------------
Report persistence
---------------------------- */

/// Write the report under its timestamp id and as `latest`. Returns the id.
pub async fn persist_report(
    store: &dyn SnapshotStore,
    collection: &str,
    report: &AnalysisReport,
) -> Result<String, StoreError> {
    ensure_metrics_described();
    let id = report.document_id();
    let doc = serde_json::to_value(report)?;

    for key in [id.as_str(), LATEST_ID] {
        if let Err(e) = store.put(collection, key, &doc).await {
            counter!("store_errors_total", "backend" => store.name()).increment(1);
            tracing::warn!(target: "store", backend = store.name(), id = key, error = %e, "store write failed");
            return Err(e);
        }
        counter!("store_writes_total", "backend" => store.name()).increment(1);
    }

    tracing::info!(target: "store", backend = store.name(), id = %id, "report persisted");
    Ok(id)
}

pub async fn load_latest(store: &dyn SnapshotStore, collection: &str) -> Result<Option<Value>, StoreError> {
    store.get(collection, LATEST_ID).await.inspect_err(|e| {
        ensure_metrics_described();
        counter!("store_errors_total", "backend" => store.name()).increment(1);
        tracing::warn!(target: "store", backend = store.name(), error = %e, "store read failed");
    })
}

/// Compose and persist a report on a fixed cadence until shutdown.
/// Ticks where some feed is not ready yet are skipped.
pub async fn persist_loop(
    cache: FeedCache,
    store: DynStore,
    collection: String,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick is immediate; nothing is ready at startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        match AnalysisReport::from_cache(&cache, Utc::now()) {
            Ok(report) => {
                let _ = persist_report(store.as_ref(), &collection, &report).await;
            }
            Err(e) => tracing::debug!(target: "store", error = %e, "skipping periodic persist"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_cannot_escape_root() {
        assert_eq!(safe_segment("../etc"), "_etc");
        assert_eq!(safe_segment("2024-05-01T12-30-05.000Z"), "2024-05-01T12-30-05.000Z");
    }

    #[test]
    fn firebase_keys_drop_forbidden_chars() {
        assert_eq!(firebase_key("2024-05-01T12-30-05.000Z"), "2024-05-01T12-30-05_000Z");
    }

    #[tokio::test]
    async fn memory_store_round_trip_and_missing() {
        let s = MemoryStore::new();
        assert!(s.get("analyses", "latest").await.unwrap().is_none());
        s.put("analyses", "latest", &json!({"a": 1})).await.unwrap();
        assert_eq!(s.get("analyses", "latest").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn file_store_overwrites_latest() {
        let dir = tempfile::tempdir().unwrap();
        let s = FileStore::new(dir.path());
        s.put("analyses", "latest", &json!({"v": 1})).await.unwrap();
        s.put("analyses", "latest", &json!({"v": 2})).await.unwrap();
        assert_eq!(s.get("analyses", "latest").await.unwrap(), Some(json!({"v": 2})));
        assert!(dir.path().join("analyses").join("latest.json").exists());
        assert!(s.get("analyses", "nope").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn file_store_concurrent_puts_to_latest_stay_valid() {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(FileStore::new(dir.path()));

        for round in 0..20 {
            let mut writers = Vec::new();
            for w in 0..8usize {
                let s = s.clone();
                writers.push(tokio::spawn(async move {
                    let doc = json!({"round": round, "writer": w, "pad": "x".repeat(w * 4096)});
                    s.put("analyses", "latest", &doc).await
                }));
            }
            for h in writers {
                h.await.unwrap().expect("put succeeds under contention");
            }
            let got = s.get("analyses", "latest").await.expect("valid json").expect("present");
            assert_eq!(got["round"], round);
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("analyses"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn firebase_without_url_is_not_configured() {
        let cfg = StoreConfig {
            backend: StoreBackend::Firebase,
            firebase_url: None,
            ..Default::default()
        };
        assert!(matches!(build_store(&cfg), Err(StoreError::NotConfigured(_))));
    }
}
