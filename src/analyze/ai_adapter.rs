//! Severity classifier: provider abstraction + result cache + daily limit.
//!
//! The classifier maps a headline text to a severity in [0,1] plus a short
//! explanation. Any failure (transport, quota, unparsable reply) yields `None`;
//! callers decide how to degrade.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::scoring::clamp01;
use crate::config::ai::ClassifierConfig;
use crate::model::Assessment;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Trait object used by the risk feed.
pub trait Classifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Assessment>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;

/// Factory: build a classifier according to config.
///
/// * provider `mock` returns a deterministic mock wrapped with the cache.
/// * `enabled == false` returns a disabled client (every item degrades).
/// * otherwise the OpenAI provider wrapped with caching + daily limit.
pub fn build_classifier(cfg: &ClassifierConfig) -> DynClassifier {
    let cache_dir = cfg.cache_dir.as_ref().map(PathBuf::from);

    if cfg.provider == "mock" {
        let mock = MockProvider {
            fixed: Assessment {
                severity: 0.1,
                explanation: "Routine news with no global impact (mock)".to_string(),
            },
        };
        return Arc::new(CachingClient::new(mock, None, cfg.daily_limit));
    }

    if !cfg.enabled {
        return Arc::new(DisabledClient);
    }

    match cfg.provider.as_str() {
        "openai" => {
            let provider = OpenAiProvider::new(cfg);
            Arc::new(CachingClient::new(provider, cache_dir, cfg.daily_limit))
        }
        other => {
            tracing::warn!(provider = other, "unsupported classifier provider, disabling");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// Prompt + reply parsing
// ------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You are an AI specialized in assessing global risks and threats to human civilization. Be objective and analytical in your assessment.";

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"Analyze this news article and rate its severity in terms of potential threat to human civilization or global stability.

Article: {text}

Rate this on a scale from 0 to 1, where:
0 = Completely harmless, no impact on global stability
0.25 = Minor local concerns
0.5 = Regional issues that could escalate
0.75 = Serious global concerns
1.0 = Major threat to civilization

You may also rate it in between these values. For example, if the article is about a minor local issue that could escalate, you could rate it 0.35.

Provide your response in this exact JSON format:
{{
    "severity": 0.X,
    "explanation": "Brief explanation of why you gave this rating"
}}

Be extremely conservative with high ratings. A severity of 1.0 should only be used for truly apocalyptic scenarios."#
    )
}

static RE_JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json object regex"));

/// Parse `{"severity": .., "explanation": ..}` out of a model reply.
/// Tolerates code fences and chatter around the object. Severity is clamped.
pub fn parse_assessment(content: &str) -> Option<Assessment> {
    #[derive(Deserialize)]
    struct Reply {
        severity: f64,
        #[serde(default)]
        explanation: String,
    }

    let raw = RE_JSON_OBJECT.find(content)?.as_str();
    let reply: Reply = serde_json::from_str(raw).ok()?;
    if !reply.severity.is_finite() {
        return None;
    }
    Some(Assessment {
        severity: clamp01(reply.severity),
        explanation: sanitize_explanation(&reply.explanation),
    })
}

/// Single line, ASCII only, at most 280 chars. Collapses whitespace.
pub fn sanitize_explanation(input: &str) -> String {
    let mut out = String::with_capacity(280);
    let mut prev_space = false;
    for ch in input.chars() {
        let c = match ch {
            '\r' | '\n' | '\t' => ' ',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            c if c.is_ascii() => c,
            _ => ' ',
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.len() >= 280 {
            break;
        }
    }
    out.trim().to_string()
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does the real remote call.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Assessment>> + Send + 'a>>;
    fn name(&self) -> &'static str;
    /// Distinguishes cache entries of different models.
    fn cache_namespace(&self) -> &str {
        self.name()
    }
}

/// OpenAI Chat Completions provider. Requires `OPENAI_API_KEY`.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(cfg: &ClassifierConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("doomsday-monitor/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
        }
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Assessment>> + Send + 'a>> {
        Box::pin(async move {
            let Some(api_key) = self.api_key.as_deref() else {
                tracing::warn!(target: "classifier", "OPENAI_API_KEY not set, skipping classification");
                return None;
            };

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let prompt = build_prompt(text);
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: &prompt,
                    },
                ],
                temperature: 0.0,
                max_tokens: 150,
            };

            let resp = match self
                .http
                .post(&self.endpoint)
                .bearer_auth(api_key)
                .json(&req)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "classifier", error = %e, "classifier request failed");
                    return None;
                }
            };

            if !resp.status().is_success() {
                tracing::warn!(target: "classifier", status = %resp.status(), "classifier returned non-success");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or("");
            parse_assessment(content)
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn cache_namespace(&self) -> &str {
        &self.model
    }
}

/// Returns `None` always; used when classification is disabled.
pub struct DisabledClient;

impl Classifier for DisabledClient {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Assessment>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: Assessment,
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Assessment>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Some(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching client wrapper (memory + optional file cache, daily limit)
// ------------------------------------------------------------

pub struct CachingClient<P: Provider> {
    inner: P,
    cache_dir: Option<PathBuf>,
    daily_limit_max: u32,
    memory: Mutex<HashMap<String, Assessment>>,
    counter: Mutex<DailyCounter>,
}

impl<P: Provider> CachingClient<P> {
    pub fn new(inner: P, cache_dir: Option<PathBuf>, daily_limit_max: u32) -> Self {
        let counter = match cache_dir.as_deref() {
            Some(dir) => {
                let _ = fs::create_dir_all(dir); // best-effort
                load_daily_counter(dir).unwrap_or_default()
            }
            None => DailyCounter::default(),
        };
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            memory: Mutex::new(HashMap::new()),
            counter: Mutex::new(counter),
        }
    }

    /// Real upstream calls made today.
    pub fn calls_today(&self) -> u32 {
        self.counter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    async fn classify_impl(&self, text: &str) -> Option<Assessment> {
        let key = cache_key(self.inner.cache_namespace(), text);

        // 1) Cache lookup; hits never count against the limit.
        let cached = {
            let mem = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            mem.get(&key).cloned()
        };
        if let Some(hit) = cached {
            return Some(hit);
        }
        if let Some(dir) = self.cache_dir.as_deref() {
            if let Some(hit) = read_cache_file(dir, &key) {
                self.remember(&key, &hit);
                return Some(hit);
            }
        }

        // 2) Daily limit.
        {
            let mut g = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            if g.is_expired() {
                g.reset_to_today();
                self.persist_counter(&g);
            }
            if g.count >= self.daily_limit_max {
                tracing::warn!(
                    target: "classifier",
                    limit = self.daily_limit_max,
                    "classifier daily limit reached"
                );
                return None;
            }
        }

        // 3) Real call.
        let fresh = self.inner.fetch(text).await?;
        {
            let mut g = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            g.count = g.count.saturating_add(1);
            self.persist_counter(&g);
        }
        self.remember(&key, &fresh);
        if let Some(dir) = self.cache_dir.as_deref() {
            if let Err(e) = write_cache_file(dir, &key, &fresh) {
                tracing::debug!(target: "classifier", error = %e, "classifier cache write failed");
            }
        }
        Some(fresh)
    }

    fn remember(&self, key: &str, value: &Assessment) {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
    }

    fn persist_counter(&self, dc: &DailyCounter) {
        if let Some(dir) = self.cache_dir.as_deref() {
            let _ = save_daily_counter(dir, dc);
        }
    }
}

impl<P: Provider> Classifier for CachingClient<P> {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Assessment>> + Send + 'a>> {
        Box::pin(self.classify_impl(text))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn cache_key(namespace: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<Assessment> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &Assessment) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)?;
    Ok(())
}
