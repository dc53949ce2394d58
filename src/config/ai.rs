// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_daily_limit() -> u32 {
    500
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_cache_dir() -> Option<String> {
    Some("cache/classifier".to_string())
}

/// Settings of the severity classifier (`[classifier]` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Real upstream calls per UTC day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// On-disk result cache. An empty string keeps results in memory only.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Resolved from `OPENAI_API_KEY`, never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            daily_limit: default_daily_limit(),
            cache_dir: default_cache_dir(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl ClassifierConfig {
    /// Normalize provider, resolve credentials and test-mode overrides.
    pub fn apply_env(&mut self) {
        self.provider = self.provider.trim().to_lowercase();

        if env::var("AI_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
            self.provider = "mock".to_string();
        }
        if let Ok(v) = env::var("AI_ENABLED") {
            self.enabled = matches!(v.trim(), "1" | "true" | "yes");
        }

        self.api_key = env::var("OPENAI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        self.cache_dir = self
            .cache_dir
            .take()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        if self.daily_limit == 0 {
            self.daily_limit = default_daily_limit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn mock_mode_overrides_provider() {
        env::set_var("AI_TEST_MODE", "mock");
        let mut cfg = ClassifierConfig {
            provider: " OpenAI ".into(),
            ..ClassifierConfig::default()
        };
        cfg.apply_env();
        assert_eq!(cfg.provider, "mock");
        env::remove_var("AI_TEST_MODE");
    }

    #[test]
    fn cache_dir_defaults_match_with_or_without_table() {
        let from_table: ClassifierConfig = toml::from_str("model = \"gpt-4o-mini\"").unwrap();
        assert_eq!(from_table.cache_dir, ClassifierConfig::default().cache_dir);
        assert_eq!(from_table.cache_dir.as_deref(), Some("cache/classifier"));
    }

    #[serial_test::serial]
    #[test]
    fn empty_cache_dir_means_memory_only() {
        env::remove_var("AI_TEST_MODE");
        let mut cfg: ClassifierConfig = toml::from_str("cache_dir = \"\"").unwrap();
        cfg.apply_env();
        assert!(cfg.cache_dir.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn blank_api_key_is_treated_as_missing() {
        env::remove_var("AI_TEST_MODE");
        env::set_var("OPENAI_API_KEY", "   ");
        let mut cfg = ClassifierConfig::default();
        cfg.apply_env();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.provider, "openai");
        env::remove_var("OPENAI_API_KEY");
    }
}
