// src/ingest/providers/newsapi.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{decode_items, http_client, send_json, trim_base};
use crate::config::NewsConfig;
use crate::error::FetchError;
use crate::ingest::types::{HeadlineProvider, RawArticle};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopHeadlines {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<serde_json::Value>,
}

/// NewsAPI `top-headlines`. The key travels in the `X-Api-Key` header.
pub struct NewsApiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    country: String,
    language: String,
    timeout: Duration,
}

impl NewsApiProvider {
    pub fn new(cfg: &NewsConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(&cfg.base_url).to_string(),
            api_key: cfg.api_key.clone(),
            country: cfg.country.clone(),
            language: cfg.language.clone(),
            timeout,
        })
    }
}

pub(crate) fn into_articles(body: TopHeadlines) -> Result<Vec<RawArticle>, FetchError> {
    if body.status != "ok" {
        return Err(FetchError::Upstream(
            body.message.unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }
    Ok(decode_items(body.articles, "news", "newsapi"))
}

#[async_trait]
impl HeadlineProvider for NewsApiProvider {
    async fn top_headlines(&self, page_size: usize) -> Result<Vec<RawArticle>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingCredential("NEWSAPI_KEY"))?;

        let req = self
            .client
            .get(format!("{}/top-headlines", self.base_url))
            .header("X-Api-Key", key)
            .query(&[
                ("language", self.language.as_str()),
                ("country", self.country.as_str()),
            ])
            .query(&[("pageSize", page_size)]);

        let body: TopHeadlines = send_json(req, self.timeout, self.name()).await?;
        into_articles(body)
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
