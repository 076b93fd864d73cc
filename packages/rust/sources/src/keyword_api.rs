//! Keyword search API backend (NewsAPI `/v2/everything`).

use async_trait::async_trait;
use newsdigest_shared::{NewsApiConfig, NewsDigestError, RawArticle, Result, SourceKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::{NewsBackend, UNKNOWN_SOURCE, build_client, trim_origin};

/// Searches recent articles by keyword. Requires an API key.
#[derive(Debug, Clone)]
pub struct KeywordApiBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl KeywordApiBackend {
    pub fn new(config: &NewsApiConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(NewsDigestError::config(format!(
                "keyword API key is empty. Set the {} environment variable.",
                config.api_key_env
            )));
        }

        Ok(Self {
            client: build_client(SourceKind::KeywordApi, config.timeout_secs)?,
            base_url: trim_origin(&config.base_url).to_string(),
            api_key,
        })
    }
}

// Response wire types. Every field is optional on the wire.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    #[serde(default)]
    source: Option<ApiSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    #[serde(default)]
    name: Option<String>,
}

impl From<ApiArticle> for RawArticle {
    fn from(a: ApiArticle) -> Self {
        let summary = a
            .description
            .filter(|d| !d.is_empty())
            .or(a.content)
            .unwrap_or_default();

        RawArticle {
            title: a.title.unwrap_or_default(),
            url: a.url.unwrap_or_default(),
            published: a.published_at.unwrap_or_default(),
            source: a
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            summary,
        }
    }
}

#[async_trait]
impl NewsBackend for KeywordApiBackend {
    fn kind(&self) -> SourceKind {
        SourceKind::KeywordApi
    }

    #[instrument(skip(self), fields(backend = "keyword-api"))]
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawArticle>> {
        let url = format!("{}/v2/everything", self.base_url);
        let page_size = limit.to_string();
        debug!(%url, "querying keyword API");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("apiKey", self.api_key.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NewsDigestError::backend("keyword-api", e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsDigestError::backend(
                "keyword-api",
                format!("HTTP {status}"),
            ));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            NewsDigestError::backend("keyword-api", format!("invalid response body: {e}"))
        })?;

        let articles: Vec<RawArticle> = body
            .articles
            .into_iter()
            .take(limit)
            .map(RawArticle::from)
            .collect();

        info!(count = articles.len(), "keyword search complete");
        Ok(articles)
    }
}
