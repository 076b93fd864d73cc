//! Public RSS news search backend.

use async_trait::async_trait;
use newsdigest_shared::{FeedConfig, NewsDigestError, RawArticle, Result, SourceKind};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::text::html_to_text;
use crate::{NewsBackend, UNKNOWN_SOURCE, build_client, trim_origin};

/// Locale parameters appended to every search.
const LOCALE_PARAMS: [(&str, &str); 3] = [("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")];

/// Searches a Google-News-style `/rss/search` endpoint.
#[derive(Debug, Clone)]
pub struct FeedBackend {
    client: Client,
    base_url: String,
}

impl FeedBackend {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(SourceKind::Feed, config.timeout_secs)?,
            base_url: trim_origin(&config.base_url).to_string(),
        })
    }

    /// Full search URL for `query`, with the query percent-encoded.
    fn search_url(&self, query: &str) -> Result<Url> {
        let endpoint = format!("{}/rss/search", self.base_url);
        let mut params = vec![("q", query)];
        params.extend(LOCALE_PARAMS);
        Url::parse_with_params(&endpoint, &params)
            .map_err(|e| NewsDigestError::backend("feed", format!("invalid feed URL: {e}")))
    }
}

#[async_trait]
impl NewsBackend for FeedBackend {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    #[instrument(skip(self), fields(backend = "feed"))]
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawArticle>> {
        let url = self.search_url(query)?;
        debug!(%url, "querying news feed");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| NewsDigestError::backend("feed", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsDigestError::backend("feed", format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| NewsDigestError::backend("feed", format!("failed to read body: {e}")))?;

        let articles = parse_feed(&body, limit)?;
        info!(count = articles.len(), "feed search complete");
        Ok(articles)
    }
}

/// Parse an RSS/Atom document into at most `limit` articles, in feed order.
pub(crate) fn parse_feed(body: &[u8], limit: usize) -> Result<Vec<RawArticle>> {
    let feed = feed_rs::parser::parse(body)
        .map_err(|e| NewsDigestError::backend("feed", format!("failed to parse feed: {e}")))?;
    let items = rss_items(body);

    let articles = feed
        .entries
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, entry)| {
            let item = items.get(i);
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
                .unwrap_or_default();

            let published = match item {
                Some(item) => item.published.clone().unwrap_or_default(),
                None => entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.to_rfc2822())
                    .unwrap_or_default(),
            };

            RawArticle {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                url,
                published,
                source: item
                    .and_then(|item| item.source.clone())
                    .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
                summary: entry
                    .summary
                    .map(|t| html_to_text(&t.content))
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok(articles)
}

/// RSS item fields that the generic feed model drops.
#[derive(Debug, Default)]
struct RssItem {
    /// `<pubDate>` exactly as the feed wrote it.
    published: Option<String>,
    /// Text of the `<source>` element, i.e. the publisher name.
    source: Option<String>,
}

/// Per-item publisher and raw date, in document order.
///
/// Empty for Atom documents, which then use the parsed timestamp instead.
fn rss_items(body: &[u8]) -> Vec<RssItem> {
    let Ok(channel) = rss::Channel::read_from(body) else {
        return Vec::new();
    };
    channel
        .items()
        .iter()
        .map(|item| RssItem {
            published: non_empty(item.pub_date()),
            source: non_empty(item.source().and_then(|s| s.title())),
        })
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
