//! End-to-end digest pipeline: validate → fetch (with fallback) → enrich →
//! aggregate → render.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument, warn};

use newsdigest_shared::{
    AppConfig, Digest, DigestStats, NewsDigestError, RawArticle, Result, RunId, SourceKind,
    read_api_key,
};
use newsdigest_sources::{FeedBackend, KeywordApiBackend, NewsBackend};

use crate::aggregate;
use crate::context::{RunContext, Stage, TraceKind};
use crate::enrichment::{self, ConcurrencyPolicy, EnrichmentProgress, Enricher};
use crate::llm::OpenAiChatModel;

/// Smallest article count a run may request.
pub const MIN_LIMIT: usize = 3;

/// Largest article count a run may request.
pub const MAX_LIMIT: usize = 10;

/// What one run should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRequest {
    pub topic: String,
    pub source: SourceKind,
    pub limit: usize,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct DigestOutput {
    pub run_id: RunId,
    pub digest: Digest,
    pub stats: DigestStats,
    /// Rendered markdown report.
    pub report: String,
    /// Every backend call made while fetching, in order.
    pub attempts: Vec<FetchAttempt>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each article's enrichment result is collected.
    fn article_enriched(&self, title: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, output: &DigestOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn article_enriched(&self, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _output: &DigestOutput) {}
}

/// Adapts a `ProgressReporter` to the `EnrichmentProgress` interface.
struct PipelineEnrichmentProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl EnrichmentProgress for PipelineEnrichmentProgress<'_> {
    fn phase(&self, name: &str) {
        self.inner.phase(name);
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.inner.article_enriched(detail, current, total);
    }
}

// ---------------------------------------------------------------------------
// Sources and fallback
// ---------------------------------------------------------------------------

/// The backends available to a run.
#[derive(Clone)]
pub struct Sources {
    pub feed: Arc<dyn NewsBackend>,
    /// `None` when no keyword API key is configured.
    pub keyword_api: Option<Arc<dyn NewsBackend>>,
}

impl Sources {
    pub fn new(feed: Arc<dyn NewsBackend>, keyword_api: Option<Arc<dyn NewsBackend>>) -> Self {
        Self { feed, keyword_api }
    }

    /// Build both backends; the keyword API only when its key env var is set.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let feed: Arc<dyn NewsBackend> = Arc::new(FeedBackend::new(&config.feed)?);
        let keyword_api = match read_api_key(&config.news_api.api_key_env) {
            Some(key) => {
                let backend: Arc<dyn NewsBackend> =
                    Arc::new(KeywordApiBackend::new(&config.news_api, key)?);
                Some(backend)
            }
            None => None,
        };
        Ok(Self { feed, keyword_api })
    }

    fn get(&self, kind: SourceKind) -> Option<&Arc<dyn NewsBackend>> {
        match kind {
            SourceKind::Feed => Some(&self.feed),
            SourceKind::KeywordApi => self.keyword_api.as_ref(),
        }
    }
}

/// One backend call made while fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchAttempt {
    pub backend: SourceKind,
    pub query: String,
    pub result_count: usize,
    /// Set when the call failed and was counted as zero results.
    pub error: Option<String>,
}

/// Articles from the first non-empty attempt, plus every attempt made.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub articles: Vec<RawArticle>,
    pub attempts: Vec<FetchAttempt>,
}

/// Reject a request before any network call.
pub fn validate_request(request: &DigestRequest, sources: &Sources) -> Result<()> {
    if request.topic.trim().is_empty() {
        return Err(NewsDigestError::config("topic must not be empty"));
    }
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&request.limit) {
        return Err(NewsDigestError::config(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {}",
            request.limit
        )));
    }
    if sources.get(request.source).is_none() {
        return Err(NewsDigestError::config(format!(
            "source '{}' selected but no API key is configured",
            request.source
        )));
    }
    Ok(())
}

/// `"a b c"` → `"a OR b OR c"`; `None` for single-token queries.
pub fn broaden_query(query: &str) -> Option<String> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    (tokens.len() > 1).then(|| tokens.join(" OR "))
}

/// Fetch articles, walking the fallback chain.
///
/// 1. An empty keyword-API result is retried on the feed.
/// 2. An empty feed result for a multi-word query is retried once with the
///    words joined by `OR`.
///
/// Recoverable backend failures count as empty results. Fatal ones (see
/// [`NewsDigestError::is_fatal`]) end the run, as does an empty final result
/// ([`NewsDigestError::NoResults`]).
#[instrument(skip_all, fields(run_id = %ctx.run_id(), topic = %request.topic, source = %request.source))]
pub async fn fetch_with_fallback(
    sources: &Sources,
    request: &DigestRequest,
    ctx: &RunContext,
) -> Result<FetchOutcome> {
    ctx.emit(
        Stage::Fetch,
        TraceKind::Started,
        format!("fetching up to {} articles from {}", request.limit, request.source),
    );

    let primary = sources.get(request.source).ok_or_else(|| {
        NewsDigestError::config(format!("source '{}' is not configured", request.source))
    })?;

    let mut attempts = Vec::new();
    let mut articles = attempt(primary.as_ref(), &request.topic, request.limit, ctx, &mut attempts).await?;

    if articles.is_empty() && request.source == SourceKind::KeywordApi {
        ctx.emit(
            Stage::Fetch,
            TraceKind::Fallback,
            "keyword API returned nothing; retrying with the feed",
        );
        articles = attempt(sources.feed.as_ref(), &request.topic, request.limit, ctx, &mut attempts).await?;
    }

    if articles.is_empty() {
        if let Some(broader) = broaden_query(&request.topic) {
            ctx.emit(
                Stage::Fetch,
                TraceKind::Fallback,
                format!("no exact-phrase results; retrying with '{broader}'"),
            );
            articles = attempt(sources.feed.as_ref(), &broader, request.limit, ctx, &mut attempts).await?;
        }
    }

    if articles.is_empty() {
        ctx.emit(
            Stage::Fetch,
            TraceKind::Failed,
            format!("no articles after {} attempts", attempts.len()),
        );
        return Err(NewsDigestError::NoResults {
            query: request.topic.clone(),
        });
    }

    ctx.emit(
        Stage::Fetch,
        TraceKind::Completed,
        format!("fetched {} articles", articles.len()),
    );
    Ok(FetchOutcome { articles, attempts })
}

async fn attempt(
    backend: &dyn NewsBackend,
    query: &str,
    limit: usize,
    ctx: &RunContext,
    attempts: &mut Vec<FetchAttempt>,
) -> Result<Vec<RawArticle>> {
    let kind = backend.kind();
    let (articles, error) = match backend.fetch(query, limit).await {
        Ok(mut articles) => {
            articles.truncate(limit);
            (articles, None)
        }
        Err(e) if e.is_fatal() => {
            ctx.emit(Stage::Fetch, TraceKind::Failed, format!("{kind} '{query}' failed: {e}"));
            return Err(e);
        }
        Err(e) => {
            warn!(backend = %kind, error = %e, "fetch failed, treating as no results");
            (Vec::new(), Some(e.to_string()))
        }
    };

    ctx.emit(
        Stage::Fetch,
        TraceKind::Attempt,
        match &error {
            Some(e) => format!("{kind} '{query}' failed: {e}"),
            None => format!("{kind} '{query}' returned {}", articles.len()),
        },
    );
    attempts.push(FetchAttempt {
        backend: kind,
        query: query.to_string(),
        result_count: articles.len(),
        error,
    });
    Ok(articles)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A configured digest pipeline. Reusable across runs.
#[derive(Clone)]
pub struct Pipeline {
    sources: Sources,
    enricher: Enricher,
    policy: ConcurrencyPolicy,
}

impl Pipeline {
    pub fn new(sources: Sources, enricher: Enricher, policy: ConcurrencyPolicy) -> Self {
        Self {
            sources,
            enricher,
            policy,
        }
    }

    /// Wire the real backends and model from config.
    pub fn from_config(config: &AppConfig, llm_key: &str) -> Result<Self> {
        let model = OpenAiChatModel::new(&config.llm, llm_key)?;
        Ok(Self::new(
            Sources::from_config(config)?,
            Enricher::new(Arc::new(model)),
            ConcurrencyPolicy::from(&config.enrichment),
        ))
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Run the full pipeline.
    ///
    /// Fails only on invalid requests ([`NewsDigestError::Config`]) and when
    /// every fetch attempt is empty ([`NewsDigestError::NoResults`]).
    #[instrument(skip_all, fields(run_id = %ctx.run_id(), topic = %request.topic, source = %request.source, limit = request.limit))]
    pub async fn run(
        &self,
        request: &DigestRequest,
        ctx: &RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<DigestOutput> {
        let start = Instant::now();
        validate_request(request, &self.sources)?;

        info!(run_id = %ctx.run_id(), "starting digest pipeline");

        // --- Phase 1: Fetch ---
        progress.phase("Fetching news articles");
        let fetched = fetch_with_fallback(&self.sources, request, ctx).await?;

        // --- Phase 2: Enrich ---
        let enrich_progress = PipelineEnrichmentProgress { inner: progress };
        let articles = enrichment::enrich_all(
            &self.enricher,
            fetched.articles,
            &self.policy,
            ctx,
            &enrich_progress,
        )
        .await;

        // --- Phase 3: Aggregate & render ---
        progress.phase("Generating digest");
        ctx.emit(Stage::Aggregate, TraceKind::Started, "aggregating digest");
        let digest = aggregate::aggregate(&request.topic, articles)?;
        let stats = aggregate::digest_stats(&digest);
        let report = newsdigest_artifacts::render_report(&digest, &stats);
        ctx.emit(
            Stage::Aggregate,
            TraceKind::Completed,
            format!("digest of {} articles, tone {}", digest.total_articles, stats.tone),
        );

        let output = DigestOutput {
            run_id: ctx.run_id().clone(),
            digest,
            stats,
            report,
            attempts: fetched.attempts,
            elapsed: start.elapsed(),
        };

        progress.done(&output);

        info!(
            articles = output.digest.total_articles,
            attempts = output.attempts.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "digest pipeline complete"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemorySink;
    use crate::testing::{ScriptedBackend, ScriptedModel, articles, is_sentiment_request};
    use newsdigest_shared::{FeedConfig, LlmConfig, Sentiment};

    const SUMMARY_JSON: &str = r#"{"core_insight":"Growth continues.","named_entities":["IEA"],"key_details":"Record year.","summary":"Capacity grew again."}"#;

    fn request(topic: &str, source: SourceKind, limit: usize) -> DigestRequest {
        DigestRequest {
            topic: topic.into(),
            source,
            limit,
        }
    }

    fn scripted_enricher() -> Enricher {
        Enricher::new(Arc::new(ScriptedModel::new(|req| {
            Ok(if is_sentiment_request(req) {
                "Positive".into()
            } else {
                SUMMARY_JSON.into()
            })
        })))
    }

    fn fast_policy() -> ConcurrencyPolicy {
        ConcurrencyPolicy {
            max_concurrent: 2,
            min_interval: Duration::ZERO,
        }
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let feed_only = Sources::new(Arc::new(ScriptedBackend::empty(SourceKind::Feed)), None);

        for limit in [2, 11] {
            let err = validate_request(&request("wind", SourceKind::Feed, limit), &feed_only).unwrap_err();
            assert!(matches!(err, NewsDigestError::Config { .. }));
        }
        let err = validate_request(&request("   ", SourceKind::Feed, 5), &feed_only).unwrap_err();
        assert!(err.to_string().contains("topic"));

        let err = validate_request(&request("wind", SourceKind::KeywordApi, 5), &feed_only).unwrap_err();
        assert!(matches!(err, NewsDigestError::Config { .. }));

        assert!(validate_request(&request("wind", SourceKind::Feed, 3), &feed_only).is_ok());
        assert!(validate_request(&request("wind", SourceKind::Feed, 10), &feed_only).is_ok());
    }

    #[tokio::test]
    async fn invalid_request_makes_no_calls() {
        let feed = Arc::new(ScriptedBackend::new(SourceKind::Feed, |q, n| Ok(articles(q, n))));
        let pipeline = Pipeline::new(
            Sources::new(feed.clone(), None),
            scripted_enricher(),
            fast_policy(),
        );

        let err = pipeline
            .run(&request("wind", SourceKind::Feed, 42), &RunContext::with_tracing(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, NewsDigestError::Config { .. }));
        assert!(feed.queries().is_empty());
    }

    #[test]
    fn broaden_joins_tokens() {
        assert_eq!(broaden_query("renewable energy").as_deref(), Some("renewable OR energy"));
        assert_eq!(broaden_query("  a  b c ").as_deref(), Some("a OR b OR c"));
        assert_eq!(broaden_query("xyzzy123nonexistent"), None);
    }

    #[tokio::test]
    async fn keyword_api_empty_retries_feed_before_no_results() {
        let keyword = Arc::new(ScriptedBackend::empty(SourceKind::KeywordApi));
        let feed = Arc::new(ScriptedBackend::empty(SourceKind::Feed));
        let sources = Sources::new(feed.clone(), Some(keyword.clone()));
        let sink = Arc::new(MemorySink::new());
        let ctx = RunContext::new(sink.clone());

        let err = fetch_with_fallback(&sources, &request("xyzzy123nonexistent", SourceKind::KeywordApi, 5), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, NewsDigestError::NoResults { .. }));
        assert_eq!(keyword.queries(), vec!["xyzzy123nonexistent"]);
        assert_eq!(feed.queries(), vec!["xyzzy123nonexistent"]);
        assert!(sink.events().iter().any(|e| e.kind == TraceKind::Fallback));
        assert_eq!(sink.events().last().map(|e| e.kind), Some(TraceKind::Failed));
    }

    #[tokio::test]
    async fn broadened_query_follows_keyword_fallback() {
        let keyword = Arc::new(ScriptedBackend::empty(SourceKind::KeywordApi));
        let feed = Arc::new(ScriptedBackend::new(SourceKind::Feed, |q, n| {
            Ok(if q.contains(" OR ") { articles(q, n) } else { Vec::new() })
        }));
        let sources = Sources::new(feed.clone(), Some(keyword));

        let outcome = fetch_with_fallback(
            &sources,
            &request("grid batteries", SourceKind::KeywordApi, 4),
            &RunContext::with_tracing(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.articles.len(), 4);
        assert_eq!(feed.queries(), vec!["grid batteries", "grid OR batteries"]);
        let backends: Vec<_> = outcome.attempts.iter().map(|a| a.backend).collect();
        assert_eq!(backends, [SourceKind::KeywordApi, SourceKind::Feed, SourceKind::Feed]);
    }

    #[tokio::test]
    async fn backend_error_counts_as_empty() {
        let keyword = Arc::new(ScriptedBackend::new(SourceKind::KeywordApi, |_, _| {
            Err(NewsDigestError::backend("keyword-api", "HTTP 401 Unauthorized"))
        }));
        let feed = Arc::new(ScriptedBackend::new(SourceKind::Feed, |q, n| Ok(articles(q, n))));
        let sources = Sources::new(feed, Some(keyword));

        let outcome = fetch_with_fallback(
            &sources,
            &request("hydrogen", SourceKind::KeywordApi, 3),
            &RunContext::with_tracing(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.articles.len(), 3);
        assert!(outcome.attempts[0].error.as_deref().unwrap().contains("401"));
        assert_eq!(outcome.attempts[1].result_count, 3);
    }

    #[tokio::test]
    async fn fatal_backend_error_skips_fallbacks() {
        let keyword = Arc::new(ScriptedBackend::new(SourceKind::KeywordApi, |_, _| {
            Err(NewsDigestError::config("keyword API key not found"))
        }));
        let feed = Arc::new(ScriptedBackend::new(SourceKind::Feed, |q, n| Ok(articles(q, n))));
        let sources = Sources::new(feed.clone(), Some(keyword));
        let ctx = RunContext::with_tracing();

        let err = fetch_with_fallback(&sources, &request("grid batteries", SourceKind::KeywordApi, 3), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, NewsDigestError::Config { .. }));
        assert!(feed.queries().is_empty());
    }

    #[tokio::test]
    async fn oversized_backend_result_is_trimmed() {
        let feed = Arc::new(ScriptedBackend::new(SourceKind::Feed, |q, _| Ok(articles(q, 20))));
        let sources = Sources::new(feed, None);

        let outcome = fetch_with_fallback(&sources, &request("wind", SourceKind::Feed, 5), &RunContext::with_tracing())
            .await
            .unwrap();
        assert_eq!(outcome.articles.len(), 5);
    }

    #[tokio::test]
    async fn end_to_end_with_scripted_collaborators() {
        let feed = Arc::new(ScriptedBackend::new(SourceKind::Feed, |q, n| Ok(articles(q, n))));
        let pipeline = Pipeline::new(Sources::new(feed, None), scripted_enricher(), fast_policy());

        let output = pipeline
            .run(
                &request("renewable energy", SourceKind::Feed, 3),
                &RunContext::with_tracing(),
                &SilentProgress,
            )
            .await
            .unwrap();

        let digest = &output.digest;
        assert_eq!(digest.total_articles, 3);
        assert_eq!(digest.articles.len(), 3);
        assert_eq!(digest.sentiment_summary.get(Sentiment::Positive), 3);
        assert_eq!(digest.sentiment_summary.total(), 3);
        for article in &digest.articles {
            assert!(output.report.contains(&article.title));
        }
        assert_eq!(output.stats.key_entities, vec!["IEA"]);

        let json = serde_json::to_value(digest).unwrap();
        for key in ["Positive", "Negative", "Neutral"] {
            assert!(json["sentiment_summary"].get(key).is_some());
        }
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>News</title><link>https://news.example.com/</link><description>d</description>
<item><title>Solar farms expand</title><link>https://news.example.com/1</link><description>Solar grows.</description></item>
<item><title>Wind auction record</title><link>https://news.example.com/2</link><description>Wind grows.</description></item>
<item><title>Battery prices fall</title><link>https://news.example.com/3</link><description>Batteries cheaper.</description></item>
</channel></rss>"#;

    #[tokio::test]
    async fn end_to_end_over_http() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/rss/search"))
            .and(wiremock::matchers::query_param("q", "renewable energy"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_raw(RSS, "application/rss+xml"),
            )
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/v1/chat/completions"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({"max_tokens": 10})))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Negative"}}]
            })))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/v1/chat/completions"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({"max_tokens": 500})))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": SUMMARY_JSON}}]
            })))
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.feed = FeedConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        };
        config.llm = LlmConfig {
            base_url: format!("{}/v1", server.uri()),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        config.news_api.api_key_env = "NEWSDIGEST_TEST_UNSET_KEY".into();
        config.enrichment.min_interval_ms = 0;

        let pipeline = Pipeline::from_config(&config, "sk-test").unwrap();
        assert!(pipeline.sources().keyword_api.is_none());

        let sink = Arc::new(MemorySink::new());
        let output = pipeline
            .run(
                &request("renewable energy", SourceKind::Feed, 3),
                &RunContext::new(sink.clone()),
                &SilentProgress,
            )
            .await
            .unwrap();

        let titles: Vec<_> = output.digest.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Solar farms expand", "Wind auction record", "Battery prices fall"]);
        assert_eq!(output.digest.sentiment_summary.negative, 3);
        assert_eq!(output.digest.articles[0].core_insight, "Growth continues.");
        assert!(output.report.contains("**Negative**"));
        assert_eq!(output.attempts.len(), 1);
        assert!(!sink.events().iter().any(|e| e.kind == TraceKind::Degraded));
    }
}
