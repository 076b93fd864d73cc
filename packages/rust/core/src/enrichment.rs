//! Per-article LLM enrichment.
//!
//! Each article gets two independent model calls run side by side: a
//! structured summary and a one-word sentiment label. Model output is
//! untrusted; anything that does not validate is replaced by placeholder
//! values, so enrichment never fails a run.
//!
//! [`enrich_all`] fans articles out over a bounded executor (semaphore plus
//! start-interval pacer) and returns results in input order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use newsdigest_shared::{
    ArticleSummary, EnrichedArticle, EnrichmentConfig, NewsDigestError, RawArticle, Result,
    SUMMARY_UNAVAILABLE, Sentiment,
};

use crate::context::{RunContext, Stage, TraceKind};
use crate::llm::{ChatModel, ChatRequest};

/// Characters of the raw excerpt shown to the summarizer.
pub const SUMMARY_INPUT_CHARS: usize = 1000;

/// Characters of `title + " " + excerpt` shown to the classifier.
pub const SENTIMENT_INPUT_CHARS: usize = 500;

/// Characters of an unparseable summarizer reply kept as the summary.
pub const REPLY_PREVIEW_CHARS: usize = 200;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a professional news analyst. Provide concise, accurate summaries in valid JSON format.";
const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 500;

const SENTIMENT_SYSTEM_PROMPT: &str = "You are a sentiment analysis expert. Respond with only one word: Positive, Negative, or Neutral.";
const SENTIMENT_TEMPERATURE: f32 = 0.1;
const SENTIMENT_MAX_TOKENS: u32 = 10;

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Runs the summarizer and the sentiment classifier against one model.
#[derive(Clone)]
pub struct Enricher {
    model: Arc<dyn ChatModel>,
}

impl Enricher {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Enrich one article. Never fails; degraded parts are traced on `ctx`.
    pub async fn enrich(&self, article: RawArticle, ctx: &RunContext) -> EnrichedArticle {
        let (summary, sentiment) =
            tokio::join!(self.summarize(&article, ctx), self.classify(&article, ctx));
        EnrichedArticle::new(article, summary, sentiment)
    }

    async fn summarize(&self, article: &RawArticle, ctx: &RunContext) -> ArticleSummary {
        let request = ChatRequest {
            system: SUMMARY_SYSTEM_PROMPT.into(),
            user: summary_prompt(article),
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
        };
        ctx.emit(Stage::Enrich, TraceKind::Attempt, format!("summarize '{}'", article.title));

        match self.model.complete(request).await {
            Ok(reply) => parse_summary(&reply).unwrap_or_else(|e| {
                ctx.emit(
                    Stage::Enrich,
                    TraceKind::Degraded,
                    format!("summary for '{}' unusable: {e}", article.title),
                );
                ArticleSummary::unavailable(format!(
                    "{}...",
                    truncate_chars(&reply, REPLY_PREVIEW_CHARS)
                ))
            }),
            Err(e) => {
                ctx.emit(
                    Stage::Enrich,
                    TraceKind::Degraded,
                    format!("summarizer failed for '{}': {e}", article.title),
                );
                ArticleSummary::unavailable(SUMMARY_UNAVAILABLE)
            }
        }
    }

    async fn classify(&self, article: &RawArticle, ctx: &RunContext) -> Sentiment {
        let text = format!("{} {}", article.title, article.summary);
        let request = ChatRequest {
            system: SENTIMENT_SYSTEM_PROMPT.into(),
            user: sentiment_prompt(truncate_chars(&text, SENTIMENT_INPUT_CHARS)),
            temperature: SENTIMENT_TEMPERATURE,
            max_tokens: SENTIMENT_MAX_TOKENS,
        };
        ctx.emit(Stage::Enrich, TraceKind::Attempt, format!("classify '{}'", article.title));

        let outcome = match self.model.complete(request).await {
            Ok(reply) => parse_sentiment(&reply),
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            ctx.emit(
                Stage::Enrich,
                TraceKind::Degraded,
                format!("sentiment for '{}' defaulted to Neutral: {e}", article.title),
            );
            Sentiment::Neutral
        })
    }
}

fn summary_prompt(article: &RawArticle) -> String {
    format!(
        r#"Please analyze and summarize the following news article:

Title: {title}
Content: {content}

Provide a summary that includes:
1. Core insight or main claim (1-2 sentences)
2. Key named entities (companies, people, events, locations)
3. Important details or implications

Format your response as JSON with the following structure:
{{
    "core_insight": "Main point of the article",
    "named_entities": ["entity1", "entity2", "entity3"],
    "key_details": "Important details and implications",
    "summary": "Complete 1-2 paragraph summary"
}}"#,
        title = article.title,
        content = truncate_chars(&article.summary, SUMMARY_INPUT_CHARS),
    )
}

fn sentiment_prompt(text: &str) -> String {
    format!(
        r#"Analyze the sentiment of the following text and classify it as exactly one of: "Positive", "Negative", or "Neutral".

Text: {text}

Respond with only the sentiment classification (Positive, Negative, or Neutral)."#
    )
}

// ---------------------------------------------------------------------------
// Output validation
// ---------------------------------------------------------------------------

/// Validate a summarizer reply against the [`ArticleSummary`] shape.
///
/// One surrounding markdown code fence is tolerated.
pub fn parse_summary(reply: &str) -> Result<ArticleSummary> {
    serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| NewsDigestError::malformed(format!("summary is not valid JSON: {e}")))
}

/// Validate a classifier reply. Only the exact labels are accepted.
pub fn parse_sentiment(reply: &str) -> Result<Sentiment> {
    let label = reply.trim();
    Sentiment::parse_label(label)
        .ok_or_else(|| NewsDigestError::malformed(format!("unexpected sentiment label '{label}'")))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        Some(inner) => inner.strip_prefix("json").unwrap_or(inner).trim(),
        None => trimmed,
    }
}

/// The first `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Bounded executor
// ---------------------------------------------------------------------------

/// How many articles are enriched at once and how fast new ones start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyPolicy {
    pub max_concurrent: usize,
    /// Minimum gap between the starts of two article enrichments.
    pub min_interval: Duration,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for ConcurrencyPolicy {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            min_interval: Duration::from_millis(config.min_interval_ms),
        }
    }
}

/// Spaces out task starts by at least `interval`.
struct Pacer {
    interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_start: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut next = self.next_start.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }
}

/// Enrich every article under `policy`, returning results in input order.
///
/// A task that panics yields [`EnrichedArticle::fallback`] for its input.
#[instrument(skip_all, fields(run_id = %ctx.run_id(), articles = articles.len()))]
pub async fn enrich_all(
    enricher: &Enricher,
    articles: Vec<RawArticle>,
    policy: &ConcurrencyPolicy,
    ctx: &RunContext,
    progress: &dyn EnrichmentProgress,
) -> Vec<EnrichedArticle> {
    let total = articles.len();
    let semaphore = Arc::new(Semaphore::new(policy.max_concurrent.max(1)));
    let pacer = Arc::new(Pacer::new(policy.min_interval));

    info!(
        total,
        max_concurrent = policy.max_concurrent,
        min_interval_ms = policy.min_interval.as_millis() as u64,
        "starting enrichment"
    );
    ctx.emit(Stage::Enrich, TraceKind::Started, format!("enriching {total} articles"));
    progress.phase("Analyzing articles");

    let mut handles = Vec::with_capacity(total);
    for article in &articles {
        let enricher = enricher.clone();
        let sem = semaphore.clone();
        let pacer = pacer.clone();
        let ctx = ctx.clone();
        let article = article.clone();

        handles.push(tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = sem.acquire_owned().await.ok();
            pacer.wait().await;
            debug!(title = %article.title, "enriching article");
            enricher.enrich(article, &ctx).await
        }));
    }

    let mut enriched = Vec::with_capacity(total);
    for (i, (handle, raw)) in handles.into_iter().zip(articles).enumerate() {
        progress.task_progress(i + 1, total, &raw.title);
        match handle.await {
            Ok(article) => enriched.push(article),
            Err(e) => {
                warn!(title = %raw.title, error = %e, "enrichment task failed");
                ctx.emit(
                    Stage::Enrich,
                    TraceKind::Degraded,
                    format!("enrichment of '{}' aborted: {e}", raw.title),
                );
                enriched.push(EnrichedArticle::fallback(raw));
            }
        }
    }

    ctx.emit(Stage::Enrich, TraceKind::Completed, format!("enriched {} articles", enriched.len()));
    enriched
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for enrichment operations.
pub trait EnrichmentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Article-level progress, in input order.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
}

/// No-op enrichment progress.
pub struct SilentEnrichmentProgress;

impl EnrichmentProgress for SilentEnrichmentProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
