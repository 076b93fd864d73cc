//! Core domain types for NewsDigest runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder insight used when the summarizer output cannot be used.
pub const INSIGHT_UNAVAILABLE: &str = "Summary unavailable";

/// Placeholder details used when the summarizer output cannot be used.
pub const DETAILS_UNAVAILABLE: &str = "Details unavailable";

/// Summary text used when the summarizer call itself failed.
pub const SUMMARY_UNAVAILABLE: &str = "Unable to generate summary";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RawArticle
// ---------------------------------------------------------------------------

/// An article as returned by a news backend, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    pub url: String,
    /// Free-form timestamp as published by the backend; may be empty.
    pub published: String,
    /// Publisher name, `"Unknown"` when the backend does not say.
    pub source: String,
    /// Raw excerpt; may be empty.
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Closed three-value tone classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Self::Positive, Self::Negative, Self::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        }
    }

    /// Exact match against the three labels. No case folding, no extra words.
    pub fn parse_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ArticleSummary
// ---------------------------------------------------------------------------

/// The structured summary the summarizer model must return.
///
/// Deserialization is strict: every key is required and `named_entities`
/// must be an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub core_insight: String,
    pub named_entities: Vec<String>,
    pub key_details: String,
    pub summary: String,
}

impl ArticleSummary {
    /// Placeholder summary carrying `summary` as its only real content.
    pub fn unavailable(summary: impl Into<String>) -> Self {
        Self {
            core_insight: INSIGHT_UNAVAILABLE.into(),
            named_entities: Vec::new(),
            key_details: DETAILS_UNAVAILABLE.into(),
            summary: summary.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// EnrichedArticle
// ---------------------------------------------------------------------------

/// A raw article plus its LLM summary and sentiment label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub title: String,
    pub url: String,
    pub published: String,
    pub source: String,
    /// LLM-refined summary; replaces the raw excerpt.
    pub summary: String,
    pub core_insight: String,
    pub named_entities: Vec<String>,
    pub key_details: String,
    pub sentiment: Sentiment,
}

impl EnrichedArticle {
    /// Combine a raw article with its enrichment results.
    pub fn new(raw: RawArticle, summary: ArticleSummary, sentiment: Sentiment) -> Self {
        Self {
            title: raw.title,
            url: raw.url,
            published: raw.published,
            source: raw.source,
            summary: summary.summary,
            core_insight: summary.core_insight,
            named_entities: summary.named_entities,
            key_details: summary.key_details,
            sentiment,
        }
    }

    /// Placeholder enrichment that keeps every raw field.
    pub fn fallback(raw: RawArticle) -> Self {
        Self::new(
            raw,
            ArticleSummary::unavailable(SUMMARY_UNAVAILABLE),
            Sentiment::Neutral,
        )
    }
}

// ---------------------------------------------------------------------------
// SentimentSummary
// ---------------------------------------------------------------------------

/// Per-label article counts. All three keys are always serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSummary {
    #[serde(rename = "Positive")]
    pub positive: usize,
    #[serde(rename = "Negative")]
    pub negative: usize,
    #[serde(rename = "Neutral")]
    pub neutral: usize,
}

impl SentimentSummary {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    pub fn get(&self, sentiment: Sentiment) -> usize {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// The terminal output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    /// `"Daily News Digest: <topic>"`.
    pub title: String,
    /// Render-time date, e.g. `"March 04, 2025"`.
    pub date: String,
    pub topic: String,
    pub total_articles: usize,
    pub sentiment_summary: SentimentSummary,
    pub articles: Vec<EnrichedArticle>,
}

// ---------------------------------------------------------------------------
// Tone / DigestStats
// ---------------------------------------------------------------------------

/// Overall tone of a digest, derived from its sentiment counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Positive,
    MixedPositive,
    Negative,
    MixedNegative,
    Balanced,
}

impl Tone {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::MixedPositive => "Mixed (Positive-leaning)",
            Self::Negative => "Negative",
            Self::MixedNegative => "Mixed (Negative-leaning)",
            Self::Balanced => "Neutral/Balanced",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Digest-wide statistics shown next to the articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestStats {
    pub tone: Tone,
    /// Entities in first-occurrence order, capped for display.
    pub key_entities: Vec<String>,
    /// Number of distinct publishers.
    pub distinct_sources: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawArticle {
        RawArticle {
            title: "Solar output hits record".into(),
            url: "https://example.com/solar".into(),
            published: "Mon, 03 Mar 2025 10:00:00 GMT".into(),
            source: "Example Times".into(),
            summary: "Raw excerpt".into(),
        }
    }

    #[test]
    fn run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn sentiment_labels_are_exact() {
        assert_eq!(Sentiment::parse_label("Positive"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse_label("Negative"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse_label("positive"), None);
        assert_eq!(Sentiment::parse_label("maybe positive?"), None);
        assert_eq!(Sentiment::parse_label(""), None);
    }

    #[test]
    fn summary_requires_every_key() {
        let missing = r#"{"core_insight":"x","named_entities":[],"summary":"y"}"#;
        assert!(serde_json::from_str::<ArticleSummary>(missing).is_err());

        let wrong_type = r#"{"core_insight":"x","named_entities":"A, B","key_details":"d","summary":"y"}"#;
        assert!(serde_json::from_str::<ArticleSummary>(wrong_type).is_err());
    }

    #[test]
    fn fallback_preserves_raw_fields() {
        let article = EnrichedArticle::fallback(raw());
        assert_eq!(article.title, "Solar output hits record");
        assert_eq!(article.url, "https://example.com/solar");
        assert_eq!(article.source, "Example Times");
        assert_eq!(article.core_insight, INSIGHT_UNAVAILABLE);
        assert_eq!(article.summary, SUMMARY_UNAVAILABLE);
        assert!(article.named_entities.is_empty());
        assert_eq!(article.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn enriched_summary_replaces_raw_excerpt() {
        let summary = ArticleSummary {
            core_insight: "Solar broke a record".into(),
            named_entities: vec!["IEA".into()],
            key_details: "Details".into(),
            summary: "Refined".into(),
        };
        let article = EnrichedArticle::new(raw(), summary, Sentiment::Positive);
        assert_eq!(article.summary, "Refined");
        assert_eq!(article.sentiment, Sentiment::Positive);
    }

    #[test]
    fn sentiment_summary_serializes_all_keys() {
        let mut counts = SentimentSummary::default();
        counts.record(Sentiment::Positive);
        counts.record(Sentiment::Positive);
        let json = serde_json::to_value(counts).expect("serialize");
        assert_eq!(json["Positive"], 2);
        assert_eq!(json["Negative"], 0);
        assert_eq!(json["Neutral"], 0);
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.get(Sentiment::Positive), 2);
    }

    #[test]
    fn tone_labels() {
        assert_eq!(Tone::MixedPositive.to_string(), "Mixed (Positive-leaning)");
        assert_eq!(Tone::Balanced.label(), "Neutral/Balanced");
    }

    #[test]
    fn enriched_article_json_is_flat() {
        let article = EnrichedArticle::fallback(raw());
        let json = serde_json::to_value(&article).expect("serialize");
        assert_eq!(json["sentiment"], "Neutral");
        assert_eq!(json["source"], "Example Times");
        assert!(json["named_entities"].is_array());
    }
}
