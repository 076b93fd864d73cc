//! Digest aggregation: sentiment counts, overall tone, entities, sources.

use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use tracing::{debug, instrument};

use newsdigest_shared::{
    Digest, DigestStats, EnrichedArticle, NewsDigestError, Result, SentimentSummary, Tone,
};

/// Unique entities shown in a report.
pub const DISPLAY_ENTITY_LIMIT: usize = 10;

/// Build a digest dated today (local time).
pub fn aggregate(topic: &str, articles: Vec<EnrichedArticle>) -> Result<Digest> {
    aggregate_on(topic, articles, Local::now().date_naive())
}

/// Build a digest for an explicit date.
#[instrument(skip(articles), fields(articles = articles.len()))]
pub fn aggregate_on(topic: &str, articles: Vec<EnrichedArticle>, date: NaiveDate) -> Result<Digest> {
    if articles.is_empty() {
        return Err(NewsDigestError::NoResults {
            query: topic.to_string(),
        });
    }

    let sentiment_summary = count_sentiments(&articles);
    debug!(?sentiment_summary, "sentiments counted");

    Ok(Digest {
        title: format!("Daily News Digest: {topic}"),
        date: date.format("%B %d, %Y").to_string(),
        topic: topic.to_string(),
        total_articles: articles.len(),
        sentiment_summary,
        articles,
    })
}

pub fn count_sentiments(articles: &[EnrichedArticle]) -> SentimentSummary {
    articles
        .iter()
        .fold(SentimentSummary::default(), |mut counts, article| {
            counts.record(article.sentiment);
            counts
        })
}

/// Overall tone from the sentiment counts.
///
/// The side with more articles wins; it is "Positive"/"Negative" only when it
/// also beats the neutral count, otherwise "Mixed". A tie is balanced.
pub fn overall_tone(counts: &SentimentSummary) -> Tone {
    let (pos, neg, neu) = (counts.positive, counts.negative, counts.neutral);
    if pos > neg {
        if pos > neu { Tone::Positive } else { Tone::MixedPositive }
    } else if neg > pos {
        if neg > neu { Tone::Negative } else { Tone::MixedNegative }
    } else {
        Tone::Balanced
    }
}

/// All named entities, deduplicated, in first-occurrence order.
pub fn unique_entities(articles: &[EnrichedArticle]) -> Vec<String> {
    let mut seen = HashSet::new();
    articles
        .iter()
        .flat_map(|a| a.named_entities.iter())
        .filter(|e| seen.insert(e.as_str()))
        .cloned()
        .collect()
}

pub fn distinct_sources(articles: &[EnrichedArticle]) -> usize {
    articles
        .iter()
        .map(|a| a.source.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Statistics shown alongside a digest.
pub fn digest_stats(digest: &Digest) -> DigestStats {
    let mut key_entities = unique_entities(&digest.articles);
    key_entities.truncate(DISPLAY_ENTITY_LIMIT);

    DigestStats {
        tone: overall_tone(&digest.sentiment_summary),
        key_entities,
        distinct_sources: distinct_sources(&digest.articles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdigest_shared::{ArticleSummary, RawArticle, Sentiment};

    fn article(i: usize, source: &str, sentiment: Sentiment, entities: &[&str]) -> EnrichedArticle {
        EnrichedArticle::new(
            RawArticle {
                title: format!("Story {i}"),
                url: format!("https://example.com/{i}"),
                published: String::new(),
                source: source.into(),
                summary: String::new(),
            },
            ArticleSummary {
                core_insight: format!("Insight {i}"),
                named_entities: entities.iter().map(|e| e.to_string()).collect(),
                key_details: "Details".into(),
                summary: "Summary".into(),
            },
            sentiment,
        )
    }

    fn counts(positive: usize, negative: usize, neutral: usize) -> SentimentSummary {
        SentimentSummary {
            positive,
            negative,
            neutral,
        }
    }

    #[test]
    fn counts_match_articles() {
        let articles = vec![
            article(1, "A", Sentiment::Positive, &[]),
            article(2, "B", Sentiment::Neutral, &[]),
            article(3, "A", Sentiment::Positive, &[]),
            article(4, "C", Sentiment::Negative, &[]),
        ];
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let digest = aggregate_on("solar power", articles, date).unwrap();

        assert_eq!(digest.title, "Daily News Digest: solar power");
        assert_eq!(digest.date, "March 04, 2025");
        assert_eq!(digest.total_articles, 4);
        assert_eq!(digest.sentiment_summary, counts(2, 1, 1));
        assert_eq!(digest.sentiment_summary.total(), digest.articles.len());
        for s in Sentiment::ALL {
            let n = digest.articles.iter().filter(|a| a.sentiment == s).count();
            assert_eq!(digest.sentiment_summary.get(s), n);
        }
    }

    #[test]
    fn empty_input_is_no_results() {
        let err = aggregate("anything", Vec::new()).unwrap_err();
        assert!(matches!(err, NewsDigestError::NoResults { .. }));
    }

    #[test]
    fn tone_rules() {
        assert_eq!(overall_tone(&counts(3, 1, 1)), Tone::Positive);
        assert_eq!(overall_tone(&counts(2, 2, 0)), Tone::Balanced);
        assert_eq!(overall_tone(&counts(2, 1, 3)), Tone::MixedPositive);
        assert_eq!(overall_tone(&counts(0, 3, 1)), Tone::Negative);
        assert_eq!(overall_tone(&counts(1, 2, 2)), Tone::MixedNegative);
        assert_eq!(overall_tone(&counts(0, 0, 5)), Tone::Balanced);
    }

    #[test]
    fn entities_dedup_in_first_occurrence_order() {
        let articles = vec![
            article(1, "A", Sentiment::Neutral, &["A", "B"]),
            article(2, "A", Sentiment::Neutral, &["B", "C"]),
        ];
        assert_eq!(unique_entities(&articles), vec!["A", "B", "C"]);
    }

    #[test]
    fn stats_cap_entities_and_count_sources() {
        let names: Vec<String> = (0..15).map(|i| format!("Entity {i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let articles = vec![
            article(1, "Reuters", Sentiment::Positive, &refs[..8]),
            article(2, "AP", Sentiment::Positive, &refs[5..]),
            article(3, "Reuters", Sentiment::Negative, &[]),
        ];
        let digest = aggregate("grid", articles).unwrap();
        let stats = digest_stats(&digest);

        assert_eq!(stats.key_entities.len(), DISPLAY_ENTITY_LIMIT);
        assert_eq!(stats.key_entities[0], "Entity 0");
        assert_eq!(stats.key_entities[9], "Entity 9");
        assert_eq!(stats.distinct_sources, 2);
        assert_eq!(stats.tone, Tone::Positive);
    }
}
