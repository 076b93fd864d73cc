//! Markdown report rendering.

use newsdigest_shared::{Digest, DigestStats};

/// Entities listed per article in the detailed section.
const ARTICLE_ENTITY_LIMIT: usize = 5;

/// Render the markdown report for `digest`.
///
/// Articles appear in digest order in every section.
pub fn render_report(digest: &Digest, stats: &DigestStats) -> String {
    let counts = &digest.sentiment_summary;
    let mut out = String::new();

    out.push_str(&format!("# {}\n", digest.title));
    out.push_str(&format!("**Date:** {}\n", digest.date));
    out.push_str(&format!("**Topic:** {}\n", digest.topic));
    out.push_str(&format!("**Total Articles:** {}\n", digest.total_articles));
    out.push_str(&format!(
        "**Sentiment Summary:** {} Positive, {} Negative, {} Neutral\n",
        counts.positive, counts.negative, counts.neutral
    ));

    out.push_str("\n## Key Takeaways\n");
    for (i, article) in digest.articles.iter().enumerate() {
        out.push_str(&format!("• **Article {}:** {}\n", i + 1, article.core_insight));
    }

    if !stats.key_entities.is_empty() {
        out.push_str("\n## Key Entities\n");
        out.push_str(&stats.key_entities.join(" • "));
        out.push('\n');
    }

    out.push_str("\n## Overall Analysis\n");
    out.push_str(&format!(
        "The overall sentiment regarding {} is **{}** based on {} analyzed articles. \
         The coverage includes perspectives from {} different news sources.\n",
        digest.topic, stats.tone, digest.total_articles, stats.distinct_sources
    ));

    out.push_str("\n## Source Links\n");
    for (i, article) in digest.articles.iter().enumerate() {
        out.push_str(&format!("{}. {} - {}\n", i + 1, article.title, article.source));
        out.push_str(&format!("   Link: {}\n\n", article.url));
    }

    out.push_str("\n## Detailed Article Analysis\n");
    for (i, article) in digest.articles.iter().enumerate() {
        out.push_str(&format!("\n### Article {}: {}\n", i + 1, article.title));
        out.push_str(&format!("**Source:** {}\n", article.source));
        if !article.published.is_empty() {
            out.push_str(&format!("**Published:** {}\n", article.published));
        }
        out.push_str(&format!("**Sentiment:** {}\n", article.sentiment));
        out.push_str(&format!("**Summary:** {}\n", article.summary));
        if !article.named_entities.is_empty() {
            let shown: Vec<&str> = article
                .named_entities
                .iter()
                .take(ARTICLE_ENTITY_LIMIT)
                .map(String::as_str)
                .collect();
            out.push_str(&format!("**Key Entities:** {}\n", shown.join(", ")));
        }
        if !article.key_details.is_empty() {
            out.push_str(&format!("**Key Details:** {}\n", article.key_details));
        }
        out.push_str(&format!("**URL:** {}\n", article.url));
        out.push_str("---\n");
    }

    out
}
