//! Shared types, error model, and configuration for NewsDigest.
//!
//! This crate is the foundation depended on by all other NewsDigest crates.
//! It provides:
//! - [`NewsDigestError`]: the unified error type
//! - Domain types ([`RawArticle`], [`EnrichedArticle`], [`Digest`], [`Sentiment`])
//! - Configuration ([`AppConfig`], [`SourceKind`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EnrichmentConfig, FeedConfig, LlmConfig, NewsApiConfig,
    SourceKind, config_dir, config_file_path, init_config, load_config, load_config_from,
    read_api_key, validate_llm_key,
};
pub use error::{NewsDigestError, Result};
pub use types::{
    ArticleSummary, DETAILS_UNAVAILABLE, Digest, DigestStats, EnrichedArticle, INSIGHT_UNAVAILABLE,
    RawArticle, RunId, SUMMARY_UNAVAILABLE, Sentiment, SentimentSummary, Tone,
};
