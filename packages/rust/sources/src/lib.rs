//! News backends for NewsDigest.
//!
//! Every backend answers the same question (`fetch(query, limit)`) against a
//! different service. Which one runs is decided by [`SourceKind`] in the run
//! configuration; the fallback chain between them lives in the pipeline.
//!
//! This crate provides:
//! - [`NewsBackend`]: the shared capability
//! - [`FeedBackend`]: public RSS news search, no credentials
//! - [`KeywordApiBackend`]: keyword search API, requires a key

mod feed;
mod keyword_api;
mod text;

use std::time::Duration;

use async_trait::async_trait;
use newsdigest_shared::{NewsDigestError, RawArticle, Result, SourceKind};
use reqwest::Client;

pub use feed::FeedBackend;
pub use keyword_api::KeywordApiBackend;
pub use text::html_to_text;

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("NewsDigest/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Source name used when a backend does not report one.
pub const UNKNOWN_SOURCE: &str = "Unknown";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A searchable news service.
///
/// Implementations report every transport, status, and payload problem as
/// [`NewsDigestError::Backend`]; deciding whether that counts as "no results"
/// is the caller's job.
#[async_trait]
pub trait NewsBackend: Send + Sync {
    /// Which configured variant this backend is.
    fn kind(&self) -> SourceKind;

    /// Return at most `limit` articles matching `query`, in backend order.
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawArticle>>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with the per-call timeout every backend uses.
pub(crate) fn build_client(backend: SourceKind, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| {
            NewsDigestError::backend(backend.as_str(), format!("failed to build HTTP client: {e}"))
        })
}

/// Trim an origin so paths can be appended without doubling slashes.
pub(crate) fn trim_origin(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}
