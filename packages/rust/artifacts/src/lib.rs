//! Digest artifacts for NewsDigest.
//!
//! Rendering is pure over a [`Digest`]:
//! - [`render_report`]: the human-readable markdown report
//! - [`render_json`]: the machine record handed to other tools
//!
//! [`write_artifacts`] persists both to a directory.
//!
//! [`Digest`]: newsdigest_shared::Digest

mod report;
mod writer;

use newsdigest_shared::{Digest, Result};

pub use report::render_report;
pub use writer::{ArtifactMeta, artifact_stem, write_artifacts};

/// Pretty-printed JSON of the whole digest.
pub fn render_json(digest: &Digest) -> Result<String> {
    Ok(serde_json::to_string_pretty(digest)?)
}
