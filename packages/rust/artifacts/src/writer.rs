//! Writing digest artifacts to disk.

use std::path::Path;

use sha2::{Digest as _, Sha256};
use tracing::{debug, info, instrument};

use newsdigest_shared::{Digest, DigestStats, NewsDigestError, Result};

use crate::{render_json, render_report};

/// Metadata for a single written artifact file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// File stem for a digest: `digest-<topic-slug>-<date-slug>`, ASCII only.
pub fn artifact_stem(digest: &Digest) -> String {
    let slug = slugify(&digest.topic);
    let date = slugify(&digest.date);
    match (slug.is_empty(), date.is_empty()) {
        (false, false) => format!("digest-{slug}-{date}"),
        (false, true) => format!("digest-{slug}"),
        _ => "digest".to_string(),
    }
}

/// Write `<stem>.md` and `<stem>.json` into `dir`.
///
/// Each file is written to a temp file first, then renamed into place.
#[instrument(skip_all, fields(dir = %dir.display(), topic = %digest.topic))]
pub fn write_artifacts(dir: &Path, digest: &Digest, stats: &DigestStats) -> Result<Vec<ArtifactMeta>> {
    std::fs::create_dir_all(dir).map_err(|e| NewsDigestError::io(dir, e))?;

    let stem = artifact_stem(digest);
    let files = [
        (format!("{stem}.md"), render_report(digest, stats)),
        (format!("{stem}.json"), render_json(digest)?),
    ];

    let mut metas = Vec::with_capacity(files.len());
    for (filename, content) in &files {
        let target = dir.join(filename);
        let temp = dir.join(format!(".{filename}.tmp"));

        std::fs::write(&temp, content).map_err(|e| NewsDigestError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| NewsDigestError::io(&target, e))?;

        let hash = format!("{:x}", Sha256::digest(content.as_bytes()));
        debug!(file = %filename, size = content.len(), "wrote artifact");

        metas.push(ArtifactMeta {
            filename: filename.clone(),
            sha256: hash,
            size_bytes: content.len(),
        });
    }

    info!(count = metas.len(), "artifacts written");
    Ok(metas)
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
