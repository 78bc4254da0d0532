//! The compare pipeline: diff two blobs, render, persist.

use thiserror::Error;

use crate::artifact::{artifact_url, ArtifactError, ArtifactStore};
use crate::diff::{compute_diff, DiffResult};
use crate::render::render_diff_page;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("failed to render diff: {0}")]
    Render(#[from] askama::Error),
    #[error(transparent)]
    Store(#[from] ArtifactError),
}

/// A persisted comparison.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub id: String,
    /// Retrieval path served by `GET /files/diff/{id}`.
    pub url: String,
    pub result: DiffResult,
}

/// Diffs `original` against `modified`, renders the side-by-side page and
/// stores it. Nothing is addressable unless the whole write succeeded.
pub fn compare_and_store(
    store: &ArtifactStore,
    original: &str,
    modified: &str,
) -> Result<Comparison, CompareError> {
    let result = compute_diff(original, modified);
    let page = render_diff_page(&result)?;
    let id = store.save(&page)?;

    tracing::info!(
        id = %id,
        added = result.added_count(),
        removed = result.removed_count(),
        "diff artifact created"
    );

    Ok(Comparison {
        url: artifact_url(&id),
        id,
        result,
    })
}
