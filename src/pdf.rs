//! PDF to markdown conversion (`file-reader convert-pdf`).
//!
//! Text comes from `pdf-extract` page by page; each page is tidied up with a few
//! regex passes and pages are joined with a blank line.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid regex"));
static CAPS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([A-Z][A-Z \t]+)$").expect("valid regex"));

/// Name of the fallback output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "converted";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Extract(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Converts `pdf_path` into `<stem>.md` and returns the written path.
///
/// `output_dir` is used when it is writable; otherwise the file goes to
/// [`default_output_dir`].
pub fn convert_pdf_to_markdown(
    pdf_path: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf, PdfError> {
    if !pdf_path.is_file() {
        return Err(PdfError::NotFound(pdf_path.to_path_buf()));
    }

    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let output_dir = ensure_writable_directory(output_dir);
    let output_path = output_dir.join(format!("{}.md", stem));

    let bytes = std::fs::read(pdf_path).map_err(|source| PdfError::Read {
        path: pdf_path.to_path_buf(),
        source,
    })?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| PdfError::Extract(e.to_string()))?;

    let markdown = pages_to_markdown(&pages);
    std::fs::write(&output_path, markdown).map_err(|source| PdfError::Write {
        path: output_path.clone(),
        source,
    })?;

    tracing::info!(
        input = %pdf_path.display(),
        output = %output_path.display(),
        "converted PDF to markdown"
    );
    Ok(output_path)
}

/// Cleans each page and joins the non-empty ones with a blank line.
pub fn pages_to_markdown<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|page| clean_text(page.as_ref()))
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Collapses blank-line and space runs, promotes all-caps lines to `##`
/// headings, and trims.
pub fn clean_text(text: &str) -> String {
    let text = BLANK_RUNS.replace_all(text, "\n\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = CAPS_LINE.replace_all(&text, "## $1");
    text.trim().to_string()
}

/// Returns `dir` if a probe file can be written there, else the default
/// output directory.
pub fn ensure_writable_directory(dir: Option<&Path>) -> PathBuf {
    let Some(dir) = dir else {
        return default_output_dir();
    };

    let probe = dir.join(".write_test");
    let writable = std::fs::write(&probe, "test")
        .and_then(|_| std::fs::remove_file(&probe))
        .is_ok();
    if writable {
        return dir.to_path_buf();
    }

    let fallback = default_output_dir();
    tracing::warn!(
        requested = %dir.display(),
        using = %fallback.display(),
        "no write permission for output directory"
    );
    fallback
}

/// `./converted`, created on demand; the working directory if that fails.
pub fn default_output_dir() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let dir = cwd.join(DEFAULT_OUTPUT_DIR);
    match std::fs::create_dir_all(&dir) {
        Ok(()) => dir,
        Err(_) => cwd,
    }
}
