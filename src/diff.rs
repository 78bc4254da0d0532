//! Line-level diff computation for the compare endpoint.
//!
//! Two text blobs go through four steps:
//!
//! 1. HTML-escape each blob ([`escape_html`]), so entities are never split
//!    by the line splitter.
//! 2. Split into lines, keeping terminators ([`split_lines`]).
//! 3. Produce a unified diff over the whole of both sequences
//!    ([`unified_diff`]) using Myers' algorithm from `similar`, which
//!    yields a minimal edit script.
//! 4. Walk the unified diff into two aligned, numbered sequences
//!    ([`align_unified`]) for side-by-side rendering.
//!
//! [`compute_diff`] runs all four.

use serde::Serialize;
use similar::{Algorithm, ChangeTag, TextDiff};

/// Marker line emitted after a line that lacks a terminator.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Classification of a rendered diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineKind {
    Context,
    Added,
    Removed,
    SectionHeader,
}

impl LineKind {
    /// CSS class used by the HTML template.
    pub fn css_class(&self) -> &'static str {
        match self {
            LineKind::Context => "context",
            LineKind::Added => "added",
            LineKind::Removed => "removed",
            LineKind::SectionHeader => "section-header",
        }
    }
}

/// One entry of an aligned rendering sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: LineKind,
    /// 1-based line number on this side; `None` for section headers.
    pub line_number: Option<usize>,
    /// Escaped content without diff marker or line terminator.
    pub text: String,
    /// The terminator stripped from `text` (empty for an unterminated last line).
    pub newline: String,
}

impl DiffLine {
    fn header(raw: &str) -> Self {
        Self {
            kind: LineKind::SectionHeader,
            line_number: None,
            text: raw.to_string(),
            newline: String::new(),
        }
    }

    fn numbered(kind: LineKind, line_number: usize, content: &str) -> Self {
        let (text, newline) = strip_terminator(content);
        Self {
            kind,
            line_number: Some(line_number),
            text: text.to_string(),
            newline: newline.to_string(),
        }
    }

    pub fn is_header(&self) -> bool {
        self.kind == LineKind::SectionHeader
    }

    /// Line number as shown in the gutter; blank for headers.
    pub fn number_label(&self) -> String {
        self.line_number.map(|n| n.to_string()).unwrap_or_default()
    }
}

/// The two aligned sides of one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub original_lines: Vec<DiffLine>,
    pub modified_lines: Vec<DiffLine>,
}

impl DiffResult {
    pub fn added_count(&self) -> usize {
        self.modified_lines
            .iter()
            .filter(|l| l.kind == LineKind::Added)
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.original_lines
            .iter()
            .filter(|l| l.kind == LineKind::Removed)
            .count()
    }

    pub fn has_changes(&self) -> bool {
        self.added_count() > 0 || self.removed_count() > 0
    }
}

/// Runs the full pipeline on raw (unescaped) input.
pub fn compute_diff(original: &str, modified: &str) -> DiffResult {
    let original = escape_html(original);
    let modified = escape_html(modified);

    let old_lines = split_lines(&original);
    let new_lines = split_lines(&modified);

    let unified = unified_diff(&old_lines, &new_lines);
    align_unified(&unified)
}

/// Escapes `& < > " '` the way HTML attribute-safe escaping does.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits text into lines, each keeping its terminator (`\n`, `\r\n` or `\r`).
///
/// A trailing fragment without terminator is still a line. Empty input
/// yields no lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            b'\r' => {
                let end = if bytes.get(i + 1) == Some(&b'\n') {
                    i + 1
                } else {
                    i
                };
                lines.push(&text[start..=end]);
                i = end;
                start = end + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Produces unified diff lines covering both sequences as a single hunk.
///
/// Output lines carry no extra terminator: a hunk header is bare, and every
/// content line is its marker followed by the original line (terminator
/// included). Returns nothing when both sides are empty.
pub fn unified_diff(old_lines: &[&str], new_lines: &[&str]) -> Vec<String> {
    if old_lines.is_empty() && new_lines.is_empty() {
        return Vec::new();
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(old_lines, new_lines);

    let mut out = Vec::with_capacity(old_lines.len() + new_lines.len() + 1);
    out.push(format!(
        "@@ -{} +{} @@",
        format_range(old_lines.len()),
        format_range(new_lines.len())
    ));

    for change in diff.iter_all_changes() {
        let marker = match change.tag() {
            ChangeTag::Equal => ' ',
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
        };
        let value: &str = change.value();
        out.push(format!("{}{}", marker, value));
        if strip_terminator(value).1.is_empty() {
            out.push(NO_NEWLINE_MARKER.to_string());
        }
    }

    out
}

/// Formats a hunk range that starts at the first line: the length is
/// omitted when it is 1, and an empty side starts at 0.
fn format_range(len: usize) -> String {
    match len {
        0 => "0,0".to_string(),
        1 => "1".to_string(),
        n => format!("1,{}", n),
    }
}

/// Walks unified diff lines into original/modified rendering sequences.
///
/// Counters start at 1 and are reset by every hunk header. Removals only
/// advance the original side, additions only the modified side, context
/// advances both. No-newline markers are skipped.
pub fn align_unified<S: AsRef<str>>(diff: &[S]) -> DiffResult {
    let mut result = DiffResult::default();
    let mut original_line_num = 1;
    let mut modified_line_num = 1;

    for line in diff {
        let line = line.as_ref();

        if line.starts_with('@') {
            if let Some((old_start, new_start)) = parse_hunk_header(line) {
                original_line_num = old_start;
                modified_line_num = new_start;
                result.original_lines.push(DiffLine::header(line));
                result.modified_lines.push(DiffLine::header(line));
            } else {
                tracing::debug!(line, "skipping malformed hunk header");
            }
        } else if let Some(content) = line.strip_prefix('-') {
            result.original_lines.push(DiffLine::numbered(
                LineKind::Removed,
                original_line_num,
                content,
            ));
            original_line_num += 1;
        } else if let Some(content) = line.strip_prefix('+') {
            result.modified_lines.push(DiffLine::numbered(
                LineKind::Added,
                modified_line_num,
                content,
            ));
            modified_line_num += 1;
        } else if line.starts_with('\\') {
            continue;
        } else {
            let content = line.strip_prefix(' ').unwrap_or(line);
            result.original_lines.push(DiffLine::numbered(
                LineKind::Context,
                original_line_num,
                content,
            ));
            result.modified_lines.push(DiffLine::numbered(
                LineKind::Context,
                modified_line_num,
                content,
            ));
            original_line_num += 1;
            modified_line_num += 1;
        }
    }

    result
}

/// Parses `@@ -A[,B] +C[,D] @@` into `(A, C)`.
pub fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    let rest = line.strip_prefix("@@ -")?;
    let (ranges, _) = rest.split_once(" @@")?;
    let (old, new) = ranges.split_once(" +")?;
    Some((range_start(old)?, range_start(new)?))
}

fn range_start(range: &str) -> Option<usize> {
    let start = match range.split_once(',') {
        Some((start, len)) => {
            len.parse::<usize>().ok()?;
            start
        }
        None => range,
    };
    start.parse().ok()
}

fn strip_terminator(line: &str) -> (&str, &str) {
    let body = line
        .strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .or_else(|| line.strip_suffix('\r'))
        .unwrap_or(line);
    line.split_at(body.len())
}
