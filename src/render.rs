//! Side-by-side HTML rendering of a [`DiffResult`].

use askama::Template;

use crate::diff::{DiffLine, DiffResult};

#[derive(Template)]
#[template(path = "file_diff.html")]
struct DiffPage<'a> {
    original_lines: &'a [DiffLine],
    modified_lines: &'a [DiffLine],
    added: usize,
    removed: usize,
}

/// Renders both sides as two tables. Line text is already escaped and is
/// emitted verbatim.
pub fn render_diff_page(result: &DiffResult) -> Result<String, askama::Error> {
    DiffPage {
        original_lines: &result.original_lines,
        modified_lines: &result.modified_lines,
        added: result.added_count(),
        removed: result.removed_count(),
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_diff;

    #[test]
    fn rows_are_tagged_by_kind() {
        let html = render_diff_page(&compute_diff("a\nb\n", "a\nc\n")).unwrap();

        assert!(html.contains(r#"<tr class="removed"><td class="num">2</td><td class="text">b</td></tr>"#));
        assert!(html.contains(r#"<tr class="added"><td class="num">2</td><td class="text">c</td></tr>"#));
        assert!(html.contains(r#"<tr class="section-header"><td class="num"></td>"#));
        assert!(html.contains("+1 / -1"));
    }

    #[test]
    fn escaped_text_is_not_double_escaped() {
        let html = render_diff_page(&compute_diff("<script>\n", "")).unwrap();

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("&amp;lt;script"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn empty_diff_still_renders_a_page() {
        let html = render_diff_page(&DiffResult::default()).unwrap();
        assert!(html.contains("<title>File Comparison</title>"));
        assert!(html.contains("+0 / -0"));
    }
}
