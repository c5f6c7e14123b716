//! Plain-text rendering for command output.

use unimail_core::Template;

/// Titles longer than this are cut with an ellipsis
const MAX_TITLE_WIDTH: usize = 60;

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Numbered id/title table with a count header.
pub fn template_table(templates: &[Template]) -> String {
    let rows: Vec<(String, &str, String)> = templates
        .iter()
        .enumerate()
        .map(|(i, t)| ((i + 1).to_string(), t.id.as_str(), truncate(&t.title, MAX_TITLE_WIDTH)))
        .collect();

    // Columns are at least as wide as their headers
    let num_width = rows.iter().map(|r| r.0.chars().count()).fold(1, usize::max);
    let id_width = rows.iter().map(|r| r.1.chars().count()).fold(2, usize::max);

    let mut out = format!("unimail templates ({})\n\n", templates.len());
    out.push_str(&format!(
        "  {:>num_width$}  {:<id_width$}  Title\n",
        "#", "ID"
    ));
    for (num, id, title) in &rows {
        let line = format!("  {:>num_width$}  {:<id_width$}  {}", num, id, title);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
