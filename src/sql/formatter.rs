//! Result formatting
//!
//! Renders a `StatementResult` into a plain-text block: optional title,
//! aligned table, then the command status. Column widths are measured in
//! terminal cells so CJK and emoji content stays aligned.

use crate::config::TableStyle;
use crate::db::types::StatementResult;
use unicode_truncate::UnicodeTruncateStr;
use unicode_width::UnicodeWidthStr;

/// Render one result as text.
///
/// Cells wider than `max_width` cells are truncated with a trailing `…`.
pub fn format_result(result: &StatementResult, style: TableStyle, max_width: usize) -> String {
    let mut out = String::new();

    if let Some(title) = &result.title {
        out.push_str(title);
        out.push('\n');
    }

    if result.has_table() {
        let headers: Vec<String> = result
            .columns
            .iter()
            .map(|c| truncate(&c.name, max_width))
            .collect();
        let cells: Vec<Vec<String>> = result
            .rows
            .iter()
            .map(|row| {
                row.values
                    .iter()
                    .map(|v| truncate(&single_line(&v.display_string()), max_width))
                    .collect()
            })
            .collect();
        let right_align: Vec<bool> = result
            .columns
            .iter()
            .map(|c| c.data_type.is_numeric())
            .collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.width());
            }
        }

        let table = Table {
            widths: &widths,
            right_align: &right_align,
        };
        match style {
            TableStyle::Psql => table.psql(&mut out, &headers, &cells),
            TableStyle::Ascii => table.ascii(&mut out, &headers, &cells),
            TableStyle::Plain => table.plain(&mut out, &headers, &cells),
        }
    }

    out.push_str(&status_line(result));
    out
}

/// Status text for the last line of a block
fn status_line(result: &StatementResult) -> String {
    if result.has_table() {
        let noun = if result.row_count == 1 { "row" } else { "rows" };
        format!("({} {})", result.row_count, noun)
    } else {
        result.status.clone()
    }
}

struct Table<'a> {
    widths: &'a [usize],
    right_align: &'a [bool],
}

impl Table<'_> {
    fn psql(&self, out: &mut String, headers: &[String], rows: &[Vec<String>]) {
        // psql centers headers; plain left-align reads the same in an editor panel
        self.line(out, headers, " ", " | ", " ", false);
        let rule: Vec<String> = self.widths.iter().map(|w| "-".repeat(w + 2)).collect();
        out.push_str(&rule.join("+"));
        out.push('\n');
        for row in rows {
            self.line(out, row, " ", " | ", " ", true);
        }
    }

    fn ascii(&self, out: &mut String, headers: &[String], rows: &[Vec<String>]) {
        let rule = self.rule();
        out.push_str(&rule);
        self.line(out, headers, "| ", " | ", " |", false);
        out.push_str(&rule);
        for row in rows {
            self.line(out, row, "| ", " | ", " |", true);
        }
        out.push_str(&rule);
    }

    fn plain(&self, out: &mut String, headers: &[String], rows: &[Vec<String>]) {
        self.line(out, headers, "", "  ", "", false);
        for row in rows {
            self.line(out, row, "", "  ", "", true);
        }
    }

    fn rule(&self) -> String {
        let parts: Vec<String> = self.widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+\n", parts.join("+"))
    }

    fn line(
        &self,
        out: &mut String,
        cells: &[String],
        open: &str,
        sep: &str,
        close: &str,
        align_numbers: bool,
    ) {
        let padded: Vec<String> = cells
            .iter()
            .zip(self.widths)
            .zip(self.right_align)
            .map(|((cell, &width), &right)| pad(cell, width, align_numbers && right))
            .collect();
        let line = format!("{}{}{}", open, padded.join(sep), close);
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

fn pad(cell: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(cell.width()));
    if right {
        format!("{}{}", fill, cell)
    } else {
        format!("{}{}", cell, fill)
    }
}

fn truncate(text: &str, max_width: usize) -> String {
    if max_width == 0 || text.width() <= max_width {
        return text.to_string();
    }
    let (head, _) = text.unicode_truncate(max_width.saturating_sub(1));
    format!("{}…", head)
}

/// Newlines and tabs would break row alignment
fn single_line(text: &str) -> String {
    text.replace('\n', "\\n").replace('\t', "\\t")
}
