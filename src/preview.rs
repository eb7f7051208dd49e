//! Terminal preview of extracted tables.
//!
//! [`TablePager`] holds which table of a multi-table result is on screen;
//! [`render_text`] draws one table as aligned plain text. Ragged rows are
//! drawn as they are: short rows stop early, long rows print their extra
//! cells past the last header.

use crate::table::ExtractedTable;

/// Pagination state over the tables of one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TablePager {
    index: usize,
}

impl TablePager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current<'a>(&self, tables: &'a [ExtractedTable]) -> Option<&'a ExtractedTable> {
        tables.get(self.index)
    }

    pub fn next(&mut self, len: usize) {
        self.index = (self.index + 1).min(len.saturating_sub(1));
    }

    pub fn prev(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn has_next(&self, len: usize) -> bool {
        self.index + 1 < len
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    /// Go back to the first table when the result shrank under the cursor.
    pub fn sync(&mut self, len: usize) {
        if self.index >= len {
            self.index = 0;
        }
    }

    /// `"2 / 5"`.
    pub fn position(&self, len: usize) -> String {
        format!("{} / {}", self.index + 1, len)
    }
}

/// Title for display: the table title, or `Table N` (1-based).
pub fn display_title(table: &ExtractedTable, index: usize) -> String {
    if table.title.is_empty() {
        format!("Table {}", index + 1)
    } else {
        table.title.clone()
    }
}

/// Render headers, a separator and all rows as aligned text.
pub fn render_text(table: &ExtractedTable) -> String {
    let columns = table.column_count();
    let mut widths = vec![0usize; columns];
    for cells in std::iter::once(&table.headers).chain(table.rows.iter()) {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let pad = widths[i].saturating_sub(cell.chars().count());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&render_row(&table.headers));
    out.push('\n');
    let rule: Vec<String> = widths
        .iter()
        .take(table.headers.len().max(1))
        .map(|w| "-".repeat((*w).max(3)))
        .collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    if table.rows.is_empty() {
        out.push_str("No data rows found.\n");
    }
    for row in &table.rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}
