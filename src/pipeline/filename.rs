//! Export file naming.
//!
//! A table is named after its title, unless it looks like a parts list: then
//! the first "Assembly Part No." cell is the more useful name. Names are
//! sanitised to a conservative character set and de-duplicated within one
//! export batch.

use crate::table::ExtractedTable;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Name used when a table has no title.
pub const FALLBACK_FILENAME: &str = "extracted_data";

const PART_NUMBER_HEADERS: [&str; 2] = ["assembly part no.", "assembly part no"];

static RE_UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9\s\-_.]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Derive the sanitised base name (no extension) for one table.
pub fn resolve_filename(table: &ExtractedTable) -> String {
    sanitize_filename(&preferred_name(table))
}

/// The unsanitised candidate: part number if present, else title, else fallback.
pub fn preferred_name(table: &ExtractedTable) -> String {
    part_number(table)
        .or_else(|| Some(table.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// First-row cell under an "Assembly Part No." header, trimmed.
fn part_number(table: &ExtractedTable) -> Option<String> {
    let column = table.headers.iter().position(|h| {
        let h = h.trim().to_lowercase();
        PART_NUMBER_HEADERS.contains(&h.as_str())
    })?;
    let cell = table.rows.first()?.get(column)?.trim();
    (!cell.is_empty()).then(|| cell.to_string())
}

/// Replace unsafe characters with `_`, then collapse whitespace runs to `_`.
pub fn sanitize_filename(name: &str) -> String {
    let safe = RE_UNSAFE_CHARS.replace_all(name, "_");
    RE_WHITESPACE.replace_all(&safe, "_").into_owned()
}

/// Names handed out within one export batch.
#[derive(Debug, Default)]
pub struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name`, appending the smallest free `_N` suffix when taken.
    pub fn claim(&mut self, name: String) -> String {
        let mut unique = name.clone();
        let mut counter = 1;
        while self.used.contains(&unique) {
            unique = format!("{name}_{counter}");
            counter += 1;
        }
        self.used.insert(unique.clone());
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(title: &str, headers: &[&str], rows: &[&[&str]]) -> ExtractedTable {
        ExtractedTable::new(
            title,
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn part_number_overrides_title() {
        let t = table("Parts", &["Assembly Part No.", "Qty"], &[&["PN-004", "2"]]);
        assert_eq!(preferred_name(&t), "PN-004");
        assert_eq!(resolve_filename(&t), "PN-004");
    }

    #[test]
    fn part_number_header_match_is_lenient() {
        let t = table("Parts", &["Qty", "  ASSEMBLY PART NO  "], &[&["2", " 77-A "]]);
        assert_eq!(preferred_name(&t), "77-A");
    }

    #[test]
    fn blank_or_missing_part_number_keeps_title() {
        let blank = table("Parts", &["Assembly Part No."], &[&["   "]]);
        assert_eq!(preferred_name(&blank), "Parts");

        let no_rows = table("Parts", &["Assembly Part No."], &[]);
        assert_eq!(preferred_name(&no_rows), "Parts");

        let short_row = table("Parts", &["Qty", "Assembly Part No."], &[&["2"]]);
        assert_eq!(preferred_name(&short_row), "Parts");
    }

    #[test]
    fn empty_title_falls_back() {
        assert_eq!(resolve_filename(&table("", &["A"], &[])), "extracted_data");
    }

    #[test]
    fn sanitises_title() {
        assert_eq!(sanitize_filename("Invoice #1/2024"), "Invoice__1_2024");
        assert_eq!(sanitize_filename("Page 1 - Parts  List"), "Page_1_-_Parts_List");
        assert_eq!(sanitize_filename("bom.v2_final"), "bom.v2_final");
        assert_eq!(sanitize_filename("Größe"), "Gr__e");
    }

    #[test]
    fn resolution_is_deterministic() {
        let t = table("Page 2 - Invoice", &["A"], &[&["1"]]);
        assert_eq!(resolve_filename(&t), resolve_filename(&t.clone()));
    }

    #[test]
    fn unique_names_use_smallest_free_suffix() {
        let mut names = UniqueNames::new();
        assert_eq!(names.claim("X".into()), "X");
        assert_eq!(names.claim("X".into()), "X_1");
        assert_eq!(names.claim("X".into()), "X_2");
    }

    #[test]
    fn unique_names_skip_taken_suffixes() {
        let mut names = UniqueNames::new();
        assert_eq!(names.claim("X_1".into()), "X_1");
        assert_eq!(names.claim("X".into()), "X");
        assert_eq!(names.claim("X".into()), "X_2");
    }
}
