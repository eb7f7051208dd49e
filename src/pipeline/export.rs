//! Spreadsheet and archive export.
//!
//! One table becomes one `.xlsx` file with a single sheet. Several tables
//! become one `.xlsx` per table, zipped in table order. The artifact is built
//! completely in memory first; [`save_export`] then writes it atomically
//! (temp file in the target directory + rename) so a failed export never
//! leaves a partial file behind.

use crate::error::DocuTableError;
use crate::pipeline::filename::{resolve_filename, UniqueNames};
use crate::table::ExtractedTable;
use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Sheet name used when a table has no usable title.
pub const FALLBACK_SHEET_NAME: &str = "Sheet1";
/// Archive stem used when the batch base name has nothing before its first `.`.
pub const FALLBACK_ARCHIVE_STEM: &str = "extracted_tables";
/// Excel's sheet-name length limit.
pub const MAX_SHEET_NAME_CHARS: usize = 31;
/// Excel's per-cell character limit.
pub const MAX_CELL_CHARS: usize = 32_767;

/// What kind of file an [`ExportArtifact`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Spreadsheet,
    Archive,
}

/// A fully assembled export, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub kind: ExportKind,
    pub bytes: Vec<u8>,
    /// Entry names inside the archive, in table order. Empty for a spreadsheet.
    pub entries: Vec<String>,
}

/// Build the export for `tables`.
///
/// Returns `Ok(None)` for an empty slice: there is nothing to save.
/// `base_name` (usually the uploaded file's name) only names the archive in
/// the multi-table case.
pub fn build_export(
    tables: &[ExtractedTable],
    base_name: &str,
) -> Result<Option<ExportArtifact>, DocuTableError> {
    match tables {
        [] => Ok(None),
        [table] => {
            let file_name = spreadsheet_file_name(&resolve_filename(table));
            let bytes = build_workbook(table, &file_name)?;
            Ok(Some(ExportArtifact {
                file_name,
                kind: ExportKind::Spreadsheet,
                bytes,
                entries: Vec::new(),
            }))
        }
        tables => build_archive(tables, &archive_name(base_name)).map(Some),
    }
}

/// Build and save in one step. Returns the written path, or `None` when
/// `tables` is empty.
pub async fn export_to_dir(
    tables: &[ExtractedTable],
    base_name: &str,
    dir: &Path,
) -> Result<Option<PathBuf>, DocuTableError> {
    match build_export(tables, base_name)? {
        Some(artifact) => save_export(artifact, dir).await.map(Some),
        None => Ok(None),
    }
}

/// Write an artifact into `dir` atomically and return its final path.
///
/// An existing file with the same name is replaced.
pub async fn save_export(artifact: ExportArtifact, dir: &Path) -> Result<PathBuf, DocuTableError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&artifact, &dir))
        .await
        .map_err(|e| DocuTableError::Internal(format!("Export task panicked: {}", e)))?
}

fn write_atomic(artifact: &ExportArtifact, dir: &Path) -> Result<PathBuf, DocuTableError> {
    let path = dir.join(&artifact.file_name);
    let write_err = |source: std::io::Error| DocuTableError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&artifact.bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    info!("Saved {} ({} bytes)", path.display(), artifact.bytes.len());
    Ok(path)
}

/// Append `.xlsx` unless the name already ends with it (any case).
pub fn spreadsheet_file_name(name: &str) -> String {
    if name.to_lowercase().ends_with(".xlsx") {
        name.to_string()
    } else {
        format!("{name}.xlsx")
    }
}

/// `<part of base before the first '.'>_tables.zip`.
pub fn archive_name(base_name: &str) -> String {
    let stem = base_name.split('.').next().unwrap_or_default();
    let stem = if stem.is_empty() {
        FALLBACK_ARCHIVE_STEM
    } else {
        stem
    };
    format!("{stem}_tables.zip")
}

/// Title with the characters Excel forbids in sheet names removed,
/// truncated to 31 characters.
pub fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '?' | '*' | '[' | ']' | ':'))
        .take(MAX_SHEET_NAME_CHARS)
        .collect();
    // Excel also rejects names that start or end with an apostrophe.
    let cleaned = cleaned.trim_matches('\'');
    if cleaned.is_empty() {
        FALLBACK_SHEET_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// One workbook, one sheet: headers on the first row, then the data rows.
/// Every non-empty cell is written as a string cell.
pub fn build_workbook(table: &ExtractedTable, file_name: &str) -> Result<Vec<u8>, DocuTableError> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| DocuTableError::SpreadsheetFailed {
        name: file_name.to_string(),
        detail: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&table.title)).map_err(xlsx_err)?;

    let lines = std::iter::once(&table.headers).chain(table.rows.iter());
    for (row_idx, cells) in lines.enumerate() {
        let row = u32::try_from(row_idx).map_err(|_| DocuTableError::SpreadsheetFailed {
            name: file_name.to_string(),
            detail: format!("row {row_idx} is out of range"),
        })?;
        for (col_idx, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let col = u16::try_from(col_idx).map_err(|_| DocuTableError::SpreadsheetFailed {
                name: file_name.to_string(),
                detail: format!("column {col_idx} is out of range"),
            })?;
            worksheet
                .write_string(row, col, fit_cell(cell, file_name, row, col))
                .map_err(xlsx_err)?;
        }
    }

    let bytes = workbook.save_to_buffer().map_err(xlsx_err)?;
    debug!("Built workbook '{}' ({} bytes)", file_name, bytes.len());
    Ok(bytes)
}

/// Cut a cell to Excel's per-cell character limit.
fn fit_cell<'a>(cell: &'a str, file_name: &str, row: u32, col: u16) -> &'a str {
    match cell.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                "'{}': cell at row {}, column {} exceeds {} characters; truncated",
                file_name,
                row + 1,
                col + 1,
                MAX_CELL_CHARS
            );
            &cell[..cut]
        }
        None => cell,
    }
}

fn build_archive(
    tables: &[ExtractedTable],
    archive_name: &str,
) -> Result<ExportArtifact, DocuTableError> {
    let zip_err = |detail: String| DocuTableError::ArchiveFailed {
        name: archive_name.to_string(),
        detail,
    };

    let mut names = UniqueNames::new();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = Vec::with_capacity(tables.len());

    for table in tables {
        let entry = format!("{}.xlsx", names.claim(resolve_filename(table)));
        let bytes = build_workbook(table, &entry)?;
        zip.start_file(entry.as_str(), options)
            .map_err(|e| zip_err(e.to_string()))?;
        zip.write_all(&bytes).map_err(|e| zip_err(e.to_string()))?;
        entries.push(entry);
    }

    let bytes = zip
        .finish()
        .map_err(|e| zip_err(e.to_string()))?
        .into_inner();
    debug!("Built archive '{}' with {} entries", archive_name, entries.len());

    Ok(ExportArtifact {
        file_name: archive_name.to_string(),
        kind: ExportKind::Archive,
        bytes,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn table(title: &str, headers: &[&str], rows: &[&[&str]]) -> ExtractedTable {
        ExtractedTable::new(
            title,
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn zip_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(build_export(&[], "scan.pdf").unwrap().is_none());
    }

    #[test]
    fn single_table_is_one_spreadsheet() {
        let t = table("Invoice #1/2024", &["Item", "Qty"], &[&["Bolt", "007"]]);
        let artifact = build_export(&[t], "scan.pdf").unwrap().unwrap();
        assert_eq!(artifact.kind, ExportKind::Spreadsheet);
        assert_eq!(artifact.file_name, "Invoice__1_2024.xlsx");
        assert!(artifact.bytes.starts_with(b"PK"));

        let strings = zip_entry(&artifact.bytes, "xl/sharedStrings.xml");
        assert!(strings.contains("007"), "numeric-looking cells stay text");
        assert!(strings.contains("Item"));
    }

    #[test]
    fn xlsx_extension_added_once() {
        assert_eq!(spreadsheet_file_name("report.XLSX"), "report.XLSX");
        assert_eq!(spreadsheet_file_name("report"), "report.xlsx");

        let t = table("parts.xlsx", &["A"], &[]);
        let artifact = build_export(&[t], "x").unwrap().unwrap();
        assert_eq!(artifact.file_name, "parts.xlsx");
    }

    #[test]
    fn duplicate_names_get_suffixes_in_archive() {
        let a = table("X", &["A"], &[&["1"]]);
        let b = table("X", &["A"], &[&["2"]]);
        let artifact = build_export(&[a, b], "bom.scan.pdf").unwrap().unwrap();
        assert_eq!(artifact.kind, ExportKind::Archive);
        assert_eq!(artifact.file_name, "bom_tables.zip");
        assert_eq!(artifact.entries, vec!["X.xlsx", "X_1.xlsx"]);

        let archive = zip::ZipArchive::new(Cursor::new(artifact.bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"X.xlsx"));
        assert!(names.contains(&"X_1.xlsx"));
    }

    #[test]
    fn archive_entries_are_workbooks() {
        let a = table("First", &["Assembly Part No.", "Qty"], &[&["PN-004", "2"]]);
        let b = table("", &["A"], &[]);
        let artifact = build_export(&[a, b], "doc.pdf").unwrap().unwrap();
        assert_eq!(artifact.entries, vec!["PN-004.xlsx", "extracted_data.xlsx"]);

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.bytes.as_slice())).unwrap();
        let mut inner = Vec::new();
        archive
            .by_name("PN-004.xlsx")
            .unwrap()
            .read_to_end(&mut inner)
            .unwrap();
        let strings = zip_entry(&inner, "xl/sharedStrings.xml");
        assert!(strings.contains("PN-004"));
    }

    #[test]
    fn archive_name_rules() {
        assert_eq!(archive_name("scan.pdf"), "scan_tables.zip");
        assert_eq!(archive_name("a.b.c"), "a_tables.zip");
        assert_eq!(archive_name(".hidden"), "extracted_tables_tables.zip");
        assert_eq!(archive_name(""), "extracted_tables_tables.zip");
    }

    #[test]
    fn sheet_name_rules() {
        assert_eq!(sheet_name(""), "Sheet1");
        assert_eq!(sheet_name("Q1 [draft] a/b?*\\"), "Q1 draft ab");
        assert_eq!(sheet_name("[]"), "Sheet1");
        assert_eq!(sheet_name("'quoted'"), "quoted");
        let long = "x".repeat(40);
        assert_eq!(sheet_name(&long).chars().count(), 31);
    }

    #[test]
    fn ragged_rows_export() {
        let t = table("Ragged", &["A", "B"], &[&["1"], &["1", "2", "3"], &[]]);
        assert!(build_workbook(&t, "ragged.xlsx").is_ok());
    }

    #[test]
    fn oversized_cell_is_truncated_not_fatal() {
        let huge = "é".repeat(MAX_CELL_CHARS + 10);
        let t = table("Big", &["Notes"], &[&[huge.as_str()]]);
        assert!(build_workbook(&t, "big.xlsx").is_ok());

        let cut = fit_cell(&huge, "big.xlsx", 1, 0);
        assert_eq!(cut.chars().count(), MAX_CELL_CHARS);
        assert_eq!(fit_cell("short", "big.xlsx", 1, 0), "short");
    }

    #[tokio::test]
    async fn save_writes_final_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let t = table("Parts", &["A"], &[&["1"]]);
        let path = export_to_dir(&[t], "scan.png", dir.path())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.path().join("Parts.xlsx"));
        assert!(path.exists());

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "no temp files left behind");
    }

    #[tokio::test]
    async fn exporting_nothing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = export_to_dir(&[], "scan.png", dir.path()).await.unwrap();
        assert!(out.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
