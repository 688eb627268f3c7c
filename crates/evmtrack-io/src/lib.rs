//! # evmtrack-io
//!
//! Loaders for the input tables of an earned value analysis.
//!
//! This crate provides:
//! - Spreadsheet reading (`.xlsx`, `.xlsm`, `.xls`, `.ods`) through calamine
//! - Delimited text reading (`.csv`, `.tsv`) with delimiter sniffing
//! - Format detection from the file extension
//!
//! The first sheet (or the whole CSV) becomes a [`Table`]: the first row
//! holds the column names, every following non-blank row is data.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use evmtrack_io::read_table;
//!
//! let spend = read_table(Path::new("EXPORT.XLSX")).unwrap();
//! println!("{} rows", spend.row_count());
//! ```

pub mod delimited;
pub mod spreadsheet;

use std::path::Path;

use evmtrack_core::{CellValue, Table};
use thiserror::Error;
use tracing::{info, warn};

/// Error while loading an input table
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error in {path}: {message}")]
    Spreadsheet { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("No worksheet in {0}")]
    NoSheet(String),
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Workbook read through calamine
    Spreadsheet,
    /// Delimited text
    Csv,
}

/// Detect file format from extension (case-insensitive)
pub fn detect_format(path: &Path) -> Option<FileFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(FileFormat::Spreadsheet),
        "csv" | "tsv" | "txt" => Some(FileFormat::Csv),
        _ => None,
    }
}

/// Table name derived from the file stem
pub(crate) fn table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table")
        .to_string()
}

/// Split raw rows into a header and data rows.
///
/// Header cells become column names (blank ones are named `Unnamed: <i>`);
/// fully blank data rows are dropped.
pub(crate) fn build_table(name: String, mut rows: impl Iterator<Item = Vec<CellValue>>) -> Table {
    let Some(header) = rows.next() else {
        return Table::new(name, Vec::new());
    };
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.as_key() {
            Some(label) => label.trim().to_string(),
            None => format!("Unnamed: {i}"),
        })
        .collect();

    let mut table = Table::new(name, columns);
    for row in rows {
        if row.iter().all(CellValue::is_empty) {
            continue;
        }
        table.push_row(row);
    }
    table
}

/// Load the first sheet of a workbook or a delimited text file.
///
/// # Errors
///
/// `UnsupportedFormat` for unknown extensions, otherwise any error raised
/// while opening or decoding the file.
pub fn read_table(path: &Path) -> Result<Table, ReadError> {
    let table = match detect_format(path) {
        Some(FileFormat::Spreadsheet) => spreadsheet::read_first_sheet(path)?,
        Some(FileFormat::Csv) => delimited::read_csv(path)?,
        None => return Err(ReadError::UnsupportedFormat(path.display().to_string())),
    };
    info!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.columns().len(),
        "table loaded"
    );
    Ok(table)
}

/// Load an optional input.
///
/// A missing file or a file that cannot be read gives `None`, with a
/// warning, so the analysis can continue without it.
pub fn read_optional_table(path: &Path) -> Option<Table> {
    if !path.exists() {
        warn!(path = %path.display(), "optional input not found");
        return None;
    }
    match read_table(path) {
        Ok(table) => Some(table),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "optional input unreadable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("EXPORT.XLSX")), Some(FileFormat::Spreadsheet));
        assert_eq!(detect_format(Path::new("pv.ods")), Some(FileFormat::Spreadsheet));
        assert_eq!(detect_format(Path::new("va.csv")), Some(FileFormat::Csv));
        assert_eq!(detect_format(Path::new("notes.docx")), None);
        assert_eq!(detect_format(Path::new("no_extension")), None);
    }

    #[test]
    fn unsupported_format_is_an_error() {
        let err = read_table(Path::new("report.pdf")).unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_optional_input_is_none() {
        assert!(read_optional_table(Path::new("/nonexistent/forecast.xlsx")).is_none());
    }

    #[test]
    fn header_and_blank_rows() {
        let rows = vec![
            vec!["Jalon".into(), CellValue::Empty, CellValue::Number(2025.0)],
            vec!["J1".into(), CellValue::Number(1.0), CellValue::Empty],
            vec![CellValue::Empty, " ".into(), CellValue::Empty],
        ];
        let table = build_table("va".into(), rows.into_iter());
        assert_eq!(table.columns(), &["Jalon", "Unnamed: 1", "2025"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.name(), "va");
    }

    #[test]
    fn empty_source_gives_empty_table() {
        let table = build_table("pv".into(), std::iter::empty());
        assert!(table.columns().is_empty());
        assert!(table.is_empty());
    }
}
