//! Workbook loading through calamine

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use evmtrack_core::table::{parse_date, serial_to_date};
use evmtrack_core::{CellValue, Table};
use tracing::debug;

use crate::{build_table, table_name, ReadError};

/// Convert a calamine cell.
///
/// Date cells become `Date`; error cells (`#N/A`, `#REF!`) read as empty.
pub fn data_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            serial_to_date(serial).map_or(CellValue::Number(serial), CellValue::Date)
        }
        Data::DateTimeIso(s) => parse_date(s).map_or_else(|| CellValue::Text(s.clone()), CellValue::Date),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => {
            debug!(error = ?e, "spreadsheet error cell read as empty");
            CellValue::Empty
        }
    }
}

/// Header cells keep dates as ISO text so date-labelled columns stay parseable
fn header_cell(data: &Data) -> CellValue {
    match data_to_cell(data) {
        CellValue::Date(d) => CellValue::Text(d.format("%Y-%m-%d").to_string()),
        other => other,
    }
}

/// Read the first worksheet of a workbook
///
/// # Errors
///
/// `Spreadsheet` when the workbook cannot be opened or decoded, `NoSheet`
/// when it holds no worksheet.
pub fn read_first_sheet(path: &Path) -> Result<Table, ReadError> {
    let spreadsheet_error = |e: calamine::Error| ReadError::Spreadsheet {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut workbook = open_workbook_auto(path).map_err(spreadsheet_error)?;
    let sheet_names = workbook.sheet_names();
    let Some(first) = sheet_names.first() else {
        return Err(ReadError::NoSheet(path.display().to_string()));
    };
    debug!(path = %path.display(), sheet = %first, sheets = sheet_names.len(), "reading worksheet");
    let range = workbook.worksheet_range(first).map_err(spreadsheet_error)?;

    let mut rows = range.rows();
    let header: Option<Vec<CellValue>> = rows.next().map(|row| row.iter().map(header_cell).collect());
    let body = rows.map(|row| row.iter().map(data_to_cell).collect::<Vec<_>>());

    Ok(build_table(table_name(path), header.into_iter().chain(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn converts_scalar_cells() {
        assert_eq!(data_to_cell(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(data_to_cell(&Data::Float(1.5)), CellValue::Number(1.5));
        assert_eq!(data_to_cell(&Data::Empty), CellValue::Empty);
        assert_eq!(data_to_cell(&Data::String("J1".into())), CellValue::from("J1"));
        assert_eq!(
            data_to_cell(&Data::DateTimeIso("2025-03-31T00:00:00".into())),
            CellValue::Date(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap())
        );
    }

    #[test]
    fn header_dates_become_iso_text() {
        assert_eq!(
            header_cell(&Data::DateTimeIso("2025-01-31".into())),
            CellValue::from("2025-01-31")
        );
        assert_eq!(header_cell(&Data::String("Jalon".into())), CellValue::from("Jalon"));
    }

    #[test]
    fn unreadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(matches!(
            read_first_sheet(&path),
            Err(ReadError::Spreadsheet { .. })
        ));
    }
}
