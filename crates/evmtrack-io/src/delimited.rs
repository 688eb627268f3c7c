//! Delimited text loading
//!
//! European exports commonly use `;` with a decimal comma, so the delimiter
//! is sniffed from the header line rather than assumed.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use evmtrack_core::{CellValue, Table};

use crate::{build_table, table_name, ReadError};

const CANDIDATES: [u8; 3] = [b';', b'\t', b','];

/// Pick the candidate delimiter occurring most often in `line` (`,` on ties)
pub fn sniff_delimiter(line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = line.bytes().filter(|b| *b == b',').count();
    for candidate in CANDIDATES {
        let count = line.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn text_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(trimmed.to_string())
    }
}

/// Read delimited text; every non-empty field is kept as text.
///
/// # Errors
///
/// Any `csv` decoding error.
pub fn read_csv_from<R: Read>(name: String, reader: R) -> Result<Table, ReadError> {
    let mut reader = BufReader::new(reader);
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    let delimiter = sniff_delimiter(&first_line);

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(first_line.as_bytes().chain(reader));

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row: Vec<CellValue> = record
            .iter()
            .map(|field| {
                if index == 0 {
                    text_cell(field.trim_start_matches('\u{feff}'))
                } else {
                    text_cell(field)
                }
            })
            .collect();
        rows.push(row);
    }
    Ok(build_table(name, rows.into_iter()))
}

/// Read a delimited text file
///
/// # Errors
///
/// `Io` when the file cannot be opened, `Csv` when it cannot be decoded.
pub fn read_csv(path: &Path) -> Result<Table, ReadError> {
    let file = File::open(path)?;
    read_csv_from(table_name(path), file)
}
