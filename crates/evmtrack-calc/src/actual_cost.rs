//! Actual Cost (AC) aggregation
//!
//! Expense lines are bucketed by calendar month, summed, then accumulated
//! into a cumulative series. Only months that carry at least one expense
//! appear; gaps are not filled.

use evmtrack_core::{CumulativeSeries, EvmError, ExpenseRow, Month, Table};
use tracing::debug;

/// Spreadsheet line number of a data row (the header is line 1)
pub(crate) fn line_number(index: usize) -> usize {
    index + 2
}

pub(crate) fn missing_field(table: &Table, field: &str) -> EvmError {
    EvmError::MissingField {
        table: table.name().to_string(),
        field: field.to_string(),
        available: table.columns().to_vec(),
    }
}

/// Extract expense rows from the spend table.
///
/// Rows with an empty date are skipped and empty amounts count as 0.
/// A date or amount that is present but unreadable is an error.
pub fn expense_rows(
    table: &Table,
    date_field: &str,
    amount_field: &str,
) -> Result<Vec<ExpenseRow>, EvmError> {
    let date_col = table
        .column_index(date_field)
        .ok_or_else(|| missing_field(table, date_field))?;
    let amount_col = table
        .column_index(amount_field)
        .ok_or_else(|| missing_field(table, amount_field))?;

    let mut rows = Vec::with_capacity(table.row_count());
    let mut skipped = 0usize;
    for row in table.rows() {
        let date_cell = row.cell(date_col);
        if date_cell.is_empty() {
            skipped += 1;
            continue;
        }
        let date = date_cell.as_date().ok_or_else(|| EvmError::InvalidDate {
            column: date_field.to_string(),
            row: line_number(row.index()),
            value: date_cell.to_string(),
        })?;

        let amount_cell = row.cell(amount_col);
        let amount = if amount_cell.is_empty() {
            0.0
        } else {
            amount_cell
                .as_number()
                .ok_or_else(|| EvmError::InvalidAmount {
                    column: amount_field.to_string(),
                    row: line_number(row.index()),
                    value: amount_cell.to_string(),
                })?
        };
        rows.push(ExpenseRow { date, amount });
    }

    if skipped > 0 {
        debug!(skipped, "spend rows without a date ignored");
    }
    Ok(rows)
}

/// Monthly totals accumulated into a cumulative series
pub fn aggregate_rows(rows: &[ExpenseRow]) -> CumulativeSeries {
    CumulativeSeries::from_monthly_totals(
        rows.iter().map(|r| (Month::from_date(r.date), r.amount)),
    )
}

/// Aggregate the spend table into cumulative AC.
///
/// An empty table yields an empty series, whatever its columns.
///
/// # Errors
///
/// `MissingField` when either configured column is absent, `InvalidDate`
/// or `InvalidAmount` for unreadable cells.
pub fn aggregate(
    table: &Table,
    date_field: &str,
    amount_field: &str,
) -> Result<CumulativeSeries, EvmError> {
    if table.is_empty() {
        return Ok(CumulativeSeries::new());
    }
    let rows = expense_rows(table, date_field, amount_field)?;
    Ok(aggregate_rows(&rows))
}
