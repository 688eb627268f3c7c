//! Planned Value (PV) normalization
//!
//! PV sheets come in several shapes, so the date and amount columns are
//! detected from ordered candidate lists (first match wins). Amounts are
//! summed per month and accumulated like actual cost; months missing
//! between the first and last planned month are then filled by linear
//! interpolation over elapsed days.

use std::collections::BTreeMap;

use evmtrack_core::{CumulativeSeries, MilestoneBudget, MilestoneId, Month, PlannedValue, Table};
use tracing::{info, warn};

use crate::actual_cost::line_number;

/// Accepted PV date columns, in priority order
pub const PV_DATE_COLUMNS: &[&str] = &["Date", "date", "Date prévisionnelle", "Date prév.", "Mois"];

/// Accepted PV amount columns, in priority order
pub const PV_AMOUNT_COLUMNS: &[&str] = &[
    "Montant planifié",
    "Cumul planifié",
    "Montant",
    "montant",
    "Montant prévisionnel",
    "Montant prév.",
    "PV",
    "Planned Value",
];

/// Detect the PV date column
pub fn detect_date_column(table: &Table) -> Option<&'static str> {
    table.find_column(PV_DATE_COLUMNS)
}

/// Detect the PV amount column
pub fn detect_amount_column(table: &Table) -> Option<&'static str> {
    table.find_column(PV_AMOUNT_COLUMNS)
}

/// Read milestone budgets from a PV table.
///
/// Rows without a milestone identifier are skipped. Unreadable amounts
/// count as 0 and unreadable dates as unknown.
pub fn milestone_budgets(table: &Table, milestone_column: &str) -> Vec<MilestoneBudget> {
    let (Some(milestone_col), Some(amount_col)) = (
        table.column_index(milestone_column),
        detect_amount_column(table).and_then(|c| table.column_index(c)),
    ) else {
        return Vec::new();
    };
    let date_col = detect_date_column(table).and_then(|c| table.column_index(c));

    table
        .rows()
        .filter_map(|row| {
            let milestone_id = row.cell(milestone_col).as_key()?;
            Some(MilestoneBudget {
                milestone_id,
                date: date_col.and_then(|c| row.cell(c).as_date()),
                planned_amount: row.cell(amount_col).as_number().unwrap_or(0.0),
            })
        })
        .collect()
}

/// Normalize a PV table into a gap-free cumulative series plus milestone labels.
///
/// Returns `None` when the table is absent or its date/amount columns
/// cannot be detected. PV is an optional input: rows whose date or
/// non-empty amount cannot be read are skipped with a warning, and an
/// empty amount counts as 0.
pub fn normalize(pv_table: Option<&Table>, milestone_column: &str) -> Option<PlannedValue> {
    let table = pv_table?;
    let (Some(date_column), Some(amount_column)) =
        (detect_date_column(table), detect_amount_column(table))
    else {
        warn!(
            table = table.name(),
            columns = ?table.columns(),
            "PV date or amount column not detected, PV unavailable"
        );
        return None;
    };
    info!(date_column, amount_column, "PV columns detected");

    let date_col = table.column_index(date_column)?;
    let amount_col = table.column_index(amount_column)?;
    let milestone_col = table.column_index(milestone_column);

    let mut totals = Vec::with_capacity(table.row_count());
    let mut milestones: BTreeMap<Month, Vec<MilestoneId>> = BTreeMap::new();
    for row in table.rows() {
        let date_cell = row.cell(date_col);
        if date_cell.is_empty() {
            continue;
        }
        let Some(month) = date_cell.as_date().map(Month::from_date) else {
            warn!(
                column = date_column,
                row = line_number(row.index()),
                value = %date_cell,
                "PV date unreadable, row skipped"
            );
            continue;
        };

        let amount_cell = row.cell(amount_col);
        let amount = if amount_cell.is_empty() {
            0.0
        } else if let Some(amount) = amount_cell.as_number() {
            amount
        } else {
            warn!(
                column = amount_column,
                row = line_number(row.index()),
                value = %amount_cell,
                "PV amount unreadable, row skipped"
            );
            continue;
        };
        totals.push((month, amount));

        if let Some(label) = milestone_col.and_then(|c| row.cell(c).as_key()) {
            milestones.entry(month).or_default().push(label);
        }
    }

    let raw = CumulativeSeries::from_monthly_totals(totals);
    let series = interpolate_missing_months(&raw);
    let interpolated_months = series.len() - raw.len();
    if interpolated_months > 0 {
        info!(interpolated_months, "PV months filled by interpolation");
    }

    Some(PlannedValue {
        series,
        milestones,
        date_column: date_column.to_string(),
        amount_column: amount_column.to_string(),
        interpolated_months,
    })
}

fn days_between(from: Month, to: Month) -> f64 {
    (to.first_day() - from.first_day()).num_days() as f64
}

/// Reindex over `[first, last]` and fill undefined months linearly.
///
/// The weight of each month is its elapsed days from the previous defined
/// month. Series with fewer than two points are returned as-is; a month
/// with no defined neighbour on one side stays undefined (NaN).
pub fn interpolate_missing_months(series: &CumulativeSeries) -> CumulativeSeries {
    let (Some(first), Some(last)) = (series.first_month(), series.last_month()) else {
        return series.clone();
    };
    if series.len() < 2 {
        return series.clone();
    }

    let months: Vec<Month> = Month::range_inclusive(first, last).collect();
    let defined: Vec<Option<f64>> = months
        .iter()
        .map(|m| series.get(*m).filter(|v| !v.is_nan()))
        .collect();

    let mut out = CumulativeSeries::new();
    let mut previous: Option<(Month, f64)> = None;
    for (i, &month) in months.iter().enumerate() {
        if let Some(value) = defined[i] {
            out.insert(month, value);
            previous = Some((month, value));
            continue;
        }
        let next = months[i + 1..]
            .iter()
            .zip(&defined[i + 1..])
            .find_map(|(m, v)| v.map(|v| (*m, v)));
        let value = match (previous, next) {
            (Some((m0, v0)), Some((m1, v1))) => {
                v0 + (v1 - v0) * days_between(m0, month) / days_between(m0, m1)
            }
            _ => f64::NAN,
        };
        out.insert(month, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmtrack_core::CellValue;
    use pretty_assertions::assert_eq;

    fn pv_table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> Table {
        Table::from_rows("pv", columns, rows)
    }

    #[test]
    fn detection_follows_priority_order() {
        let table = pv_table(&["Jalon", "Mois", "Date", "PV", "Montant"], vec![]);
        assert_eq!(detect_date_column(&table), Some("Date"));
        assert_eq!(detect_amount_column(&table), Some("Montant"));
    }

    #[test]
    fn undetectable_columns_mean_no_pv() {
        let table = pv_table(&["Jalon", "Quand", "Combien"], vec![vec![
            "J1".into(),
            "2025-01-01".into(),
            1.0.into(),
        ]]);
        assert_eq!(normalize(Some(&table), "Jalon"), None);
        assert_eq!(normalize(None, "Jalon"), None);
    }

    #[test]
    fn interpolates_over_elapsed_days() {
        let table = pv_table(&["Jalon", "Date", "Montant"], vec![
            vec!["J1".into(), "2025-01-31".into(), 100.0.into()],
            vec!["J2".into(), "2025-04-30".into(), 300.0.into()],
        ]);
        let pv = normalize(Some(&table), "Jalon").unwrap();
        assert_eq!(pv.interpolated_months, 2);
        assert_eq!(pv.series.len(), 4);

        // Jan 1 -> Apr 1 spans 90 days; Feb 1 is 31 days in, Mar 1 is 59.
        let feb = pv.series.get(Month::new(2025, 2)).unwrap();
        let mar = pv.series.get(Month::new(2025, 3)).unwrap();
        assert!((feb - (100.0 + 300.0 * 31.0 / 90.0)).abs() < 1e-9);
        assert!((mar - (100.0 + 300.0 * 59.0 / 90.0)).abs() < 1e-9);
        assert_eq!(pv.bac(), 400.0);
    }

    #[test]
    fn single_point_is_returned_unmodified() {
        let table = pv_table(&["Date", "PV"], vec![vec!["2025-06-15".into(), 5.0.into()]]);
        let pv = normalize(Some(&table), "Jalon").unwrap();
        assert_eq!(pv.series.iter().collect::<Vec<_>>(), vec![(Month::new(2025, 6), 5.0)]);
        assert!(pv.milestones.is_empty());
    }

    #[test]
    fn milestones_share_months_in_row_order() {
        let table = pv_table(&["Jalon", "Date prévisionnelle", "Montant planifié"], vec![
            vec!["J2".into(), "2025-03-10".into(), 10.0.into()],
            vec!["J1".into(), "2025-03-20".into(), 20.0.into()],
            vec![CellValue::Empty, "2025-04-01".into(), 5.0.into()],
        ]);
        let pv = normalize(Some(&table), "Jalon").unwrap();
        assert_eq!(
            pv.milestones.get(&Month::new(2025, 3)),
            Some(&vec!["J2".to_string(), "J1".to_string()])
        );
        assert!(!pv.milestones.contains_key(&Month::new(2025, 4)));
        assert_eq!(pv.date_column, "Date prévisionnelle");
        assert_eq!(pv.amount_column, "Montant planifié");
    }

    #[test]
    fn undefined_edges_stay_undefined() {
        let mut series = CumulativeSeries::new();
        series.insert(Month::new(2025, 1), f64::NAN);
        series.insert(Month::new(2025, 3), 30.0);
        let filled = interpolate_missing_months(&series);
        assert!(filled.get(Month::new(2025, 1)).unwrap().is_nan());
        assert!(filled.get(Month::new(2025, 2)).unwrap().is_nan());
        assert_eq!(filled.get(Month::new(2025, 3)), Some(30.0));
    }

    #[test]
    fn budgets_tolerate_bad_cells() {
        let table = pv_table(&["Jalon", "Date", "Montant"], vec![
            vec!["J1".into(), "2025-01-31".into(), "n/a".into()],
            vec!["J2".into(), "soon".into(), 50.0.into()],
        ]);
        let budgets = milestone_budgets(&table, "Jalon");
        assert_eq!(budgets.len(), 2);
        assert_eq!(budgets[0].planned_amount, 0.0);
        assert_eq!(budgets[1].date, None);
        assert_eq!(budgets[1].planned_amount, 50.0);
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let table = pv_table(&["Jalon", "Date", "Montant"], vec![
            vec!["J1".into(), "2025-01-31".into(), 100.0.into()],
            vec!["J2".into(), "TBD".into(), 50.0.into()],
            vec!["J3".into(), "2025-02-28".into(), "beaucoup".into()],
            vec!["J4".into(), "2025-03-31".into(), 25.0.into()],
        ]);
        let pv = normalize(Some(&table), "Jalon").unwrap();
        assert_eq!(pv.bac(), 125.0);
        assert_eq!(pv.interpolated_months, 1);
        assert_eq!(
            pv.milestones.values().flatten().cloned().collect::<Vec<_>>(),
            vec!["J1".to_string(), "J4".to_string()]
        );
    }
}
