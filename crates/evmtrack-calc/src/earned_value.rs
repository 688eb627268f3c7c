//! Earned Value (EV) fusion
//!
//! Combines the PV table's per-milestone budgets with the percent-complete
//! (VA) table. Every VA column whose header reads as a date is a progress
//! snapshot; snapshots are grouped by month, and each milestone's percent
//! is made non-decreasing through time before being multiplied by its
//! budget.
//!
//! ```text
//! EV(M) = Σ budget(milestone) × max(percent(milestone, m) for m ≤ M)
//! ```
//!
//! Only milestones present in both tables contribute, and months whose
//! total is not strictly positive are dropped.

use std::collections::{BTreeMap, BTreeSet};

use evmtrack_core::table::{parse_amount, parse_date};
use evmtrack_core::{
    CellValue, CumulativeSeries, EarnedValue, MilestoneContribution, MilestoneId, Month,
    PercentCompleteMatrix, Table,
};
use tracing::{debug, info, warn};

use crate::planned_value::{detect_amount_column, milestone_budgets};

/// Percent read from a VA cell; text such as `"40 %"` means 0.4
fn percent_value(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Text(s) if s.trim_end().ends_with('%') => parse_amount(s).map(|p| p / 100.0),
        other => other.as_number(),
    }
}

/// Map each VA month to the columns whose header parses as a date in it
pub fn month_columns(va: &Table, milestone_column: &str) -> BTreeMap<Month, Vec<usize>> {
    let mut by_month: BTreeMap<Month, Vec<usize>> = BTreeMap::new();
    for (idx, name) in va.columns().iter().enumerate() {
        if name == milestone_column {
            continue;
        }
        if let Some(date) = parse_date(name) {
            by_month.entry(Month::from_date(date)).or_default().push(idx);
        }
    }
    by_month
}

/// Build the cumulative-max percent table from a VA table.
///
/// Columns falling in the same month collapse to their maximum, then each
/// milestone's values take the running maximum across months. A missing
/// or unreadable cell reads as 0 for its month without resetting the
/// running maximum. Duplicate milestone rows merge by maximum.
///
/// Returns `None` when the milestone column or every date column is missing.
pub fn percent_matrix(va: &Table, milestone_column: &str) -> Option<PercentCompleteMatrix> {
    let milestone_col = va.column_index(milestone_column)?;
    let by_month = month_columns(va, milestone_column);
    if by_month.is_empty() {
        return None;
    }
    let months: Vec<Month> = by_month.keys().copied().collect();

    // Raw month maxima, `None` where no column of the month is readable
    let mut raw: BTreeMap<MilestoneId, Vec<Option<f64>>> = BTreeMap::new();
    for row in va.rows() {
        let Some(key) = row.cell(milestone_col).as_key() else {
            continue;
        };
        let values = raw.entry(key).or_insert_with(|| vec![None; months.len()]);
        for (slot, cols) in values.iter_mut().zip(by_month.values()) {
            for &col in cols {
                if let Some(p) = percent_value(row.cell(col)) {
                    *slot = Some(slot.map_or(p, |cur| cur.max(p)));
                }
            }
        }
    }

    let rows: BTreeMap<MilestoneId, Vec<f64>> = raw
        .into_iter()
        .map(|(milestone, values)| {
            let mut running: Option<f64> = None;
            let effective: Vec<f64> = values
                .into_iter()
                .map(|value| match value {
                    Some(p) => {
                        let peak = running.map_or(p, |r| r.max(p));
                        running = Some(peak);
                        peak
                    }
                    None => 0.0,
                })
                .collect();
            (milestone, effective)
        })
        .collect();

    Some(PercentCompleteMatrix::new(months, rows))
}

/// Fuse PV budgets and VA progress into cumulative EV.
///
/// Returns `None` when either table is absent, the milestone column or PV
/// amount column is missing, VA has no date columns, no milestone appears
/// in both tables, or no month has positive EV.
pub fn fuse(
    pv_table: Option<&Table>,
    va_table: Option<&Table>,
    milestone_column: &str,
) -> Option<EarnedValue> {
    let (pv, va) = (pv_table?, va_table?);
    if !pv.has_column(milestone_column) || detect_amount_column(pv).is_none() {
        warn!(table = pv.name(), "PV table lacks milestone or amount column, EV unavailable");
        return None;
    }
    let Some(matrix) = percent_matrix(va, milestone_column) else {
        warn!(table = va.name(), "VA table lacks milestone or date columns, EV unavailable");
        return None;
    };

    let mut budgets: BTreeMap<MilestoneId, f64> = BTreeMap::new();
    for budget in milestone_budgets(pv, milestone_column) {
        *budgets.entry(budget.milestone_id).or_insert(0.0) += budget.planned_amount;
    }

    let common: BTreeSet<&str> = matrix
        .milestones()
        .filter(|m| budgets.contains_key(*m))
        .collect();
    if common.is_empty() {
        warn!("no milestone shared by PV and VA tables, EV unavailable");
        return None;
    }

    let mut series = CumulativeSeries::new();
    let mut contributions = BTreeMap::new();
    for &month in matrix.months() {
        let mut total = 0.0;
        let mut parts = Vec::new();
        for &milestone in &common {
            let percent = matrix.percent(milestone, month).unwrap_or(0.0);
            let planned_amount = budgets.get(milestone).copied().unwrap_or(0.0);
            let earned = planned_amount * percent;
            total += earned;
            if percent > 0.0 {
                debug!(%month, milestone, percent, planned_amount, earned, "EV contribution");
                parts.push(MilestoneContribution {
                    milestone_id: milestone.to_string(),
                    percent,
                    planned_amount,
                    earned,
                });
            }
        }
        debug!(%month, total, "EV month total");
        if total > 0.0 {
            series.insert(month, total);
            contributions.insert(month, parts);
        }
    }

    if series.is_empty() {
        warn!("earned value is zero for every month");
        return None;
    }
    info!(months = series.len(), milestones = common.len(), "earned value fused");
    Some(EarnedValue {
        series,
        contributions,
    })
}
