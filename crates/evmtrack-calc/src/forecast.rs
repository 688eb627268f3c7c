//! Manual forecast projection
//!
//! Project managers supply, per milestone, a projected completion date and
//! an EAC amount. The forecast path follows EV up to its last month, then
//! steps up at each projected month by the amounts of the entries due by
//! then.

use std::collections::{BTreeMap, BTreeSet};

use evmtrack_core::{
    ColumnConfig, CumulativeSeries, ForecastEntry, ForecastProjection, MilestoneId, Month, Table,
};
use tracing::{debug, info, warn};

/// How each forecast entry adds to the EV baseline
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ForecastAccumulation {
    /// Add the entry's EAC amount as is
    #[default]
    SumOfEac,
    /// Add the EAC amount net of what the milestone has already earned
    NetOfEarned(BTreeMap<MilestoneId, f64>),
}

impl ForecastAccumulation {
    fn contribution(&self, entry: &ForecastEntry) -> f64 {
        match self {
            ForecastAccumulation::SumOfEac => entry.eac_amount,
            ForecastAccumulation::NetOfEarned(earned) => {
                entry.eac_amount - earned.get(&entry.milestone_id).copied().unwrap_or(0.0)
            }
        }
    }
}

/// Read forecast entries from the forecast table.
///
/// Rows lacking a milestone, with an unreadable date, or with a non-empty
/// unreadable EAC are skipped; an empty EAC counts as 0. Returns `None`
/// when the table is absent, a configured column is missing, or no row
/// yields an entry.
pub fn forecast_entries(table: Option<&Table>, columns: &ColumnConfig) -> Option<Vec<ForecastEntry>> {
    let table = table?;
    let indices = (
        table.column_index(&columns.milestone),
        table.column_index(&columns.forecast_date),
        table.column_index(&columns.forecast_eac),
    );
    let (Some(milestone_col), Some(date_col), Some(eac_col)) = indices else {
        warn!(
            table = table.name(),
            columns = ?table.columns(),
            "forecast table lacks milestone, date or EAC column, forecast unavailable"
        );
        return None;
    };

    let mut entries = Vec::new();
    for row in table.rows() {
        let Some(milestone_id) = row.cell(milestone_col).as_key() else {
            continue;
        };
        let Some(date) = row.cell(date_col).as_date() else {
            debug!(milestone = %milestone_id, value = %row.cell(date_col), "forecast date unreadable, row skipped");
            continue;
        };
        let eac_cell = row.cell(eac_col);
        let eac_amount = if eac_cell.is_empty() {
            0.0
        } else if let Some(amount) = eac_cell.as_number() {
            amount
        } else {
            warn!(milestone = %milestone_id, value = %eac_cell, "forecast EAC unreadable, row skipped");
            continue;
        };
        entries.push(ForecastEntry {
            milestone_id,
            projected_month: Month::from_date(date),
            eac_amount,
        });
    }

    if entries.is_empty() {
        warn!(table = table.name(), "no usable forecast row");
        return None;
    }
    Some(entries)
}

/// Forecast path with literal EAC summation.
pub fn project_forecast(
    ev: Option<&CumulativeSeries>,
    entries: &[ForecastEntry],
) -> Option<ForecastProjection> {
    project_forecast_with(ev, entries, &ForecastAccumulation::SumOfEac)
}

/// Forecast path.
///
/// The last entry wins when a milestone appears more than once. Only the
/// projected months of the retained entries appear in the output:
///
/// - up to the last EV month, the EV value where EV is defined
/// - after it, `EV_final + Σ contribution(entry)` over entries due by then
///
/// Returns `None` when EV is absent or empty, there are no entries, or
/// no month ends up in the output.
pub fn project_forecast_with(
    ev: Option<&CumulativeSeries>,
    entries: &[ForecastEntry],
    accumulation: &ForecastAccumulation,
) -> Option<ForecastProjection> {
    let ev = ev.filter(|s| !s.is_empty())?;
    let (last_ev_month, ev_final) = ev.last()?;
    if entries.is_empty() {
        return None;
    }

    let by_milestone: BTreeMap<MilestoneId, ForecastEntry> = entries
        .iter()
        .map(|e| (e.milestone_id.clone(), e.clone()))
        .collect();
    let months: BTreeSet<Month> = by_milestone.values().map(|e| e.projected_month).collect();

    let mut series = CumulativeSeries::new();
    for month in months {
        if month <= last_ev_month {
            if let Some(value) = ev.get(month) {
                series.insert(month, value);
            }
            continue;
        }
        let due: f64 = by_milestone
            .values()
            .filter(|e| e.projected_month <= month)
            .map(|e| accumulation.contribution(e))
            .sum();
        series.insert(month, ev_final + due);
    }

    let (finish, eac) = series.last()?;
    info!(%finish, eac, milestones = by_milestone.len(), "manual forecast projected");
    Some(ForecastProjection {
        series,
        by_milestone,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmtrack_core::CellValue;
    use pretty_assertions::assert_eq;

    fn entry(id: &str, month: (i32, u32), eac: f64) -> ForecastEntry {
        ForecastEntry {
            milestone_id: id.to_string(),
            projected_month: Month::new(month.0, month.1),
            eac_amount: eac,
        }
    }

    fn ev() -> CumulativeSeries {
        [(Month::new(2025, 1), 10_000.0), (Month::new(2025, 3), 30_000.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn reads_entries_and_skips_bad_rows() {
        let table = Table::from_rows("forecast", &["Jalon", "Date projetée", "EAC (€)"], vec![
            vec!["J1".into(), "2025-05-15".into(), 50_000.0.into()],
            vec!["J2".into(), "plus tard".into(), 1.0.into()],
            vec![CellValue::Empty, "2025-06-01".into(), 1.0.into()],
            vec!["J3".into(), "30/06/2025".into(), CellValue::Empty],
        ]);
        let entries = forecast_entries(Some(&table), &ColumnConfig::default()).unwrap();
        assert_eq!(entries, vec![entry("J1", (2025, 5), 50_000.0), entry("J3", (2025, 6), 0.0)]);
    }

    #[test]
    fn unusable_table_gives_none() {
        let cols = ColumnConfig::default();
        assert!(forecast_entries(None, &cols).is_none());

        let missing = Table::from_rows("forecast", &["Jalon", "EAC (€)"], vec![]);
        assert!(forecast_entries(Some(&missing), &cols).is_none());

        let undated = Table::from_rows("forecast", &["Jalon", "Date projetée", "EAC (€)"], vec![
            vec!["J1".into(), "?".into(), 1.0.into()],
        ]);
        assert!(forecast_entries(Some(&undated), &cols).is_none());
    }

    #[test]
    fn sums_entries_due_after_last_ev_month() {
        let entries = vec![
            entry("J0", (2025, 3), 5_000.0),
            entry("J1", (2025, 5), 20_000.0),
            entry("J2", (2025, 8), 40_000.0),
        ];
        let f = project_forecast(Some(&ev()), &entries).unwrap();
        assert_eq!(
            f.series.iter().collect::<Vec<_>>(),
            vec![
                (Month::new(2025, 3), 30_000.0),
                (Month::new(2025, 5), 55_000.0),
                (Month::new(2025, 8), 95_000.0),
            ]
        );
    }

    #[test]
    fn past_months_without_ev_are_skipped() {
        let entries = vec![entry("J1", (2025, 2), 1_000.0), entry("J2", (2025, 4), 2_000.0)];
        let f = project_forecast(Some(&ev()), &entries).unwrap();
        assert_eq!(
            f.series.iter().collect::<Vec<_>>(),
            vec![(Month::new(2025, 4), 33_000.0)]
        );
    }

    #[test]
    fn last_entry_wins_per_milestone() {
        let entries = vec![entry("J1", (2025, 5), 1_000.0), entry("J1", (2025, 7), 9_000.0)];
        let f = project_forecast(Some(&ev()), &entries).unwrap();
        assert_eq!(f.by_milestone.len(), 1);
        assert_eq!(f.by_milestone["J1"].projected_month, Month::new(2025, 7));
        assert_eq!(
            f.series.iter().collect::<Vec<_>>(),
            vec![(Month::new(2025, 7), 39_000.0)]
        );
    }

    #[test]
    fn net_of_earned_subtracts_progress() {
        let earned = BTreeMap::from([("J1".to_string(), 4_000.0)]);
        let entries = vec![entry("J1", (2025, 6), 10_000.0), entry("J2", (2025, 6), 5_000.0)];
        let f = project_forecast_with(
            Some(&ev()),
            &entries,
            &ForecastAccumulation::NetOfEarned(earned),
        )
        .unwrap();
        assert_eq!(f.series.get(Month::new(2025, 6)), Some(41_000.0));
        assert_eq!(f.as_projection(30_000.0).unwrap().remaining, 11_000.0);
    }

    #[test]
    fn requires_ev_and_entries() {
        let entries = vec![entry("J1", (2025, 5), 1.0)];
        assert!(project_forecast(None, &entries).is_none());
        assert!(project_forecast(Some(&CumulativeSeries::new()), &entries).is_none());
        assert!(project_forecast(Some(&ev()), &[]).is_none());
    }
}
