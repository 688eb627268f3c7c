//! Month-by-month comparison of AC, PV and EV
//!
//! One row per month of the union of the three series. A series that has
//! no finite value for a month reads as 0 there. Variance columns only
//! exist when both PV and EV are available.


use evmtrack_core::{EvmAnalysis, Month, RenderError, Renderer};
use serde::Serialize;

use crate::group_thousands;

pub const COL_MONTH: &str = "Mois";
pub const COL_AC: &str = "AC (Dépenses réelles)";
pub const COL_PV: &str = "PV (Budget prévu)";
pub const COL_EV: &str = "EV (Valeur acquise)";
pub const COL_SV: &str = "SV (Schedule Variance)";
pub const COL_CV: &str = "CV (Cost Variance)";

/// One month of the comparison table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub month: Month,
    pub ac: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev: Option<f64>,
    /// EV - PV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sv: Option<f64>,
    /// EV - AC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv: Option<f64>,
}

impl ComparisonRow {
    /// Numeric cells in header order
    pub fn values(&self) -> Vec<f64> {
        std::iter::once(self.ac)
            .chain(self.pv)
            .chain(self.ev)
            .chain(self.sv)
            .chain(self.cv)
            .collect()
    }

    /// Whether any of AC, PV, EV is positive
    pub fn has_activity(&self) -> bool {
        self.ac > 0.0 || self.pv.is_some_and(|v| v > 0.0) || self.ev.is_some_and(|v| v > 0.0)
    }
}

/// AC/PV/EV comparison table
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComparisonTable {
    pub headers: Vec<&'static str>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn from_analysis(analysis: &EvmAnalysis) -> Self {
        let ac = &analysis.actual_cost;
        let pv = analysis.pv_series();
        let ev = analysis.ev_series();
        let with_variances = pv.is_some() && ev.is_some();

        let mut headers = vec![COL_MONTH, COL_AC];
        if pv.is_some() {
            headers.push(COL_PV);
        }
        if ev.is_some() {
            headers.push(COL_EV);
        }
        if with_variances {
            headers.extend([COL_SV, COL_CV]);
        }

        let mut months: Vec<Month> = ac.months().collect();
        months.extend(pv.into_iter().flat_map(|s| s.months()));
        months.extend(ev.into_iter().flat_map(|s| s.months()));
        months.sort_unstable();
        months.dedup();

        let value_at = |series: &evmtrack_core::CumulativeSeries, month: Month| {
            series.get(month).filter(|v| v.is_finite()).unwrap_or(0.0)
        };

        let rows = months
            .into_iter()
            .map(|month| {
                let ac_value = value_at(ac, month);
                let pv_value = pv.map(|s| value_at(s, month));
                let ev_value = ev.map(|s| value_at(s, month));
                let (sv, cv) = match (pv_value, ev_value) {
                    (Some(p), Some(e)) => (Some(e - p), Some(e - ac_value)),
                    _ => (None, None),
                };
                ComparisonRow {
                    month,
                    ac: ac_value,
                    pv: pv_value,
                    ev: ev_value,
                    sv,
                    cv,
                }
            })
            .collect();

        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows where any of AC, PV, EV is positive
    pub fn active_rows(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| r.has_activity())
    }

    /// Fixed-width console rendering
    pub fn to_text(&self) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.month.to_string())
                    .chain(row.values().into_iter().map(|v| group_thousands(v, 2)))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:>w$}"))
            .collect();
        out.push_str(&format!("{}\n", header.join("  ")));
        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{c:>w$}"))
                .collect();
            out.push_str(&format!("{}\n", line.join("  ")));
        }
        out
    }
}

/// CSV export of the comparison table
///
/// Values are written with full precision and a `.` decimal separator.
#[derive(Clone, Debug)]
pub struct CsvRenderer {
    pub delimiter: u8,
}

impl Default for CsvRenderer {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Renderer for CsvRenderer {
    type Output = String;

    fn render(&self, analysis: &EvmAnalysis) -> Result<String, RenderError> {
        let table = ComparisonTable::from_analysis(analysis);
        let csv_error = |e: csv::Error| RenderError::Format(format!("Failed to write CSV: {e}"));

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        writer.write_record(&table.headers).map_err(csv_error)?;
        for row in &table.rows {
            let record = std::iter::once(row.month.to_string())
                .chain(row.values().into_iter().map(|v| v.to_string()));
            writer.write_record(record).map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| RenderError::Format(format!("Failed to write CSV: {e}")))?;
        String::from_utf8(bytes).map_err(|e| RenderError::Format(format!("Invalid UTF-8: {}", e)))
    }
}
