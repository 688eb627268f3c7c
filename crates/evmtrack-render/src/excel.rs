//! Excel export of an earned value analysis
//!
//! Generates an XLSX workbook with:
//! - Tableau EVM: the month-by-month comparison table (first sheet, so the
//!   workbook reads back as the same table)
//! - Indicateurs: status at the last AC month
//! - Scénarios: one row per EAC projection with its variance at completion
//! - Jalons: per-milestone EV contributions at the last EV month
//!
//! With formulas enabled, variance columns and totals are live Excel
//! formulas over the value cells, so edited values propagate.
//!
//! ## Example Output Structure
//!
//! ```text
//! Sheet: Tableau EVM
//! | Mois    | AC (Dépenses réelles) | PV (Budget prévu) | EV (Valeur acquise) | SV    | CV    |
//! |---------|-----------------------|-------------------|---------------------|-------|-------|
//! | 2025-01 | 20 000,00 €           | 25 000,00 €       | 18 000,00 €         | =D2-C2| =D2-B2|
//!
//! Sheet: Scénarios
//! | Scénario                   | Formule         | EAC (€)   | Date Fin | VAC (€)  | Dépassement |
//! | Méthode CPI (Réaliste)     | BAC / CPI       | 112 500 € | 05/2025  | =$B$1-C3 | Oui         |
//! ```

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use evmtrack_core::{EvmAnalysis, RenderError, Renderer};

use crate::table::ComparisonTable;
use crate::{format_month, ordered_projections, scenario_label};

/// Excel workbook renderer
#[derive(Clone, Debug)]
pub struct ExcelRenderer {
    /// Currency symbol
    pub currency: String,
    /// Whether to write variances and totals as formulas (vs static values)
    pub use_formulas: bool,
    /// Whether to include the Indicateurs sheet
    pub include_summary: bool,
    /// Whether to include the Scénarios sheet
    pub include_scenarios: bool,
    /// Whether to include the Jalons sheet
    pub include_milestones: bool,
}

impl Default for ExcelRenderer {
    fn default() -> Self {
        Self {
            currency: "€".into(),
            use_formulas: true,
            include_summary: true,
            include_scenarios: true,
            include_milestones: true,
        }
    }
}

impl ExcelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set currency symbol
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Write computed values instead of formulas
    pub fn static_values(mut self) -> Self {
        self.use_formulas = false;
        self
    }

    /// Disable Indicateurs sheet
    pub fn no_summary(mut self) -> Self {
        self.include_summary = false;
        self
    }

    /// Disable Scénarios sheet
    pub fn no_scenarios(mut self) -> Self {
        self.include_scenarios = false;
        self
    }

    /// Disable Jalons sheet
    pub fn no_milestones(mut self) -> Self {
        self.include_milestones = false;
        self
    }

    /// Render to XLSX bytes without checking for data
    pub fn render_to_bytes(&self, analysis: &EvmAnalysis) -> Result<Vec<u8>, RenderError> {
        let mut workbook = Workbook::new();
        let formats = self.create_formats();

        self.add_table_sheet(&mut workbook, analysis, &formats)?;

        if self.include_summary {
            self.add_summary_sheet(&mut workbook, analysis, &formats)?;
        }

        if self.include_scenarios && !analysis.all_projections().is_empty() {
            self.add_scenarios_sheet(&mut workbook, analysis, &formats)?;
        }

        if self.include_milestones && analysis.earned_value.is_some() {
            self.add_milestones_sheet(&mut workbook, analysis, &formats)?;
        }

        let buffer = workbook
            .save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))?;

        Ok(buffer)
    }

    /// Create reusable formats
    fn create_formats(&self) -> ExcelFormats {
        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0x4472C4)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);

        let currency = Format::new()
            .set_num_format(&format!("#,##0.00 \"{}\"", self.currency))
            .set_border(FormatBorder::Thin);

        // Negative variances in red
        let variance = Format::new()
            .set_num_format(&format!("#,##0.00 \"{0}\";[Red]-#,##0.00 \"{0}\"", self.currency))
            .set_border(FormatBorder::Thin);

        let index = Format::new()
            .set_num_format("0.00")
            .set_border(FormatBorder::Thin);

        let percent = Format::new()
            .set_num_format("0.0%")
            .set_border(FormatBorder::Thin);

        let text = Format::new().set_border(FormatBorder::Thin);

        let total_row = Format::new()
            .set_bold()
            .set_background_color(0xE2EFDA)
            .set_border(FormatBorder::Thin);

        let total_currency = Format::new()
            .set_bold()
            .set_num_format(&format!("#,##0.00 \"{}\"", self.currency))
            .set_background_color(0xE2EFDA)
            .set_border(FormatBorder::Thin);

        ExcelFormats {
            header,
            currency,
            variance,
            index,
            percent,
            text,
            total_row,
            total_currency,
        }
    }

    /// Add the comparison table sheet
    fn add_table_sheet(
        &self,
        workbook: &mut Workbook,
        analysis: &EvmAnalysis,
        formats: &ExcelFormats,
    ) -> Result<(), RenderError> {
        let table = ComparisonTable::from_analysis(analysis);
        let sheet = workbook.add_worksheet();
        sheet
            .set_name("Tableau EVM")
            .map_err(|e| RenderError::Format(e.to_string()))?;

        for (col, header) in table.headers.iter().enumerate() {
            sheet
                .write_with_format(0, col as u16, *header, &formats.header)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        sheet.set_column_width(0, 10).ok();
        for col in 1..table.headers.len() as u16 {
            sheet.set_column_width(col, 24).ok();
        }
        sheet.set_freeze_panes(1, 0).ok();

        // Column letters of AC, PV and EV when present
        let ac_col = Self::col_to_letter(1);
        let pv_col = table.rows.first().and_then(|r| r.pv).map(|_| Self::col_to_letter(2));
        let ev_col = table
            .rows
            .first()
            .and_then(|r| r.ev)
            .map(|_| Self::col_to_letter(if pv_col.is_some() { 3 } else { 2 }));

        for (i, row) in table.rows.iter().enumerate() {
            let r = i as u32 + 1;
            sheet
                .write_with_format(r, 0, row.month.to_string(), &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;

            let mut col = 1u16;
            for value in [Some(row.ac), row.pv, row.ev].into_iter().flatten() {
                sheet
                    .write_with_format(r, col, value, &formats.currency)
                    .map_err(|e| RenderError::Format(e.to_string()))?;
                col += 1;
            }

            let (Some(sv), Some(cv)) = (row.sv, row.cv) else {
                continue;
            };
            match (&pv_col, &ev_col) {
                (Some(pv), Some(ev)) if self.use_formulas => {
                    let sv_formula = format!("={ev}{0}-{pv}{0}", r + 1);
                    let cv_formula = format!("={ev}{0}-{ac_col}{0}", r + 1);
                    sheet
                        .write_formula_with_format(r, col, sv_formula.as_str(), &formats.variance)
                        .map_err(|e| RenderError::Format(e.to_string()))?;
                    sheet
                        .write_formula_with_format(r, col + 1, cv_formula.as_str(), &formats.variance)
                        .map_err(|e| RenderError::Format(e.to_string()))?;
                }
                _ => {
                    sheet
                        .write_with_format(r, col, sv, &formats.variance)
                        .map_err(|e| RenderError::Format(e.to_string()))?;
                    sheet
                        .write_with_format(r, col + 1, cv, &formats.variance)
                        .map_err(|e| RenderError::Format(e.to_string()))?;
                }
            }
        }

        Ok(())
    }

    /// Add the status sheet
    fn add_summary_sheet(
        &self,
        workbook: &mut Workbook,
        analysis: &EvmAnalysis,
        formats: &ExcelFormats,
    ) -> Result<(), RenderError> {
        let Some(status) = analysis.status() else {
            return Ok(());
        };
        let sheet = workbook.add_worksheet();
        sheet
            .set_name("Indicateurs")
            .map_err(|e| RenderError::Format(e.to_string()))?;

        let title = format!("INDICATEURS AU {}", format_month(status.status_month));
        sheet.merge_range(0, 0, 0, 1, &title, &formats.header).ok();

        let amounts = [
            ("AC (Dépenses réelles)", status.ac),
            ("EV (Valeur acquise)", status.ev),
            ("PV (Budget prévu)", status.pv),
            ("BAC (Budget total)", status.bac),
            ("CV (EV - AC)", status.cv),
            ("SV (EV - PV)", status.sv),
        ];
        let mut row = 2u32;
        for (label, value) in amounts {
            sheet
                .write_with_format(row, 0, label, &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 1, value, &formats.variance)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            row += 1;
        }

        let ratios = [
            ("CPI (EV / AC)", status.cpi, &formats.index),
            ("SPI (EV / PV)", status.spi, &formats.index),
            ("Avancement (EV / BAC)", status.percent_complete, &formats.percent),
        ];
        for (label, value, format) in ratios {
            sheet
                .write_with_format(row, 0, label, &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            match value {
                Some(v) => sheet.write_with_format(row, 1, v, format),
                None => sheet.write_with_format(row, 1, "N/A", &formats.text),
            }
            .map_err(|e| RenderError::Format(e.to_string()))?;
            row += 1;
        }

        sheet
            .write_with_format(row, 0, "Statut", &formats.total_row)
            .map_err(|e| RenderError::Format(e.to_string()))?;
        sheet
            .write_with_format(row, 1, status.status_indicator().as_str(), &formats.total_row)
            .map_err(|e| RenderError::Format(e.to_string()))?;

        sheet.set_column_width(0, 26).ok();
        sheet.set_column_width(1, 20).ok();

        Ok(())
    }

    /// Add the EAC scenario sheet
    fn add_scenarios_sheet(
        &self,
        workbook: &mut Workbook,
        analysis: &EvmAnalysis,
        formats: &ExcelFormats,
    ) -> Result<(), RenderError> {
        let bac = analysis.bac();
        let sheet = workbook.add_worksheet();
        sheet
            .set_name("Scénarios")
            .map_err(|e| RenderError::Format(e.to_string()))?;

        sheet
            .write_with_format(0, 0, "BAC (Budget total)", &formats.total_row)
            .map_err(|e| RenderError::Format(e.to_string()))?;
        sheet
            .write_with_format(0, 1, bac, &formats.total_currency)
            .map_err(|e| RenderError::Format(e.to_string()))?;

        let headers = [
            "Scénario",
            "Formule",
            &format!("EAC ({})", self.currency),
            "Date Fin",
            &format!("VAC ({})", self.currency),
            "Dépassement",
        ];
        for (col, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(1, col as u16, *header, &formats.header)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        for (i, projection) in ordered_projections(analysis).iter().enumerate() {
            let row = i as u32 + 2;
            let vac = bac - projection.eac;
            sheet
                .write_with_format(row, 0, scenario_label(projection.method), &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 1, projection.method.formula(), &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 2, projection.eac, &formats.currency)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 3, format_month(projection.finish_month), &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;

            if self.use_formulas {
                let formula = format!("=$B$1-C{}", row + 1);
                sheet
                    .write_formula_with_format(row, 4, formula.as_str(), &formats.variance)
                    .map_err(|e| RenderError::Format(e.to_string()))?;
            } else {
                sheet
                    .write_with_format(row, 4, vac, &formats.variance)
                    .map_err(|e| RenderError::Format(e.to_string()))?;
            }
            sheet
                .write_with_format(row, 5, if vac < 0.0 { "Oui" } else { "Non" }, &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        sheet.set_column_width(0, 34).ok();
        sheet.set_column_width(1, 30).ok();
        sheet.set_column_width(2, 18).ok();
        sheet.set_column_width(3, 10).ok();
        sheet.set_column_width(4, 18).ok();
        sheet.set_column_width(5, 12).ok();

        Ok(())
    }

    /// Add the per-milestone EV sheet
    fn add_milestones_sheet(
        &self,
        workbook: &mut Workbook,
        analysis: &EvmAnalysis,
        formats: &ExcelFormats,
    ) -> Result<(), RenderError> {
        let Some((month, contributions)) = analysis
            .earned_value
            .as_ref()
            .and_then(|ev| ev.contributions.iter().next_back())
        else {
            return Ok(());
        };

        let sheet = workbook.add_worksheet();
        sheet
            .set_name("Jalons")
            .map_err(|e| RenderError::Format(e.to_string()))?;

        let headers = [
            "Jalon",
            "Avancement",
            &format!("Budget ({})", self.currency),
            &format!("EV au {} ({})", format_month(*month), self.currency),
        ];
        for (col, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(0, col as u16, *header, &formats.header)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        let mut row = 1u32;
        for contribution in contributions {
            sheet
                .write_with_format(row, 0, &contribution.milestone_id, &formats.text)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 1, contribution.percent, &formats.percent)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 2, contribution.planned_amount, &formats.currency)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            if self.use_formulas {
                let formula = format!("=B{0}*C{0}", row + 1);
                sheet
                    .write_formula_with_format(row, 3, formula.as_str(), &formats.currency)
                    .map_err(|e| RenderError::Format(e.to_string()))?;
            } else {
                sheet
                    .write_with_format(row, 3, contribution.earned, &formats.currency)
                    .map_err(|e| RenderError::Format(e.to_string()))?;
            }
            row += 1;
        }

        sheet
            .write_with_format(row, 0, "TOTAL", &formats.total_row)
            .map_err(|e| RenderError::Format(e.to_string()))?;
        sheet
            .write_with_format(row, 1, "", &formats.total_row)
            .map_err(|e| RenderError::Format(e.to_string()))?;
        if self.use_formulas && row > 1 {
            let sum_budget = format!("=SUM(C2:C{row})");
            sheet
                .write_formula_with_format(row, 2, sum_budget.as_str(), &formats.total_currency)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            let sum_earned = format!("=SUM(D2:D{row})");
            sheet
                .write_formula_with_format(row, 3, sum_earned.as_str(), &formats.total_currency)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        } else {
            let budget: f64 = contributions.iter().map(|c| c.planned_amount).sum();
            let earned: f64 = contributions.iter().map(|c| c.earned).sum();
            sheet
                .write_with_format(row, 2, budget, &formats.total_currency)
                .map_err(|e| RenderError::Format(e.to_string()))?;
            sheet
                .write_with_format(row, 3, earned, &formats.total_currency)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        sheet.set_column_width(0, 20).ok();
        sheet.set_column_width(1, 12).ok();
        sheet.set_column_width(2, 18).ok();
        sheet.set_column_width(3, 22).ok();

        Ok(())
    }

    /// Convert column index to Excel column letter (0 = A, 25 = Z, 26 = AA)
    fn col_to_letter(col: u16) -> String {
        let mut result = String::new();
        let mut n = u32::from(col) + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            result.insert(0, char::from(b'A' + rem as u8));
            n = (n - 1) / 26;
        }
        result
    }
}

/// Reusable Excel formats
struct ExcelFormats {
    header: Format,
    currency: Format,
    variance: Format,
    index: Format,
    percent: Format,
    text: Format,
    total_row: Format,
    total_currency: Format,
}

impl Renderer for ExcelRenderer {
    type Output = Vec<u8>;

    fn render(&self, analysis: &EvmAnalysis) -> Result<Vec<u8>, RenderError> {
        if analysis.actual_cost.is_empty() {
            return Err(RenderError::InvalidData("No actual cost to export".into()));
        }
        self.render_to_bytes(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmtrack_core::{CumulativeSeries, EarnedValue, MilestoneContribution, Month};
    use std::collections::BTreeMap;

    fn analysis() -> EvmAnalysis {
        let month = Month::new(2025, 2);
        EvmAnalysis {
            actual_cost: CumulativeSeries::from_monthly_totals([(month, 12_000.0)]),
            planned_value: None,
            earned_value: Some(EarnedValue {
                series: CumulativeSeries::from_monthly_totals([(month, 10_000.0)]),
                contributions: BTreeMap::from([(
                    month,
                    vec![MilestoneContribution {
                        milestone_id: "J1".into(),
                        percent: 0.5,
                        planned_amount: 20_000.0,
                        earned: 10_000.0,
                    }],
                )]),
            }),
            projections: None,
            forecast: None,
        }
    }

    #[test]
    fn excel_renderer_creation() {
        let renderer = ExcelRenderer::new();
        assert_eq!(renderer.currency, "€");
        assert!(renderer.use_formulas);
        assert!(renderer.include_summary);
        assert!(renderer.include_scenarios);
        assert!(renderer.include_milestones);
    }

    #[test]
    fn excel_renderer_with_options() {
        let renderer = ExcelRenderer::new()
            .currency("CHF")
            .static_values()
            .no_summary()
            .no_scenarios()
            .no_milestones();
        assert_eq!(renderer.currency, "CHF");
        assert!(!renderer.use_formulas);
        assert!(!renderer.include_summary);
        assert!(!renderer.include_scenarios);
        assert!(!renderer.include_milestones);
    }

    #[test]
    fn excel_produces_valid_output() {
        let bytes = ExcelRenderer::new().render(&analysis()).unwrap();
        // XLSX files start with PK (ZIP header)
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..2], b"PK");

        let bytes = ExcelRenderer::new().static_values().render(&analysis()).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn excel_without_actual_cost_fails() {
        let mut empty = analysis();
        empty.actual_cost = CumulativeSeries::new();
        assert!(matches!(
            ExcelRenderer::new().render(&empty),
            Err(RenderError::InvalidData(_))
        ));
    }

    #[test]
    fn col_to_letter_works() {
        assert_eq!(ExcelRenderer::col_to_letter(0), "A");
        assert_eq!(ExcelRenderer::col_to_letter(25), "Z");
        assert_eq!(ExcelRenderer::col_to_letter(26), "AA");
        assert_eq!(ExcelRenderer::col_to_letter(51), "AZ");
    }
}
