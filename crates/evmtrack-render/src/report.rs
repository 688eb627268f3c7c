//! Narrative EVM report in Markdown
//!
//! Sections:
//! 1. EVM definitions
//! 2. Realised to date: value table, chart, current indicators and their
//!    interpretation
//! 3. Projections at completion: scenario table, chart, range and
//!    deviation against BAC
//! 4. Conclusion and recommendations
//!
//! Charts are linked, not embedded; pass their paths relative to the
//! report location.


use chrono::NaiveDate;
use evmtrack_core::{EvmAnalysis, EvmStatus, Projection, ProjectionMethod, RenderError, Renderer};

use crate::table::ComparisonTable;
use crate::{format_euros, format_month, group_thousands, scenario_label};

/// Scenario order in the report, from optimistic to manual
const REPORT_ORDER: [ProjectionMethod; 4] = [
    ProjectionMethod::RestePlan,
    ProjectionMethod::Cpi,
    ProjectionMethod::CpiSpi,
    ProjectionMethod::Forecast,
];

const DEFINITIONS: [(&str, &str); 8] = [
    (
        "PV (Planned Value)",
        "Budget prévu ou valeur planifiée. Représente le coût budgété du travail prévu à une date donnée.",
    ),
    (
        "AC (Actual Cost)",
        "Coût réel ou dépenses réelles. Représente le coût réel du travail effectué à une date donnée.",
    ),
    (
        "EV (Earned Value)",
        "Valeur acquise ou valeur gagnée. Représente la valeur du travail réellement accompli à une date donnée, mesurée en termes de budget.",
    ),
    (
        "EAC (Estimate at Completion)",
        "Estimation à terminaison. Projection du coût total du projet à son achèvement.",
    ),
    (
        "CV (Cost Variance)",
        "Écart de coût. CV = EV - AC. Un CV négatif indique un dépassement de coût.",
    ),
    (
        "SV (Schedule Variance)",
        "Écart de délai. SV = EV - PV. Un SV négatif indique un retard sur le planning.",
    ),
    (
        "CPI (Cost Performance Index)",
        "Indice de performance des coûts. CPI = EV / AC. Un CPI < 1 indique un dépassement de coût.",
    ),
    (
        "SPI (Schedule Performance Index)",
        "Indice de performance des délais. SPI = EV / PV. Un SPI < 1 indique un retard.",
    ),
];

/// Markdown report renderer
#[derive(Clone, Debug, Default)]
pub struct MarkdownReportRenderer {
    /// Report date (today when unset)
    pub date: Option<NaiveDate>,
    /// Link to the realised chart
    pub realised_chart: Option<String>,
    /// Link to the projection chart
    pub projections_chart: Option<String>,
}

impl MarkdownReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the report date
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Link the realised chart
    pub fn realised_chart(mut self, path: impl Into<String>) -> Self {
        self.realised_chart = Some(path.into());
        self
    }

    /// Link the projection chart
    pub fn projections_chart(mut self, path: impl Into<String>) -> Self {
        self.projections_chart = Some(path.into());
        self
    }

    fn write_title(&self, out: &mut String) {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        out.push_str("# Rapport d'Analyse EVM\n\n");
        out.push_str(&format!("*Date du rapport: {}*\n\n", date.format("%d/%m/%Y")));
    }

    fn write_definitions(out: &mut String) {
        out.push_str("## 1. Définitions EVM\n\n");
        for (term, definition) in DEFINITIONS {
            out.push_str(&format!("- **{term}**: {definition}\n"));
        }
        out.push('\n');
    }

    fn write_chart(out: &mut String, path: Option<&str>, caption: &str) {
        match path {
            Some(path) => {
                out.push_str(&format!("![{caption}]({path})\n\n"));
                out.push_str(&format!("*{caption}*\n\n"));
            }
            None => {
                out.push_str("*Graphique non disponible.*\n\n");
            }
        }
    }

    fn write_realised(&self, out: &mut String, analysis: &EvmAnalysis, status: &EvmStatus) {
        out.push_str("## 2. Réalisé à Date\n\n");
        out.push_str("### 2.1 Tableau des Valeurs\n\n");

        let table = ComparisonTable::from_analysis(analysis);
        out.push_str(&format!("| {} |\n", table.headers.join(" | ")));
        out.push_str(&format!("|{}\n", table.headers.iter().map(|_| "---:|").collect::<String>()));
        for row in table.active_rows() {
            let values: Vec<String> = row.values().into_iter().map(|v| group_thousands(v, 2)).collect();
            out.push_str(&format!("| {} | {} |\n", row.month, values.join(" | ")));
        }
        out.push('\n');

        out.push_str("### 2.2 Graphique du Réalisé\n\n");
        Self::write_chart(
            out,
            self.realised_chart.as_deref(),
            "Figure 1: Courbes du réalisé - AC, PV, EV et variances",
        );

        out.push_str("### 2.3 Indicateurs de Performance Actuels\n\n");
        out.push_str(&format!("Au mois de {}:\n\n", status.status_month));
        out.push_str(&format!("- Dépenses Réelles (AC): {}\n", format_euros(status.ac)));
        out.push_str(&format!("- Valeur Acquise (EV): {}\n", format_euros(status.ev)));
        out.push_str(&format!("- Valeur Planifiée (PV): {}\n\n", format_euros(status.pv)));
        out.push_str(&format!("- Cost Variance (CV): {}\n", format_euros(status.cv)));
        out.push_str(&format!("- Schedule Variance (SV): {}\n", format_euros(status.sv)));
        out.push_str(&format!("- Cost Performance Index (CPI): {}\n", index_text(status.cpi)));
        out.push_str(&format!(
            "- Schedule Performance Index (SPI): {}\n\n",
            index_text(status.spi)
        ));

        out.push_str("**Interprétation:**\n\n");
        if status.cv < 0.0 {
            out.push_str(&format!(
                "- ⚠ Le projet présente un dépassement de coût de {} à date.\n",
                format_euros(status.cv.abs())
            ));
        } else {
            out.push_str(&format!(
                "- ✓ Le projet est sous budget avec une économie de {} à date.\n",
                format_euros(status.cv)
            ));
        }
        if status.sv < 0.0 {
            out.push_str(&format!(
                "- ⚠ Le projet présente un retard équivalent à {} de travail non réalisé.\n",
                format_euros(status.sv.abs())
            ));
        } else {
            out.push_str(&format!(
                "- ✓ Le projet est en avance avec {} de travail supplémentaire réalisé.\n",
                format_euros(status.sv)
            ));
        }
        match status.cpi {
            Some(cpi) => {
                let mark = if cpi < 1.0 { "⚠" } else { "✓" };
                out.push_str(&format!(
                    "- {mark} L'efficacité des coûts est de {:.1}% (chaque euro dépensé génère {:.2} € de valeur).\n",
                    cpi * 100.0,
                    cpi
                ));
            }
            None => {
                out.push_str("- ℹ L'efficacité des coûts n'est pas calculable (aucune dépense à date).\n");
            }
        }
        out.push('\n');
    }

    fn write_projections(&self, out: &mut String, scenarios: &[Projection], bac: f64) {
        out.push_str("## 3. Projections à Terminaison\n\n");
        out.push_str("### 3.1 Tableau Comparatif des Scénarios\n\n");
        if scenarios.is_empty() {
            out.push_str("Aucune projection disponible (valeur acquise absente).\n\n");
        } else {
            out.push_str("| Scénario | EAC (€) | Date Fin | VAC (€) | Dépassement |\n");
            out.push_str("|---|---:|---|---:|---|\n");
            for p in scenarios {
                let vac = bac - p.eac;
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    scenario_label(p.method),
                    group_thousands(p.eac, 2),
                    format_month(p.finish_month),
                    group_thousands(vac, 2),
                    if vac < 0.0 { "Oui" } else { "Non" }
                ));
            }
            out.push('\n');
        }

        out.push_str("### 3.2 Graphique des Projections\n\n");
        Self::write_chart(
            out,
            self.projections_chart.as_deref(),
            "Figure 2: Projections à terminaison - Différents scénarios EAC",
        );

        out.push_str("### 3.3 Analyse des Scénarios\n\n");
        if scenarios.is_empty() {
            out.push_str("Aucun scénario à analyser.\n\n");
            return;
        }
        out.push_str(&format!("Budget Total (BAC): {}\n\n", format_euros(bac)));
        out.push_str("Fourchette des projections:\n\n");
        for p in scenarios {
            out.push_str(&format!("- {}: {}\n", scenario_label(p.method), format_euros(p.eac)));
        }
        out.push('\n');

        out.push_str("Écarts par rapport au budget:\n\n");
        for p in scenarios {
            let gap = p.eac - bac;
            let sign = if gap >= 0.0 { "+" } else { "" };
            let share = if bac > 0.0 {
                format!(" ({:+.1}%)", gap / bac * 100.0)
            } else {
                String::new()
            };
            out.push_str(&format!(
                "- {}: {sign}{}{share}\n",
                scenario_label(p.method),
                format_euros(gap)
            ));
        }
        out.push('\n');
    }

    fn write_conclusion(out: &mut String, status: &EvmStatus, scenarios: &[Projection], bac: f64) {
        out.push_str("## 4. Conclusion et Recommandations\n\n");
        out.push_str("### 4.1 Synthèse\n\n");

        out.push_str("Performance actuelle:\n\n");
        let cpi_line = match status.cpi {
            Some(v) if v < 0.9 => "⚠ Le CPI est très faible, indiquant une efficacité des coûts préoccupante. Actions correctives urgentes recommandées.",
            Some(v) if v < 1.0 => "⚠ Le CPI est inférieur à 1, indiquant un dépassement de coût. Une surveillance étroite est nécessaire.",
            Some(_) => "✓ Le CPI est supérieur à 1, indiquant une bonne efficacité des coûts.",
            None => "ℹ Le CPI n'est pas calculable (aucune dépense à date).",
        };
        let spi_line = match status.spi {
            Some(v) if v < 0.9 => "⚠ Le SPI est très faible, indiquant un retard significatif. Révision du planning recommandée.",
            Some(v) if v < 1.0 => "⚠ Le SPI est inférieur à 1, indiquant un retard. Des mesures d'accélération devraient être envisagées.",
            Some(_) => "✓ Le SPI est supérieur à 1, indiquant une bonne performance sur les délais.",
            None => "ℹ Le SPI n'est pas calculable (aucune valeur planifiée au mois courant).",
        };
        out.push_str(&format!("- {cpi_line}\n"));
        out.push_str(&format!("- {spi_line}\n\n"));

        if !scenarios.is_empty() {
            out.push_str("Projections à terminaison:\n\n");
            let over = scenarios.iter().filter(|p| p.eac > bac).count();
            let verdict = if over == scenarios.len() {
                "⚠ Tous les scénarios prévoient un dépassement de budget. Des mesures correctives sont nécessaires."
            } else if over > 0 {
                "⚠ Certains scénarios prévoient un dépassement de budget. Une vigilance accrue est requise."
            } else {
                "✓ Les projections indiquent un achèvement sous budget dans tous les scénarios."
            };
            out.push_str(&format!("- {verdict}\n"));

            if bac > 0.0 {
                let (min, max) = scenarios
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.eac), hi.max(p.eac)));
                let spread = (max - min) / bac * 100.0;
                if spread > 10.0 {
                    out.push_str(&format!(
                        "- ⚠ L'écart entre scénarios est important ({spread:.1}% du budget), reflétant une forte incertitude.\n"
                    ));
                } else if spread > 5.0 {
                    out.push_str(&format!(
                        "- ℹ L'écart entre scénarios est modéré ({spread:.1}% du budget).\n"
                    ));
                } else {
                    out.push_str(&format!(
                        "- ✓ L'écart entre scénarios est faible ({spread:.1}% du budget), indiquant une bonne prévisibilité.\n"
                    ));
                }
            }
            out.push('\n');
        }

        out.push_str("### 4.2 Recommandations\n\n");
        let cost_issue = status.cpi.is_some_and(|v| v < 1.0);
        let schedule_issue = status.spi.is_some_and(|v| v < 1.0);
        let overrun = scenarios.iter().any(|p| bac - p.eac < 0.0);

        if cost_issue || schedule_issue || overrun {
            out.push_str("Actions recommandées:\n\n");
            if cost_issue {
                out.push_str("1. Analyser les causes du dépassement de coût et identifier les postes problématiques\n");
                out.push_str("2. Mettre en place des mesures de réduction des coûts ou réviser le scope\n");
            }
            if schedule_issue {
                out.push_str("3. Revoir la planification et identifier les leviers d'accélération\n");
                out.push_str("4. Augmenter les ressources si nécessaire pour rattraper le retard\n");
            }
            if overrun {
                out.push_str("5. Prévoir un budget de contingence pour couvrir le dépassement projeté\n");
                out.push_str("6. Communiquer proactivement avec les parties prenantes sur les risques financiers\n");
            }
        } else {
            out.push_str("Le projet montre de bonnes performances. Recommandations:\n\n");
            out.push_str("- Maintenir les pratiques actuelles de gestion\n");
            out.push_str("- Continuer la surveillance régulière des indicateurs\n");
            out.push_str("- Capitaliser sur les bonnes pratiques pour les projets futurs\n");
        }
    }
}

fn index_text(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

/// Projections in report order
fn report_scenarios(analysis: &EvmAnalysis) -> Vec<Projection> {
    let mut all = analysis.all_projections();
    all.sort_by_key(|p| REPORT_ORDER.iter().position(|m| *m == p.method));
    all
}

impl Renderer for MarkdownReportRenderer {
    type Output = String;

    fn render(&self, analysis: &EvmAnalysis) -> Result<String, RenderError> {
        let status = analysis
            .status()
            .ok_or_else(|| RenderError::InvalidData("No actual cost to report".into()))?;
        let scenarios = report_scenarios(analysis);
        let bac = analysis.bac();

        let mut out = String::new();
        self.write_title(&mut out);
        Self::write_definitions(&mut out);
        self.write_realised(&mut out, analysis, &status);
        self.write_projections(&mut out, &scenarios, bac);
        Self::write_conclusion(&mut out, &status, &scenarios, bac);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmtrack_core::{CumulativeSeries, EarnedValue, ForecastProjection, Month, PlannedValue};
    use std::collections::BTreeMap;

    fn series(points: &[(u32, f64)]) -> CumulativeSeries {
        points.iter().map(|(m, v)| (Month::new(2025, *m), *v)).collect()
    }

    fn analysis(ev_final: f64) -> EvmAnalysis {
        EvmAnalysis {
            actual_cost: series(&[(1, 10_000.0), (2, 20_000.0)]),
            planned_value: Some(PlannedValue {
                series: series(&[(1, 0.0), (2, 20_000.0), (3, 100_000.0)]),
                milestones: BTreeMap::new(),
                date_column: "Date".into(),
                amount_column: "Montant".into(),
                interpolated_months: 0,
            }),
            earned_value: Some(EarnedValue {
                series: series(&[(2, ev_final)]),
                contributions: BTreeMap::new(),
            }),
            projections: None,
            forecast: Some(ForecastProjection {
                series: series(&[(2, ev_final), (5, 130_000.0)]),
                by_milestone: BTreeMap::new(),
            }),
        }
    }

    fn render(analysis: &EvmAnalysis) -> String {
        MarkdownReportRenderer::new()
            .date(NaiveDate::from_ymd_opt(2025, 3, 4).unwrap())
            .realised_chart("analyse_evm_realise.svg")
            .render(analysis)
            .unwrap()
    }

    #[test]
    fn report_sections_in_order() {
        let report = render(&analysis(16_000.0));
        let positions: Vec<usize> = [
            "# Rapport d'Analyse EVM",
            "## 1. Définitions EVM",
            "## 2. Réalisé à Date",
            "## 3. Projections à Terminaison",
            "## 4. Conclusion et Recommandations",
        ]
        .iter()
        .map(|h| report.find(h).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(report.contains("*Date du rapport: 04/03/2025*"));
        assert_eq!(report.matches("\n- **").count(), 8);
    }

    #[test]
    fn over_budget_interpretation() {
        let report = render(&analysis(16_000.0));
        assert!(report.contains("dépassement de coût de 4 000,00 € à date"));
        assert!(report.contains("retard équivalent à 4 000,00 €"));
        assert!(report.contains("L'efficacité des coûts est de 80.0%"));
        assert!(report.contains("Le CPI est très faible"));
        assert!(report.contains("Le SPI est très faible"));
        // Forecast 130k over a 100k BAC
        assert!(report.contains("| Forecast Manuel | 130 000,00 | 05/2025 | -30 000,00 | Oui |"));
        assert!(report.contains("- Forecast Manuel: +30 000,00 € (+30.0%)"));
        assert!(report.contains("Tous les scénarios prévoient un dépassement"));
        assert!(report.contains("1. Analyser les causes"));
        assert!(report.contains("5. Prévoir un budget de contingence"));
    }

    #[test]
    fn good_performance_recommendations() {
        let mut good = analysis(24_000.0);
        good.forecast = Some(ForecastProjection {
            series: series(&[(2, 24_000.0), (4, 95_000.0)]),
            by_milestone: BTreeMap::new(),
        });
        let report = render(&good);
        assert!(report.contains("sous budget avec une économie de 4 000,00 €"));
        assert!(report.contains("Le CPI est supérieur à 1"));
        assert!(report.contains("achèvement sous budget dans tous les scénarios"));
        assert!(report.contains("L'écart entre scénarios est faible (0.0% du budget)"));
        assert!(report.contains("Le projet montre de bonnes performances"));
        assert!(!report.contains("Actions recommandées"));
    }

    #[test]
    fn table_keeps_active_months_only() {
        let mut quiet = analysis(16_000.0);
        quiet.actual_cost = series(&[(1, 0.0), (2, 20_000.0)]);
        let report = render(&quiet);
        assert!(!report.contains("| 2025-01 |"));
        assert!(report.contains("| 2025-02 | 20 000,00 | 20 000,00 | 16 000,00 | -4 000,00 | -4 000,00 |"));
    }

    #[test]
    fn chart_links() {
        let report = render(&analysis(16_000.0));
        assert!(report.contains("](analyse_evm_realise.svg)"));
        assert!(report.contains("*Graphique non disponible.*"));
    }

    #[test]
    fn report_needs_actual_cost() {
        let mut empty = analysis(16_000.0);
        empty.actual_cost = CumulativeSeries::new();
        assert!(MarkdownReportRenderer::new().render(&empty).is_err());
    }
}
