//! Integration tests for rendering a computed analysis
//!
//! The analysis comes from `EvmCalculator` over in-memory tables; exports
//! are written to a temporary directory and read back through evmtrack-io.

use chrono::NaiveDate;
use evmtrack_calc::EvmCalculator;
use evmtrack_core::{CellValue, EvmAnalysis, EvmEngine, EvmInputs, Renderer, Table};
use evmtrack_io::read_table;
use evmtrack_render::{
    chart_path, ChartKind, ComparisonTable, CsvRenderer, ExcelRenderer, JsonRenderer,
    MarkdownReportRenderer, SvgRenderer, TextRenderer,
};
use pretty_assertions::assert_eq;

fn analysis() -> EvmAnalysis {
    let spend = Table::from_rows(
        "spend",
        &["Date de la pièce", "Val./Devise objet"],
        vec![
            vec!["15/01/2025".into(), CellValue::Number(30_000.0)],
            vec!["12/02/2025".into(), CellValue::Number(25_000.0)],
            vec!["20/03/2025".into(), CellValue::Number(45_000.0)],
        ],
    );
    let pv = Table::from_rows("pv", &["Jalon", "Date", "Montant"], vec![
        vec!["J1".into(), "2025-01-31".into(), CellValue::Number(50_000.0)],
        vec!["J2".into(), "2025-03-31".into(), CellValue::Number(100_000.0)],
        vec!["J3".into(), "2025-06-30".into(), CellValue::Number(150_000.0)],
    ]);
    let va = Table::from_rows(
        "va",
        &["Jalon", "2025-01-31", "2025-02-28", "2025-03-31"],
        vec![
            vec!["J1".into(), 0.5.into(), 0.3.into(), 1.0.into()],
            vec!["J2".into(), 0.0.into(), 0.2.into(), 0.4.into()],
        ],
    );
    let forecast = Table::from_rows("forecast", &["Jalon", "Date projetée", "EAC (€)"], vec![
        vec!["J2".into(), "2025-05-15".into(), CellValue::Number(110_000.0)],
        vec!["J3".into(), "2025-09-30".into(), CellValue::Number(170_000.0)],
    ]);

    let inputs = EvmInputs::new(spend)
        .planned_value(Some(pv))
        .progress(Some(va))
        .forecast(Some(forecast));
    EvmCalculator::new().analyze(&inputs).unwrap()
}

#[test]
fn comparison_table_spans_all_series() {
    let table = ComparisonTable::from_analysis(&analysis());
    assert_eq!(table.headers.len(), 6);
    // AC Jan-Mar, PV Jan-Jun
    assert_eq!(table.rows.len(), 6);
    let march = &table.rows[2];
    assert_eq!(march.values(), vec![100_000.0, 150_000.0, 90_000.0, -60_000.0, -10_000.0]);
}

#[test]
fn csv_export_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tableau_evm.csv");
    std::fs::write(&path, CsvRenderer::new().render(&analysis()).unwrap()).unwrap();

    let table = read_table(&path).unwrap();
    assert_eq!(
        table.columns(),
        &[
            "Mois",
            "AC (Dépenses réelles)",
            "PV (Budget prévu)",
            "EV (Valeur acquise)",
            "SV (Schedule Variance)",
            "CV (Cost Variance)",
        ]
    );
    let feb = table.rows().nth(1).unwrap();
    assert_eq!(feb.get("Mois"), Some(&CellValue::from("2025-02")));
    assert_eq!(feb.get("EV (Valeur acquise)").and_then(CellValue::as_number), Some(45_000.0));
}

#[test]
fn excel_export_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tableau_evm.xlsx");
    let bytes = ExcelRenderer::new().static_values().render(&analysis()).unwrap();
    std::fs::write(&path, bytes).unwrap();

    // First sheet is the comparison table
    let table = read_table(&path).unwrap();
    assert_eq!(table.row_count(), 6);
    let march = table.rows().nth(2).unwrap();
    assert_eq!(march.get("AC (Dépenses réelles)").and_then(CellValue::as_number), Some(100_000.0));
    assert_eq!(march.get("CV (Cost Variance)").and_then(CellValue::as_number), Some(-10_000.0));
}

#[test]
fn charts_for_every_scenario() {
    let analysis = analysis();
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("analyse_evm.svg");

    for kind in [ChartKind::Realised, ChartKind::Projections] {
        let svg = SvgRenderer::new().kind(kind).render(&analysis).unwrap();
        std::fs::write(chart_path(&base, kind), svg).unwrap();
    }

    let realised = std::fs::read_to_string(dir.path().join("analyse_evm_realise.svg")).unwrap();
    assert!(realised.contains("EV (Earned Value - Valeur acquise)"));
    assert!(realised.contains("J3"));

    let projections = std::fs::read_to_string(dir.path().join("analyse_evm_projections.svg")).unwrap();
    for label in [
        "EAC méthode CPI (réaliste)",
        "EAC méthode CPI×SPI (pessimiste)",
        "EAC reste à plan (optimiste) (310 k€)",
        "EAC forecast manuel (370 k€)",
    ] {
        assert!(projections.contains(label), "missing {label}");
    }
}

#[test]
fn report_lists_all_scenarios() {
    let report = MarkdownReportRenderer::new()
        .date(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap())
        .realised_chart("analyse_evm_realise.svg")
        .projections_chart("analyse_evm_projections.svg")
        .render(&analysis())
        .unwrap();

    let order: Vec<usize> = [
        "| Méthode Reste à Plan (Optimiste) | 310 000,00 |",
        "| Méthode CPI (Réaliste) |",
        "| Méthode CPI×SPI (Pessimiste) |",
        "| Forecast Manuel | 370 000,00 | 09/2025 |",
    ]
    .iter()
    .map(|row| report.find(row).unwrap())
    .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
    assert!(report.contains("Budget Total (BAC): 300 000,00 €"));
    assert!(report.contains("Au mois de 2025-03:"));
    assert!(report.contains("3. Revoir la planification"));
}

#[test]
fn console_and_json_outputs() {
    let analysis = analysis();
    let text = TextRenderer.render(&analysis).unwrap();
    assert!(text.contains("=== PROJECTIONS À TERMINAISON ==="));
    assert!(text.contains("FORECAST"));

    let json = JsonRenderer.render(&analysis).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["earned_value"]["series"]["2025-03"], 90_000.0);
    assert_eq!(value["scenarios"]["RESTE_PLAN"]["eac"], 310_000.0);
}
