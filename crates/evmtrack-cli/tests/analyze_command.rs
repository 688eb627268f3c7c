//! End-to-end tests of the evmtrack binary
//!
//! ## Exit Code Contract
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success, including runs without optional inputs |
//! | 1 | Missing spend file or misconfigured column |

use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SPEND: &str = "Date de la pièce;Val./Devise objet\n\
15/01/2025;30 000\n\
12/02/2025;25 000\n\
20/03/2025;45 000,00\n";

const PV: &str = "Jalon;Date;Montant\n\
J1;2025-01-31;50000\n\
J2;2025-03-31;100000\n\
J3;2025-06-30;150000\n";

const VA: &str = "Jalon;2025-01-31;2025-02-28;2025-03-31\n\
J1;50 %;30 %;100 %\n\
J2;0;0,2;0,4\n";

const FORECAST: &str = "Jalon;Date projetée;EAC (€)\n\
J2;15/05/2025;110 000\n\
J3;30/09/2025;170 000\n";

/// Temporary project directory with the four inputs as CSV
fn project(with_optional: bool) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("spend.csv"), SPEND).unwrap();
    if with_optional {
        std::fs::write(dir.path().join("pv.csv"), PV).unwrap();
        std::fs::write(dir.path().join("va.csv"), VA).unwrap();
        std::fs::write(dir.path().join("forecast.csv"), FORECAST).unwrap();
    }
    dir
}

fn evmtrack(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_evmtrack"))
        .current_dir(dir)
        .env_remove("EVMTRACK_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to execute evmtrack")
}

fn analyze(dir: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "analyze", "--spend", "spend.csv", "--pv", "pv.csv", "--va", "va.csv", "--forecast", "forecast.csv",
    ];
    args.extend_from_slice(extra);
    evmtrack(dir, &args)
}

#[test]
fn full_run_with_report() {
    let dir = project(true);
    let out = analyze(dir.path(), &["--report", "rapport.md", "--json", "analyse.json"]);
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("=== Analyse EVM ==="));
    assert!(stdout.contains("RESTE_PLAN"));
    assert!(stdout.contains("✓ Analyse EVM terminée"));

    let root = dir.path();
    assert!(root.join("analyse_evm_realise.svg").exists());
    assert!(root.join("analyse_evm_projections.svg").exists());
    // Table exports are intermediate when a report is written
    assert!(!root.join("tableau_evm.csv").exists());
    assert!(!root.join("tableau_evm.xlsx").exists());

    let report = std::fs::read_to_string(root.join("rapport.md")).unwrap();
    assert!(report.contains("](analyse_evm_realise.svg)"));
    assert!(report.contains("| Forecast Manuel | 370 000,00 | 09/2025 |"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("analyse.json")).unwrap()).unwrap();
    assert_eq!(json["actual_cost"]["2025-03"], 100_000.0);
    assert_eq!(json["earned_value"]["series"]["2025-03"], 90_000.0);
    assert_eq!(json["scenarios"]["RESTE_PLAN"]["eac"], 310_000.0);
}

#[test]
fn keep_intermediate_tables() {
    let dir = project(true);
    let out = analyze(dir.path(), &["--report", "rapport.md", "--keep-intermediate", "--table", "out/evm"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(dir.path().join("out/evm.csv").exists());
    assert!(dir.path().join("out/evm.xlsx").exists());
}

#[test]
fn tables_without_report() {
    let dir = project(true);
    let out = analyze(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(0));

    let csv = std::fs::read_to_string(dir.path().join("tableau_evm.csv")).unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(
        header,
        "Mois,AC (Dépenses réelles),PV (Budget prévu),EV (Valeur acquise),SV (Schedule Variance),CV (Cost Variance)"
    );
    assert!(dir.path().join("tableau_evm.xlsx").exists());
}

#[test]
fn spend_only_run_degrades() {
    let dir = project(false);
    let out = evmtrack(dir.path(), &["analyze", "--spend", "spend.csv"]);
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("100 000,00 €"));
    assert!(!stdout.contains("PROJECTIONS À TERMINAISON"));
    assert!(dir.path().join("analyse_evm_realise.svg").exists());
    assert!(!dir.path().join("analyse_evm_projections.svg").exists());

    let csv = std::fs::read_to_string(dir.path().join("tableau_evm.csv")).unwrap();
    assert!(csv.starts_with("Mois,AC (Dépenses réelles)\n"));
}

#[test]
fn missing_spend_file_exits_1() {
    let dir = project(false);
    let out = evmtrack(dir.path(), &["analyze"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("EXPORT.XLSX"), "{stderr}");
}

#[test]
fn misconfigured_column_exits_1() {
    let dir = project(false);
    std::fs::write(dir.path().join("spend.csv"), "Date;Montant\n15/01/2025;10\n").unwrap();
    let out = evmtrack(dir.path(), &["analyze", "--spend", "spend.csv"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Date de la pièce"), "{stderr}");
}

#[test]
fn config_file_renames_columns() {
    let dir = project(false);
    std::fs::write(dir.path().join("spend.csv"), "Date;Montant\n15/01/2025;10\n20/02/2025;5\n").unwrap();
    std::fs::write(
        dir.path().join("evmtrack.toml"),
        "[inputs]\nspend = \"spend.csv\"\n\n[columns]\nspend_date = \"Date\"\nspend_amount = \"Montant\"\n\n[outputs]\ntable = \"exports/tableau\"\n",
    )
    .unwrap();

    let out = evmtrack(dir.path(), &["analyze", "--config", "evmtrack.toml"]);
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    let csv = std::fs::read_to_string(dir.path().join("exports/tableau.csv")).unwrap();
    assert!(csv.contains("2025-02,15"));
}

#[test]
fn inspect_progress_table() {
    let dir = project(true);
    let out = evmtrack(dir.path(), &["inspect", "va.csv"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Lignes:   2"));
    assert!(stdout.contains("Avancement: 3 mois (2025-01, 2025-02, 2025-03)"));
}

#[test]
fn inspect_unsupported_file_exits_1() {
    let dir = project(false);
    std::fs::write(dir.path().join("notes.docx"), "x").unwrap();
    let out = evmtrack(dir.path(), &["inspect", "notes.docx"]);
    assert_eq!(out.status.code(), Some(1));
}
