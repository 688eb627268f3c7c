//! The `inspect` command: what the pipeline sees in one input file

use std::path::Path;

use anyhow::{Context, Result};
use evmtrack_calc::earned_value::month_columns;
use evmtrack_calc::planned_value::{detect_amount_column, detect_date_column};
use evmtrack_core::Table;
use evmtrack_io::read_table;

/// Describe a loaded table
pub fn describe(table: &Table, milestone_column: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Table:    {}\n", table.name()));
    out.push_str(&format!("Lignes:   {}\n", table.row_count()));
    out.push_str(&format!("Colonnes: {}\n", table.columns().len()));
    for (i, column) in table.columns().iter().enumerate() {
        out.push_str(&format!("  {i:>3}  {column}\n"));
    }

    if let (Some(date), Some(amount)) = (detect_date_column(table), detect_amount_column(table)) {
        out.push_str(&format!("\nBudget prévu: date '{date}', montant '{amount}'\n"));
    }

    if table.has_column(milestone_column) {
        let months = month_columns(table, milestone_column);
        if !months.is_empty() {
            let labels: Vec<String> = months.keys().map(ToString::to_string).collect();
            out.push_str(&format!("\nAvancement: {} mois ({})\n", months.len(), labels.join(", ")));
        }
    } else {
        out.push_str(&format!("\nColonne jalon '{milestone_column}' absente\n"));
    }
    out
}

pub fn run(path: &Path, milestone_column: &str) -> Result<()> {
    let table = read_table(path).with_context(|| format!("Cannot read {}", path.display()))?;
    print!("{}", describe(&table, milestone_column));
    Ok(())
}
