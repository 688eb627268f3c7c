//! Configuration for the evmtrack CLI
//!
//! Precedence: command-line flags, then the TOML file given with
//! `--config`, then built-in defaults.
//!
//! ```toml
//! [inputs]
//! spend = "EXPORT.XLSX"
//! planned_value = "pv.xlsx"
//!
//! [outputs]
//! chart = "out/analyse_evm.svg"
//! report = "out/rapport.md"
//!
//! [columns]
//! spend_date = "Date comptable"
//!
//! [forecast]
//! accumulation = "net-of-earned"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evmtrack_core::{ColumnConfig, ForecastMode};
use serde::{Deserialize, Serialize};

/// Input file locations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Spend export (required)
    pub spend: PathBuf,
    /// Planned value table
    pub planned_value: PathBuf,
    /// Percent-complete table
    pub progress: PathBuf,
    /// Manual forecast table
    pub forecast: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            spend: "EXPORT.XLSX".into(),
            planned_value: "pv.xlsx".into(),
            progress: "va.xlsx".into(),
            forecast: "forecast.xlsx".into(),
        }
    }
}

/// Output locations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    /// Base path of the charts (`<stem>_realise.svg`, `<stem>_projections.svg`)
    pub chart: PathBuf,
    /// Base path of the comparison table (`<base>.csv`, `<base>.xlsx`)
    pub table: PathBuf,
    /// Markdown report
    pub report: Option<PathBuf>,
    /// JSON dump of the analysis
    pub json: Option<PathBuf>,
    /// Keep chart and table files when a report is written
    pub keep_intermediate: bool,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            chart: "analyse_evm.svg".into(),
            table: "tableau_evm".into(),
            report: None,
            json: None,
            keep_intermediate: false,
        }
    }
}

/// Forecast settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub accumulation: ForecastMode,
}

/// Complete CLI configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inputs: InputPaths,
    pub outputs: OutputPaths,
    pub columns: ColumnConfig,
    pub forecast: ForecastSettings,
}

impl Config {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse TOML text; missing sections and keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_layout() {
        let config = Config::default();
        assert_eq!(config.inputs.spend, PathBuf::from("EXPORT.XLSX"));
        assert_eq!(config.inputs.progress, PathBuf::from("va.xlsx"));
        assert_eq!(config.outputs.chart, PathBuf::from("analyse_evm.svg"));
        assert_eq!(config.outputs.table, PathBuf::from("tableau_evm"));
        assert_eq!(config.columns.spend_date, "Date de la pièce");
        assert_eq!(config.forecast.accumulation, ForecastMode::SumOfEac);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [inputs]
            spend = "depenses.csv"

            [columns]
            spend_amount = "Montant"

            [forecast]
            accumulation = "net-of-earned"
            "#,
        )
        .unwrap();
        assert_eq!(config.inputs.spend, PathBuf::from("depenses.csv"));
        assert_eq!(config.inputs.planned_value, PathBuf::from("pv.xlsx"));
        assert_eq!(config.columns.spend_amount, "Montant");
        assert_eq!(config.columns.spend_date, "Date de la pièce");
        assert_eq!(config.forecast.accumulation, ForecastMode::NetOfEarned);
        assert_eq!(config.outputs.report, None);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn invalid_mode_is_rejected() {
        assert!(Config::from_toml("[forecast]\naccumulation = \"average\"").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = Config::default();
        config.outputs.report = Some("rapport.md".into());
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evmtrack.toml");
        std::fs::write(&path, "[outputs]\njson = \"analysis.json\"\n").unwrap();
        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.outputs.json, Some(PathBuf::from("analysis.json")));

        assert!(Config::load(&dir.path().join("absent.toml")).is_err());
    }
}
