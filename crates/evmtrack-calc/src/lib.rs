//! # evmtrack-calc
//!
//! Earned value pipeline: actual cost aggregation, planned value
//! normalization, earned value fusion and EAC projections.
//!
//! This crate provides:
//! - Cumulative AC from spend lines ([`actual_cost`])
//! - Gap-free PV with milestone labels ([`planned_value`])
//! - Cumulative-max EV per milestone ([`earned_value`])
//! - CPI, CPI×SPI and Reste-à-Plan EAC scenarios ([`projections`])
//! - Manual per-milestone forecast ([`forecast`])
//!
//! Every stage is a pure function over in-memory tables. Optional inputs
//! that are absent or unusable yield `None` and the later stages skip
//! them; only a misconfigured spend table stops the run.
//!
//! ## Example
//!
//! ```rust
//! use evmtrack_core::{CellValue, EvmEngine, EvmInputs, Month, Table};
//! use evmtrack_calc::EvmCalculator;
//!
//! let spend = Table::from_rows(
//!     "spend",
//!     &["Date de la pièce", "Val./Devise objet"],
//!     vec![
//!         vec!["2025-01-15".into(), CellValue::Number(10_000.0)],
//!         vec!["2025-02-10".into(), CellValue::Number(8_000.0)],
//!     ],
//! );
//!
//! let analysis = EvmCalculator::new().analyze(&EvmInputs::new(spend)).unwrap();
//! assert_eq!(analysis.actual_cost.get(Month::new(2025, 2)), Some(18_000.0));
//! assert!(analysis.projections.is_none());
//! ```

pub mod actual_cost;
pub mod earned_value;
pub mod forecast;
pub mod planned_value;
pub mod projections;

pub use actual_cost::aggregate;
pub use earned_value::fuse;
pub use forecast::{forecast_entries, project_forecast, project_forecast_with, ForecastAccumulation};
pub use planned_value::normalize;
pub use projections::project_analytic;

use evmtrack_core::{EvmAnalysis, EvmEngine, EvmError, EvmInputs, ForecastMode};
use tracing::{info, warn};

/// Runs the whole earned value pipeline
#[derive(Clone, Debug, Default)]
pub struct EvmCalculator;

impl EvmCalculator {
    pub fn new() -> Self {
        Self
    }
}

impl EvmEngine for EvmCalculator {
    fn analyze(&self, inputs: &EvmInputs) -> Result<EvmAnalysis, EvmError> {
        let columns = &inputs.columns;

        let actual_cost = aggregate(&inputs.spend, &columns.spend_date, &columns.spend_amount)?;
        if actual_cost.is_empty() {
            warn!(table = inputs.spend.name(), "no dated spend line, AC is empty");
        } else {
            info!(months = actual_cost.len(), "actual cost aggregated");
        }

        let planned_value = normalize(inputs.planned_value.as_ref(), &columns.milestone);
        if planned_value.is_none() {
            warn!("planned value unavailable");
        }

        let earned_value = fuse(
            inputs.planned_value.as_ref(),
            inputs.progress.as_ref(),
            &columns.milestone,
        );
        let ev_series = earned_value.as_ref().map(|ev| &ev.series);
        let pv_series = planned_value.as_ref().map(|pv| &pv.series);

        let projections = project_analytic(&actual_cost, ev_series, pv_series);
        if projections.is_none() {
            warn!("no earned value, analytic projections skipped");
        }

        let accumulation = match inputs.forecast_mode {
            ForecastMode::SumOfEac => ForecastAccumulation::SumOfEac,
            ForecastMode::NetOfEarned => ForecastAccumulation::NetOfEarned(
                earned_value
                    .as_ref()
                    .map(|ev| ev.earned_by_milestone())
                    .unwrap_or_default(),
            ),
        };
        let forecast = forecast_entries(inputs.forecast.as_ref(), columns)
            .and_then(|entries| project_forecast_with(ev_series, &entries, &accumulation));

        Ok(EvmAnalysis {
            actual_cost,
            planned_value,
            earned_value,
            projections,
            forecast,
        })
    }
}
