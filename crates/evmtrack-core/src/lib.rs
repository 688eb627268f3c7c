//! # evmtrack-core
//!
//! Core domain model and traits for the evmtrack earned value engine.
//!
//! This crate provides:
//! - Time axis: `Month`, `CumulativeSeries`
//! - Tabular input: `Table`, `CellValue`, `ColumnConfig`, `EvmInputs`
//! - Result types: `PlannedValue`, `EarnedValue`, `Projection`, `EvmAnalysis`
//! - Core traits: `EvmEngine`, `Renderer`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use evmtrack_core::{CumulativeSeries, Month};
//!
//! let ac = CumulativeSeries::from_monthly_totals([
//!     (Month::new(2025, 1), 15_000.0),
//!     (Month::new(2025, 2), 8_000.0),
//! ]);
//!
//! assert_eq!(ac.get(Month::new(2025, 2)), Some(23_000.0));
//! assert_eq!(ac.last_month(), Some(Month::new(2025, 2)));
//! ```

pub mod status;
pub mod table;

pub use status::{EvmStatus, StatusIndicator};
pub use table::{CellValue, Row, Table};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a milestone ("Jalon")
pub type MilestoneId = String;

// ============================================================================
// Month
// ============================================================================

/// A calendar month (year + month, no day component).
///
/// Ordering is year-major, month-minor. Serializes as `"YYYY-MM"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month.
    ///
    /// # Panics
    ///
    /// Panics if `month` is not in `1..=12`. Use [`Month::try_new`] for
    /// untrusted input.
    pub fn new(year: i32, month: u32) -> Self {
        Self::try_new(year, month).unwrap_or_else(|| panic!("invalid month {month}"))
    }

    pub fn try_new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Absolute month number (year * 12 + month - 1)
    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    /// Shift by `n` months (negative goes back in time)
    pub fn add_months(&self, n: i64) -> Self {
        Self::from_ordinal(self.ordinal() + n)
    }

    /// The following month
    pub fn succ(&self) -> Self {
        self.add_months(1)
    }

    /// Number of months from `self` to `other` (negative if `other` is earlier)
    pub fn months_until(&self, other: Month) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// Every month from `start` to `end` inclusive (empty if `end < start`)
    pub fn range_inclusive(start: Month, end: Month) -> impl Iterator<Item = Month> {
        (start.ordinal()..=end.ordinal()).map(Month::from_ordinal)
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for Month {
    type Err = EvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EvmError::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Month::try_new(year, month).ok_or_else(invalid)
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

impl TryFrom<String> for Month {
    type Error = EvmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Cumulative Series
// ============================================================================

/// Month-indexed cumulative amounts (AC, PV, EV, EAC paths).
///
/// Months are unique and iterated chronologically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CumulativeSeries {
    points: BTreeMap<Month, f64>,
}

impl CumulativeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a running sum from per-month totals.
    ///
    /// Totals sharing a month are added together before accumulating.
    pub fn from_monthly_totals(totals: impl IntoIterator<Item = (Month, f64)>) -> Self {
        let mut monthly: BTreeMap<Month, f64> = BTreeMap::new();
        for (month, amount) in totals {
            *monthly.entry(month).or_insert(0.0) += amount;
        }

        let mut running = 0.0;
        let points = monthly
            .into_iter()
            .map(|(month, amount)| {
                running += amount;
                (month, running)
            })
            .collect();
        Self { points }
    }

    /// Set the value at `month`, replacing any previous value
    pub fn insert(&mut self, month: Month, value: f64) {
        self.points.insert(month, value);
    }

    pub fn get(&self, month: Month) -> Option<f64> {
        self.points.get(&month).copied()
    }

    pub fn contains(&self, month: Month) -> bool {
        self.points.contains_key(&month)
    }

    pub fn first(&self) -> Option<(Month, f64)> {
        self.points.iter().next().map(|(m, v)| (*m, *v))
    }

    pub fn last(&self) -> Option<(Month, f64)> {
        self.points.iter().next_back().map(|(m, v)| (*m, *v))
    }

    pub fn first_month(&self) -> Option<Month> {
        self.first().map(|(m, _)| m)
    }

    pub fn last_month(&self) -> Option<Month> {
        self.last().map(|(m, _)| m)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.last().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in chronological order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Month, f64)> + '_ {
        self.points.iter().map(|(m, v)| (*m, *v))
    }

    pub fn months(&self) -> impl Iterator<Item = Month> + '_ {
        self.points.keys().copied()
    }
}

impl FromIterator<(Month, f64)> for CumulativeSeries {
    fn from_iter<I: IntoIterator<Item = (Month, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Default spend-export date column
pub const DEFAULT_SPEND_DATE: &str = "Date de la pièce";
/// Default spend-export amount column
pub const DEFAULT_SPEND_AMOUNT: &str = "Val./Devise objet";
/// Default milestone column shared by PV, VA and forecast tables
pub const DEFAULT_MILESTONE: &str = "Jalon";
/// Default forecast projected-date column
pub const DEFAULT_FORECAST_DATE: &str = "Date projetée";
/// Default forecast EAC column
pub const DEFAULT_FORECAST_EAC: &str = "EAC (€)";

/// Column names the pipeline looks up by exact match
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Date column of the spend export
    pub spend_date: String,
    /// Amount column of the spend export
    pub spend_amount: String,
    /// Milestone identifier column
    pub milestone: String,
    /// Projected date column of the forecast table
    pub forecast_date: String,
    /// EAC column of the forecast table
    pub forecast_eac: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            spend_date: DEFAULT_SPEND_DATE.into(),
            spend_amount: DEFAULT_SPEND_AMOUNT.into(),
            milestone: DEFAULT_MILESTONE.into(),
            forecast_date: DEFAULT_FORECAST_DATE.into(),
            forecast_eac: DEFAULT_FORECAST_EAC.into(),
        }
    }
}

/// How manual forecast entries accumulate past the last EV month
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastMode {
    /// Add every entry's EAC field as-is
    #[default]
    SumOfEac,
    /// Add `eac - earned_to_date(milestone)` for every entry
    NetOfEarned,
}

// ============================================================================
// Input Entities
// ============================================================================

/// One spend transaction from the actual-cost export
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpenseRow {
    pub date: NaiveDate,
    /// Signed amount (credits and reversals are negative)
    pub amount: f64,
}

/// Budget of one milestone in the planned-value table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MilestoneBudget {
    pub milestone_id: MilestoneId,
    /// Planned completion date, when the table has a date column
    pub date: Option<NaiveDate>,
    pub planned_amount: f64,
}

/// One row of the manual forecast table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForecastEntry {
    pub milestone_id: MilestoneId,
    pub projected_month: Month,
    pub eac_amount: f64,
}

/// Cumulative fraction complete per milestone per month.
///
/// Cells are running maxima, so progress never decreases along a row.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PercentCompleteMatrix {
    months: Vec<Month>,
    rows: BTreeMap<MilestoneId, Vec<f64>>,
}

impl PercentCompleteMatrix {
    /// Build from chronologically sorted months and one value per month per row.
    ///
    /// Rows shorter than `months` are padded with zeros.
    pub fn new(months: Vec<Month>, rows: BTreeMap<MilestoneId, Vec<f64>>) -> Self {
        let width = months.len();
        let rows = rows
            .into_iter()
            .map(|(id, mut values)| {
                values.resize(width, 0.0);
                (id, values)
            })
            .collect();
        Self { months, rows }
    }

    pub fn months(&self) -> &[Month] {
        &self.months
    }

    pub fn milestones(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn contains(&self, milestone: &str) -> bool {
        self.rows.contains_key(milestone)
    }

    /// Percent for a milestone at a month present in the matrix
    pub fn percent(&self, milestone: &str, month: Month) -> Option<f64> {
        let col = self.months.binary_search(&month).ok()?;
        self.rows.get(milestone).map(|values| values[col])
    }

    /// Row of percents for one milestone, aligned with [`Self::months`]
    pub fn row(&self, milestone: &str) -> Option<&[f64]> {
        self.rows.get(milestone).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty() || self.rows.is_empty()
    }
}

/// Raw tables handed to the pipeline
#[derive(Clone, Debug)]
pub struct EvmInputs {
    /// Actual-cost export (required)
    pub spend: Table,
    /// Milestone budget table
    pub planned_value: Option<Table>,
    /// Percent-complete table (milestones × months)
    pub progress: Option<Table>,
    /// Manual forecast table
    pub forecast: Option<Table>,
    pub columns: ColumnConfig,
    pub forecast_mode: ForecastMode,
}

impl EvmInputs {
    pub fn new(spend: Table) -> Self {
        Self {
            spend,
            planned_value: None,
            progress: None,
            forecast: None,
            columns: ColumnConfig::default(),
            forecast_mode: ForecastMode::default(),
        }
    }

    pub fn planned_value(mut self, table: Option<Table>) -> Self {
        self.planned_value = table;
        self
    }

    pub fn progress(mut self, table: Option<Table>) -> Self {
        self.progress = table;
        self
    }

    pub fn forecast(mut self, table: Option<Table>) -> Self {
        self.forecast = table;
        self
    }

    pub fn columns(mut self, columns: ColumnConfig) -> Self {
        self.columns = columns;
        self
    }

    pub fn forecast_mode(mut self, mode: ForecastMode) -> Self {
        self.forecast_mode = mode;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Normalized planned value
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannedValue {
    /// Cumulative PV, gap-free between first and last month
    pub series: CumulativeSeries,
    /// Milestone labels keyed by their planned month
    pub milestones: BTreeMap<Month, Vec<MilestoneId>>,
    /// Detected date column
    pub date_column: String,
    /// Detected amount column
    pub amount_column: String,
    /// Number of months filled by interpolation
    pub interpolated_months: usize,
}

impl PlannedValue {
    /// Budget at completion (final cumulative PV)
    pub fn bac(&self) -> f64 {
        self.series.last_value().unwrap_or(0.0)
    }
}

/// Contribution of one milestone to one month's EV
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MilestoneContribution {
    pub milestone_id: MilestoneId,
    /// Cumulative fraction complete used for the month
    pub percent: f64,
    pub planned_amount: f64,
    /// `planned_amount * percent`
    pub earned: f64,
}

/// Fused earned value
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EarnedValue {
    /// Cumulative EV for months with positive EV
    pub series: CumulativeSeries,
    /// Per-month breakdown of non-zero milestone contributions
    pub contributions: BTreeMap<Month, Vec<MilestoneContribution>>,
}

impl EarnedValue {
    /// Earned amount per milestone at the last EV month
    pub fn earned_by_milestone(&self) -> BTreeMap<MilestoneId, f64> {
        self.series
            .last_month()
            .and_then(|month| self.contributions.get(&month))
            .map(|parts| {
                parts
                    .iter()
                    .map(|c| (c.milestone_id.clone(), c.earned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// EAC projection method
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionMethod {
    /// BAC / CPI
    Cpi,
    /// AC + (BAC - EV) / (CPI × SPI)
    CpiSpi,
    /// AC + (BAC - EV)
    RestePlan,
    /// Manual per-milestone forecast
    Forecast,
}

impl ProjectionMethod {
    /// The three formula-driven methods, in reporting order
    pub const ANALYTIC: [ProjectionMethod; 3] = [
        ProjectionMethod::Cpi,
        ProjectionMethod::CpiSpi,
        ProjectionMethod::RestePlan,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ProjectionMethod::Cpi => "CPI",
            ProjectionMethod::CpiSpi => "CPI_SPI",
            ProjectionMethod::RestePlan => "RESTE_PLAN",
            ProjectionMethod::Forecast => "FORECAST",
        }
    }

    pub fn formula(&self) -> &'static str {
        match self {
            ProjectionMethod::Cpi => "BAC / CPI",
            ProjectionMethod::CpiSpi => "AC + [(BAC-EV) / (CPI × SPI)]",
            ProjectionMethod::RestePlan => "AC + (BAC - EV)",
            ProjectionMethod::Forecast => "EV + Σ EAC(jalon)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProjectionMethod::Cpi => "Performance des coûts actuelle se poursuit",
            ProjectionMethod::CpiSpi => "Performance coûts ET délais se poursuit",
            ProjectionMethod::RestePlan => "Le reste se déroule comme prévu initialement",
            ProjectionMethod::Forecast => "Forecast manuel par jalon",
        }
    }
}

impl std::fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One EAC scenario
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Projection {
    pub method: ProjectionMethod,
    /// Estimate at completion
    pub eac: f64,
    /// Amount still to be spent (or earned, for forecasts)
    pub remaining: f64,
    /// Historical AC followed by the projected path
    pub series: CumulativeSeries,
    pub finish_month: Month,
}

/// Current values the analytic projections start from
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceIndices {
    /// Last month of the AC series
    pub current_month: Month,
    pub ac: f64,
    pub ev: f64,
    /// PV at `current_month` (0 when undefined)
    pub pv: f64,
    /// Budget at completion (0 without PV)
    pub bac: f64,
    /// EV / AC, 1 when AC is 0
    pub cpi: f64,
    /// EV / PV, 1 when PV is 0
    pub spi: f64,
}

/// CPI, CPI×SPI and Reste-à-Plan projections
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalyticProjections {
    pub indices: PerformanceIndices,
    /// Estimated finish month shared by all methods
    pub finish_month: Month,
    pub methods: BTreeMap<ProjectionMethod, Projection>,
}

impl AnalyticProjections {
    pub fn get(&self, method: ProjectionMethod) -> Option<&Projection> {
        self.methods.get(&method)
    }
}

/// Manual forecast EAC path
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForecastProjection {
    pub series: CumulativeSeries,
    /// Entry retained per milestone (last one wins on duplicates)
    pub by_milestone: BTreeMap<MilestoneId, ForecastEntry>,
}

impl ForecastProjection {
    /// View as a [`Projection`]: EAC is the last value, finish is the last month.
    ///
    /// `remaining` is measured from the final EV value.
    pub fn as_projection(&self, ev_final: f64) -> Option<Projection> {
        let (finish_month, eac) = self.series.last()?;
        Some(Projection {
            method: ProjectionMethod::Forecast,
            eac,
            remaining: eac - ev_final,
            series: self.series.clone(),
            finish_month,
        })
    }
}

/// Everything computed for one project
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvmAnalysis {
    pub actual_cost: CumulativeSeries,
    pub planned_value: Option<PlannedValue>,
    pub earned_value: Option<EarnedValue>,
    pub projections: Option<AnalyticProjections>,
    pub forecast: Option<ForecastProjection>,
}

impl EvmAnalysis {
    pub fn pv_series(&self) -> Option<&CumulativeSeries> {
        self.planned_value.as_ref().map(|pv| &pv.series)
    }

    pub fn ev_series(&self) -> Option<&CumulativeSeries> {
        self.earned_value.as_ref().map(|ev| &ev.series)
    }

    /// Budget at completion, 0 without PV
    pub fn bac(&self) -> f64 {
        self.planned_value.as_ref().map_or(0.0, PlannedValue::bac)
    }

    /// Milestone labels keyed by planned month (empty without PV)
    pub fn milestone_labels(&self) -> BTreeMap<Month, Vec<MilestoneId>> {
        self.planned_value
            .as_ref()
            .map(|pv| pv.milestones.clone())
            .unwrap_or_default()
    }

    /// All projections: CPI, CPI_SPI, RESTE_PLAN, then FORECAST when present
    pub fn all_projections(&self) -> Vec<Projection> {
        let mut all: Vec<Projection> = self
            .projections
            .as_ref()
            .map(|p| p.methods.values().cloned().collect())
            .unwrap_or_default();

        let ev_final = self
            .ev_series()
            .and_then(CumulativeSeries::last_value)
            .unwrap_or(0.0);
        if let Some(forecast) = self.forecast.as_ref().and_then(|f| f.as_projection(ev_final)) {
            all.push(forecast);
        }
        all
    }

    /// Status dashboard at the last AC month
    pub fn status(&self) -> Option<EvmStatus> {
        EvmStatus::from_series(&self.actual_cost, self.pv_series(), self.ev_series())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Earned value computation
pub trait EvmEngine {
    /// Run the whole pipeline over the input tables.
    ///
    /// Absent or unusable optional tables yield `None` in the matching
    /// result field; only structural misconfiguration is an error.
    fn analyze(&self, inputs: &EvmInputs) -> Result<EvmAnalysis, EvmError>;
}

/// Output rendering
pub trait Renderer {
    type Output;

    /// Render an analysis to the output format
    fn render(&self, analysis: &EvmAnalysis) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Pipeline error (structural misconfiguration or unreadable required data)
#[derive(Debug, Error)]
pub enum EvmError {
    #[error("Column '{field}' not found in {table} table (available: {})", available.join(", "))]
    MissingField {
        table: String,
        field: String,
        available: Vec<String>,
    },

    #[error("Invalid date in column '{column}' at row {row}: {value}")]
    InvalidDate {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid amount in column '{column}' at row {row}: {value}")]
    InvalidAmount {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid month: {0} (expected YYYY-MM)")]
    InvalidMonth(String),
}

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================
