//! Project Status Dashboard
//!
//! This module provides the "where do we stand right now?" view of an
//! analysis: current AC/EV/PV, cost and schedule variances, and the
//! performance indices, evaluated at the last month of actual cost.
//!
//! # Core Concepts
//!
//! - **EvmStatus**: Current-month metrics derived from the AC/PV/EV series
//! - **StatusIndicator**: On Track, At Risk, or Behind classification
//!
//! Unlike the projection engine, where a zero denominator makes CPI/SPI
//! default to 1, the dashboard reports such indices as unavailable.
//!
//! # Example
//!
//! ```rust
//! use evmtrack_core::{CumulativeSeries, Month};
//! use evmtrack_core::status::{EvmStatus, StatusIndicator};
//!
//! let ac: CumulativeSeries = [(Month::new(2025, 3), 100_000.0)].into_iter().collect();
//! let ev: CumulativeSeries = [(Month::new(2025, 3), 50_000.0)].into_iter().collect();
//!
//! let status = EvmStatus::from_series(&ac, None, Some(&ev)).unwrap();
//! assert_eq!(status.cv, -50_000.0);
//! assert_eq!(status.cpi, Some(0.5));
//! assert_eq!(status.status_indicator(), StatusIndicator::Behind);
//! ```

use serde::Serialize;

use crate::{CumulativeSeries, Month};

// ============================================================================
// Core Types
// ============================================================================

/// Status classification for the project
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StatusIndicator {
    /// Both indices at or above 1.0
    OnTrack,
    /// Worst index in [0.9, 1.0)
    AtRisk,
    /// Worst index below 0.9
    Behind,
}

impl StatusIndicator {
    /// Get the display string for this indicator
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusIndicator::OnTrack => "On Track",
            StatusIndicator::AtRisk => "At Risk",
            StatusIndicator::Behind => "Behind",
        }
    }
}

impl std::fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current-month EVM metrics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvmStatus {
    /// Last month of the AC series
    pub status_month: Month,

    /// Actual cost to date
    pub ac: f64,

    /// Earned value to date (last EV value, 0 without EV)
    pub ev: f64,

    /// Planned value at the status month (0 when undefined)
    pub pv: f64,

    /// Budget at completion (final PV, 0 without PV)
    pub bac: f64,

    /// Cost variance (EV - AC)
    pub cv: f64,

    /// Schedule variance (EV - PV)
    pub sv: f64,

    /// Cost Performance Index (EV / AC), `None` when AC is 0
    pub cpi: Option<f64>,

    /// Schedule Performance Index (EV / PV), `None` when PV is 0
    pub spi: Option<f64>,

    /// EV / BAC, `None` without a positive BAC
    pub percent_complete: Option<f64>,
}

impl EvmStatus {
    /// Evaluate the dashboard at the last AC month.
    ///
    /// Returns `None` when there is no actual cost at all.
    pub fn from_series(
        ac: &CumulativeSeries,
        pv: Option<&CumulativeSeries>,
        ev: Option<&CumulativeSeries>,
    ) -> Option<Self> {
        let (status_month, ac_now) = ac.last()?;
        let ev_now = ev.and_then(CumulativeSeries::last_value).unwrap_or(0.0);
        let pv_now = pv.and_then(|s| s.get(status_month)).unwrap_or(0.0);
        let bac = pv.and_then(CumulativeSeries::last_value).unwrap_or(0.0);

        let ratio = |num: f64, den: f64| (den > 0.0).then(|| num / den);

        Some(Self {
            status_month,
            ac: ac_now,
            ev: ev_now,
            pv: pv_now,
            bac,
            cv: ev_now - ac_now,
            sv: ev_now - pv_now,
            cpi: ratio(ev_now, ac_now),
            spi: ratio(ev_now, pv_now),
            percent_complete: ratio(ev_now, bac),
        })
    }

    /// Classify from the worse of CPI and SPI.
    ///
    /// - On Track: worst index >= 1.0 (or no index available)
    /// - At Risk: 0.9 <= worst index < 1.0
    /// - Behind: worst index < 0.9
    pub fn status_indicator(&self) -> StatusIndicator {
        let worst = [self.cpi, self.spi]
            .into_iter()
            .flatten()
            .fold(f64::INFINITY, f64::min);
        match worst {
            w if w >= 1.0 => StatusIndicator::OnTrack,
            w if w >= 0.9 => StatusIndicator::AtRisk,
            _ => StatusIndicator::Behind,
        }
    }

    /// Get a formatted cost variance string
    pub fn cost_variance_string(&self) -> String {
        match self.cv {
            v if v < 0.0 => format!("over budget by {:.2}", v.abs()),
            v if v > 0.0 => format!("under budget by {:.2}", v),
            _ => "on budget".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
