//! EAC projections
//!
//! Three formula-driven scenarios share the same starting point (the last
//! AC month) and the same estimated finish month:
//!
//! | Method | EAC |
//! |--------|-----|
//! | CPI | `BAC / CPI` |
//! | CPI_SPI | `AC + (BAC - EV) / (CPI × SPI)` |
//! | RESTE_PLAN | `AC + (BAC - EV)` |
//!
//! Each projected series is the AC history followed by a straight line
//! from the current AC to the method's EAC at the finish month.

use std::collections::BTreeMap;

use evmtrack_core::{
    AnalyticProjections, CumulativeSeries, Month, PerformanceIndices, Projection,
    ProjectionMethod,
};
use tracing::{debug, info};

/// Finish month offset used when no plan or no schedule index is available
pub const DEFAULT_PROJECTION_MONTHS: i64 = 12;

/// Upper bound on the projected duration (100 years)
pub const MAX_PROJECTION_MONTHS: i64 = 1200;

/// CPI and SPI, each defaulting to 1 when its denominator is not positive
pub fn compute_indices(ac_now: f64, ev_now: f64, pv_now: f64) -> (f64, f64) {
    let cpi = if ac_now > 0.0 { ev_now / ac_now } else { 1.0 };
    let spi = if pv_now > 0.0 { ev_now / pv_now } else { 1.0 };
    (cpi, spi)
}

/// Estimated finish month.
///
/// With a plan and a positive SPI, the months remaining per plan are
/// stretched by `1 / SPI` (rounded down). Otherwise the finish is
/// [`DEFAULT_PROJECTION_MONTHS`] after the current month.
pub fn estimate_finish_month(current: Month, pv: Option<&CumulativeSeries>, spi: f64) -> Month {
    match pv.and_then(CumulativeSeries::last_month) {
        Some(plan_end) if spi > 0.0 => {
            let remaining_plan = current.months_until(plan_end) as f64;
            let projected = (remaining_plan / spi).floor();
            let projected = projected.clamp(-(MAX_PROJECTION_MONTHS as f64), MAX_PROJECTION_MONTHS as f64);
            current.add_months(projected as i64)
        }
        _ => current.add_months(DEFAULT_PROJECTION_MONTHS),
    }
}

/// AC history followed by a constant-increment path up to `finish`.
///
/// When `finish` is not after `current` the history is returned alone.
pub fn projection_series(
    ac: &CumulativeSeries,
    current: Month,
    ac_now: f64,
    remaining: f64,
    finish: Month,
) -> CumulativeSeries {
    let mut series = ac.clone();
    let steps = current.months_until(finish);
    if steps <= 0 {
        return series;
    }
    let increment = remaining / steps as f64;
    let mut value = ac_now;
    for month in Month::range_inclusive(current.succ(), finish) {
        value += increment;
        series.insert(month, value);
    }
    series
}

/// Compute the CPI, CPI×SPI and Reste-à-Plan projections.
///
/// Returns `None` when EV is absent or empty, or when there is no AC.
pub fn project_analytic(
    ac: &CumulativeSeries,
    ev: Option<&CumulativeSeries>,
    pv: Option<&CumulativeSeries>,
) -> Option<AnalyticProjections> {
    let ev_now = ev?.last_value()?;
    let (current_month, ac_now) = ac.last()?;
    let pv = pv.filter(|s| !s.is_empty());

    let bac = pv.and_then(CumulativeSeries::last_value).unwrap_or(0.0);
    let pv_now = pv
        .and_then(|s| s.get(current_month))
        .filter(|v| !v.is_nan())
        .unwrap_or(0.0);
    let (cpi, spi) = compute_indices(ac_now, ev_now, pv_now);
    let finish_month = estimate_finish_month(current_month, pv, spi);
    info!(%current_month, ac_now, ev_now, pv_now, bac, cpi, spi, %finish_month, "performance indices");

    let mut methods = BTreeMap::new();
    for method in ProjectionMethod::ANALYTIC {
        let (eac, remaining) = match method {
            ProjectionMethod::Cpi => {
                let eac = if cpi > 0.0 { bac / cpi } else { bac };
                (eac, eac - ac_now)
            }
            ProjectionMethod::CpiSpi => {
                let combined = cpi * spi;
                let eac = if combined > 0.0 {
                    ac_now + (bac - ev_now) / combined
                } else {
                    bac
                };
                (eac, eac - ac_now)
            }
            ProjectionMethod::RestePlan => (ac_now + (bac - ev_now), bac - ev_now),
            ProjectionMethod::Forecast => continue,
        };
        debug!(method = method.id(), eac, remaining, "projection");
        methods.insert(
            method,
            Projection {
                method,
                eac,
                remaining,
                series: projection_series(ac, current_month, ac_now, remaining, finish_month),
                finish_month,
            },
        );
    }

    Some(AnalyticProjections {
        indices: PerformanceIndices {
            current_month,
            ac: ac_now,
            ev: ev_now,
            pv: pv_now,
            bac,
            cpi,
            spi,
        },
        finish_month,
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn series(points: &[((i32, u32), f64)]) -> CumulativeSeries {
        points
            .iter()
            .map(|((y, m), v)| (Month::new(*y, *m), *v))
            .collect()
    }

    #[test]
    fn indices_default_to_one() {
        assert_eq!(compute_indices(0.0, 10.0, 0.0), (1.0, 1.0));
        assert_eq!(compute_indices(100.0, 50.0, 200.0), (0.5, 0.25));
    }

    #[test]
    fn formulas() {
        let ac = series(&[((2025, 1), 40_000.0), ((2025, 3), 100_000.0)]);
        let ev = series(&[((2025, 3), 50_000.0)]);
        let pv = series(&[((2025, 3), 50_000.0), ((2025, 12), 300_000.0)]);

        let p = project_analytic(&ac, Some(&ev), Some(&pv)).unwrap();
        assert_eq!(p.indices.cpi, 0.5);
        assert_eq!(p.indices.spi, 1.0);

        let cpi = p.get(ProjectionMethod::Cpi).unwrap();
        assert_eq!(cpi.eac, 600_000.0);
        assert_eq!(cpi.remaining, 500_000.0);

        let cpi_spi = p.get(ProjectionMethod::CpiSpi).unwrap();
        assert_eq!(cpi_spi.eac, 100_000.0 + 250_000.0 / 0.5);

        let reste = p.get(ProjectionMethod::RestePlan).unwrap();
        assert_eq!(reste.eac, 350_000.0);
        assert_eq!(reste.remaining, 250_000.0);
        assert!(p.get(ProjectionMethod::Forecast).is_none());
    }

    #[test]
    fn finish_month_stretches_with_spi() {
        let current = Month::new(2025, 3);
        let pv = series(&[((2025, 1), 1.0), ((2025, 9), 2.0)]);
        // 6 plan months at SPI 0.8 -> floor(7.5) = 7
        assert_eq!(estimate_finish_month(current, Some(&pv), 0.8), Month::new(2025, 10));
        assert_eq!(estimate_finish_month(current, None, 0.8), Month::new(2026, 3));
        assert_eq!(estimate_finish_month(current, Some(&pv), 0.0), Month::new(2026, 3));
    }

    #[test]
    fn series_keeps_history_then_walks_linearly() {
        let ac = series(&[((2025, 1), 10.0), ((2025, 2), 40.0)]);
        let s = projection_series(&ac, Month::new(2025, 2), 40.0, 60.0, Month::new(2025, 5));
        assert_eq!(
            s.iter().collect::<Vec<_>>(),
            vec![
                (Month::new(2025, 1), 10.0),
                (Month::new(2025, 2), 40.0),
                (Month::new(2025, 3), 60.0),
                (Month::new(2025, 4), 80.0),
                (Month::new(2025, 5), 100.0),
            ]
        );

        let flat = projection_series(&ac, Month::new(2025, 2), 40.0, 60.0, Month::new(2025, 2));
        assert_eq!(flat, ac);
    }

    #[test]
    fn plan_already_finished_gives_no_extension() {
        let ac = series(&[((2025, 6), 500.0)]);
        let ev = series(&[((2025, 6), 250.0)]);
        let pv = series(&[((2025, 1), 100.0), ((2025, 4), 400.0)]);

        let p = project_analytic(&ac, Some(&ev), Some(&pv)).unwrap();
        // PV undefined at the current month, so SPI defaults to 1
        assert_eq!(p.indices.pv, 0.0);
        assert_eq!(p.indices.spi, 1.0);
        assert_eq!(p.finish_month, Month::new(2025, 4));
        for projection in p.methods.values() {
            assert_eq!(projection.series, ac);
        }
    }

    #[test]
    fn no_ev_means_no_projection() {
        let ac = series(&[((2025, 1), 1.0)]);
        assert!(project_analytic(&ac, None, None).is_none());
        assert!(project_analytic(&ac, Some(&CumulativeSeries::new()), None).is_none());
        assert!(project_analytic(&CumulativeSeries::new(), Some(&ac), None).is_none());
    }

    #[test]
    fn without_pv_bac_is_zero() {
        let ac = series(&[((2025, 1), 100.0)]);
        let ev = series(&[((2025, 1), 50.0)]);
        let p = project_analytic(&ac, Some(&ev), None).unwrap();
        assert_eq!(p.indices.bac, 0.0);
        assert_eq!(p.finish_month, Month::new(2026, 1));
        assert_eq!(p.get(ProjectionMethod::Cpi).unwrap().eac, 0.0);
        assert_eq!(p.get(ProjectionMethod::RestePlan).unwrap().eac, 50.0);
    }
}
