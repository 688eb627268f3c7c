//! # evmtrack-render
//!
//! Rendering backends for evmtrack analyses.
//!
//! This crate provides:
//! - SVG charts: realised-to-date (AC/PV/EV/CV/SV) and EAC projections
//! - Comparison table with CSV export
//! - Excel workbook (table, scenarios, milestone breakdown)
//! - Markdown narrative report
//! - Plain text console summary and JSON output
//!
//! ## Example
//!
//! ```rust,ignore
//! use evmtrack_core::Renderer;
//! use evmtrack_render::{ChartKind, ExcelRenderer, MarkdownReportRenderer, SvgRenderer};
//!
//! // Realised chart
//! let svg = SvgRenderer::new().render(&analysis)?;
//!
//! // Projection scenarios chart
//! let svg = SvgRenderer::new().kind(ChartKind::Projections).render(&analysis)?;
//!
//! // Excel workbook
//! let xlsx_bytes = ExcelRenderer::new().render(&analysis)?;
//! std::fs::write("tableau_evm.xlsx", xlsx_bytes)?;
//!
//! // Narrative report
//! let markdown = MarkdownReportRenderer::new().render(&analysis)?;
//! ```

pub mod excel;
pub mod report;
pub mod table;

pub use excel::ExcelRenderer;
pub use report::MarkdownReportRenderer;
pub use table::{ComparisonRow, ComparisonTable, CsvRenderer};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use evmtrack_core::{
    CumulativeSeries, EvmAnalysis, EvmStatus, Month, Projection, ProjectionMethod, RenderError,
    Renderer,
};
use serde::Serialize;
use svg::node::element::{Circle, Group, Line, Polyline, Rectangle, Text};
use svg::Document;

// ============================================================================
// Number formatting
// ============================================================================

/// Group the integer part by thousands with spaces, decimal comma
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    let is_zero = formatted.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    match frac {
        Some(f) => format!("{sign}{grouped},{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// `1 234 567,89 €`
pub fn format_euros(value: f64) -> String {
    format!("{} €", group_thousands(value, 2))
}

/// `1 235 k€`
pub fn format_keur(value: f64) -> String {
    format!("{} k€", group_thousands(value / 1000.0, 0))
}

/// Index to two decimals, `N/A` when unavailable
pub fn format_index(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

/// `MM/YYYY`
pub fn format_month(month: Month) -> String {
    format!("{:02}/{}", month.month(), month.year())
}

// ============================================================================
// SVG charts
// ============================================================================

/// Which chart to draw
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChartKind {
    /// AC, PV and EV to date with CV and SV
    #[default]
    Realised,
    /// AC/EV history plus one path per EAC scenario
    Projections,
}

impl ChartKind {
    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::Realised => "Analyse EVM - Réalisé à date (AC vs PV vs EV)",
            ChartKind::Projections => "Analyse EVM - Projections à terminaison (scénarios EAC)",
        }
    }

    /// File name suffix
    pub fn suffix(&self) -> &'static str {
        match self {
            ChartKind::Realised => "realise",
            ChartKind::Projections => "projections",
        }
    }
}

/// Chart file for `kind` next to `base`: `<stem>_realise.svg`, `<stem>_projections.svg`
pub fn chart_path(base: &Path, kind: ChartKind) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("analyse_evm");
    base.with_file_name(format!("{stem}_{}.svg", kind.suffix()))
}

/// Colour and legend label of a projection method
pub fn projection_style(method: ProjectionMethod) -> (&'static str, &'static str) {
    match method {
        ProjectionMethod::Cpi => ("#f39c12", "EAC méthode CPI (réaliste)"),
        ProjectionMethod::CpiSpi => ("#9b59b6", "EAC méthode CPI×SPI (pessimiste)"),
        ProjectionMethod::RestePlan => ("#e67e22", "EAC reste à plan (optimiste)"),
        ProjectionMethod::Forecast => ("#3498db", "EAC forecast manuel"),
    }
}

/// Scenario name used in tables and the report
pub fn scenario_label(method: ProjectionMethod) -> &'static str {
    match method {
        ProjectionMethod::RestePlan => "Méthode Reste à Plan (Optimiste)",
        ProjectionMethod::Cpi => "Méthode CPI (Réaliste)",
        ProjectionMethod::CpiSpi => "Méthode CPI×SPI (Pessimiste)",
        ProjectionMethod::Forecast => "Forecast Manuel",
    }
}

/// One plotted line, values in k€
struct Curve {
    label: String,
    color: String,
    dash: Option<&'static str>,
    width: f64,
    points: Vec<(Month, f64)>,
}

impl Curve {
    fn new(label: impl Into<String>, color: &str, series: &CumulativeSeries) -> Self {
        Self {
            label: label.into(),
            color: color.to_string(),
            dash: None,
            width: 2.5,
            points: series
                .iter()
                .filter(|(_, v)| v.is_finite())
                .map(|(m, v)| (m, v / 1000.0))
                .collect(),
        }
    }

    fn dashed(mut self, dash: &'static str) -> Self {
        self.dash = Some(dash);
        self
    }

    fn thin(mut self) -> Self {
        self.width = 2.0;
        self
    }
}

/// Text attached to a data point
struct Annotation {
    month: Month,
    value: f64,
    lines: Vec<String>,
    color: String,
    dy: f64,
}

/// Month and value domain of a chart
struct Frame {
    first: Month,
    span: i64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn from_curves(curves: &[Curve]) -> Option<Self> {
        let points = curves.iter().flat_map(|c| c.points.iter());
        let first = points.clone().map(|(m, _)| *m).min()?;
        let last = points.clone().map(|(m, _)| *m).max()?;
        let (lo, hi) = points.fold((0.0_f64, 0.0_f64), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
        let hi = if hi - lo < f64::EPSILON { lo + 1.0 } else { hi };
        let headroom = (hi - lo) * 0.05;
        Some(Self {
            first,
            span: first.months_until(last).max(1),
            y_min: if lo < 0.0 { lo - headroom } else { lo },
            y_max: hi + headroom,
        })
    }
}

/// SVG chart renderer configuration
#[derive(Clone, Debug)]
pub struct SvgRenderer {
    /// Chart to draw
    pub kind: ChartKind,
    /// Width of the plot area in pixels
    pub chart_width: u32,
    /// Height of the plot area in pixels
    pub chart_height: u32,
    /// Width of the value axis labels
    pub axis_width: u32,
    /// Header height in pixels
    pub header_height: u32,
    /// Padding around the chart
    pub padding: u32,
    /// Room right of the plot for end-of-line annotations
    pub gutter: u32,
    /// AC line colour
    pub ac_color: String,
    /// PV line colour
    pub pv_color: String,
    /// EV line colour
    pub ev_color: String,
    /// CV line colour
    pub cv_color: String,
    /// SV line colour
    pub sv_color: String,
    /// Background color
    pub background_color: String,
    /// Grid line color
    pub grid_color: String,
    /// Text color
    pub text_color: String,
    /// Font family
    pub font_family: String,
    /// Font size in pixels
    pub font_size: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            kind: ChartKind::Realised,
            chart_width: 900,
            chart_height: 420,
            axis_width: 70,
            header_height: 50,
            padding: 20,
            gutter: 130,
            ac_color: "#e74c3c".into(),
            pv_color: "#3498db".into(),
            ev_color: "#2ecc71".into(),
            cv_color: "#e67e22".into(),
            sv_color: "#9b59b6".into(),
            background_color: "#ffffff".into(),
            grid_color: "#ecf0f1".into(),
            text_color: "#2c3e50".into(),
            font_family: "system-ui, -apple-system, sans-serif".into(),
            font_size: 12,
        }
    }
}

impl SvgRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the chart to draw
    pub fn kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    /// Configure plot width
    pub fn chart_width(mut self, width: u32) -> Self {
        self.chart_width = width;
        self
    }

    /// Configure plot height
    pub fn chart_height(mut self, height: u32) -> Self {
        self.chart_height = height;
        self
    }

    fn plot_left(&self) -> f64 {
        f64::from(self.padding + self.axis_width)
    }

    fn plot_top(&self) -> f64 {
        f64::from(self.padding + self.header_height)
    }

    fn month_to_x(&self, month: Month, frame: &Frame) -> f64 {
        let offset = frame.first.months_until(month) as f64;
        self.plot_left() + offset * f64::from(self.chart_width) / frame.span as f64
    }

    fn value_to_y(&self, value: f64, frame: &Frame) -> f64 {
        let ratio = (frame.y_max - value) / (frame.y_max - frame.y_min);
        self.plot_top() + ratio * f64::from(self.chart_height)
    }

    fn text(&self, content: impl Into<String>, x: f64, y: f64, size: u32, color: &str) -> Text {
        Text::new(content.into())
            .set("x", x)
            .set("y", y)
            .set("font-family", self.font_family.as_str())
            .set("font-size", size)
            .set("fill", color)
    }

    /// Curves and annotations of the realised chart
    fn realised_curves(&self, analysis: &EvmAnalysis) -> (Vec<Curve>, Vec<Annotation>) {
        let ac = &analysis.actual_cost;
        let mut curves = vec![Curve::new("AC (Actual Cost - Dépenses réelles)", &self.ac_color, ac)];
        let mut notes = Vec::new();

        // AC values on about six points
        let step = (ac.len() / 6).max(1);
        for (i, (month, value)) in ac.iter().enumerate() {
            if i % step == 0 || i + 1 == ac.len() {
                notes.push(Annotation {
                    month,
                    value: value / 1000.0,
                    lines: vec![format!("{:.0}", value / 1000.0)],
                    color: self.ac_color.clone(),
                    dy: -10.0,
                });
            }
        }

        let pv = analysis.pv_series();
        if let Some(pv) = pv {
            curves.push(Curve::new("PV (Planned Value - Budget prévu)", &self.pv_color, pv).dashed("8,4"));
            for (month, labels) in analysis.milestone_labels() {
                if let Some(value) = pv.get(month).filter(|v| v.is_finite()) {
                    notes.push(Annotation {
                        month,
                        value: value / 1000.0,
                        lines: labels,
                        color: self.pv_color.clone(),
                        dy: 16.0,
                    });
                }
            }
        }

        let ev = analysis.ev_series();
        if let Some(ev) = ev {
            curves.push(Curve::new("EV (Earned Value - Valeur acquise)", &self.ev_color, ev).dashed("8,3,2,3"));
        }

        if let (Some(ev), Some(pv)) = (ev, pv) {
            let variances = [
                ("CV (Cost Variance = EV - AC)", "CV", &self.cv_color, ac, 14.0),
                ("SV (Schedule Variance = EV - PV)", "SV", &self.sv_color, pv, 28.0),
            ];
            for (label, short, color, base, dy) in variances {
                let series: CumulativeSeries = ev
                    .iter()
                    .filter_map(|(m, e)| base.get(m).map(|b| (m, e - b)))
                    .collect();
                let curve = Curve::new(label, color, &series).dashed("2,3").thin();
                if let Some(&(month, value)) = curve.points.last() {
                    notes.push(Annotation {
                        month,
                        value,
                        lines: vec![format!("{short}: {value:.1} k€")],
                        color: color.clone(),
                        dy,
                    });
                }
                if !curve.points.is_empty() {
                    curves.push(curve);
                }
            }
        }

        (curves, notes)
    }

    /// Curves and annotations of the projection chart
    fn projection_curves(&self, analysis: &EvmAnalysis) -> (Vec<Curve>, Vec<Annotation>) {
        let mut curves = vec![Curve::new(
            "AC historique (Dépenses réelles)",
            &self.ac_color,
            &analysis.actual_cost,
        )];
        if let Some(ev) = analysis.ev_series() {
            curves.push(Curve::new("EV historique (Valeur acquise)", &self.ev_color, ev).dashed("8,3,2,3"));
        }

        let mut notes = Vec::new();
        for projection in ordered_projections(analysis) {
            let (color, label) = projection_style(projection.method);
            let eac_k = projection.eac / 1000.0;
            let curve = Curve::new(format!("{label} ({eac_k:.0} k€)"), color, &projection.series)
                .dashed("6,4");
            if let Some(&(month, value)) = curve.points.last() {
                notes.push(Annotation {
                    month,
                    value,
                    lines: vec![format!("{eac_k:.0} k€"), format_month(projection.finish_month)],
                    color: color.to_string(),
                    dy: -8.0,
                });
            }
            curves.push(curve);
        }
        (curves, notes)
    }

    /// Value grid, month ticks and axis titles
    fn render_axes(&self, frame: &Frame) -> Group {
        let mut group = Group::new().set("class", "axes");
        let left = self.plot_left();
        let right = left + f64::from(self.chart_width);
        let bottom = self.plot_top() + f64::from(self.chart_height);

        let ticks = 5;
        for i in 0..=ticks {
            let value = frame.y_min + (frame.y_max - frame.y_min) * f64::from(i) / f64::from(ticks);
            let y = self.value_to_y(value, frame);
            group = group.add(
                Line::new()
                    .set("x1", left)
                    .set("y1", y)
                    .set("x2", right)
                    .set("y2", y)
                    .set("stroke", self.grid_color.as_str())
                    .set("stroke-width", 1),
            );
            group = group.add(
                self.text(format!("{value:.0}"), left - 8.0, y + 4.0, self.font_size - 1, &self.text_color)
                    .set("text-anchor", "end"),
            );
        }

        if frame.y_min < 0.0 {
            let y = self.value_to_y(0.0, frame);
            group = group.add(
                Line::new()
                    .set("x1", left)
                    .set("y1", y)
                    .set("x2", right)
                    .set("y2", y)
                    .set("stroke", "#95a5a6")
                    .set("stroke-width", 1),
            );
        }

        // At most about twelve month labels
        let step = usize::try_from(frame.span / 12 + 1).unwrap_or(1);
        let last = frame.first.add_months(frame.span);
        for (i, month) in Month::range_inclusive(frame.first, last).enumerate() {
            let x = self.month_to_x(month, frame);
            group = group.add(
                Line::new()
                    .set("x1", x)
                    .set("y1", self.plot_top())
                    .set("x2", x)
                    .set("y2", bottom)
                    .set("stroke", self.grid_color.as_str())
                    .set("stroke-width", 1),
            );
            if i % step == 0 {
                let y = bottom + 16.0;
                group = group.add(
                    self.text(format_month(month), x, y, self.font_size - 1, &self.text_color)
                        .set("text-anchor", "end")
                        .set("transform", format!("rotate(-35 {x} {y})")),
                );
            }
        }

        let axis_y = self.plot_top() + f64::from(self.chart_height) / 2.0;
        let axis_x = f64::from(self.padding) + 12.0;
        group = group.add(
            self.text("Montant cumulé (k€)", axis_x, axis_y, self.font_size, &self.text_color)
                .set("text-anchor", "middle")
                .set("transform", format!("rotate(-90 {axis_x} {axis_y})")),
        );
        group.add(
            self.text("Mois", left + f64::from(self.chart_width) / 2.0, bottom + 52.0, self.font_size, &self.text_color)
                .set("text-anchor", "middle"),
        )
    }

    fn render_curve(&self, curve: &Curve, frame: &Frame) -> Group {
        let mut group = Group::new().set("class", "series");
        let mut points = String::new();
        for &(month, value) in &curve.points {
            let (x, y) = (self.month_to_x(month, frame), self.value_to_y(value, frame));
            points.push_str(&format!("{x:.1},{y:.1} "));
            group = group.add(
                Circle::new()
                    .set("cx", x)
                    .set("cy", y)
                    .set("r", 3)
                    .set("fill", curve.color.as_str()),
            );
        }
        let mut line = Polyline::new()
            .set("points", points.trim_end())
            .set("fill", "none")
            .set("stroke", curve.color.as_str())
            .set("stroke-width", curve.width);
        if let Some(dash) = curve.dash {
            line = line.set("stroke-dasharray", dash);
        }
        group.add(line)
    }

    fn render_annotation(&self, note: &Annotation, frame: &Frame) -> Group {
        let mut group = Group::new().set("class", "annotation");
        let x = self.month_to_x(note.month, frame) + 6.0;
        let mut y = self.value_to_y(note.value, frame) + note.dy;
        for line in &note.lines {
            group = group.add(self.text(line.as_str(), x, y, self.font_size - 2, &note.color));
            y += f64::from(self.font_size);
        }
        group
    }

    fn render_legend(&self, curves: &[Curve], y_offset: f64) -> Group {
        let mut group = Group::new().set("class", "legend");
        let x = self.plot_left();
        for (i, curve) in curves.iter().enumerate() {
            let y = y_offset + i as f64 * 18.0;
            let mut swatch = Line::new()
                .set("x1", x)
                .set("y1", y - 4.0)
                .set("x2", x + 24.0)
                .set("y2", y - 4.0)
                .set("stroke", curve.color.as_str())
                .set("stroke-width", curve.width);
            if let Some(dash) = curve.dash {
                swatch = swatch.set("stroke-dasharray", dash);
            }
            group = group.add(swatch);
            group = group.add(self.text(curve.label.as_str(), x + 32.0, y, self.font_size - 1, &self.text_color));
        }
        group
    }
}

/// Projections in reporting order: CPI, CPI×SPI, Reste à Plan, Forecast
pub fn ordered_projections(analysis: &EvmAnalysis) -> Vec<Projection> {
    let mut all = analysis.all_projections();
    all.sort_by_key(|p| p.method);
    all
}

impl Renderer for SvgRenderer {
    type Output = String;

    fn render(&self, analysis: &EvmAnalysis) -> Result<String, RenderError> {
        let (curves, notes) = match self.kind {
            ChartKind::Realised => {
                if analysis.actual_cost.is_empty() {
                    return Err(RenderError::InvalidData("No actual cost to chart".into()));
                }
                self.realised_curves(analysis)
            }
            ChartKind::Projections => {
                if analysis.all_projections().is_empty() {
                    return Err(RenderError::InvalidData("No projection to chart".into()));
                }
                self.projection_curves(analysis)
            }
        };
        let frame = Frame::from_curves(&curves)
            .ok_or_else(|| RenderError::InvalidData("No finite value to chart".into()))?;

        let width = self.padding * 2 + self.axis_width + self.chart_width + self.gutter;
        let legend_top = self.plot_top() + f64::from(self.chart_height) + 80.0;
        let height = (legend_top + curves.len() as f64 * 18.0) as u32 + self.padding;

        let mut document = Document::new()
            .set("width", width)
            .set("height", height)
            .set("viewBox", (0, 0, width, height))
            .set("xmlns", "http://www.w3.org/2000/svg");

        document = document.add(
            Rectangle::new()
                .set("width", "100%")
                .set("height", "100%")
                .set("fill", self.background_color.as_str()),
        );
        document = document.add(
            self.text(
                self.kind.title(),
                f64::from(self.padding),
                f64::from(self.padding) + 18.0,
                self.font_size + 4,
                &self.text_color,
            )
            .set("font-weight", "bold"),
        );

        document = document.add(self.render_axes(&frame));
        for curve in &curves {
            document = document.add(self.render_curve(curve, &frame));
        }
        for note in &notes {
            document = document.add(self.render_annotation(note, &frame));
        }
        document = document.add(self.render_legend(&curves, legend_top));

        let mut output = Vec::new();
        svg::write(&mut output, &document)
            .map_err(|e| RenderError::Format(format!("Failed to write SVG: {}", e)))?;

        String::from_utf8(output).map_err(|e| RenderError::Format(format!("Invalid UTF-8: {}", e)))
    }
}

// ============================================================================
// Text and JSON
// ============================================================================

/// Plain text renderer for console output
#[derive(Default)]
pub struct TextRenderer;

impl TextRenderer {
    fn write_series(out: &mut String, title: &str, series: &CumulativeSeries) {
        out.push_str(&format!("\n=== {title} ===\n"));
        for (month, value) in series.iter() {
            out.push_str(&format!("{month}  {:>16}\n", format_euros(value)));
        }
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, analysis: &EvmAnalysis) -> Result<String, RenderError> {
        let mut out = String::new();
        Self::write_series(&mut out, "AC (Dépenses réelles cumulées)", &analysis.actual_cost);
        if let Some(pv) = &analysis.planned_value {
            Self::write_series(&mut out, "PV (Planned Value cumulée)", &pv.series);
            out.push_str(&format!(
                "Colonnes détectées: date '{}', montant '{}'\n",
                pv.date_column,
                pv.amount_column
            ));
        }
        if let Some(ev) = analysis.ev_series() {
            Self::write_series(&mut out, "EV (Earned Value cumulée)", ev);
        }

        if let Some(status) = analysis.status() {
            out.push_str(&format!("\n=== INDICATEURS AU {} ===\n", status.status_month));
            out.push_str(&format!("CV:  {}\n", format_euros(status.cv)));
            out.push_str(&format!("SV:  {}\n", format_euros(status.sv)));
            out.push_str(&format!("CPI: {}\n", format_index(status.cpi)));
            out.push_str(&format!("SPI: {}\n", format_index(status.spi)));
            out.push_str(&format!("Statut: {}\n", status.status_indicator()));
        }

        let projections = ordered_projections(analysis);
        if !projections.is_empty() {
            out.push_str("\n=== PROJECTIONS À TERMINAISON ===\n");
            for p in &projections {
                out.push_str(&format!(
                    "{:<11} {:<32} EAC {:>18}  fin {}\n",
                    p.method.id(),
                    p.method.formula(),
                    format_euros(p.eac),
                    format_month(p.finish_month)
                ));
            }
        }

        let table = ComparisonTable::from_analysis(analysis);
        out.push_str("\n=== TABLEAU COMPARATIF EVM ===\n");
        out.push_str(&table.to_text());
        Ok(out)
    }
}

/// Serialized view of an analysis
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    analysis: &'a EvmAnalysis,
    status: Option<EvmStatus>,
    comparison: ComparisonTable,
    scenarios: BTreeMap<&'static str, &'a Projection>,
}

/// JSON renderer (pretty-printed)
#[derive(Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    type Output = String;

    fn render(&self, analysis: &EvmAnalysis) -> Result<String, RenderError> {
        let projections = analysis.all_projections();
        let report = JsonReport {
            analysis,
            status: analysis.status(),
            comparison: ComparisonTable::from_analysis(analysis),
            scenarios: projections.iter().map(|p| (p.method.id(), p)).collect(),
        };
        serde_json::to_string_pretty(&report)
            .map_err(|e| RenderError::Format(format!("Failed to write JSON: {e}")))
    }
}
