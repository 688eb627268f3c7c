//! The `analyze` command: load inputs, run the pipeline, write outputs

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use evmtrack_calc::EvmCalculator;
use evmtrack_core::{EvmAnalysis, EvmEngine, EvmInputs, RenderError, Renderer};
use evmtrack_io::{read_optional_table, read_table};
use evmtrack_render::{
    chart_path, ChartKind, CsvRenderer, ExcelRenderer, JsonRenderer, MarkdownReportRenderer,
    SvgRenderer, TextRenderer,
};
use tracing::{debug, info, warn};

use crate::config::Config;

/// `<base>.<ext>` without replacing an extension-like suffix of `base`
fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Cannot write {}", path.display()))
}

/// Render, or `None` with a warning when there is nothing to draw
fn render_optional<R: Renderer>(renderer: &R, analysis: &EvmAnalysis, what: &str) -> Result<Option<R::Output>> {
    match renderer.render(analysis) {
        Ok(output) => Ok(Some(output)),
        Err(RenderError::InvalidData(reason)) => {
            warn!(output = what, %reason, "output skipped");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("Cannot render {what}")),
    }
}

/// Link from the report to `target`, relative when both share a directory
fn link_from(report: &Path, target: &Path) -> String {
    let report_dir = report.parent().unwrap_or_else(|| Path::new(""));
    target
        .strip_prefix(report_dir)
        .unwrap_or(target)
        .to_string_lossy()
        .replace('\\', "/")
}

fn load_inputs(config: &Config) -> Result<EvmInputs> {
    let paths = &config.inputs;
    if !paths.spend.exists() {
        bail!("Fichier de dépenses introuvable: {}", paths.spend.display());
    }
    let spend = read_table(&paths.spend)
        .with_context(|| format!("Cannot read spend export {}", paths.spend.display()))?;

    Ok(EvmInputs::new(spend)
        .planned_value(read_optional_table(&paths.planned_value))
        .progress(read_optional_table(&paths.progress))
        .forecast(read_optional_table(&paths.forecast))
        .columns(config.columns.clone())
        .forecast_mode(config.forecast.accumulation))
}

fn print_intro(config: &Config) {
    let inputs = &config.inputs;
    let outputs = &config.outputs;
    println!("=== Analyse EVM ===");
    println!("Dépenses:       {}", inputs.spend.display());
    println!("Budget prévu:   {}", inputs.planned_value.display());
    println!("Avancement:     {}", inputs.progress.display());
    println!("Forecast:       {}", inputs.forecast.display());
    println!("Graphiques:     {}", outputs.chart.display());
    println!("Tableau:        {}", outputs.table.display());
    if let Some(report) = &outputs.report {
        println!("Rapport:        {}", report.display());
    }
}

/// Run the analysis and write every output.
///
/// Returns the files left on disk.
pub fn run(config: &Config) -> Result<Vec<PathBuf>> {
    print_intro(config);
    let inputs = load_inputs(config)?;

    let analysis = EvmCalculator::new()
        .analyze(&inputs)
        .context("Analyse impossible")?;

    if let Some(pv) = &analysis.planned_value {
        info!(
            date_column = %pv.date_column,
            amount_column = %pv.amount_column,
            interpolated = pv.interpolated_months,
            "planned value columns detected"
        );
    }
    let summary = TextRenderer.render(&analysis)?;
    print!("{summary}");
    println!();

    let outputs = &config.outputs;
    let mut written = Vec::new();
    let mut charts = Vec::new();

    for kind in [ChartKind::Realised, ChartKind::Projections] {
        let renderer = SvgRenderer::new().kind(kind);
        if let Some(svg) = render_optional(&renderer, &analysis, kind.suffix())? {
            let path = chart_path(&outputs.chart, kind);
            write_file(&path, svg)?;
            println!("✓ Graphique sauvegardé: {}", path.display());
            charts.push((kind, path));
        }
    }

    let mut table_files = Vec::new();
    if let Some(csv) = render_optional(&CsvRenderer::new(), &analysis, "csv")? {
        let path = with_suffix(&outputs.table, "csv");
        write_file(&path, csv)?;
        table_files.push(path);
    }
    if let Some(xlsx) = render_optional(&ExcelRenderer::new(), &analysis, "xlsx")? {
        let path = with_suffix(&outputs.table, "xlsx");
        write_file(&path, xlsx)?;
        table_files.push(path);
    }
    if !table_files.is_empty() {
        let names: Vec<String> = table_files.iter().map(|p| p.display().to_string()).collect();
        println!("✓ Tableau sauvegardé: {}", names.join(" et "));
    }

    if let Some(path) = &outputs.json {
        let json = JsonRenderer.render(&analysis)?;
        write_file(path, json)?;
        println!("✓ JSON sauvegardé: {}", path.display());
        written.push(path.clone());
    }

    if let Some(report_path) = &outputs.report {
        let mut renderer = MarkdownReportRenderer::new();
        for (kind, path) in &charts {
            let link = link_from(report_path, path);
            renderer = match kind {
                ChartKind::Realised => renderer.realised_chart(link),
                ChartKind::Projections => renderer.projections_chart(link),
            };
        }
        if let Some(report) = render_optional(&renderer, &analysis, "report")? {
            write_file(report_path, report)?;
            println!("✓ Rapport généré: {}", report_path.display());
            written.push(report_path.clone());
        }

        // Charts stay: the report links them
        if !outputs.keep_intermediate {
            for path in table_files.drain(..) {
                match fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "intermediate file removed"),
                    Err(err) => warn!(path = %path.display(), error = %err, "cannot remove intermediate file"),
                }
            }
        }
    }

    written.extend(charts.into_iter().map(|(_, path)| path));
    written.extend(table_files);
    println!("\n✓ Analyse EVM terminée");
    Ok(written)
}
