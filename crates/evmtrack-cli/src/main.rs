//! evmtrack CLI - Earned Value Management analysis
//!
//! Command-line interface for computing AC/PV/EV series and EAC projections
//! from spreadsheet exports and rendering charts, tables and a report.
//!
//! ## Exit Codes
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success, including runs degraded by absent optional inputs |
//! | 1 | Missing spend file, unreadable input or misconfigured column |

mod analyze;
mod config;
mod inspect;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use evmtrack_core::ForecastMode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "evmtrack")]
#[command(author, version, about = "Earned value analysis of project spend", long_about = None)]
struct Cli {
    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write charts, tables and report
    Analyze(AnalyzeArgs),

    /// Show the columns of an input file and what the pipeline detects in it
    Inspect {
        /// Input file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Milestone column name
        #[arg(long, value_name = "NAME")]
        milestone: Option<String>,
    },
}

/// Flags of the analyze command; every one overrides the config file
#[derive(Args, Debug, Default)]
struct AnalyzeArgs {
    /// Spend export (default EXPORT.XLSX)
    #[arg(long, value_name = "FILE")]
    spend: Option<PathBuf>,

    /// Planned value table (default pv.xlsx)
    #[arg(long, value_name = "FILE")]
    pv: Option<PathBuf>,

    /// Percent-complete table (default va.xlsx)
    #[arg(long, value_name = "FILE")]
    va: Option<PathBuf>,

    /// Manual forecast table (default forecast.xlsx)
    #[arg(long, value_name = "FILE")]
    forecast: Option<PathBuf>,

    /// Chart base path (default analyse_evm.svg)
    #[arg(long, value_name = "FILE")]
    chart: Option<PathBuf>,

    /// Table base path, without extension (default tableau_evm)
    #[arg(long, value_name = "BASE")]
    table: Option<PathBuf>,

    /// Write a Markdown report
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Write the analysis as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE", env = "EVMTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Keep table files when a report is written
    #[arg(long)]
    keep_intermediate: bool,

    /// How forecast entries accumulate
    #[arg(long, value_enum, value_name = "MODE")]
    forecast_mode: Option<ForecastModeArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ForecastModeArg {
    SumOfEac,
    NetOfEarned,
}

impl From<ForecastModeArg> for ForecastMode {
    fn from(arg: ForecastModeArg) -> Self {
        match arg {
            ForecastModeArg::SumOfEac => ForecastMode::SumOfEac,
            ForecastModeArg::NetOfEarned => ForecastMode::NetOfEarned,
        }
    }
}

impl AnalyzeArgs {
    /// Config file (or defaults) with the flags applied on top
    fn resolve(self) -> Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        let inputs = &mut config.inputs;
        if let Some(path) = self.spend {
            inputs.spend = path;
        }
        if let Some(path) = self.pv {
            inputs.planned_value = path;
        }
        if let Some(path) = self.va {
            inputs.progress = path;
        }
        if let Some(path) = self.forecast {
            inputs.forecast = path;
        }

        let outputs = &mut config.outputs;
        if let Some(path) = self.chart {
            outputs.chart = path;
        }
        if let Some(path) = self.table {
            outputs.table = path;
        }
        if self.report.is_some() {
            outputs.report = self.report;
        }
        if self.json.is_some() {
            outputs.json = self.json;
        }
        outputs.keep_intermediate |= self.keep_intermediate;

        if let Some(mode) = self.forecast_mode {
            config.forecast.accumulation = mode.into();
        }
        Ok(config)
    }
}

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    /// Success, possibly with degraded output
    Success = 0,
    /// Structural error or missing required input
    Failure = 1,
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Analyze(args) => {
            let config = args.resolve()?;
            analyze::run(&config).map(|_| ())
        }
        Commands::Inspect { file, milestone } => {
            let milestone = milestone.unwrap_or_else(|| evmtrack_core::DEFAULT_MILESTONE.to_string());
            inspect::run(&file, &milestone)
        }
    }
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let code = match run(cli.command) {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            eprintln!("Erreur: {err:#}");
            ExitCode::Failure
        }
    };
    code.into()
}
