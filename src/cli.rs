//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::panic;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Mutex, Once};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::adapters::csv_adapter::CsvQuoteSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::nav_csv_adapter::NavCsvAdapter;
use crate::domain::backtest::{self, BacktestConfig, Evaluation};
use crate::domain::config_validation::{
    EVALUATION_SECTION, positive_double, require_string, validate_eval_config,
};
use crate::domain::error::QuotevalError;
use crate::domain::feed;
use crate::domain::metrics::ScoreReport;
use crate::domain::runner::{self, StrategyRunner};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::QuoteSource;
use crate::ports::report_port::ReportPort;
use crate::strategies::{self, STRATEGY_NAMES, STRATEGY_SECTION};

pub const DEFAULT_REPORT_PATH: &str = "report.json";

#[derive(Parser, Debug)]
#[command(name = "quoteval", about = "Event-driven strategy evaluator over quote data")]
pub struct Cli {
    /// Log at debug level on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write a debug-level log to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a strategy against a quote file
    Eval {
        #[arg(short, long)]
        config: PathBuf,
        /// Quote CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Strategy name, overrides [strategy] name
        #[arg(short, long)]
        strategy: Option<String>,
        /// JSON report path, overrides [report] output
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// NAV series CSV path, overrides [report] nav_csv
        #[arg(long)]
        nav_csv: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show format, universe and timestep range of a quote file
    Inspect {
        #[arg(short, long)]
        data: PathBuf,
    },
    /// List built-in strategies
    ListStrategies,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct EvalOverrides {
    pub data: Option<PathBuf>,
    pub strategy: Option<String>,
    pub output: Option<PathBuf>,
    pub nav_csv: Option<PathBuf>,
}

/// Fully resolved inputs of one `eval` run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPlan {
    pub backtest: BacktestConfig,
    pub data_path: PathBuf,
    pub strategy_name: String,
    pub output: PathBuf,
    pub nav_csv: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    match cli.command {
        Command::Eval {
            config,
            data,
            strategy,
            output,
            nav_csv,
            dry_run,
        } => {
            let overrides = EvalOverrides {
                data,
                strategy,
                output,
                nav_csv,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_eval(&config, &overrides)
            }
        }
        Command::Inspect { data } => run_inspect(&data),
        Command::ListStrategies => run_list_strategies(),
    }
}

/// Console layer on stderr (RUST_LOG, default info) plus an optional
/// debug-level file layer.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<(), QuotevalError> {
    let console_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    // A subscriber may already be installed when `run` is called more than once.
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();
    Ok(())
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, QuotevalError> {
    FileConfigAdapter::from_file(path).map_err(|e| QuotevalError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, QuotevalError> {
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        initial_cash: positive_double(
            adapter,
            EVALUATION_SECTION,
            "initial_cash",
            defaults.initial_cash,
        )?,
        leverage_limit: positive_double(
            adapter,
            EVALUATION_SECTION,
            "leverage_limit",
            defaults.leverage_limit,
        )?,
        periods_per_year: positive_double(
            adapter,
            EVALUATION_SECTION,
            "periods_per_year",
            defaults.periods_per_year,
        )?,
    })
}

pub fn build_eval_plan(
    adapter: &dyn ConfigPort,
    overrides: &EvalOverrides,
) -> Result<EvalPlan, QuotevalError> {
    validate_eval_config(adapter)?;
    let backtest = build_backtest_config(adapter)?;

    let data_path = match &overrides.data {
        Some(p) => p.clone(),
        None => PathBuf::from(require_string(adapter, "data", "path")?),
    };
    let strategy_name = match &overrides.strategy {
        Some(s) => s.clone(),
        None => require_string(adapter, STRATEGY_SECTION, "name")?,
    };
    let output = overrides
        .output
        .clone()
        .or_else(|| adapter.get_string("report", "output").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));
    let nav_csv = overrides.nav_csv.clone().or_else(|| {
        adapter
            .get_string("report", "nav_csv")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    });

    Ok(EvalPlan {
        backtest,
        data_path,
        strategy_name,
        output,
        nav_csv,
    })
}

fn fail(e: QuotevalError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

fn run_eval(config_path: &Path, overrides: &EvalOverrides) -> ExitCode {
    match eval_pipeline(config_path, overrides) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

/// Load config, evaluate, print the summary and write reports.
pub fn eval_pipeline(
    config_path: &Path,
    overrides: &EvalOverrides,
) -> Result<Evaluation, QuotevalError> {
    // Stage 1: Load and resolve config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let plan = build_eval_plan(&adapter, overrides)?;

    // Stage 2: Resolve strategy
    let factory = strategies::factory_from_config(&plan.strategy_name, &adapter)?;
    eprintln!("Strategy: {}", plan.strategy_name);

    // Stage 3: Validate data, run, score
    eprintln!("Evaluating against {}", plan.data_path.display());
    let source = CsvQuoteSource::new(&plan.data_path);
    install_panic_filter();
    let evaluation = backtest::evaluate(&source, factory.as_ref(), &plan.backtest)?;

    // Stage 4: Summary and reports
    print_summary(&evaluation);

    JsonReportAdapter.write(&evaluation.report, &plan.output)?;
    eprintln!("\nReport written to: {}", plan.output.display());
    if let Some(nav_path) = &plan.nav_csv {
        NavCsvAdapter.write(&evaluation.report, nav_path)?;
        eprintln!("NAV series written to: {}", nav_path.display());
    }
    Ok(evaluation)
}

/// Install [`chain_panic_filter`] once per process.
fn install_panic_filter() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(chain_panic_filter);
}

/// Wrap the current panic hook. Panics raised inside strategy code are
/// recorded as step faults, so they go to the debug log only; every other
/// panic reaches the previous hook unchanged.
fn chain_panic_filter() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if runner::in_trader_call() {
            tracing::debug!("strategy panic: {info}");
        } else {
            previous(info);
        }
    }));
}

fn print_summary(evaluation: &Evaluation) {
    let report: &ScoreReport = &evaluation.report;
    let degenerate = if report.degenerate { " (degenerate)" } else { "" };

    eprintln!("\n=== Evaluation Results ===");
    eprintln!("Products:         {}", evaluation.summary.universe.count());
    eprintln!("Steps:            {}", report.steps);
    eprintln!("Initial NAV:      {:.2}", report.initial_nav);
    eprintln!("Final NAV:        {:.2}", report.final_nav);
    eprintln!("PnL:              {:.2}", report.pnl);
    eprintln!("Total Return:     {:.2}%", report.total_return * 100.0);
    eprintln!("Sharpe (step):    {:.4}{degenerate}", report.sharpe_ratio);
    eprintln!("Sharpe (annual):  {:.4}{degenerate}", report.annualized_sharpe);
    eprintln!("Max Drawdown:     -{:.2}%", report.max_drawdown * 100.0);
    eprintln!("Trades:           {}", report.trade_count);
    eprintln!("Rejected Trades:  {}", report.rejected_trades);
    eprintln!("Step Faults:      {}", report.fault_count);

    if let Some(first) = report.faults.first() {
        eprintln!(
            "  first fault at step {} ({}): {}",
            first.step, first.timestep, first.message
        );
    }
}

pub fn run_dry_run(config_path: &Path, overrides: &EvalOverrides) -> ExitCode {
    match dry_run_pipeline(config_path, overrides) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

/// Validate config, data and strategy construction without running.
pub fn dry_run_pipeline(
    config_path: &Path,
    overrides: &EvalOverrides,
) -> Result<(), QuotevalError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let plan = build_eval_plan(&adapter, overrides)?;
    let factory = strategies::factory_from_config(&plan.strategy_name, &adapter)?;
    eprintln!("Config validated successfully");

    let source = CsvQuoteSource::new(&plan.data_path);
    let summary = feed::scan(&source)?;
    StrategyRunner::load(factory.as_ref(), &summary.universe)?;

    eprintln!("\nEvaluation:");
    eprintln!("  initial_cash:     {}", plan.backtest.initial_cash);
    eprintln!("  leverage_limit:   {}", plan.backtest.leverage_limit);
    eprintln!("  periods_per_year: {}", plan.backtest.periods_per_year);
    eprintln!("\nStrategy: {}", plan.strategy_name);
    for key in adapter.section_keys(STRATEGY_SECTION) {
        if key != "name" {
            let value = adapter.get_string(STRATEGY_SECTION, &key).unwrap_or_default();
            eprintln!("  {key:<16} {value}");
        }
    }
    eprintln!("\nData: {}", source.describe());
    eprintln!("  steps:    {}", summary.steps);
    eprintln!("  range:    {} .. {}", summary.first, summary.last);
    eprintln!("  universe: {}", summary.universe.products().join(", "));
    eprintln!("\nReport: {}", plan.output.display());
    if let Some(nav) = &plan.nav_csv {
        eprintln!("NAV CSV: {}", nav.display());
    }

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_inspect(data: &Path) -> ExitCode {
    let source = CsvQuoteSource::new(data);
    let result = source
        .layout()
        .and_then(|layout| feed::scan(&source).map(|summary| (layout, summary)));

    match result {
        Ok((layout, summary)) => {
            println!("source:   {}", source.describe());
            println!("format:   {}", layout.name());
            println!("steps:    {}", summary.steps);
            println!("range:    {} .. {}", summary.first, summary.last);
            println!("products: {}", summary.universe.count());
            for product in summary.universe.iter() {
                println!("  {product}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_list_strategies() -> ExitCode {
    for (name, description) in STRATEGY_NAMES {
        println!("{name:<16} {description}");
    }
    ExitCode::SUCCESS
}
